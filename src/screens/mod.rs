//! Feature screens. Each one exposes its orchestration (scoped reads, writes,
//! aggregation) once, and wraps it twice: an HTML page whose forms POST and
//! redirect back, and JSON endpoints under `/api`.

pub mod account;
pub mod admin;
pub mod analysis;
pub mod dashboard;
pub mod expenses;
pub mod notes;
pub mod protein;
pub mod water;

use crate::errors::AppError;
use crate::models::{ExpenseCategory, ProteinFood};
use crate::session::{CurrentUser, Notice};
use crate::state::AppState;
use crate::storage::{Filter, Order, Store};
use crate::ui::{self, Nav, Page};
use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::{Local, NaiveDate};
use tower_sessions::Session;
use tracing::{error, warn};

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses an optional `YYYY-MM-DD` value; blank means `fallback`.
pub fn parse_date(raw: Option<&str>, fallback: NaiveDate) -> Result<NaiveDate, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(fallback),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| AppError::bad_request(format!("Invalid date: {value}"))),
    }
}

/// Parses an optional `YYYY-MM` value into the first day of that month.
pub fn parse_month(raw: Option<&str>, fallback: NaiveDate) -> Result<NaiveDate, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(crate::stats::first_of_month(fallback)),
        Some(value) => NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
            .map_err(|_| AppError::bad_request(format!("Invalid month: {value}"))),
    }
}

pub fn parse_number(raw: &str, field: &str) -> Result<f64, AppError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| AppError::bad_request(format!("{field} must be a number")))
}

pub fn required(raw: &str, message: &str) -> Result<String, AppError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(message));
    }
    Ok(value.to_string())
}

/// `path` with a `?date=` suffix when `raw` is a valid date other than today.
pub fn back_to(path: &str, raw: &str) -> String {
    match parse_date(Some(raw), today()) {
        Ok(date) if date != today() => format!("{path}?date={date}"),
        _ => path.to_string(),
    }
}

/// Queues the outcome of a form POST as a notice and sends the browser back.
pub async fn finish(
    session: &Session,
    to: &str,
    outcome: Result<Notice, AppError>,
) -> Result<Redirect, AppError> {
    let notice = match outcome {
        Ok(notice) => notice,
        Err(err) => {
            if err.status.is_server_error() {
                error!(status = %err.status, "write failed: {}", err.message);
            } else {
                warn!(status = %err.status, "rejected write: {}", err.message);
            }
            Notice::from(&err)
        }
    };
    notice.flash(session).await?;
    Ok(Redirect::to(to))
}

/// Renders a gated screen, consuming any pending notice.
pub async fn render(
    session: &Session,
    user: &CurrentUser,
    title: &str,
    nav: Nav,
    body: String,
) -> Result<Html<String>, AppError> {
    let notice = Notice::take(session).await?;
    Ok(Html(ui::render_page(Page {
        title,
        nav,
        user: Some(user),
        notice,
        body,
    })))
}

/// Categories ordered by group name, then name.
pub async fn categories(store: &Store) -> Vec<ExpenseCategory> {
    let mut rows: Vec<ExpenseCategory> = store.list(&Filter::all(), Order::Inserted).await;
    rows.sort_by(|a, b| {
        a.group_name
            .cmp(&b.group_name)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Protein foods ordered by sort order.
pub async fn foods(store: &Store) -> Vec<ProteinFood> {
    let mut rows: Vec<ProteinFood> = store.list(&Filter::all(), Order::Inserted).await;
    rows.sort_by_key(|f| f.sort_order);
    rows
}

pub async fn api_categories(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Json<Vec<ExpenseCategory>> {
    Json(categories(&state.store).await)
}

pub async fn api_foods(State(state): State<AppState>, _user: CurrentUser) -> Json<Vec<ProteinFood>> {
    Json(foods(&state.store).await)
}

pub async fn not_found(OriginalUri(uri): OriginalUri, user: Option<CurrentUser>) -> Response {
    if uri.path().starts_with("/api/") {
        return AppError::not_found(format!("No route for {}", uri.path())).into_response();
    }
    (
        StatusCode::NOT_FOUND,
        Html(ui::render_not_found(user.as_ref())),
    )
        .into_response()
}
