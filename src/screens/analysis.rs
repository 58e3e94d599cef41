use super::{parse_date, parse_month, render, today};
use crate::errors::AppError;
use crate::models::{Expense, MonthQuery, Note, ProteinEntry, WaterEntry};
use crate::session::CurrentUser;
use crate::state::AppState;
use crate::stats::{first_of_month, month_bounds, summarize_month, DaySummary, MonthlySummary};
use crate::storage::{Filter, Order};
use crate::ui::{format_amount, format_liters, stat, Nav};
use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tower_sessions::Session;
use uuid::Uuid;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub summary: MonthlySummary,
    pub selected: Option<DaySummary>,
}

pub async fn load(state: &AppState, user_id: Uuid, month: NaiveDate) -> MonthlySummary {
    let (start, end) = month_bounds(month);
    let filter = Filter::owned_by(user_id).between(start, end);
    let expenses: Vec<Expense> = state.store.list(&filter, Order::Inserted).await;
    let protein: Vec<ProteinEntry> = state.store.list(&filter, Order::Inserted).await;
    let water: Vec<WaterEntry> = state.store.list(&filter, Order::Inserted).await;
    let notes: Vec<Note> = state.store.list(&filter, Order::Inserted).await;
    summarize_month(start, &expenses, &protein, &water, &notes)
}

/// Resolves `?month=` and `?day=`; a day outside the month selects nothing.
fn resolve(query: &MonthQuery) -> Result<(NaiveDate, Option<NaiveDate>), AppError> {
    let day = match query.day.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_date(Some(raw), today())?),
        None => None,
    };
    let month = match (query.month.as_deref(), day) {
        (None, Some(day)) => parse_month(None, day)?,
        (raw, _) => parse_month(raw, today())?,
    };
    Ok((month, day))
}

pub async fn api_month(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let (month, day) = resolve(&query)?;
    let summary = load(&state, user.id, month).await;
    let selected = day.and_then(|d| summary.day(d).cloned());
    Ok(Json(AnalysisResponse { summary, selected }))
}

pub async fn page(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Query(query): Query<MonthQuery>,
) -> Result<Html<String>, AppError> {
    let (month, day) = resolve(&query).unwrap_or_else(|_| (first_of_month(today()), None));
    let summary = load(&state, user.id, month).await;
    let today = today();
    let selected = day.or_else(|| (month_bounds(today).0 == summary.start).then_some(today));
    render(
        &session,
        &user,
        "Analysis",
        Nav::Analysis,
        render_analysis(&summary, selected, today),
    )
    .await
}

fn day_cell(day: &DaySummary, selected: Option<NaiveDate>, today: NaiveDate) -> String {
    let mut classes = vec!["day"];
    if !day.has_data {
        classes.push("empty");
    }
    if day.date == today {
        classes.push("today");
    }
    if Some(day.date) == selected {
        classes.push("selected");
    }
    let dot = |kind: &str, level: u8| format!(r#"<span class="dot {kind} l{level}"></span>"#);
    let expense_dot = if day.expenses > 0.0 {
        r#"<span class="dot expense"></span>"#.to_string()
    } else {
        String::new()
    };
    format!(
        r#"<a class="{classes}" href="/analysis?month={month}&day={date}"><strong>{n}</strong><span class="dots">{expense_dot}{protein}{water}</span></a>"#,
        classes = classes.join(" "),
        month = day.date.format("%Y-%m"),
        date = day.date,
        n = day.date.day(),
        protein = if day.protein > 0.0 { dot("protein", day.protein_level) } else { String::new() },
        water = if day.water > 0 { dot("water", day.water_level) } else { String::new() },
    )
}

fn day_details(day: Option<&DaySummary>) -> String {
    let Some(day) = day else {
        return r#"<p class="hint">Select a day to see its details.</p>"#.to_string();
    };
    if !day.has_data {
        return format!(
            r#"<h2>{}</h2><p class="hint">No data recorded for this day.</p>"#,
            day.date.format("%A, %B %-d")
        );
    }
    format!(
        r#"<h2>{date}</h2><div class="panel">{expenses}{protein}{water}{notes}</div>"#,
        date = day.date.format("%A, %B %-d"),
        expenses = stat("Expenses", &format!("₹{}", format_amount(day.expenses)), "expense"),
        protein = stat(
            "Protein",
            &format!(
                "{:.0}g{}",
                day.protein,
                if day.protein_goal_met { " ✓" } else { "" }
            ),
            "protein"
        ),
        water = stat(
            "Water",
            &format!(
                "{}{}",
                format_liters(f64::from(day.water)),
                if day.water_goal_met { " ✓" } else { "" }
            ),
            "water"
        ),
        notes = stat("Notes", &day.notes.to_string(), ""),
    )
}

fn render_analysis(summary: &MonthlySummary, selected: Option<NaiveDate>, today: NaiveDate) -> String {
    let heads: String = WEEKDAYS
        .iter()
        .map(|d| format!(r#"<span class="head">{d}</span>"#))
        .collect();
    let blanks = "<span></span>".repeat(summary.leading_blanks as usize);
    let cells: String = summary
        .days
        .iter()
        .map(|d| day_cell(d, selected, today))
        .collect();
    let totals = &summary.totals;

    format!(
        r#"<nav class="nav">
  <a class="tab" href="/analysis?month={prev}">← Previous</a>
  <span class="tab active">{title}</span>
  <a class="tab" href="/analysis?month={next}">Next →</a>
</nav>
<section class="card"><div class="calendar">{heads}{blanks}{cells}</div></section>
<section class="card">{details}</section>
<section class="panel">{spent}{protein_days}{water_days}{active}</section>"#,
        prev = summary.previous_month,
        next = summary.next_month,
        title = summary.start.format("%B %Y"),
        details = day_details(selected.and_then(|d| summary.day(d))),
        spent = stat("Spent this month", &format!("₹{}", format_amount(totals.expenses)), "expense"),
        protein_days = stat("Protein goal days", &totals.protein_goal_days.to_string(), "protein"),
        water_days = stat("Water goal days", &totals.water_goal_days.to_string(), "water"),
        active = stat("Active days", &totals.active_days.to_string(), ""),
    )
}
