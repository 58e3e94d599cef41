use super::{back_to, finish, parse_date, parse_number, render, today};
use crate::errors::{ApiJson, AppError};
use crate::models::{DateQuery, WaterEntry};
use crate::session::{CurrentUser, Notice};
use crate::state::AppState;
use crate::stats::{crosses_water_goal, summarize_water, water_total, WaterSummary, WATER_GOAL_ML};
use crate::storage::{Filter, Order};
use crate::ui::{delete_button, format_liters, progress_bar, stat, Nav};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    Form, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

pub const QUICK_AMOUNTS_ML: [u32; 3] = [250, 500, 1000];

const TOO_LARGE: &str = "Amount is too large";

#[derive(Debug, Deserialize)]
pub struct NewWater {
    pub amount_ml: i64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WaterForm {
    pub amount_ml: String,
    pub date: String,
}

impl TryFrom<WaterForm> for NewWater {
    type Error = AppError;

    fn try_from(form: WaterForm) -> Result<Self, Self::Error> {
        let amount = parse_number(&form.amount_ml, "Amount")?;
        if amount.fract() != 0.0 {
            return Err(AppError::bad_request("Amount must be whole millilitres"));
        }
        if amount > f64::from(u32::MAX) {
            return Err(AppError::bad_request(TOO_LARGE));
        }
        Ok(Self {
            amount_ml: amount as i64,
            date: Some(parse_date(Some(&form.date), today())?),
        })
    }
}

/// A logged drink and whether it took the day across the goal.
#[derive(Debug, Clone)]
pub struct Logged {
    pub entry: WaterEntry,
    pub total_ml: u32,
    pub goal_reached: bool,
}

#[derive(Debug, Serialize)]
pub struct WaterResponse {
    #[serde(flatten)]
    pub summary: WaterSummary,
    pub goal_reached: bool,
}

async fn entries_for(state: &AppState, user_id: Uuid, date: NaiveDate) -> Vec<WaterEntry> {
    state
        .store
        .list::<WaterEntry>(&Filter::owned_by(user_id).on(date), Order::NewestFirst)
        .await
}

pub async fn load(state: &AppState, user_id: Uuid, date: NaiveDate) -> WaterSummary {
    summarize_water(date, entries_for(state, user_id, date).await)
}

pub async fn create(state: &AppState, user_id: Uuid, input: NewWater) -> Result<Logged, AppError> {
    if input.amount_ml <= 0 {
        return Err(AppError::bad_request("Amount must be greater than zero"));
    }
    let amount_ml =
        u32::try_from(input.amount_ml).map_err(|_| AppError::bad_request(TOO_LARGE))?;
    let date = input.date.unwrap_or_else(today);

    let before = water_total(&entries_for(state, user_id, date).await);
    let entry = state
        .store
        .insert(WaterEntry {
            id: Uuid::new_v4(),
            user_id,
            amount_ml,
            date,
            created_at: Utc::now(),
        })
        .await?;
    let goal_reached = crosses_water_goal(before, amount_ml);
    info!(
        user_id = %user_id,
        id = %entry.id,
        table = "water_entries",
        amount_ml,
        goal_reached,
        "water logged"
    );

    Ok(Logged {
        entry,
        total_ml: before.saturating_add(amount_ml),
        goal_reached,
    })
}

pub async fn remove(state: &AppState, user_id: Uuid, id: Uuid) -> Result<WaterEntry, AppError> {
    let filter = Filter::owned_by(user_id);
    let entry = state
        .store
        .find::<WaterEntry>(id, &filter)
        .await
        .ok_or_else(|| AppError::not_found("Entry not found"))?;
    state.store.delete::<WaterEntry>(id, &filter).await?;
    info!(user_id = %user_id, id = %id, table = "water_entries", "water entry deleted");
    Ok(entry)
}

fn logged_notice(logged: &Logged) -> Notice {
    if logged.goal_reached {
        Notice::success("🎉 Goal Achieved!").with_description("You've hit your daily water goal!")
    } else {
        Notice::success("Water logged").with_description(format!(
            "+{}ml added (Total: {})",
            logged.entry.amount_ml,
            format_liters(f64::from(logged.total_ml))
        ))
    }
}

pub async fn api_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<WaterSummary>, AppError> {
    let date = parse_date(query.date.as_deref(), today())?;
    Ok(Json(load(&state, user.id, date).await))
}

pub async fn api_create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NewWater>,
) -> Result<(StatusCode, Json<WaterResponse>), AppError> {
    let logged = create(&state, user.id, input).await?;
    let summary = load(&state, user.id, logged.entry.date).await;
    Ok((
        StatusCode::CREATED,
        Json(WaterResponse {
            summary,
            goal_reached: logged.goal_reached,
        }),
    ))
}

pub async fn api_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<WaterSummary>, AppError> {
    let entry = remove(&state, user.id, id).await?;
    Ok(Json(load(&state, user.id, entry.date).await))
}

pub async fn page(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Query(query): Query<DateQuery>,
) -> Result<Html<String>, AppError> {
    let date = parse_date(query.date.as_deref(), today()).unwrap_or_else(|_| today());
    let summary = load(&state, user.id, date).await;
    render(&session, &user, "Water Tracker", Nav::Water, render_water(&summary)).await
}

pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Form(form): Form<WaterForm>,
) -> Result<Redirect, AppError> {
    let back = back_to("/water", &form.date);
    let outcome = async {
        let logged = create(&state, user.id, NewWater::try_from(form)?).await?;
        Ok::<_, AppError>(logged_notice(&logged))
    }
    .await;
    finish(&session, &back, outcome).await
}

pub async fn submit_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let (back, outcome) = match remove(&state, user.id, id).await {
        Ok(entry) => (
            back_to("/water", &entry.date.to_string()),
            Ok(Notice::success("Entry removed")),
        ),
        Err(err) => ("/water".to_string(), Err(err)),
    };
    finish(&session, &back, outcome).await
}

fn render_water(summary: &WaterSummary) -> String {
    let progress = &summary.progress;
    let quick: String = QUICK_AMOUNTS_ML
        .iter()
        .map(|ml| {
            format!(
                r#"<form method="post" action="/water" class="inline">
  <input type="hidden" name="amount_ml" value="{ml}" />
  <input type="hidden" name="date" value="{date}" />
  <button class="btn-sub" type="submit">+{ml}ml</button>
</form>"#,
                date = summary.date,
            )
        })
        .collect();

    let recent: String = summary
        .recent
        .iter()
        .map(|entry| {
            format!(
                "<li><span>{}ml</span><span>{} {}</span></li>",
                entry.amount_ml,
                entry.created_at.format("%H:%M"),
                delete_button(&format!("/water/{}/delete", entry.id), "Delete entry"),
            )
        })
        .collect();
    let recent = if recent.is_empty() {
        r#"<p class="hint">No water logged yet.</p>"#.to_string()
    } else {
        format!(r#"<ul class="rows">{recent}</ul>"#)
    };

    let status = if progress.goal_met {
        "Daily goal achieved. Keep it up!".to_string()
    } else {
        format!(
            "{} more glasses to reach {}.",
            summary.glasses_to_goal,
            format_liters(f64::from(WATER_GOAL_ML))
        )
    };

    format!(
        r#"<section class="panel">{total}{glasses}{percent}</section>
<section class="card">{bar}<p class="hint">{status}</p><div>{quick}</div>
  <form class="grid" method="post" action="/water">
    <label>Custom amount (ml)<input name="amount_ml" type="number" min="1" step="1" required /></label>
    <input type="hidden" name="date" value="{date}" />
    <button class="btn-add" type="submit">Log</button>
  </form>
</section>
<section class="card"><h2>Recent</h2>{recent}</section>"#,
        total = stat(
            "Intake",
            &format!(
                "{} / {}",
                format_liters(progress.total),
                format_liters(progress.goal)
            ),
            "water"
        ),
        glasses = stat(
            "Glasses",
            &format!("{} / {}", summary.glasses, summary.glasses_goal),
            "water"
        ),
        percent = stat("Progress", &format!("{:.0}%", progress.percentage), "water"),
        bar = progress_bar(progress.bar_percentage, "water"),
        date = summary.date,
    )
}
