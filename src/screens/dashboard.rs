use super::{finish, parse_date, render, today};
use crate::errors::AppError;
use crate::models::{DateQuery, Expense, Note, ProteinEntry, WaterEntry};
use crate::session::{CurrentUser, Notice};
use crate::state::AppState;
use crate::stats::{summarize_dashboard, DashboardSummary};
use crate::storage::{Filter, Order};
use crate::ui::{format_amount, format_liters, progress_bar, stat, Nav};
use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetCounts {
    pub expenses: usize,
    pub protein_entries: usize,
    pub water_entries: usize,
}

pub async fn load(state: &AppState, user_id: Uuid, date: NaiveDate) -> DashboardSummary {
    let filter = Filter::owned_by(user_id).on(date);
    let expenses: Vec<Expense> = state.store.list(&filter, Order::Inserted).await;
    let protein: Vec<ProteinEntry> = state.store.list(&filter, Order::Inserted).await;
    let water: Vec<WaterEntry> = state.store.list(&filter, Order::Inserted).await;
    let notes: Vec<Note> = state.store.list(&filter, Order::Inserted).await;
    summarize_dashboard(date, &expenses, &protein, &water, notes)
}

/// Deletes the day's expense, protein and water records. Notes are kept.
pub async fn reset_day(
    state: &AppState,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<ResetCounts, AppError> {
    let filter = Filter::owned_by(user_id).on(date);
    let counts = state
        .store
        .transaction(move |batch| {
            Ok(ResetCounts {
                expenses: batch.delete_where::<Expense, _>(|row| filter.matches(row)),
                protein_entries: batch.delete_where::<ProteinEntry, _>(|row| filter.matches(row)),
                water_entries: batch.delete_where::<WaterEntry, _>(|row| filter.matches(row)),
            })
        })
        .await?;
    info!(
        user_id = %user_id,
        date = %date,
        expenses = counts.expenses,
        protein_entries = counts.protein_entries,
        water_entries = counts.water_entries,
        "day reset"
    );
    Ok(counts)
}

pub async fn api_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<DashboardSummary>, AppError> {
    let date = parse_date(query.date.as_deref(), today())?;
    Ok(Json(load(&state, user.id, date).await))
}

pub async fn api_reset(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<DashboardSummary>, AppError> {
    let date = today();
    reset_day(&state, user.id, date).await?;
    Ok(Json(load(&state, user.id, date).await))
}

pub async fn page(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> Result<Html<String>, AppError> {
    let summary = load(&state, user.id, today()).await;
    render(
        &session,
        &user,
        "Dashboard",
        Nav::Dashboard,
        render_dashboard(&summary),
    )
    .await
}

pub async fn submit_reset(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> Result<Redirect, AppError> {
    let outcome = reset_day(&state, user.id, today())
        .await
        .map(|_| Notice::success("Data Reset").with_description("Today's data has been cleared."));
    finish(&session, "/", outcome).await
}

fn render_dashboard(summary: &DashboardSummary) -> String {
    let protein = &summary.protein;
    let water = &summary.water;
    format!(
        r#"<section class="card">
  <h2>{date}</h2>
  <form method="post" action="/reset-today"><button class="btn-ghost" type="submit">Reset Today's Data</button></form>
</section>
<section class="panel">{expense}{protein_stat}{water_stat}{tasks}</section>
<section class="card">
  <h2>Protein goal</h2>{protein_bar}
  <p class="hint">{protein_pct:.0}% of {protein_goal:.0}g</p>
  <h2>Water goal</h2>{water_bar}
  <p class="hint">{water_pct:.0}% of {water_goal}</p>
</section>"#,
        date = summary.date.format("%A, %B %-d, %Y"),
        expense = stat(
            "Total Expense",
            &format!("₹{}", format_amount(summary.expense_total)),
            "expense"
        ),
        protein_stat = stat("Protein Intake", &format!("{:.0}g", protein.total), "protein"),
        water_stat = stat("Water Intake", &format_liters(water.total), "water"),
        tasks = stat(
            "Tasks",
            &format!("{}/{}", summary.completed_tasks, summary.total_tasks),
            ""
        ),
        protein_bar = progress_bar(protein.bar_percentage, "protein"),
        protein_pct = protein.percentage,
        protein_goal = protein.goal,
        water_bar = progress_bar(water.bar_percentage, "water"),
        water_pct = water.percentage,
        water_goal = format_liters(water.goal),
    )
}
