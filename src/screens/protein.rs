use super::{back_to, finish, foods, parse_date, parse_number, render, required, today};
use crate::errors::{ApiJson, AppError};
use crate::models::{DateQuery, ProteinEntry, ProteinFood};
use crate::session::{CurrentUser, Notice};
use crate::state::AppState;
use crate::stats::{summarize_protein, ProteinSummary};
use crate::storage::{Filter, Order};
use crate::ui::{delete_button, escape, format_amount, progress_bar, stat, Nav};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    Form, Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

/// Either a reference food plus a quantity, or a free food name with the
/// protein grams given directly.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewProtein {
    pub food_id: Option<Uuid>,
    pub quantity: Option<f64>,
    pub food_name: Option<String>,
    pub protein_amount: Option<f64>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProteinForm {
    pub food_id: String,
    pub quantity: String,
    pub food_name: String,
    pub protein_amount: String,
    pub date: String,
}

impl TryFrom<ProteinForm> for NewProtein {
    type Error = AppError;

    fn try_from(form: ProteinForm) -> Result<Self, Self::Error> {
        let food_id = match form.food_id.trim() {
            "" => None,
            raw => Some(
                raw.parse::<Uuid>()
                    .map_err(|_| AppError::bad_request("Unknown food"))?,
            ),
        };
        let optional_number = |raw: &str, field: &str| -> Result<Option<f64>, AppError> {
            if raw.trim().is_empty() {
                Ok(None)
            } else {
                parse_number(raw, field).map(Some)
            }
        };

        Ok(Self {
            food_id,
            quantity: optional_number(&form.quantity, "Quantity")?,
            food_name: Some(form.food_name).filter(|name| !name.trim().is_empty()),
            protein_amount: optional_number(&form.protein_amount, "Protein")?,
            date: Some(parse_date(Some(&form.date), today())?),
        })
    }
}

pub async fn load(state: &AppState, user_id: Uuid, date: NaiveDate) -> ProteinSummary {
    let entries = state
        .store
        .list::<ProteinEntry>(&Filter::owned_by(user_id).on(date), Order::OldestFirst)
        .await;
    summarize_protein(date, entries)
}

/// Servings default to one and must be a positive number.
fn checked_quantity(quantity: Option<f64>) -> Result<f64, AppError> {
    let quantity = quantity.unwrap_or(1.0);
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(AppError::bad_request("Quantity must be greater than zero"));
    }
    Ok(quantity)
}

pub async fn create(
    state: &AppState,
    user_id: Uuid,
    input: NewProtein,
) -> Result<ProteinEntry, AppError> {
    let (food_name, quantity, protein_amount) = match input.food_id {
        Some(food_id) => {
            let food = state
                .store
                .find::<ProteinFood>(food_id, &Filter::all())
                .await
                .ok_or_else(|| AppError::bad_request("Unknown food"))?;
            let quantity = checked_quantity(input.quantity)?;
            let protein = food.protein_for(quantity);
            (food.name, quantity, protein)
        }
        None => {
            let name = required(
                input.food_name.as_deref().unwrap_or_default(),
                "Please choose a food or enter a name",
            )?;
            let protein = input
                .protein_amount
                .filter(|grams| grams.is_finite() && *grams > 0.0)
                .ok_or_else(|| AppError::bad_request("Protein must be greater than zero"))?;
            (name, checked_quantity(input.quantity)?, protein)
        }
    };

    let entry = state
        .store
        .insert(ProteinEntry {
            id: Uuid::new_v4(),
            user_id,
            food_name,
            quantity,
            protein_amount,
            date: input.date.unwrap_or_else(today),
            created_at: Utc::now(),
        })
        .await?;
    info!(
        user_id = %user_id,
        id = %entry.id,
        table = "protein_entries",
        protein = entry.protein_amount,
        "protein entry added"
    );
    Ok(entry)
}

pub async fn remove(state: &AppState, user_id: Uuid, id: Uuid) -> Result<ProteinEntry, AppError> {
    let filter = Filter::owned_by(user_id);
    let entry = state
        .store
        .find::<ProteinEntry>(id, &filter)
        .await
        .ok_or_else(|| AppError::not_found("Entry not found"))?;
    state.store.delete::<ProteinEntry>(id, &filter).await?;
    info!(user_id = %user_id, id = %id, table = "protein_entries", "protein entry deleted");
    Ok(entry)
}

pub async fn api_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<ProteinSummary>, AppError> {
    let date = parse_date(query.date.as_deref(), today())?;
    Ok(Json(load(&state, user.id, date).await))
}

pub async fn api_create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NewProtein>,
) -> Result<(StatusCode, Json<ProteinSummary>), AppError> {
    let entry = create(&state, user.id, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(load(&state, user.id, entry.date).await),
    ))
}

pub async fn api_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProteinSummary>, AppError> {
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
    let foods = foods(&state.store).await;
    render(
        &session,
        &user,
        "Protein Diet",
        Nav::Protein,
        render_protein(&summary, &foods),
    )
    .await
}

pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Form(form): Form<ProteinForm>,
) -> Result<Redirect, AppError> {
    let back = back_to("/protein", &form.date);
    let outcome = async {
        let entry = create(&state, user.id, NewProtein::try_from(form)?).await?;
        Ok::<_, AppError>(
            Notice::success("Added to today's intake").with_description(format!(
                "{} × {} (+{:.1}g protein)",
                format_amount(entry.quantity),
                entry.food_name,
                entry.protein_amount
            )),
        )
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
            back_to("/protein", &entry.date.to_string()),
            Ok(Notice::success("Entry removed")),
        ),
        Err(err) => ("/protein".to_string(), Err(err)),
    };
    finish(&session, &back, outcome).await
}

fn render_protein(summary: &ProteinSummary, foods: &[ProteinFood]) -> String {
    let progress = &summary.progress;
    let status = if progress.goal_met {
        format!(
            "Goal reached! {}g over target.",
            format_amount(progress.exceeded_by.round())
        )
    } else {
        format!("{}g to go.", format_amount(progress.remaining.round()))
    };

    let food_forms: String = foods
        .iter()
        .map(|food| {
            format!(
                r#"<li><span><strong>{name}</strong> · {per}g per {unit}</span>
<form method="post" action="/protein" class="inline">
  <input type="hidden" name="food_id" value="{id}" />
  <input type="hidden" name="date" value="{date}" />
  <input name="quantity" type="number" min="0.1" step="0.1" value="1" aria-label="Quantity" />
  <button class="btn-add" type="submit">Add</button>
</form></li>"#,
                name = escape(&food.name),
                per = format_amount(food.protein_per_unit),
                unit = escape(&food.unit),
                id = food.id,
                date = summary.date,
            )
        })
        .collect();

    let groups: String = summary
        .by_food
        .iter()
        .map(|group| {
            format!(
                "<li><span><strong>{}</strong> × {}</span><span>{:.1}g {}</span></li>",
                escape(&group.food_name),
                group.servings,
                group.protein,
                delete_button(
                    &format!("/protein/{}/delete", group.latest_entry_id),
                    "Remove one serving"
                ),
            )
        })
        .collect();
    let eaten = if groups.is_empty() {
        r#"<p class="hint">Nothing logged yet.</p>"#.to_string()
    } else {
        format!(r#"<ul class="rows">{groups}</ul>"#)
    };

    format!(
        r#"<section class="panel">{total}{percent}</section>
<section class="card">{bar}<p class="hint">{status}</p></section>
<section class="card"><h2>Eaten on {date}</h2>{eaten}</section>
<section class="card">
  <h2>Custom food</h2>
  <form class="grid" method="post" action="/protein">
    <label>Food<input name="food_name" required /></label>
    <label>Protein (g)<input name="protein_amount" type="number" min="0.1" step="0.1" required /></label>
    <input type="hidden" name="date" value="{date}" />
    <button class="btn-add" type="submit">Add</button>
  </form>
</section>
<section class="card"><h2>Foods</h2><ul class="rows">{food_forms}</ul></section>"#,
        total = stat(
            "Protein",
            &format!("{:.0}g / {:.0}g", progress.total, progress.goal),
            "protein"
        ),
        percent = stat("Progress", &format!("{:.0}%", progress.percentage), "protein"),
        bar = progress_bar(progress.bar_percentage, "protein"),
        date = summary.date,
    )
}
