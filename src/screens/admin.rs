//! Reference data and admin membership. Every handler here is behind
//! [`AdminUser`], so a non-admin never reaches a read or a write.

use super::{categories, finish, foods, parse_number, render, required};
use crate::auth::find_profile_by_email;
use crate::errors::{ApiJson, AppError};
use crate::models::{ExpenseCategory, Profile, ProteinFood, Role, UserRole};
use crate::session::{AdminUser, Notice};
use crate::state::AppState;
use crate::storage::{Filter, Order, StoreError};
use crate::ui::{delete_button, escape, format_amount, Nav};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Redirect},
    Form, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_EMOJI: &str = "📦";
pub const DEFAULT_UNIT: &str = "100g";
const ADMIN_PATH: &str = "/admin";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryInput {
    pub name: String,
    pub emoji: String,
    pub group_name: String,
}

#[derive(Debug, Deserialize)]
pub struct FoodInput {
    #[serde(default)]
    pub name: String,
    pub protein_per_unit: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FoodForm {
    pub name: String,
    pub protein_per_unit: String,
    pub unit: String,
}

impl TryFrom<FoodForm> for FoodInput {
    type Error = AppError;

    fn try_from(form: FoodForm) -> Result<Self, Self::Error> {
        Ok(Self {
            protein_per_unit: parse_number(&form.protein_per_unit, "Protein per unit")?,
            name: form.name,
            unit: form.unit,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GrantInput {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminEntry {
    pub user_id: Uuid,
    pub email: String,
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AdminOverview {
    pub categories: Vec<ExpenseCategory>,
    pub foods: Vec<ProteinFood>,
    pub admins: Vec<AdminEntry>,
}

fn validate_category(input: CategoryInput) -> Result<(String, String, String), AppError> {
    let name = required(&input.name, "Please fill all fields")?;
    let group_name = required(&input.group_name, "Please fill all fields")?;
    let emoji = match input.emoji.trim() {
        "" => DEFAULT_EMOJI.to_string(),
        emoji => emoji.to_string(),
    };
    Ok((name, emoji, group_name))
}

fn validate_food(input: FoodInput) -> Result<(String, f64, String), AppError> {
    let name = required(&input.name, "Please fill all fields")?;
    if !input.protein_per_unit.is_finite() || input.protein_per_unit <= 0.0 {
        return Err(AppError::bad_request("Protein per unit must be greater than zero"));
    }
    let unit = match input.unit.trim() {
        "" => DEFAULT_UNIT.to_string(),
        unit => unit.to_string(),
    };
    Ok((name, input.protein_per_unit, unit))
}

fn missing(what: &str) -> impl FnOnce(StoreError) -> AppError + '_ {
    move |err| match err {
        StoreError::NotFound { .. } => AppError::not_found(format!("{what} not found")),
        err => err.into(),
    }
}

pub async fn add_category(state: &AppState, input: CategoryInput) -> Result<ExpenseCategory, AppError> {
    let (name, emoji, group_name) = validate_category(input)?;
    let category = state
        .store
        .insert(ExpenseCategory {
            id: Uuid::new_v4(),
            name,
            emoji,
            group_name,
        })
        .await?;
    info!(id = %category.id, table = "expense_categories", "category added");
    Ok(category)
}

pub async fn update_category(
    state: &AppState,
    id: Uuid,
    input: CategoryInput,
) -> Result<ExpenseCategory, AppError> {
    let (name, emoji, group_name) = validate_category(input)?;
    let category = state
        .store
        .update::<ExpenseCategory, _>(id, &Filter::all(), move |category| {
            category.name = name;
            category.emoji = emoji;
            category.group_name = group_name;
        })
        .await
        .map_err(missing("Category"))?;
    info!(id = %id, table = "expense_categories", "category updated");
    Ok(category)
}

pub async fn delete_category(state: &AppState, id: Uuid) -> Result<(), AppError> {
    state
        .store
        .delete::<ExpenseCategory>(id, &Filter::all())
        .await
        .map_err(missing("Category"))?;
    info!(id = %id, table = "expense_categories", "category deleted");
    Ok(())
}

pub async fn add_food(state: &AppState, input: FoodInput) -> Result<ProteinFood, AppError> {
    let (name, protein_per_unit, unit) = validate_food(input)?;
    let sort_order = u32::try_from(foods(&state.store).await.len())
        .unwrap_or(u32::MAX)
        .saturating_add(1);
    let food = state
        .store
        .insert(ProteinFood {
            id: Uuid::new_v4(),
            name,
            protein_per_unit,
            unit,
            sort_order,
        })
        .await?;
    info!(id = %food.id, table = "protein_foods", sort_order, "protein food added");
    Ok(food)
}

pub async fn update_food(state: &AppState, id: Uuid, input: FoodInput) -> Result<ProteinFood, AppError> {
    let (name, protein_per_unit, unit) = validate_food(input)?;
    let food = state
        .store
        .update::<ProteinFood, _>(id, &Filter::all(), move |food| {
            food.name = name;
            food.protein_per_unit = protein_per_unit;
            food.unit = unit;
        })
        .await
        .map_err(missing("Protein food"))?;
    info!(id = %id, table = "protein_foods", "protein food updated");
    Ok(food)
}

pub async fn delete_food(state: &AppState, id: Uuid) -> Result<(), AppError> {
    state
        .store
        .delete::<ProteinFood>(id, &Filter::all())
        .await
        .map_err(missing("Protein food"))?;
    info!(id = %id, table = "protein_foods", "protein food deleted");
    Ok(())
}

pub async fn list_admins(state: &AppState) -> Vec<AdminEntry> {
    let roles: Vec<UserRole> = state.store.list(&Filter::all(), Order::OldestFirst).await;
    let profiles: Vec<Profile> = state.store.list(&Filter::all(), Order::Inserted).await;
    roles
        .into_iter()
        .filter(|r| r.role == Role::Admin)
        .map(|r| AdminEntry {
            email: profiles
                .iter()
                .find(|p| p.user_id == r.user_id)
                .map(|p| p.email.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            user_id: r.user_id,
            granted_at: r.created_at,
        })
        .collect()
}

pub async fn grant_admin(state: &AppState, granted_by: Uuid, email: &str) -> Result<AdminEntry, AppError> {
    let email = required(email, "Please enter an email")?;
    let profile = find_profile_by_email(&state.store, &email)
        .await
        .ok_or_else(|| AppError::not_found("User not found: they must sign up first"))?;

    let role = state
        .store
        .insert(UserRole {
            id: Uuid::new_v4(),
            user_id: profile.user_id,
            role: Role::Admin,
            created_at: Utc::now(),
        })
        .await
        .map_err(|err| match err {
            StoreError::Conflict { .. } => AppError::conflict("User is already an admin"),
            err => err.into(),
        })?;
    info!(user_id = %profile.user_id, granted_by = %granted_by, "admin role granted");

    Ok(AdminEntry {
        user_id: profile.user_id,
        email: profile.email,
        granted_at: role.created_at,
    })
}

/// Revokes `user_id`'s admin role. Admins cannot revoke themselves.
pub async fn revoke_admin(state: &AppState, acting: Uuid, user_id: Uuid) -> Result<(), AppError> {
    if acting == user_id {
        warn!(user_id = %acting, "admin tried to revoke their own role");
        return Err(AppError::bad_request("Cannot remove yourself"));
    }
    let removed = state
        .store
        .delete_where::<UserRole, _>(move |r| r.user_id == user_id && r.role == Role::Admin)
        .await?;
    if removed == 0 {
        return Err(AppError::not_found("User is not an admin"));
    }
    info!(user_id = %user_id, revoked_by = %acting, "admin role revoked");
    Ok(())
}

pub async fn overview(state: &AppState) -> AdminOverview {
    AdminOverview {
        categories: categories(&state.store).await,
        foods: foods(&state.store).await,
        admins: list_admins(state).await,
    }
}

pub async fn api_overview(State(state): State<AppState>, _admin: AdminUser) -> Json<AdminOverview> {
    Json(overview(&state).await)
}

pub async fn api_categories(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Json<Vec<ExpenseCategory>> {
    Json(categories(&state.store).await)
}

pub async fn api_add_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<ExpenseCategory>), AppError> {
    Ok((StatusCode::CREATED, Json(add_category(&state, input).await?)))
}

pub async fn api_update_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<Json<ExpenseCategory>, AppError> {
    Ok(Json(update_category(&state, id, input).await?))
}

pub async fn api_delete_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    delete_category(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn api_foods(State(state): State<AppState>, _admin: AdminUser) -> Json<Vec<ProteinFood>> {
    Json(foods(&state.store).await)
}

pub async fn api_add_food(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<FoodInput>,
) -> Result<(StatusCode, Json<ProteinFood>), AppError> {
    Ok((StatusCode::CREATED, Json(add_food(&state, input).await?)))
}

pub async fn api_update_food(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<FoodInput>,
) -> Result<Json<ProteinFood>, AppError> {
    Ok(Json(update_food(&state, id, input).await?))
}

pub async fn api_delete_food(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    delete_food(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn api_admins(State(state): State<AppState>, _admin: AdminUser) -> Json<Vec<AdminEntry>> {
    Json(list_admins(&state).await)
}

pub async fn api_grant(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(input): ApiJson<GrantInput>,
) -> Result<(StatusCode, Json<Vec<AdminEntry>>), AppError> {
    grant_admin(&state, admin.id, &input.email).await?;
    Ok((StatusCode::CREATED, Json(list_admins(&state).await)))
}

pub async fn api_revoke(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<AdminEntry>>, AppError> {
    revoke_admin(&state, admin.id, user_id).await?;
    Ok(Json(list_admins(&state).await))
}

pub async fn page(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    session: Session,
) -> Result<Html<String>, AppError> {
    let overview = overview(&state).await;
    render(
        &session,
        &admin,
        "Admin Panel",
        Nav::Admin,
        render_admin(&overview, admin.id),
    )
    .await
}

pub async fn submit_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    session: Session,
    Form(input): Form<CategoryInput>,
) -> Result<Redirect, AppError> {
    let outcome = add_category(&state, input)
        .await
        .map(|_| Notice::success("Category added"));
    finish(&session, ADMIN_PATH, outcome).await
}

pub async fn submit_category_update(
    State(state): State<AppState>,
    _admin: AdminUser,
    session: Session,
    Path(id): Path<Uuid>,
    Form(input): Form<CategoryInput>,
) -> Result<Redirect, AppError> {
    let outcome = update_category(&state, id, input)
        .await
        .map(|_| Notice::success("Category updated"));
    finish(&session, ADMIN_PATH, outcome).await
}

pub async fn submit_category_delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let outcome = delete_category(&state, id)
        .await
        .map(|_| Notice::success("Category deleted"));
    finish(&session, ADMIN_PATH, outcome).await
}

pub async fn submit_food(
    State(state): State<AppState>,
    _admin: AdminUser,
    session: Session,
    Form(form): Form<FoodForm>,
) -> Result<Redirect, AppError> {
    let outcome = async {
        add_food(&state, FoodInput::try_from(form)?).await?;
        Ok::<_, AppError>(Notice::success("Protein food added"))
    }
    .await;
    finish(&session, ADMIN_PATH, outcome).await
}

pub async fn submit_food_update(
    State(state): State<AppState>,
    _admin: AdminUser,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<FoodForm>,
) -> Result<Redirect, AppError> {
    let outcome = async {
        update_food(&state, id, FoodInput::try_from(form)?).await?;
        Ok::<_, AppError>(Notice::success("Protein food updated"))
    }
    .await;
    finish(&session, ADMIN_PATH, outcome).await
}

pub async fn submit_food_delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let outcome = delete_food(&state, id)
        .await
        .map(|_| Notice::success("Protein food deleted"));
    finish(&session, ADMIN_PATH, outcome).await
}

pub async fn submit_grant(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    session: Session,
    Form(input): Form<GrantInput>,
) -> Result<Redirect, AppError> {
    let outcome = grant_admin(&state, admin.id, &input.email)
        .await
        .map(|_| Notice::success("Admin added successfully"));
    finish(&session, ADMIN_PATH, outcome).await
}

pub async fn submit_revoke(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    session: Session,
    Path(user_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let outcome = revoke_admin(&state, admin.id, user_id)
        .await
        .map(|_| Notice::success("Admin removed"));
    finish(&session, ADMIN_PATH, outcome).await
}

fn category_rows(categories: &[ExpenseCategory]) -> String {
    let mut html = String::new();
    let mut current_group: Option<&str> = None;
    for category in categories {
        if current_group != Some(category.group_name.as_str()) {
            if current_group.is_some() {
                html.push_str("</ul>");
            }
            html.push_str(&format!(
                r#"<h3>{}</h3><ul class="rows">"#,
                escape(&category.group_name)
            ));
            current_group = Some(&category.group_name);
        }
        html.push_str(&format!(
            r#"<li><form class="grid" method="post" action="/admin/categories/{id}/update">
  <input name="emoji" value="{emoji}" aria-label="Emoji" />
  <input name="name" value="{name}" aria-label="Name" />
  <input name="group_name" value="{group}" aria-label="Group" />
  <button class="btn-sub" type="submit">Save</button>
</form>{delete}</li>"#,
            id = category.id,
            emoji = escape(&category.emoji),
            name = escape(&category.name),
            group = escape(&category.group_name),
            delete = delete_button(
                &format!("/admin/categories/{}/delete", category.id),
                "Delete category"
            ),
        ));
    }
    if current_group.is_some() {
        html.push_str("</ul>");
    }
    html
}

fn food_rows(foods: &[ProteinFood]) -> String {
    foods
        .iter()
        .map(|food| {
            format!(
                r#"<li><form class="grid" method="post" action="/admin/foods/{id}/update">
  <input name="name" value="{name}" aria-label="Name" />
  <input name="protein_per_unit" type="number" min="0.1" step="0.1" value="{protein}" aria-label="Protein per unit" />
  <input name="unit" value="{unit}" aria-label="Unit" />
  <button class="btn-sub" type="submit">Save</button>
</form>{delete}</li>"#,
                id = food.id,
                name = escape(&food.name),
                protein = format_amount(food.protein_per_unit),
                unit = escape(&food.unit),
                delete = delete_button(&format!("/admin/foods/{}/delete", food.id), "Delete food"),
            )
        })
        .collect()
}

fn admin_rows(admins: &[AdminEntry], me: Uuid) -> String {
    admins
        .iter()
        .map(|entry| {
            let action = if entry.user_id == me {
                r#"<span class="hint">You</span>"#.to_string()
            } else {
                delete_button(
                    &format!("/admin/admins/{}/delete", entry.user_id),
                    "Remove admin",
                )
            };
            format!(
                "<li><span>{}</span><span>{} {action}</span></li>",
                escape(&entry.email),
                entry.granted_at.format("%Y-%m-%d"),
            )
        })
        .collect()
}

fn render_admin(overview: &AdminOverview, me: Uuid) -> String {
    format!(
        r#"<section class="card">
  <h2>Expense categories</h2>
  <form class="grid" method="post" action="/admin/categories">
    <label>Emoji<input name="emoji" value="{default_emoji}" /></label>
    <label>Name<input name="name" required /></label>
    <label>Group<input name="group_name" required /></label>
    <button class="btn-add" type="submit">Add category</button>
  </form>
  {categories}
</section>
<section class="card">
  <h2>Protein foods</h2>
  <form class="grid" method="post" action="/admin/foods">
    <label>Name<input name="name" required /></label>
    <label>Protein per unit (g)<input name="protein_per_unit" type="number" min="0.1" step="0.1" required /></label>
    <label>Unit<input name="unit" value="{default_unit}" /></label>
    <button class="btn-add" type="submit">Add food</button>
  </form>
  <ul class="rows">{foods}</ul>
</section>
<section class="card">
  <h2>Admins</h2>
  <form class="grid" method="post" action="/admin/admins">
    <label>Email<input name="email" type="email" required /></label>
    <button class="btn-add" type="submit">Add admin</button>
  </form>
  <ul class="rows">{admins}</ul>
</section>"#,
        default_emoji = DEFAULT_EMOJI,
        default_unit = DEFAULT_UNIT,
        categories = category_rows(&overview.categories),
        foods = food_rows(&overview.foods),
        admins = admin_rows(&overview.admins, me),
    )
}
