use super::{back_to, categories, finish, parse_date, parse_number, render, required, today};
use crate::errors::{ApiJson, AppError};
use crate::models::{DateQuery, Expense, ExpenseCategory};
use crate::session::{CurrentUser, Notice};
use crate::state::AppState;
use crate::stats::{summarize_expenses, ExpenseSummary};
use crate::storage::{Filter, Order};
use crate::ui::{delete_button, escape, format_amount, stat, Nav};
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

#[derive(Debug, Deserialize)]
pub struct NewExpense {
    pub item_name: String,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExpenseForm {
    pub item_name: String,
    pub category: String,
    pub amount: String,
    pub date: String,
}

impl TryFrom<ExpenseForm> for NewExpense {
    type Error = AppError;

    fn try_from(form: ExpenseForm) -> Result<Self, Self::Error> {
        Ok(Self {
            amount: parse_number(&form.amount, "Amount")?,
            date: Some(parse_date(Some(&form.date), today())?),
            item_name: form.item_name,
            category: form.category,
        })
    }
}

pub async fn load(state: &AppState, user_id: Uuid, date: NaiveDate) -> ExpenseSummary {
    let expenses = state
        .store
        .list::<Expense>(&Filter::owned_by(user_id).on(date), Order::NewestFirst)
        .await;
    summarize_expenses(date, expenses)
}

pub async fn create(state: &AppState, user_id: Uuid, input: NewExpense) -> Result<Expense, AppError> {
    let item_name = required(&input.item_name, "Please enter an item name")?;
    let category = required(&input.category, "Please select a category")?;
    if !input.amount.is_finite() || input.amount < 0.0 {
        return Err(AppError::bad_request("Amount cannot be negative"));
    }

    let expense = state
        .store
        .insert(Expense {
            id: Uuid::new_v4(),
            user_id,
            item_name,
            category,
            amount: input.amount,
            date: input.date.unwrap_or_else(today),
            created_at: Utc::now(),
        })
        .await?;
    info!(user_id = %user_id, id = %expense.id, table = "expenses", "expense added");
    Ok(expense)
}

pub async fn remove(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Expense, AppError> {
    let filter = Filter::owned_by(user_id);
    let expense = state
        .store
        .find::<Expense>(id, &filter)
        .await
        .ok_or_else(|| AppError::not_found("Expense not found"))?;
    state.store.delete::<Expense>(id, &filter).await?;
    info!(user_id = %user_id, id = %id, table = "expenses", "expense deleted");
    Ok(expense)
}

pub async fn api_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<ExpenseSummary>, AppError> {
    let date = parse_date(query.date.as_deref(), today())?;
    Ok(Json(load(&state, user.id, date).await))
}

pub async fn api_create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NewExpense>,
) -> Result<(StatusCode, Json<ExpenseSummary>), AppError> {
    let expense = create(&state, user.id, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(load(&state, user.id, expense.date).await),
    ))
}

pub async fn api_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ExpenseSummary>, AppError> {
    let expense = remove(&state, user.id, id).await?;
    Ok(Json(load(&state, user.id, expense.date).await))
}

pub async fn page(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Query(query): Query<DateQuery>,
) -> Result<Html<String>, AppError> {
    let date = parse_date(query.date.as_deref(), today()).unwrap_or_else(|_| today());
    let summary = load(&state, user.id, date).await;
    let categories = categories(&state.store).await;
    render(
        &session,
        &user,
        "Expenses",
        Nav::Expenses,
        render_expenses(&summary, &categories),
    )
    .await
}

pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Form(form): Form<ExpenseForm>,
) -> Result<Redirect, AppError> {
    let back = back_to("/expenses", &form.date);
    let outcome = async {
        let expense = create(&state, user.id, NewExpense::try_from(form)?).await?;
        Ok::<_, AppError>(Notice::success("Expense added").with_description(format!(
            "₹{} for {}",
            format_amount(expense.amount),
            expense.item_name
        )))
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
        Ok(expense) => (
            back_to("/expenses", &expense.date.to_string()),
            Ok(Notice::success("Expense deleted")),
        ),
        Err(err) => ("/expenses".to_string(), Err(err)),
    };
    finish(&session, &back, outcome).await
}

fn category_label(name: &str, categories: &[ExpenseCategory]) -> String {
    match categories.iter().find(|c| c.name == name) {
        Some(category) => format!("{} {}", escape(&category.emoji), escape(&category.name)),
        None => escape(name),
    }
}

fn category_picker(categories: &[ExpenseCategory]) -> String {
    let mut html = String::from(
        r#"<select name="category" required><option value="">Select category</option>"#,
    );
    let mut current_group: Option<&str> = None;
    for category in categories {
        if current_group != Some(category.group_name.as_str()) {
            if current_group.is_some() {
                html.push_str("</optgroup>");
            }
            html.push_str(&format!(
                r#"<optgroup label="{}">"#,
                escape(&category.group_name)
            ));
            current_group = Some(&category.group_name);
        }
        html.push_str(&format!(
            r#"<option value="{name}">{emoji} {name}</option>"#,
            name = escape(&category.name),
            emoji = escape(&category.emoji),
        ));
    }
    if current_group.is_some() {
        html.push_str("</optgroup>");
    }
    html.push_str("</select>");
    html
}

fn render_expenses(summary: &ExpenseSummary, categories: &[ExpenseCategory]) -> String {
    let rows: String = summary
        .expenses
        .iter()
        .map(|e| {
            format!(
                "<li><span>{} <strong>{}</strong></span><span>₹{} {}</span></li>",
                category_label(&e.category, categories),
                escape(&e.item_name),
                format_amount(e.amount),
                delete_button(&format!("/expenses/{}/delete", e.id), "Delete expense"),
            )
        })
        .collect();
    let list = if rows.is_empty() {
        r#"<p class="hint">No expenses recorded for this day.</p>"#.to_string()
    } else {
        format!(r#"<ul class="rows">{rows}</ul>"#)
    };

    let breakdown: String = summary
        .by_category
        .iter()
        .map(|c| {
            format!(
                "<li><span>{}</span><span>₹{} · {}</span></li>",
                category_label(&c.category, categories),
                format_amount(c.total),
                c.count
            )
        })
        .collect();

    format!(
        r#"<section class="panel">{total}{count}</section>
<section class="card">
  <h2>Add expense</h2>
  <form class="grid" method="post" action="/expenses">
    <label>Item<input name="item_name" placeholder="e.g. Tea" required /></label>
    <label>Category{picker}</label>
    <label>Amount (₹)<input name="amount" type="number" min="0" step="0.01" required /></label>
    <input type="hidden" name="date" value="{date}" />
    <button class="btn-add" type="submit">Add</button>
  </form>
</section>
<section class="card"><h2>{date}</h2>{list}</section>
<section class="card"><h2>By category</h2><ul class="rows">{breakdown}</ul></section>"#,
        total = stat("Total", &format!("₹{}", format_amount(summary.total)), "expense"),
        count = stat("Entries", &summary.count.to_string(), ""),
        picker = category_picker(categories),
        date = summary.date,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(group: &str, name: &str) -> ExpenseCategory {
        ExpenseCategory {
            id: Uuid::new_v4(),
            name: name.into(),
            emoji: "🍵".into(),
            group_name: group.into(),
        }
    }

    #[test]
    fn form_converts_numbers_and_dates() {
        let input = NewExpense::try_from(ExpenseForm {
            item_name: "Tea".into(),
            category: "Tea".into(),
            amount: "20".into(),
            date: "2024-01-01".into(),
        })
        .unwrap();
        assert_eq!(input.amount, 20.0);
        assert_eq!(input.date, Some("2024-01-01".parse().unwrap()));
    }

    #[test]
    fn form_rejects_missing_amount() {
        let err = NewExpense::try_from(ExpenseForm {
            item_name: "Tea".into(),
            category: "Tea".into(),
            ..ExpenseForm::default()
        })
        .unwrap_err();
        assert_eq!(err.message, "Amount is required");
    }

    #[test]
    fn picker_groups_options() {
        let html = category_picker(&[
            category("Food & Beverages", "Coffee"),
            category("Food & Beverages", "Tea"),
            category("Travel & Transport", "Bus Fare"),
        ]);
        assert_eq!(html.matches("<optgroup").count(), 2);
        assert_eq!(html.matches("</optgroup>").count(), 2);
        assert!(html.contains(r#"<optgroup label="Food &amp; Beverages">"#));
    }

    #[test]
    fn unknown_category_renders_its_raw_name() {
        assert_eq!(category_label("Gone", &[]), "Gone");
        assert_eq!(
            category_label("Tea", &[category("Food & Beverages", "Tea")]),
            "🍵 Tea"
        );
    }
}
