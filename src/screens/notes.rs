use super::{back_to, finish, parse_date, render, required, today};
use crate::errors::{ApiJson, AppError};
use crate::models::{DateQuery, Note, NoteKind};
use crate::session::{CurrentUser, Notice};
use crate::state::AppState;
use crate::stats::{summarize_notes, NotesSummary};
use crate::storage::{Filter, Order, StoreError};
use crate::ui::{day_label, delete_button, escape, progress_bar, Nav};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    Form, Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NewNote {
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NoteForm {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
}

impl TryFrom<NoteForm> for NewNote {
    type Error = AppError;

    fn try_from(form: NoteForm) -> Result<Self, Self::Error> {
        Ok(Self {
            date: Some(parse_date(Some(&form.date), today())?),
            kind: NoteKind::from(form.kind),
            content: form.content,
        })
    }
}

pub async fn load(state: &AppState, user_id: Uuid, date: NaiveDate) -> NotesSummary {
    let notes = state
        .store
        .list::<Note>(&Filter::owned_by(user_id).on(date), Order::OldestFirst)
        .await;
    summarize_notes(date, notes)
}

pub async fn create(state: &AppState, user_id: Uuid, input: NewNote) -> Result<Note, AppError> {
    let content = required(&input.content, "Please write something first")?;
    let note = state
        .store
        .insert(Note {
            id: Uuid::new_v4(),
            user_id,
            content,
            is_completed: false,
            kind: input.kind,
            date: input.date.unwrap_or_else(today),
            created_at: Utc::now(),
        })
        .await?;
    info!(user_id = %user_id, id = %note.id, table = "notes", kind = note.kind.as_str(), "note added");
    Ok(note)
}

pub async fn toggle(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Note, AppError> {
    let note = state
        .store
        .update::<Note, _>(id, &Filter::owned_by(user_id), |note| {
            note.is_completed = !note.is_completed;
        })
        .await
        .map_err(|err| match err {
            StoreError::NotFound { .. } => AppError::not_found("Note not found"),
            err => err.into(),
        })?;
    info!(
        user_id = %user_id,
        id = %id,
        table = "notes",
        completed = note.is_completed,
        "note toggled"
    );
    Ok(note)
}

pub async fn remove(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Note, AppError> {
    let filter = Filter::owned_by(user_id);
    let note = state
        .store
        .find::<Note>(id, &filter)
        .await
        .ok_or_else(|| AppError::not_found("Note not found"))?;
    state.store.delete::<Note>(id, &filter).await?;
    info!(user_id = %user_id, id = %id, table = "notes", "note deleted");
    Ok(note)
}

pub async fn api_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<NotesSummary>, AppError> {
    let date = parse_date(query.date.as_deref(), today())?;
    Ok(Json(load(&state, user.id, date).await))
}

pub async fn api_create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NewNote>,
) -> Result<(StatusCode, Json<NotesSummary>), AppError> {
    let note = create(&state, user.id, input).await?;
    Ok((StatusCode::CREATED, Json(load(&state, user.id, note.date).await)))
}

pub async fn api_toggle(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NotesSummary>, AppError> {
    let note = toggle(&state, user.id, id).await?;
    Ok(Json(load(&state, user.id, note.date).await))
}

pub async fn api_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NotesSummary>, AppError> {
    let note = remove(&state, user.id, id).await?;
    Ok(Json(load(&state, user.id, note.date).await))
}

pub async fn page(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Query(query): Query<DateQuery>,
) -> Result<Html<String>, AppError> {
    let date = parse_date(query.date.as_deref(), today()).unwrap_or_else(|_| today());
    let summary = load(&state, user.id, date).await;
    render(
        &session,
        &user,
        "Notes",
        Nav::Notes,
        render_notes(&summary, today()),
    )
    .await
}

pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Form(form): Form<NoteForm>,
) -> Result<Redirect, AppError> {
    let back = back_to("/notes", &form.date);
    let outcome = async {
        let note = create(&state, user.id, NewNote::try_from(form)?).await?;
        let description = match note.kind {
            NoteKind::Task => "Task added to your list",
            NoteKind::Note => "Note saved",
        };
        Ok::<_, AppError>(Notice::success("Note added").with_description(description))
    }
    .await;
    finish(&session, &back, outcome).await
}

pub async fn submit_toggle(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    match toggle(&state, user.id, id).await {
        Ok(note) => Ok(Redirect::to(&back_to("/notes", &note.date.to_string()))),
        Err(err) => finish(&session, "/notes", Err(err)).await,
    }
}

pub async fn submit_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let (back, outcome) = match remove(&state, user.id, id).await {
        Ok(note) => (
            back_to("/notes", &note.date.to_string()),
            Ok(Notice::success("Note deleted")),
        ),
        Err(err) => ("/notes".to_string(), Err(err)),
    };
    finish(&session, &back, outcome).await
}

fn note_row(note: &Note) -> String {
    let content = escape(&note.content);
    let text = match (note.kind, note.is_completed) {
        (NoteKind::Task, true) => format!(r#"<span class="done">{content}</span>"#),
        _ => format!("<span>{content}</span>"),
    };
    let toggle = match note.kind {
        NoteKind::Task => format!(
            r#"<form method="post" action="/notes/{id}/toggle" class="inline"><button class="btn-ghost" type="submit" aria-label="Toggle">{mark}</button></form>"#,
            id = note.id,
            mark = if note.is_completed { "☑" } else { "☐" },
        ),
        NoteKind::Note => String::new(),
    };
    format!(
        "<li>{toggle}{text}{}</li>",
        delete_button(&format!("/notes/{}/delete", note.id), "Delete note")
    )
}

fn render_notes(summary: &NotesSummary, today: NaiveDate) -> String {
    let date = summary.date;
    let tasks: String = summary.tasks.iter().map(note_row).collect();
    let notes: String = summary.notes.iter().map(note_row).collect();
    let list = |rows: String, empty: &str| {
        if rows.is_empty() {
            format!(r#"<p class="hint">{empty}</p>"#)
        } else {
            format!(r#"<ul class="rows">{rows}</ul>"#)
        }
    };

    format!(
        r#"<nav class="nav">
  <a class="tab" href="/notes?date={prev}">← Previous</a>
  <a class="tab active" href="/notes?date={date}">{label}</a>
  <a class="tab" href="/notes?date={next}">Next →</a>
  <a class="tab" href="/notes">Today</a>
</nav>
<section class="card">
  <h2>Tasks · {done}/{total}</h2>
  {bar}
  {tasks}
</section>
<section class="card">
  <form class="grid" method="post" action="/notes">
    <label>New entry<input name="content" placeholder="What needs doing?" required /></label>
    <label>Type<select name="type"><option value="task">Task</option><option value="note">Note</option></select></label>
    <input type="hidden" name="date" value="{date}" />
    <button class="btn-add" type="submit">Add</button>
  </form>
</section>
<section class="card"><h2>Notes</h2>{notes}</section>"#,
        prev = date - Duration::days(1),
        next = date + Duration::days(1),
        label = day_label(date, today),
        done = summary.completed_tasks,
        total = summary.total_tasks,
        bar = progress_bar(summary.completion_percentage(), ""),
        tasks = list(tasks, "No tasks for this day."),
        notes = list(notes, "No notes for this day."),
    )
}
