use crate::auth::{self, SignIn, SignUp};
use crate::errors::{ApiJson, AppError};
use crate::models::Profile;
use crate::session::{self as gate, CurrentUser, Notice, SIGN_IN_PATH};
use crate::state::AppState;
use crate::ui::{self, Nav, Page};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub user: Option<CurrentUser>,
}

async fn signed_in(state: &AppState, session: &Session, profile: &Profile) -> Result<CurrentUser, AppError> {
    gate::start(session, profile.user_id).await?;
    CurrentUser::resolve(state, profile.user_id)
        .await
        .ok_or_else(|| AppError::write("Account could not be loaded"))
}

pub async fn page(user: Option<CurrentUser>, session: Session) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let notice = Notice::take(&session).await?;
    Ok(Html(ui::render_page(Page {
        title: "Sign in",
        nav: Nav::None,
        user: None,
        notice,
        body: AUTH_FORMS.to_string(),
    }))
    .into_response())
}

pub async fn submit_sign_in(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignIn>,
) -> Result<Redirect, AppError> {
    match auth::sign_in(&state, form).await {
        Ok(profile) => {
            signed_in(&state, &session, &profile).await?;
            Ok(Redirect::to("/"))
        }
        Err(err) => {
            Notice::error("Sign in failed")
                .with_description(err.message)
                .flash(&session)
                .await?;
            Ok(Redirect::to(SIGN_IN_PATH))
        }
    }
}

pub async fn submit_sign_up(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignUp>,
) -> Result<Redirect, AppError> {
    match auth::sign_up(&state, form).await {
        Ok(profile) => {
            signed_in(&state, &session, &profile).await?;
            Notice::success("Welcome!")
                .with_description("Your account has been created.")
                .flash(&session)
                .await?;
            Ok(Redirect::to("/"))
        }
        Err(err) => {
            Notice::error("Sign up failed")
                .with_description(err.message)
                .flash(&session)
                .await?;
            Ok(Redirect::to(SIGN_IN_PATH))
        }
    }
}

pub async fn submit_sign_out(session: Session) -> Result<Redirect, AppError> {
    gate::end(&session).await?;
    info!("signed out");
    Ok(Redirect::to(SIGN_IN_PATH))
}

pub async fn api_session(user: Option<CurrentUser>) -> Json<SessionInfo> {
    Json(SessionInfo { user })
}

pub async fn api_sign_in(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<SignIn>,
) -> Result<Json<SessionInfo>, AppError> {
    let profile = auth::sign_in(&state, form).await?;
    let user = signed_in(&state, &session, &profile).await?;
    Ok(Json(SessionInfo { user: Some(user) }))
}

pub async fn api_sign_up(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<SignUp>,
) -> Result<(StatusCode, Json<SessionInfo>), AppError> {
    let profile = auth::sign_up(&state, form).await?;
    let user = signed_in(&state, &session, &profile).await?;
    Ok((StatusCode::CREATED, Json(SessionInfo { user: Some(user) })))
}

pub async fn api_sign_out(session: Session) -> Result<StatusCode, AppError> {
    gate::end(&session).await?;
    info!("signed out");
    Ok(StatusCode::NO_CONTENT)
}

const AUTH_FORMS: &str = r#"<section class="panel">
  <div class="card">
    <h2>Sign in</h2>
    <form class="grid" method="post" action="/auth/sign-in">
      <label>Email<input name="email" type="email" autocomplete="email" required /></label>
      <label>Password<input name="password" type="password" autocomplete="current-password" required /></label>
      <button class="btn-add" type="submit">Sign in</button>
    </form>
  </div>
  <div class="card">
    <h2>Create account</h2>
    <form class="grid" method="post" action="/auth/sign-up">
      <label>Full name<input name="full_name" autocomplete="name" /></label>
      <label>Email<input name="email" type="email" autocomplete="email" required /></label>
      <label>Password<input name="password" type="password" minlength="6" autocomplete="new-password" required /></label>
      <button class="btn-sub" type="submit">Sign up</button>
    </form>
  </div>
</section>"#;
