//! Access gate: who is signed in, whether they are an admin, and the one-shot
//! notices shown on the next rendered page.

use crate::auth::{find_profile, has_role};
use crate::errors::AppError;
use crate::models::Role;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, OriginalUri},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

pub const SESSION_USER_ID_KEY: &str = "daily_tracker:user:id";
pub const SESSION_NOTICE_KEY: &str = "daily_tracker:notice";
pub const SIGN_IN_PATH: &str = "/auth";

#[derive(Default, Deserialize, Serialize, Debug)]
pub struct SessionUserId(pub Uuid);

impl SessionUserId {
    pub async fn insert(session: &Session, user_id: Uuid) -> Result<(), AppError> {
        session
            .insert(SESSION_USER_ID_KEY, SessionUserId(user_id))
            .await?;
        Ok(())
    }

    pub async fn get(session: &Session) -> Result<Option<Uuid>, AppError> {
        Ok(session
            .get::<SessionUserId>(SESSION_USER_ID_KEY)
            .await?
            .map(|SessionUserId(id)| id))
    }
}

/// Stores `user_id` under a fresh session id.
pub async fn start(session: &Session, user_id: Uuid) -> Result<(), AppError> {
    session.cycle_id().await?;
    SessionUserId::insert(session, user_id).await
}

/// Drops everything held for this session, including pending notices.
pub async fn end(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient notification consumed by the next page render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: title.into(),
            description: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub async fn flash(self, session: &Session) -> Result<(), AppError> {
        session.insert(SESSION_NOTICE_KEY, self).await?;
        Ok(())
    }

    pub async fn take(session: &Session) -> Result<Option<Notice>, AppError> {
        Ok(session.remove::<Notice>(SESSION_NOTICE_KEY).await?)
    }
}

impl From<&AppError> for Notice {
    fn from(err: &AppError) -> Self {
        Notice::error(err.message.clone())
    }
}

/// The signed-in user as seen by a screen at mount time.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

impl CurrentUser {
    pub async fn resolve(state: &AppState, user_id: Uuid) -> Option<Self> {
        let profile = find_profile(&state.store, user_id).await?;
        let is_admin = has_role(&state.store, user_id, Role::Admin).await;
        Some(Self {
            id: user_id,
            email: profile.email,
            full_name: profile.full_name,
            is_admin,
        })
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

/// An admin; everyone else is turned away at extraction time.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[derive(Debug)]
pub enum GateRejection {
    /// Anonymous visitor on an HTML screen.
    SignIn,
    /// Non-admin on the admin screen; the denial notice is already queued.
    Denied,
    Api(AppError),
    Session(StatusCode, &'static str),
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            Self::SignIn => Redirect::to(SIGN_IN_PATH).into_response(),
            Self::Denied => Redirect::to("/").into_response(),
            Self::Api(err) => err.into_response(),
            Self::Session(status, message) => (status, message).into_response(),
        }
    }
}

/// Path as the client sent it; nested routers only see the stripped suffix.
fn request_path(parts: &Parts) -> &str {
    parts
        .extensions
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.path())
        .unwrap_or_else(|| parts.uri.path())
}

fn is_api(parts: &Parts) -> bool {
    request_path(parts).starts_with("/api/")
}

async fn session_of(parts: &mut Parts, state: &AppState) -> Result<Session, GateRejection> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|(status, message)| GateRejection::Session(status, message))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let api = is_api(parts);
        let anonymous = || {
            if api {
                GateRejection::Api(AppError::unauthorized("Sign in required"))
            } else {
                GateRejection::SignIn
            }
        };

        let session = session_of(parts, state).await?;
        let user_id = SessionUserId::get(&session)
            .await
            .map_err(GateRejection::Api)?
            .ok_or_else(anonymous)?;

        match CurrentUser::resolve(state, user_id).await {
            Some(user) => Ok(user),
            None => {
                debug!(user_id = %user_id, "session refers to a missing profile");
                Err(anonymous())
            }
        }
    }
}

/// Anonymous visitors resolve to `None` instead of being turned away.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = GateRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        let session = session_of(parts, state).await?;
        let Some(user_id) = SessionUserId::get(&session)
            .await
            .map_err(GateRejection::Api)?
        else {
            return Ok(None);
        };
        Ok(CurrentUser::resolve(state, user_id).await)
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = <CurrentUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        if user.is_admin {
            return Ok(AdminUser(user));
        }

        warn!(user_id = %user.id, path = %request_path(parts), "admin access denied");
        if is_api(parts) {
            return Err(GateRejection::Api(AppError::forbidden(
                "You do not have admin privileges.",
            )));
        }

        let session = session_of(parts, state).await?;
        Notice::error("Access Denied")
            .with_description("You do not have admin privileges.")
            .flash(&session)
            .await
            .map_err(GateRejection::Api)?;
        Err(GateRejection::Denied)
    }
}
