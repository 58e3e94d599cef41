use crate::screens::{self, account, admin, analysis, dashboard, expenses, notes, protein, water};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

const SESSION_IDLE_DAYS: i64 = 7;

pub fn router(state: AppState) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(SESSION_IDLE_DAYS)));

    Router::new()
        .merge(html_routes())
        .nest("/api", api_routes())
        .fallback(screens::not_found)
        .layer(sessions)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn html_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::page))
        .route("/reset-today", post(dashboard::submit_reset))
        .route("/expenses", get(expenses::page).post(expenses::submit))
        .route("/expenses/{id}/delete", post(expenses::submit_delete))
        .route("/protein", get(protein::page).post(protein::submit))
        .route("/protein/{id}/delete", post(protein::submit_delete))
        .route("/water", get(water::page).post(water::submit))
        .route("/water/{id}/delete", post(water::submit_delete))
        .route("/notes", get(notes::page).post(notes::submit))
        .route("/notes/{id}/toggle", post(notes::submit_toggle))
        .route("/notes/{id}/delete", post(notes::submit_delete))
        .route("/analysis", get(analysis::page))
        .route("/admin", get(admin::page))
        .route("/admin/categories", post(admin::submit_category))
        .route(
            "/admin/categories/{id}/update",
            post(admin::submit_category_update),
        )
        .route(
            "/admin/categories/{id}/delete",
            post(admin::submit_category_delete),
        )
        .route("/admin/foods", post(admin::submit_food))
        .route("/admin/foods/{id}/update", post(admin::submit_food_update))
        .route("/admin/foods/{id}/delete", post(admin::submit_food_delete))
        .route("/admin/admins", post(admin::submit_grant))
        .route("/admin/admins/{user_id}/delete", post(admin::submit_revoke))
        .route("/auth", get(account::page))
        .route("/auth/sign-in", post(account::submit_sign_in))
        .route("/auth/sign-up", post(account::submit_sign_up))
        .route("/auth/sign-out", post(account::submit_sign_out))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(account::api_session))
        .route("/auth/sign-in", post(account::api_sign_in))
        .route("/auth/sign-up", post(account::api_sign_up))
        .route("/auth/sign-out", post(account::api_sign_out))
        .route("/dashboard", get(dashboard::api_summary))
        .route("/reset-today", post(dashboard::api_reset))
        .route("/categories", get(screens::api_categories))
        .route("/foods", get(screens::api_foods))
        .route("/expenses", get(expenses::api_list).post(expenses::api_create))
        .route("/expenses/{id}", delete(expenses::api_delete))
        .route("/protein", get(protein::api_list).post(protein::api_create))
        .route("/protein/{id}", delete(protein::api_delete))
        .route("/water", get(water::api_list).post(water::api_create))
        .route("/water/{id}", delete(water::api_delete))
        .route("/notes", get(notes::api_list).post(notes::api_create))
        .route("/notes/{id}", delete(notes::api_delete))
        .route("/notes/{id}/toggle", post(notes::api_toggle))
        .route("/analysis", get(analysis::api_month))
        .route("/admin", get(admin::api_overview))
        .route(
            "/admin/categories",
            get(admin::api_categories).post(admin::api_add_category),
        )
        .route(
            "/admin/categories/{id}",
            put(admin::api_update_category).delete(admin::api_delete_category),
        )
        .route("/admin/foods", get(admin::api_foods).post(admin::api_add_food))
        .route(
            "/admin/foods/{id}",
            put(admin::api_update_food).delete(admin::api_delete_food),
        )
        .route("/admin/admins", get(admin::api_admins).post(admin::api_grant))
        .route("/admin/admins/{user_id}", delete(admin::api_revoke))
}
