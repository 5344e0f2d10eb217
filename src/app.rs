use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/session", get(handlers::get_session))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/auth/signup", post(handlers::sign_up))
        .route("/api/auth/signin", post(handlers::sign_in))
        .route("/api/auth/signout", post(handlers::sign_out))
        .route("/api/day/navigate", post(handlers::navigate))
        .route("/api/day/today", post(handlers::go_to_today))
        .route("/api/day/toggle", post(handlers::toggle))
        .route("/api/settings/start-date", post(handlers::change_start_date))
        .route(
            "/api/settings/mark-past",
            get(handlers::mark_past_preview).post(handlers::mark_past),
        )
        .with_state(state)
}
