use crate::errors::AppError;
use crate::models::{
    AuthResponse, CredentialsRequest, MarkPastPreview, MarkPastRequest, NavigateRequest, SessionView,
    StartDateRequest, StatsResponse,
};
use crate::state::AppState;
use crate::ui::render_index;
use axum::{extract::State, http::StatusCode, response::Html, Json};
use tracing::debug;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(render_index(&session.view()))
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    let session = state.session.lock().await;
    Json(session.view())
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let session = state.session.lock().await;
    Ok(Json(session.stats()?))
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let identity = state.identity.create_account(&payload.email, &payload.password).await?;
    Ok(Json(AuthResponse { email: identity.email }))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let identity = state.identity.sign_in(&payload.email, &payload.password).await?;
    Ok(Json(AuthResponse { email: identity.email }))
}

pub async fn sign_out(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.identity.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn navigate(
    State(state): State<AppState>,
    Json(payload): Json<NavigateRequest>,
) -> Result<Json<SessionView>, AppError> {
    let mut session = state.session.lock().await;
    let day = session.navigate(payload.delta)?;
    debug!(%day, delta = payload.delta, "navigated");
    Ok(Json(session.view()))
}

pub async fn go_to_today(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    let mut session = state.session.lock().await;
    session.go_to_today()?;
    Ok(Json(session.view()))
}

pub async fn toggle(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    let mut session = state.session.lock().await;
    session.toggle_current().await?;
    Ok(Json(session.view()))
}

pub async fn change_start_date(
    State(state): State<AppState>,
    Json(payload): Json<StartDateRequest>,
) -> Result<Json<SessionView>, AppError> {
    let mut session = state.session.lock().await;
    session.change_start_date(&payload.start_date).await?;
    Ok(Json(session.view()))
}

pub async fn mark_past_preview(State(state): State<AppState>) -> Result<Json<MarkPastPreview>, AppError> {
    let session = state.session.lock().await;
    Ok(Json(session.mark_past_preview()?))
}

pub async fn mark_past(
    State(state): State<AppState>,
    Json(payload): Json<MarkPastRequest>,
) -> Result<Json<SessionView>, AppError> {
    let mut session = state.session.lock().await;
    session.mark_past_complete(payload.confirm).await?;
    Ok(Json(session.view()))
}
