use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Response,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        errors::AuthError,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Unreadable bodies are client errors like any other validation failure.
fn body_error(rejection: JsonRejection) -> AuthError {
    warn!(status = %rejection.status(), "rejected request body");
    AuthError::validation(format!("Invalid request body: {}", rejection.body_text()))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), Response> {
    let expose = state.config.expose_error_details();
    let Json(payload) = payload.map_err(|r| body_error(r).into_http("registration", expose))?;

    let outcome = state
        .auth
        .register(payload)
        .await
        .map_err(|e| e.into_http("registration", expose))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new("User registered successfully", outcome)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, Response> {
    let expose = state.config.expose_error_details();
    let Json(payload) = payload.map_err(|r| body_error(r).into_http("login", expose))?;

    let outcome = state
        .auth
        .login(payload)
        .await
        .map_err(|e| e.into_http("login", expose))?;

    Ok(Json(AuthResponse::new("Login successful", outcome)))
}
