use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, SignupRequest, TokenResponse},
        errors::AuthError,
        services,
    },
    state::AppState,
};

/// Serde's message can quote submitted values, so it is logged, never returned.
fn malformed_body(rejection: JsonRejection) -> AuthError {
    warn!(status = %rejection.status(), detail = %rejection.body_text(), "rejected request body");
    AuthError::MalformedBody
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Json(payload) = payload.map_err(malformed_body)?;
    let token = services::register(&state, payload).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Json(payload) = payload.map_err(malformed_body)?;
    let token = services::authenticate(&state, payload).await?;
    Ok(Json(TokenResponse { token }))
}
