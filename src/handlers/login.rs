// handlers/login.rs - credential login and token refresh

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, HandlerResult, RequestClaims};
use crate::services::TokenResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /login - Exchange username and password for a token
///
/// Body shape is enforced by the `login` schema before this runs.
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> HandlerResult<TokenResponse> {
    let service = state.user_service()?;
    let response = service.login(&request.username, &request.password).await?;
    Ok(ApiResponse::success(response))
}

/// POST /refreshtoken - Re-issue the caller's token close to its expiry
pub async fn refresh(State(state): State<AppState>, claims: RequestClaims) -> HandlerResult<TokenResponse> {
    let current = claims
        .token()
        .ok_or_else(|| ApiError::unauthorized("Absent authorization token"))?;
    let response = state.user_service()?.refresh(current)?;
    Ok(ApiResponse::success(response))
}
