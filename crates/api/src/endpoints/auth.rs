//! Authentication endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chrono::{DateTime, Utc};
use pollhub_common::{AppError, AppResult};
use pollhub_core::{AuthToken, LoginInput, RefreshTokenInput};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Log in with email and password.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginInput>,
) -> AppResult<ApiResponse<AuthToken>> {
    let token = state.auth_service.login(req).await?;
    Ok(ApiResponse::ok(token))
}

/// Exchange a refresh token for a new token pair.
async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenInput>,
) -> AppResult<ApiResponse<AuthToken>> {
    req.validate()?;

    let token = state
        .auth_service
        .refresh_token(&req.refresh_token, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(token))
}

/// Drop the caller's refresh token.
async fn logout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    state.auth_service.logout(&user.id).await?;
    Ok(no_content())
}

/// Validate token request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    pub token: String,
}

/// Validate token response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Check an access token without touching the database.
async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateTokenRequest>,
) -> AppResult<ApiResponse<ValidateTokenResponse>> {
    let claims = state.auth_service.validate_token(&req.token)?;
    let expires_at = DateTime::from_timestamp(claims.exp, 0)
        .ok_or_else(|| AppError::InvalidToken("Invalid token".to_string()))?;

    Ok(ApiResponse::ok(ValidateTokenResponse {
        valid: true,
        user_id: claims.user_id,
        expires_at,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/validate", post(validate))
}
