use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::auth::{clear_session_cookie, session_cookie, session_token_from_headers};

use super::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/session - log in.
///
/// Unknown username → USER_DOES_NOT_EXIST; wrong password → UNAUTHORIZED.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if req.username.trim().is_empty() {
        return Err(ApiError::UsernameRequired);
    }
    if req.password.is_empty() {
        return Err(ApiError::PasswordRequired);
    }

    if state
        .repository
        .get_user_by_username(req.username.trim())
        .await?
        .is_none()
    {
        return Err(ApiError::UserDoesNotExist);
    }

    let user = state
        .repository
        .verify_user_password(req.username.trim(), &req.password)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let ttl = state.auth_config.session_ttl_secs;
    let token = state.repository.create_session(&user.id, ttl).await?;
    let cookie = session_cookie(&token, ttl, state.auth_config.https);
    info!(username = %user.username, "User logged in");

    Ok(([(header::SET_COOKIE, cookie)], Json(user)).into_response())
}

/// DELETE /api/session - log out and clear the cookie. Idempotent.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = session_token_from_headers(&headers) {
        state.repository.delete_session(&token).await?;
    }
    let cookie = clear_session_cookie(state.auth_config.https);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}
