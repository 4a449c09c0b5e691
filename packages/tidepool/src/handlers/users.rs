use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::auth::{AuthUser, session_cookie};
use crate::models::User;
use crate::repository::{hash_password, is_unique_violation};

use super::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn validate_signup(req: &SignupRequest) -> Result<(), ApiError> {
    if req.username.trim().is_empty() {
        return Err(ApiError::UsernameRequired);
    }
    if req.password.is_empty() {
        return Err(ApiError::PasswordRequired);
    }
    if req.email.trim().is_empty() {
        return Err(ApiError::EmailRequired);
    }
    if !req.email.contains('@') {
        return Err(ApiError::EmailInvalid);
    }
    Ok(())
}

/// POST /api/users - register an account and log it in.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    if !state.auth_config.allow_registration {
        return Err(ApiError::Unauthorized);
    }
    validate_signup(&req)?;

    let password_hash = hash_password(&req.password)?;
    let user = User::new(req.username.trim().to_string(), req.email.trim().to_string(), password_hash);

    // Uniqueness is enforced by the username constraint, so two
    // concurrent signups for the same name can never both succeed; the
    // loser gets the conflict, not a server error.
    if let Err(e) = state.repository.create_user(&user).await {
        if is_unique_violation(&e) {
            return Err(ApiError::UsernameExists);
        }
        return Err(e.into());
    }
    info!(username = %user.username, "User registered");

    let ttl = state.auth_config.session_ttl_secs;
    let token = state.repository.create_session(&user.id, ttl).await?;
    let cookie = session_cookie(&token, ttl, state.auth_config.https);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(user),
    )
        .into_response())
}

/// GET /api/users/me - the logged-in user's own record.
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = state
        .repository
        .get_user_by_id(&auth.user_id)
        .await?
        .ok_or(ApiError::UserDoesNotExist)?;
    Ok(Json(user))
}

/// GET /api/users/{username} - public profile lookup.
pub async fn get_user_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let user = state
        .repository
        .get_user_by_username(&username)
        .await?
        .ok_or(ApiError::UserDoesNotExist)?;
    Ok(Json(user.profile()).into_response())
}
