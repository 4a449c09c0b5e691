//! Authentication: session-cookie identity backed by the database.
//!
//! A login issues an opaque token stored (hashed) in the sessions
//! table and returned in an HttpOnly cookie. The middleware resolves
//! the cookie on every request and stashes an [`AuthUser`] in request
//! extensions for handlers and extractors.

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::repository::ChatRepository;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "tidepool_session";

// =============================================================================
// AuthUser
// =============================================================================

/// Authenticated user, populated from the session cookie by the middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

// =============================================================================
// Auth State (shared across middleware and handlers)
// =============================================================================

#[derive(Clone)]
pub struct AuthState {
    pub repository: Arc<ChatRepository>,
    pub auth_config: Arc<AuthConfig>,
}

// =============================================================================
// Cookies
// =============================================================================

/// Extract the session token from a request's Cookie headers.
pub fn session_token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() == Some(SESSION_COOKIE) {
                if let Some(token) = parts.next() {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

/// Set-Cookie value for a fresh session.
pub fn session_cookie(token: &str, ttl_secs: u64, https: bool) -> String {
    let secure = if https { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_secs}{secure}"
    )
}

/// Set-Cookie value that clears the session.
pub fn clear_session_cookie(https: bool) -> String {
    let secure = if https { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{secure}")
}

// =============================================================================
// Auth Middleware
// =============================================================================

/// Auth middleware for HTTP routes.
///
/// 1. Public routes (signup, login, health, metrics) pass through.
/// 2. A valid session cookie → `AuthUser` in request extensions.
/// 3. Everything else → 401.
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    if is_public_route(method.as_str(), &path) {
        return next.run(request).await;
    }

    let Some(token) = session_token_from_headers(request.headers()) else {
        return unauthorized();
    };

    match auth_state.repository.resolve_session(&token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser {
                user_id: user.id,
                username: user.username,
            });
            next.run(request).await
        }
        Ok(None) => unauthorized(),
        Err(e) => {
            tracing::error!("Session lookup failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "INTERNAL_SERVER_ERROR"})),
            )
                .into_response()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "UNAUTHORIZED"})),
    )
        .into_response()
}

fn is_public_route(method: &str, path: &str) -> bool {
    (method == "POST" && (path == "/api/users" || path == "/api/session"))
        || path == "/health"
        || path.starts_with("/health/")
        || path == "/metrics"
}

// =============================================================================
// Axum Extractors
// =============================================================================

/// Extract AuthUser from request extensions (set by middleware).
/// Returns 401 if not present.
impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "UNAUTHORIZED"})),
            )
        })
    }
}
