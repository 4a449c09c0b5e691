pub mod health;
pub mod hubs;
pub mod rooms;
pub mod session;
pub mod users;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler, health_ready_handler, metrics_handler};
pub use hubs::{create_hub, create_room, get_hub, get_hub_rooms, join_hub, list_hubs};
pub use rooms::{get_room_messages, patch_room_status};
pub use session::{login, logout};
pub use users::{get_user_profile, me, signup};
pub use websocket::room_websocket_handler;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Machine-readable API error. Serialized as
/// `{"error": "<CODE>", "message": "..."}` with the matching status.
#[derive(Debug)]
pub enum ApiError {
    UsernameExists,
    UsernameRequired,
    PasswordRequired,
    EmailRequired,
    EmailInvalid,
    UserDoesNotExist,
    BadRequest(String),
    NotFound,
    HubNotFound,
    RoomNotFound,
    Unauthorized,
    Internal(anyhow::Error),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::UsernameExists => "USERNAME_EXISTS",
            ApiError::UsernameRequired => "USERNAME_REQUIRED",
            ApiError::PasswordRequired => "PASSWORD_REQUIRED",
            ApiError::EmailRequired => "EMAIL_REQUIRED",
            ApiError::EmailInvalid => "EMAIL_INVALID",
            ApiError::UserDoesNotExist => "USER_DOES_NOT_EXIST",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::HubNotFound => "HUB_NOT_FOUND",
            ApiError::RoomNotFound => "ROOM_NOT_FOUND",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::UsernameExists => StatusCode::CONFLICT,
            ApiError::UsernameRequired
            | ApiError::PasswordRequired
            | ApiError::EmailRequired
            | ApiError::EmailInvalid
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UserDoesNotExist | ApiError::NotFound | ApiError::HubNotFound
            | ApiError::RoomNotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::BadRequest(msg) => Some(msg.clone()),
            ApiError::Internal(e) => {
                error!("Request failed: {e:#}");
                None
            }
            _ => None,
        };
        let body = ErrorBody {
            error: self.code(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_body_shape() {
        let resp = ApiError::UsernameExists.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "USERNAME_EXISTS");
        assert!(json.get("message").is_none());
    }

    #[tokio::test]
    async fn bad_request_carries_message() {
        let resp = ApiError::BadRequest("roomID is not valid".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "BAD_REQUEST");
        assert_eq!(json["message"], "roomID is not valid");
    }

    #[test]
    fn internal_hides_details() {
        let err = ApiError::from(anyhow::anyhow!("db exploded"));
        assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
