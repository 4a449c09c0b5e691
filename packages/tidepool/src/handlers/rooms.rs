use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthUser;
use crate::models::{MessageWithAuthor, Room};

use super::ApiError;

/// Validate a room id and load the room. Malformed ids are rejected
/// before the database is consulted.
pub(super) async fn validate_room(state: &AppState, room_id: &str) -> Result<Room, ApiError> {
    if room_id.trim().is_empty() {
        return Err(ApiError::BadRequest("roomID is required".into()));
    }
    if Uuid::parse_str(room_id).is_err() {
        return Err(ApiError::BadRequest("roomID is not valid".into()));
    }
    state
        .repository
        .get_room(room_id)
        .await?
        .ok_or(ApiError::RoomNotFound)
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// GET /api/rooms/{id}/messages - recent history, newest first.
///
/// `limit` defaults from config and is clamped to the configured max.
pub async fn get_room_messages(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageWithAuthor>>, ApiError> {
    let room = validate_room(&state, &room_id).await?;

    let limit = effective_limit(query.limit, &state.chat_config);

    let messages = state.repository.recent_messages(&room.id, limit).await?;
    Ok(Json(messages))
}

fn effective_limit(requested: Option<u32>, config: &crate::config::ChatConfig) -> u32 {
    requested
        .unwrap_or(config.history_limit)
        .min(config.history_limit_max)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchStatusRequest {
    pub last_read_msg_id: Option<i64>,
}

/// PATCH /api/rooms/{id}/status - move the caller's read marker.
pub async fn patch_room_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Json(req): Json<PatchStatusRequest>,
) -> Result<StatusCode, ApiError> {
    let room = validate_room(&state, &room_id).await?;
    state
        .repository
        .upsert_read_status(&room.id, &auth.user_id, req.last_read_msg_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
