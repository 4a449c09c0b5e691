use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::auth::AuthUser;
use crate::ws;

use super::ApiError;
use super::rooms::validate_room;

/// GET /api/rooms/{id}/ws - join a room over WebSocket.
///
/// The room id is validated before the upgrade, so a bad id never
/// creates registry state. Everything after the handshake happens in
/// the room session loop.
pub async fn room_websocket_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let room = validate_room(&state, &room_id).await?;

    let user = state
        .repository
        .get_user_by_id(&auth.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(ws
        .on_upgrade(move |socket| ws::run_room_session(socket, state, room, user))
        .into_response())
}
