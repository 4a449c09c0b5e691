use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::auth::AuthUser;
use crate::models::{Hub, Room};

use super::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHubRequest {
    #[serde(default)]
    pub name: String,
}

/// POST /api/hubs - create a hub owned by the caller.
pub async fn create_hub(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateHubRequest>,
) -> Result<Response, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("hub name is required".into()));
    }

    let hub = Hub::new(auth.user_id.clone(), name.to_string());
    state.repository.create_hub(&hub).await?;
    info!(hub = %hub.id, owner = %auth.username, "Hub created");

    Ok((StatusCode::CREATED, Json(hub)).into_response())
}

/// GET /api/hubs/{id} - hub by id.
pub async fn get_hub(
    State(state): State<AppState>,
    Path(hub_id): Path<String>,
) -> Result<Json<Hub>, ApiError> {
    let hub = state
        .repository
        .get_hub(&hub_id)
        .await?
        .ok_or(ApiError::HubNotFound)?;
    Ok(Json(hub))
}

/// GET /api/hubs - hubs the caller belongs to.
pub async fn list_hubs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Hub>>, ApiError> {
    let hubs = state.repository.get_user_hubs(&auth.user_id).await?;
    Ok(Json(hubs))
}

/// POST /api/hubs/{id}/join - join a hub. Re-joining is a no-op.
pub async fn join_hub(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(hub_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.repository.get_hub(&hub_id).await?.is_none() {
        return Err(ApiError::HubNotFound);
    }
    state.repository.join_hub(&hub_id, &auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default = "default_room_kind")]
    pub kind: String,
}

fn default_room_kind() -> String {
    "text".to_string()
}

/// POST /api/hubs/{id}/rooms - add a room to a hub the caller belongs to.
pub async fn create_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(hub_id): Path<String>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Response, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("room name is required".into()));
    }

    if state.repository.get_hub(&hub_id).await?.is_none() {
        return Err(ApiError::HubNotFound);
    }
    if !state.repository.is_hub_member(&hub_id, &auth.user_id).await? {
        return Err(ApiError::Unauthorized);
    }

    let room = Room::new(hub_id, name.to_string(), req.kind, req.group_name);
    state.repository.create_room(&room).await?;
    info!(room = %room.id, hub = %room.hub_id, "Room created");

    Ok((StatusCode::CREATED, Json(room)).into_response())
}

/// GET /api/hubs/{id}/rooms - rooms in a hub the caller belongs to.
pub async fn get_hub_rooms(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(hub_id): Path<String>,
) -> Result<Json<Vec<Room>>, ApiError> {
    if state.repository.get_hub(&hub_id).await?.is_none() {
        return Err(ApiError::HubNotFound);
    }
    if !state.repository.is_hub_member(&hub_id, &auth.user_id).await? {
        return Err(ApiError::Unauthorized);
    }
    let rooms = state.repository.get_hub_rooms(&hub_id).await?;
    Ok(Json(rooms))
}
