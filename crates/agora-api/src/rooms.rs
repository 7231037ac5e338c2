use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use agora_types::api::{
    CreateDirectRoomRequest, CreateRoomRequest, DirectRoomView, GroupRoomView, Identity,
    RoomSummary, UpdateRoomRequest,
};

use crate::error::ApiResult;
use crate::{AppState, run_blocking};

/// Resolve-or-create the direct room for the caller and one other user.
/// Idempotent: both parties land on the same room whoever initiates.
pub async fn create_direct_room(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateDirectRoomRequest>,
) -> ApiResult<Json<DirectRoomView>> {
    let view = state
        .chat
        .resolve_or_create_direct(&identity, req.other_user_id)?;
    Ok(Json(view))
}

pub async fn list_direct_rooms(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<DirectRoomView>>> {
    let views = state.chat.list_direct_rooms(&identity)?;
    Ok(Json(views))
}

/// The merged per-user room directory, most recent activity first.
pub async fn list_my_rooms(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<RoomSummary>>> {
    let chat = state.chat.clone();
    let views = run_blocking(move || chat.list_rooms_for_user(&identity)).await?;
    Ok(Json(views))
}

pub async fn list_group_rooms(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<GroupRoomView>>> {
    let views = state.chat.list_group_rooms(group_id, &identity)?;
    Ok(Json(views))
}

pub async fn create_group_room(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<impl IntoResponse> {
    let view = state.chat.create_room(group_id, &identity, &req)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_group_room(
    State(state): State<AppState>,
    Path((group_id, room_id)): Path<(i64, i64)>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateRoomRequest>,
) -> ApiResult<impl IntoResponse> {
    state.chat.update_room(group_id, room_id, &identity, &req)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_group_room(
    State(state): State<AppState>,
    Path((group_id, room_id)): Path<(i64, i64)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    state.chat.delete_room(group_id, room_id, &identity)?;
    Ok(StatusCode::NO_CONTENT)
}
