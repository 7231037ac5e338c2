use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use agora_types::api::{
    DirectMessageView, GroupMessageView, Identity, Page, SendMessageRequest,
};
use agora_types::events::{ChatEvent, RoomAddress};

use crate::error::ApiResult;
use crate::{AppState, run_blocking};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    50
}

/// Live group-room view: ascending pages, oldest first, read-on-view.
pub async fn get_group_messages(
    State(state): State<AppState>,
    Path((group_id, room_id)): Path<(i64, i64)>,
    Query(query): Query<PageQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Page<GroupMessageView>>> {
    let size = query.size.clamp(1, 200);
    let chat = state.chat.clone();

    let page = run_blocking(move || {
        chat.page_group_live(group_id, room_id, &identity, query.page, size)
    })
    .await?;

    Ok(Json(page))
}

pub async fn send_group_message(
    State(state): State<AppState>,
    Path((group_id, room_id)): Path<(i64, i64)>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let view =
        run_blocking(move || chat.append_group(group_id, room_id, &identity, &req)).await?;

    state.dispatcher.publish(
        RoomAddress::group(group_id, room_id),
        ChatEvent::GroupMessage(view.clone()),
    );

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn delete_group_message(
    State(state): State<AppState>,
    Path((group_id, room_id, message_id)): Path<(i64, i64, i64)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let addr = RoomAddress::group(group_id, room_id);
    state.chat.soft_delete(addr, message_id, &identity)?;

    state
        .dispatcher
        .publish(addr, ChatEvent::MessageDeleted { message_id });

    Ok(StatusCode::NO_CONTENT)
}

/// Direct history: newest-first pages with read state, read-on-view.
pub async fn get_direct_messages(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(query): Query<PageQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Page<DirectMessageView>>> {
    let size = query.size.clamp(1, 200);
    let chat = state.chat.clone();

    let page =
        run_blocking(move || chat.page_direct(room_id, &identity, query.page, size)).await?;

    Ok(Json(page))
}

pub async fn send_direct_message(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let view = run_blocking(move || chat.append_direct(room_id, &identity, &req)).await?;

    state.dispatcher.publish(
        RoomAddress::direct(room_id),
        ChatEvent::DirectMessage(view.clone()),
    );

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn delete_direct_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(i64, i64)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let addr = RoomAddress::direct(room_id);
    state.chat.soft_delete(addr, message_id, &identity)?;

    state
        .dispatcher
        .publish(addr, ChatEvent::MessageDeleted { message_id });

    Ok(StatusCode::NO_CONTENT)
}
