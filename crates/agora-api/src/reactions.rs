use axum::{
    Extension, Json,
    extract::{Path, State},
};

use agora_types::api::{Identity, ToggleReactionRequest};
use agora_types::events::{ChatEvent, RoomAddress};

use crate::AppState;
use crate::error::ApiResult;

/// Toggle one emoji reaction. The response only says whether the tuple is
/// now present; clients re-fetch aggregates (and receive the published
/// aggregate) instead of applying a delta.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path((group_id, room_id, message_id)): Path<(i64, i64, i64)>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ToggleReactionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (added, reactions) =
        state
            .chat
            .toggle_reaction(group_id, room_id, &identity, message_id, &req.emoji)?;

    state.dispatcher.publish(
        RoomAddress::group(group_id, room_id),
        ChatEvent::Reaction {
            message_id,
            reactions,
        },
    );

    Ok(Json(serde_json::json!({ "added": added })))
}
