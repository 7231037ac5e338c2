use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use agora_types::api::{Identity, Page, SearchHit};
use agora_types::events::RoomKind;

use crate::error::ApiResult;
use crate::{AppState, run_blocking};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// "group" or "direct"
    #[serde(rename = "type")]
    pub kind: RoomKind,
    pub room_id: i64,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_search_size")]
    pub size: u32,
}

fn default_search_size() -> u32 {
    20
}

/// Substring search within one room, newest-first with totals.
pub async fn search_messages(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Page<SearchHit>>> {
    let size = query.size.clamp(1, 200);
    let chat = state.chat.clone();

    let page = run_blocking(move || {
        chat.search(
            query.kind,
            query.room_id,
            &identity,
            &query.query,
            query.page,
            size,
        )
    })
    .await?;

    Ok(Json(page))
}
