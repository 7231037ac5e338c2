use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// JWT claims shared across agora-api (REST middleware) and agora-gateway
/// (WebSocket authentication). Canonical definition lives here in agora-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

/// The identity bound to a session or request. Threaded explicitly through
/// every domain call; there is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

// -- Messages --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "TEXT",
            MessageKind::Image => "IMAGE",
            MessageKind::File => "FILE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TEXT" => Some(MessageKind::Text),
            "IMAGE" => Some(MessageKind::Image),
            "FILE" => Some(MessageKind::File),
            _ => None,
        }
    }
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub reply_to_message_id: Option<i64>,
}

/// Group-room message view: derived read count plus the per-sender admin
/// badge and the reaction aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessageView {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub profile_image_url: Option<String>,
    pub is_admin: bool,
    pub kind: MessageKind,
    pub message: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to_message_id: Option<i64>,
    pub read_count: i64,
    pub reactions: Vec<ReactionGroup>,
    pub my_emojis: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Direct-room message view: boolean read state instead of a count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessageView {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub profile_image_url: Option<String>,
    pub kind: MessageKind,
    pub message: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to_message_id: Option<i64>,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Reactions --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: i64,
}

// -- Read receipts --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub message_id: i64,
    pub user_id: i64,
    pub username: String,
    pub read_count: i64,
}

// -- Rooms --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDirectRoomRequest {
    pub other_user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectRoomView {
    pub id: i64,
    pub other_user_id: i64,
    pub other_username: String,
    pub other_nickname: Option<String>,
    pub other_profile_image_url: Option<String>,
    pub last_message: Option<String>,
    pub last_message_time: Option<chrono::DateTime<chrono::Utc>>,
    pub unread_count: i64,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRoomView {
    pub id: i64,
    pub group_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_admin_room: bool,
    pub is_general: bool,
    pub last_message: Option<String>,
    pub last_message_time: Option<chrono::DateTime<chrono::Utc>>,
    pub unread_count: i64,
}

/// One entry of the merged per-user room directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topology", rename_all = "snake_case")]
pub enum RoomSummary {
    Group(GroupRoomView),
    Direct(DirectRoomView),
}

// -- Search --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub message: Option<String>,
    pub username: String,
    pub nickname: Option<String>,
    pub kind: MessageKind,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Pagination --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: i64, page_size: u32) -> Self {
        let size = i64::from(page_size.max(1));
        Self {
            content,
            total_elements,
            total_pages: (total_elements + size - 1) / size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_totals_round_up() {
        let page = Page::new(vec![1, 2, 3], 101, 50);
        assert_eq!(page.total_pages, 3);
        assert_eq!(Page::<i64>::new(vec![], 0, 50).total_pages, 0);
        assert_eq!(Page::<i64>::new(vec![], 50, 50).total_pages, 1);
    }

    #[test]
    fn message_kind_round_trips_db_repr() {
        for kind in [MessageKind::Text, MessageKind::Image, MessageKind::File] {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::parse("VIDEO"), None);
    }
}
