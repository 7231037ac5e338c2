use agora_db::models::MessageRow;
use agora_types::api::MessageKind;
use agora_types::events::RoomAddress;

/// A stored message as the domain sees it. Deletion is a state, not a flag
/// beside live fields, so "deleted but still referenced by a reply or a
/// cursor" is explicit at the type level.
#[derive(Debug)]
pub struct StoredMessage {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub state: MessageState,
    room_kind: String,
}

#[derive(Debug)]
pub enum MessageState {
    Active(MessagePayload),
    Deleted,
}

/// The immutable payload of an active message.
#[derive(Debug, Clone)]
pub struct MessagePayload {
    pub kind: MessageKind,
    pub body: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to_id: Option<i64>,
}

impl StoredMessage {
    pub(crate) fn from_row(row: MessageRow) -> Self {
        let state = if row.is_deleted {
            MessageState::Deleted
        } else {
            MessageState::Active(MessagePayload {
                kind: MessageKind::parse(&row.kind).unwrap_or_default(),
                body: row.body,
                file_url: row.file_url,
                file_name: row.file_name,
                file_size: row.file_size,
                reply_to_id: row.reply_to_id,
            })
        };

        Self {
            id: row.id,
            room_id: row.room_id,
            sender_id: row.sender_id,
            state,
            room_kind: row.room_kind,
        }
    }

    /// Whether the message lives in the addressed room. The group id of a
    /// group address plays no part here; rooms are bound to their group
    /// separately.
    pub fn is_in(&self, addr: RoomAddress) -> bool {
        self.room_kind == addr.room_kind().as_str() && self.room_id == addr.room_id()
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.state, MessageState::Deleted)
    }

    /// The payload, when the message is still active.
    pub fn payload(&self) -> Option<&MessagePayload> {
        match &self.state {
            MessageState::Active(payload) => Some(payload),
            MessageState::Deleted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(is_deleted: bool) -> MessageRow {
        MessageRow {
            id: 7,
            room_kind: "group".into(),
            room_id: 3,
            sender_id: 1,
            kind: "FILE".into(),
            body: None,
            file_url: Some("https://cdn.example/a.pdf".into()),
            file_name: Some("a.pdf".into()),
            file_size: Some(2048),
            reply_to_id: Some(5),
            is_deleted,
            created_at: "2026-08-04 10:00:00".into(),
        }
    }

    #[test]
    fn deletion_is_a_state_not_a_flag() {
        let active = StoredMessage::from_row(row(false));
        let payload = active.payload().expect("active message has a payload");
        assert_eq!(payload.kind, MessageKind::File);
        assert_eq!(payload.file_size, Some(2048));
        assert_eq!(payload.reply_to_id, Some(5));

        let deleted = StoredMessage::from_row(row(true));
        assert!(deleted.is_deleted());
        assert!(deleted.payload().is_none());
        // Identity and room binding survive deletion; only the payload hides.
        assert_eq!(deleted.id, 7);
        assert!(deleted.is_in(RoomAddress::group(99, 3)));
        assert!(!deleted.is_in(RoomAddress::direct(3)));
    }
}
