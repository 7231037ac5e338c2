use agora_types::api::{Identity, ReadReceipt};
use agora_types::events::RoomAddress;

use crate::ChatService;
use crate::error::{ChatError, Result};

/// Read-cursor tracker: one monotonic pointer per (user, room); unread
/// counts and per-message read state are derived, never stored.
impl ChatService {
    /// Acknowledge a message as read. Stale and duplicate acks are no-ops;
    /// a soft-deleted id is still a valid cursor anchor.
    pub fn mark_read(
        &self,
        addr: RoomAddress,
        user: &Identity,
        message_id: i64,
    ) -> Result<ReadReceipt> {
        self.authorize_room_access(addr, user.user_id)?;

        // Deleted messages stay valid cursor anchors, so no liveness filter.
        let msg = self
            .fetch_message(message_id)?
            .ok_or(ChatError::NotFound("message not found"))?;
        if !msg.is_in(addr) {
            return Err(ChatError::NotFound("message not found"));
        }

        let kind = addr.room_kind().as_str();
        self.db
            .advance_cursor(kind, addr.room_id(), user.user_id, message_id)?;

        let read_count =
            self.db
                .read_count_for_message(kind, addr.room_id(), msg.sender_id, message_id)?;

        Ok(ReadReceipt {
            message_id,
            user_id: user.user_id,
            username: user.username.clone(),
            read_count,
        })
    }

    /// Non-deleted messages above the user's cursor that they did not send.
    /// No cursor row means nothing has been read.
    pub fn unread_count(&self, addr: RoomAddress, user_id: i64) -> Result<i64> {
        let kind = addr.room_kind().as_str();
        let cursor = self.db.read_cursor(kind, addr.room_id(), user_id)?;
        let count = self
            .db
            .count_unread(kind, addr.room_id(), user_id, cursor)?;
        Ok(count)
    }

    /// Whether the given participant's cursor has reached the message.
    pub fn is_read_by(&self, addr: RoomAddress, message_id: i64, user_id: i64) -> Result<bool> {
        let cursor = self
            .db
            .read_cursor(addr.room_kind().as_str(), addr.room_id(), user_id)?;
        Ok(cursor.map_or(false, |c| c >= message_id))
    }
}
