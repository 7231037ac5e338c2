use agora_db::models::{MessageRow, NewMessage};
use agora_types::api::{
    DirectMessageView, GroupMessageView, Identity, MessageKind, Page, SearchHit,
    SendMessageRequest,
};
use agora_types::events::{RoomAddress, RoomKind};

use crate::ChatService;
use crate::error::{ChatError, Result};
use crate::model::StoredMessage;
use crate::view::{self, GroupViewContext, UserDirectory};

/// Message store: append-only, soft-deletable, ordered strictly by the
/// server-assigned message id.
impl ChatService {
    pub fn append_group(
        &self,
        group_id: i64,
        room_id: i64,
        sender: &Identity,
        req: &SendMessageRequest,
    ) -> Result<GroupMessageView> {
        let room = self.require_group_room(group_id, room_id)?;
        self.require_room_access(&room, sender.user_id)?;

        let kind = RoomKind::Group.as_str();
        validate_content(req)?;
        self.validate_reply(req.reply_to_message_id, RoomAddress::group(group_id, room_id))?;

        let id = self.insert_from_request(kind, room_id, sender.user_id, req)?;
        self.db.advance_cursor(kind, room_id, sender.user_id, id)?;

        let row = self
            .db
            .get_message(id)?
            .ok_or(ChatError::NotFound("message not found"))?;
        let ctx =
            self.group_view_context(group_id, room_id, sender.user_id, std::slice::from_ref(&row))?;
        Ok(view::group_message_view(&row, &ctx))
    }

    pub fn append_direct(
        &self,
        room_id: i64,
        sender: &Identity,
        req: &SendMessageRequest,
    ) -> Result<DirectMessageView> {
        let room = self.require_direct_room(room_id)?;
        self.require_direct_participant(&room, sender.user_id)?;

        let kind = RoomKind::Direct.as_str();
        validate_content(req)?;
        self.validate_reply(req.reply_to_message_id, RoomAddress::direct(room_id))?;

        let id = self.insert_from_request(kind, room_id, sender.user_id, req)?;
        self.db.advance_cursor(kind, room_id, sender.user_id, id)?;
        self.db.touch_direct_room(room_id)?;

        let row = self
            .db
            .get_message(id)?
            .ok_or(ChatError::NotFound("message not found"))?;
        let users = UserDirectory::load(&self.db, [row.sender_id])?;
        let other = room.other_user(sender.user_id);
        let other_cursor = self.db.read_cursor(kind, room_id, other)?;

        Ok(view::direct_message_view(
            &row,
            &users,
            sender.user_id,
            Some(id),
            other_cursor,
        ))
    }

    /// The live group-room view: ascending-by-id pages for natural
    /// scrollback. Fetching a page acknowledges its newest message.
    pub fn page_group_live(
        &self,
        group_id: i64,
        room_id: i64,
        viewer: &Identity,
        page: u32,
        size: u32,
    ) -> Result<Page<GroupMessageView>> {
        let room = self.require_group_room(group_id, room_id)?;
        self.require_room_access(&room, viewer.user_id)?;

        let kind = RoomKind::Group.as_str();
        let (rows, total) = self.db.page_messages(kind, room_id, page, size, true)?;

        // Read on view, before deriving read state so the viewer's own
        // cursor is current.
        if let Some(newest) = rows.iter().map(|r| r.id).max() {
            self.db.advance_cursor(kind, room_id, viewer.user_id, newest)?;
        }

        let ctx = self.group_view_context(group_id, room_id, viewer.user_id, &rows)?;
        let content = rows
            .iter()
            .map(|row| view::group_message_view(row, &ctx))
            .collect();

        Ok(Page::new(content, total, size))
    }

    /// Direct history: newest-first pages with per-message read state.
    /// Fetching a page acknowledges its newest message.
    pub fn page_direct(
        &self,
        room_id: i64,
        viewer: &Identity,
        page: u32,
        size: u32,
    ) -> Result<Page<DirectMessageView>> {
        let room = self.require_direct_room(room_id)?;
        self.require_direct_participant(&room, viewer.user_id)?;

        let kind = RoomKind::Direct.as_str();
        let (rows, total) = self.db.page_messages(kind, room_id, page, size, false)?;

        if let Some(newest) = rows.iter().map(|r| r.id).max() {
            self.db.advance_cursor(kind, room_id, viewer.user_id, newest)?;
        }

        let my_cursor = self.db.read_cursor(kind, room_id, viewer.user_id)?;
        let other_cursor = self
            .db
            .read_cursor(kind, room_id, room.other_user(viewer.user_id))?;
        let users = UserDirectory::load(&self.db, rows.iter().map(|r| r.sender_id))?;

        let content = rows
            .iter()
            .map(|row| {
                view::direct_message_view(row, &users, viewer.user_id, my_cursor, other_cursor)
            })
            .collect();

        Ok(Page::new(content, total, size))
    }

    /// Soft-delete: the message disappears from pages and search while its
    /// id stays a valid reply and cursor anchor.
    pub fn soft_delete(
        &self,
        addr: RoomAddress,
        message_id: i64,
        requester: &Identity,
    ) -> Result<()> {
        let msg = self.require_live_message(addr, message_id)?;

        let authorized = match addr {
            RoomAddress::Group { group_id, room_id } => {
                self.require_group_room(group_id, room_id)?;
                msg.sender_id == requester.user_id
                    || self.db.is_group_admin(group_id, requester.user_id)?
            }
            RoomAddress::Direct { room_id } => {
                let room = self.require_direct_room(room_id)?;
                self.require_direct_participant(&room, requester.user_id)?;
                msg.sender_id == requester.user_id
            }
        };
        if !authorized {
            return Err(ChatError::Forbidden(
                "only the sender or a room admin can delete a message",
            ));
        }

        self.db.soft_delete_message(msg.id)?;
        Ok(())
    }

    /// Substring search within one room, newest-first, membership-gated.
    /// The parent group is derived from the room itself.
    pub fn search(
        &self,
        kind: RoomKind,
        room_id: i64,
        viewer: &Identity,
        query: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::invalid("search query must not be blank"));
        }

        match kind {
            RoomKind::Group => {
                let room = self
                    .db
                    .get_group_room(room_id)?
                    .ok_or(ChatError::NotFound("chat room not found"))?;
                self.require_room_access(&room, viewer.user_id)?;
            }
            RoomKind::Direct => {
                let room = self.require_direct_room(room_id)?;
                self.require_direct_participant(&room, viewer.user_id)?;
            }
        }

        let (rows, total) = self
            .db
            .search_messages(kind.as_str(), room_id, query, page, size)?;
        let users = UserDirectory::load(&self.db, rows.iter().map(|r| r.sender_id))?;

        let content = rows
            .iter()
            .map(|row| SearchHit {
                id: row.id,
                message: row.body.clone(),
                username: users.username(row.sender_id),
                nickname: users.nickname(row.sender_id),
                kind: view::message_kind(row),
                created_at: view::parse_db_time(&row.created_at),
            })
            .collect();

        Ok(Page::new(content, total, size))
    }

    // -- internals --

    fn insert_from_request(
        &self,
        room_kind: &str,
        room_id: i64,
        sender_id: i64,
        req: &SendMessageRequest,
    ) -> Result<i64> {
        let id = self.db.insert_message(&NewMessage {
            room_kind,
            room_id,
            sender_id,
            kind: req.kind.as_str(),
            body: req.message.as_deref(),
            file_url: req.file_url.as_deref(),
            file_name: req.file_name.as_deref(),
            file_size: req.file_size,
            reply_to_id: req.reply_to_message_id,
        })?;
        Ok(id)
    }

    /// Single-message fetch at the domain boundary, with deletion as an
    /// explicit state.
    pub(crate) fn fetch_message(&self, id: i64) -> Result<Option<StoredMessage>> {
        Ok(self.db.get_message(id)?.map(StoredMessage::from_row))
    }

    /// Reply targets must resolve within the same room. Checked only at
    /// creation time; a target in the Deleted state is still a valid
    /// anchor.
    fn validate_reply(&self, reply_to: Option<i64>, addr: RoomAddress) -> Result<()> {
        let Some(id) = reply_to else {
            return Ok(());
        };
        let target = self
            .fetch_message(id)?
            .ok_or(ChatError::NotFound("reply target not found"))?;
        if !target.is_in(addr) {
            return Err(ChatError::invalid("reply target is not in this room"));
        }
        Ok(())
    }

    /// Active message addressed within the given room; a deleted or
    /// elsewhere-homed message is absent from the caller's point of view.
    fn require_live_message(&self, addr: RoomAddress, message_id: i64) -> Result<StoredMessage> {
        let msg = self
            .fetch_message(message_id)?
            .filter(|m| !m.is_deleted())
            .ok_or(ChatError::NotFound("message not found"))?;
        if !msg.is_in(addr) {
            return Err(ChatError::NotFound("message not found"));
        }
        Ok(msg)
    }

    pub(crate) fn group_view_context(
        &self,
        group_id: i64,
        room_id: i64,
        viewer_id: i64,
        rows: &[MessageRow],
    ) -> Result<GroupViewContext> {
        let users = UserDirectory::load(&self.db, rows.iter().map(|r| r.sender_id))?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let (reactions, my_emojis) = self.aggregate_reactions(&ids, viewer_id)?;

        Ok(GroupViewContext {
            users,
            admin_ids: self.db.group_admin_ids(group_id)?,
            cursors: self.db.room_cursors(RoomKind::Group.as_str(), room_id)?,
            reactions,
            my_emojis,
        })
    }
}

fn validate_content(req: &SendMessageRequest) -> Result<()> {
    let blank = |s: &Option<String>| s.as_deref().map_or(true, |v| v.trim().is_empty());

    match req.kind {
        MessageKind::Text => {
            if blank(&req.message) {
                return Err(ChatError::invalid("TEXT messages need a non-blank body"));
            }
        }
        MessageKind::Image => {
            if blank(&req.file_url) {
                return Err(ChatError::invalid("IMAGE messages need a file_url"));
            }
        }
        MessageKind::File => {
            if blank(&req.file_url)
                || blank(&req.file_name)
                || req.file_size.map_or(true, |s| s <= 0)
            {
                return Err(ChatError::invalid(
                    "FILE messages need file_url, file_name and a positive file_size",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_request(body: &str) -> SendMessageRequest {
        SendMessageRequest {
            kind: MessageKind::Text,
            message: Some(body.to_string()),
            file_url: None,
            file_name: None,
            file_size: None,
            reply_to_message_id: None,
        }
    }

    #[test]
    fn content_validation_is_per_kind() {
        assert!(validate_content(&text_request("hi")).is_ok());
        assert!(validate_content(&text_request("   ")).is_err());

        let image = SendMessageRequest {
            kind: MessageKind::Image,
            message: None,
            file_url: Some("https://cdn.example/a.png".into()),
            file_name: None,
            file_size: None,
            reply_to_message_id: None,
        };
        assert!(validate_content(&image).is_ok());

        let file_without_size = SendMessageRequest {
            kind: MessageKind::File,
            message: None,
            file_url: Some("https://cdn.example/a.pdf".into()),
            file_name: Some("a.pdf".into()),
            file_size: Some(0),
            reply_to_message_id: None,
        };
        assert!(validate_content(&file_without_size).is_err());
    }
}
