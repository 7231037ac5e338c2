use agora_db::models::{DirectRoomRow, GroupRoomRow};
use agora_types::api::{
    CreateRoomRequest, DirectRoomView, GroupRoomView, Identity, RoomSummary, UpdateRoomRequest,
};
use agora_types::events::{RoomAddress, RoomKind};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::ChatService;
use crate::error::{ChatError, Result};
use crate::view;

const GENERAL_ROOM_NAME: &str = "General";
const ADMIN_ROOM_NAME: &str = "Admins";

/// Room directory: canonical room identity for both topologies, membership
/// and admin-room gating, activity-ordered listings.
impl ChatService {
    /// Resolve the one direct room for a user pair, creating it on first
    /// contact. Normalizing to (min, max) plus the pair uniqueness
    /// constraint makes concurrent first calls by either party converge on
    /// the same row.
    pub fn resolve_or_create_direct(
        &self,
        me: &Identity,
        other_user_id: i64,
    ) -> Result<DirectRoomView> {
        if other_user_id == me.user_id {
            return Err(ChatError::invalid(
                "cannot open a direct room with yourself",
            ));
        }

        let other = self
            .db
            .get_user_by_id(other_user_id)?
            .ok_or(ChatError::NotFound("user not found"))?;

        let (user_a, user_b) = (
            me.user_id.min(other.id),
            me.user_id.max(other.id),
        );

        let room = match self.db.find_direct_room_by_pair(user_a, user_b)? {
            Some(room) => room,
            None => {
                self.db.insert_direct_room_if_absent(user_a, user_b)?;
                self.db
                    .find_direct_room_by_pair(user_a, user_b)?
                    .ok_or(ChatError::Conflict("direct room creation raced"))?
            }
        };

        self.direct_room_view(&room, me.user_id)
    }

    /// The caller's direct rooms, most recent activity first.
    pub fn list_direct_rooms(&self, me: &Identity) -> Result<Vec<DirectRoomView>> {
        let rooms = self.db.list_direct_rooms(me.user_id)?;
        let mut views = Vec::with_capacity(rooms.len());
        for room in &rooms {
            match self.direct_room_view(room, me.user_id) {
                Ok(view) => views.push(view),
                Err(e) => {
                    // A room referencing a vanished counterpart should not
                    // break the whole listing.
                    warn!("Skipping direct room {}: {}", room.id, e);
                }
            }
        }
        Ok(views)
    }

    /// Rooms of one group, member-gated. Admin rooms are omitted for
    /// non-admin viewers.
    pub fn list_group_rooms(&self, group_id: i64, viewer: &Identity) -> Result<Vec<GroupRoomView>> {
        self.require_member(group_id, viewer.user_id)?;
        let is_admin = self.db.is_group_admin(group_id, viewer.user_id)?;

        let mut views = vec![];
        for room in self.db.list_group_rooms(group_id)? {
            if room.is_admin_room && !is_admin {
                continue;
            }
            views.push(self.group_room_view(&room, viewer.user_id)?);
        }
        Ok(views)
    }

    /// Merged per-user directory across both topologies, ordered by
    /// most-recent-activity descending (direct: room updated_at; group:
    /// derived last-message time, room updated_at when empty).
    pub fn list_rooms_for_user(&self, me: &Identity) -> Result<Vec<RoomSummary>> {
        let mut entries: Vec<(DateTime<Utc>, RoomSummary)> = vec![];

        for room in self.db.list_direct_rooms(me.user_id)? {
            let view = match self.direct_room_view(&room, me.user_id) {
                Ok(view) => view,
                Err(e) => {
                    warn!("Skipping direct room {}: {}", room.id, e);
                    continue;
                }
            };
            let activity = view.last_message_time.unwrap_or(view.updated_at);
            entries.push((activity, RoomSummary::Direct(view)));
        }

        for group_id in self.db.member_group_ids(me.user_id)? {
            let is_admin = self.db.is_group_admin(group_id, me.user_id)?;
            for room in self.db.list_group_rooms(group_id)? {
                if room.is_admin_room && !is_admin {
                    continue;
                }
                let updated = view::parse_db_time(&room.updated_at);
                let view = self.group_room_view(&room, me.user_id)?;
                let activity = view.last_message_time.unwrap_or(updated);
                entries.push((activity, RoomSummary::Group(view)));
            }
        }

        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, summary)| summary).collect())
    }

    /// Create the two rooms every group starts with. Invoked by the group
    /// module at group creation; idempotent so a retry cannot double the
    /// rooms. Returns (admin room id, general room id).
    pub fn provision_group_rooms(&self, group_id: i64) -> Result<(i64, i64)> {
        if !self.db.group_exists(group_id)? {
            return Err(ChatError::NotFound("group not found"));
        }

        let existing = self.db.list_group_rooms(group_id)?;
        let admin = existing.iter().find(|r| r.is_admin_room).map(|r| r.id);
        let general = existing.iter().find(|r| r.is_general).map(|r| r.id);
        if let (Some(admin_id), Some(general_id)) = (admin, general) {
            return Ok((admin_id, general_id));
        }

        let admin_id = match admin {
            Some(id) => id,
            None => self.db.insert_group_room(
                group_id,
                ADMIN_ROOM_NAME,
                Some("Room for group admins."),
                true,
                false,
            )?,
        };
        let general_id = match general {
            Some(id) => id,
            None => self.db.insert_group_room(
                group_id,
                GENERAL_ROOM_NAME,
                Some("Room for all group members."),
                false,
                true,
            )?,
        };

        Ok((admin_id, general_id))
    }

    pub fn create_room(
        &self,
        group_id: i64,
        caller: &Identity,
        req: &CreateRoomRequest,
    ) -> Result<GroupRoomView> {
        self.require_admin(group_id, caller.user_id)?;
        if req.name.trim().is_empty() {
            return Err(ChatError::invalid("room name must not be blank"));
        }

        let room_id = self.db.insert_group_room(
            group_id,
            req.name.trim(),
            req.description.as_deref(),
            false,
            false,
        )?;
        let room = self
            .db
            .get_group_room(room_id)?
            .ok_or(ChatError::NotFound("chat room not found"))?;
        self.group_room_view(&room, caller.user_id)
    }

    pub fn update_room(
        &self,
        group_id: i64,
        room_id: i64,
        caller: &Identity,
        req: &UpdateRoomRequest,
    ) -> Result<()> {
        self.require_admin(group_id, caller.user_id)?;
        let room = self.require_group_room(group_id, room_id)?;
        if req.name.trim().is_empty() {
            return Err(ChatError::invalid("room name must not be blank"));
        }
        self.db
            .update_group_room(room.id, req.name.trim(), req.description.as_deref())?;
        Ok(())
    }

    /// Soft-delete a room. The auto-created general and admin rooms refuse
    /// deletion regardless of the caller's capability.
    pub fn delete_room(&self, group_id: i64, room_id: i64, caller: &Identity) -> Result<()> {
        self.require_admin(group_id, caller.user_id)?;
        let room = self.require_group_room(group_id, room_id)?;
        if room.is_general || room.is_admin_room {
            return Err(ChatError::invalid(
                "the default rooms of a group cannot be deleted",
            ));
        }
        self.db.soft_delete_group_room(room.id)?;
        Ok(())
    }

    // -- Authorization --

    pub(crate) fn require_member(&self, group_id: i64, user_id: i64) -> Result<()> {
        if self.db.is_group_member(group_id, user_id)? {
            Ok(())
        } else {
            Err(ChatError::Forbidden("group members only"))
        }
    }

    pub(crate) fn require_admin(&self, group_id: i64, user_id: i64) -> Result<()> {
        if self.db.is_group_admin(group_id, user_id)? {
            Ok(())
        } else {
            Err(ChatError::Forbidden("group admins only"))
        }
    }

    /// Live room belonging to the given group; anything else is absent.
    pub(crate) fn require_group_room(&self, group_id: i64, room_id: i64) -> Result<GroupRoomRow> {
        let room = self
            .db
            .get_group_room(room_id)?
            .ok_or(ChatError::NotFound("chat room not found"))?;
        if room.group_id != group_id {
            return Err(ChatError::NotFound("chat room not found"));
        }
        Ok(room)
    }

    /// Membership plus admin-room gating.
    pub(crate) fn require_room_access(&self, room: &GroupRoomRow, user_id: i64) -> Result<()> {
        self.require_member(room.group_id, user_id)?;
        if room.is_admin_room && !self.db.is_group_admin(room.group_id, user_id)? {
            return Err(ChatError::Forbidden("admin-only room"));
        }
        Ok(())
    }

    pub(crate) fn require_direct_room(&self, room_id: i64) -> Result<DirectRoomRow> {
        self.db
            .get_direct_room(room_id)?
            .ok_or(ChatError::NotFound("chat room not found"))
    }

    pub(crate) fn require_direct_participant(
        &self,
        room: &DirectRoomRow,
        user_id: i64,
    ) -> Result<()> {
        if room.is_participant(user_id) {
            Ok(())
        } else {
            Err(ChatError::Forbidden("not a participant of this room"))
        }
    }

    /// Full access check for an addressed room, used by the gateway for
    /// subscriptions and per-action reauthorization.
    pub fn authorize_room_access(&self, addr: RoomAddress, user_id: i64) -> Result<()> {
        match addr {
            RoomAddress::Group { group_id, room_id } => {
                let room = self.require_group_room(group_id, room_id)?;
                self.require_room_access(&room, user_id)
            }
            RoomAddress::Direct { room_id } => {
                let room = self.require_direct_room(room_id)?;
                self.require_direct_participant(&room, user_id)
            }
        }
    }

    /// Connect-time participant proof for the direct transport path.
    /// Absent rooms simply report false; the handshake is rejected either way.
    pub fn is_direct_participant(&self, room_id: i64, user_id: i64) -> Result<bool> {
        Ok(self
            .db
            .get_direct_room(room_id)?
            .map_or(false, |room| room.is_participant(user_id)))
    }

    // -- View assembly --

    fn direct_room_view(&self, room: &DirectRoomRow, viewer_id: i64) -> Result<DirectRoomView> {
        let other_id = room.other_user(viewer_id);
        let other = self
            .db
            .get_user_by_id(other_id)?
            .ok_or(ChatError::NotFound("user not found"))?;

        let kind = RoomKind::Direct.as_str();
        let last = self.db.last_message(kind, room.id)?;
        let cursor = self.db.read_cursor(kind, room.id, viewer_id)?;
        let unread = self.db.count_unread(kind, room.id, viewer_id, cursor)?;

        Ok(DirectRoomView {
            id: room.id,
            other_user_id: other.id,
            other_username: other.username,
            other_nickname: other.nickname,
            other_profile_image_url: other.profile_image_url,
            last_message: last.as_ref().and_then(|m| m.body.clone()),
            last_message_time: last.as_ref().map(|m| view::parse_db_time(&m.created_at)),
            unread_count: unread,
            updated_at: view::parse_db_time(&room.updated_at),
        })
    }

    fn group_room_view(&self, room: &GroupRoomRow, viewer_id: i64) -> Result<GroupRoomView> {
        let kind = RoomKind::Group.as_str();
        let last = self.db.last_message(kind, room.id)?;
        let cursor = self.db.read_cursor(kind, room.id, viewer_id)?;
        let unread = self.db.count_unread(kind, room.id, viewer_id, cursor)?;

        Ok(GroupRoomView {
            id: room.id,
            group_id: room.group_id,
            name: room.name.clone(),
            description: room.description.clone(),
            is_admin_room: room.is_admin_room,
            is_general: room.is_general,
            last_message: last.as_ref().and_then(|m| m.body.clone()),
            last_message_time: last.as_ref().map(|m| view::parse_db_time(&m.created_at)),
            unread_count: unread,
        })
    }
}
