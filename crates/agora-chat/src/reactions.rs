use std::collections::HashMap;

use agora_types::api::{Identity, ReactionGroup};
use agora_types::events::RoomAddress;

use crate::ChatService;
use crate::error::{ChatError, Result};

/// Reaction aggregator: a toggle set of (message, user, emoji) with grouped
/// counting. Counts are computed fresh on read so concurrent toggles cannot
/// drift a running counter.
impl ChatService {
    /// Toggle one (user, emoji) tuple on a message. Returns whether the
    /// reaction is now present plus the fresh aggregate for the message;
    /// callers re-fetch rather than applying a delta.
    pub fn toggle_reaction(
        &self,
        group_id: i64,
        room_id: i64,
        user: &Identity,
        message_id: i64,
        emoji: &str,
    ) -> Result<(bool, Vec<ReactionGroup>)> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(ChatError::invalid("emoji must not be blank"));
        }

        let room = self.require_group_room(group_id, room_id)?;
        self.require_room_access(&room, user.user_id)?;

        let msg = self
            .fetch_message(message_id)?
            .filter(|m| !m.is_deleted())
            .ok_or(ChatError::NotFound("message not found"))?;
        if !msg.is_in(RoomAddress::group(group_id, room_id)) {
            return Err(ChatError::NotFound("message not found"));
        }

        let added = if self.db.reaction_exists(msg.id, user.user_id, emoji)? {
            self.db.delete_reaction(msg.id, user.user_id, emoji)?;
            false
        } else {
            // Check-then-act; the unique index absorbs a racing duplicate
            // insert, and either way the tuple is present afterwards.
            self.db.insert_reaction(msg.id, user.user_id, emoji)?;
            true
        };

        let (mut counts, _) = self.aggregate_reactions(&[msg.id], user.user_id)?;
        Ok((added, counts.remove(&msg.id).unwrap_or_default()))
    }

    /// Grouped (emoji, count) lists per message id, plus the emojis the
    /// viewer applied.
    pub fn aggregate_reactions(
        &self,
        message_ids: &[i64],
        viewer_id: i64,
    ) -> Result<(HashMap<i64, Vec<ReactionGroup>>, HashMap<i64, Vec<String>>)> {
        let mut grouped: HashMap<i64, Vec<ReactionGroup>> = HashMap::new();
        for (message_id, emoji, count) in self.db.reaction_counts(message_ids)? {
            grouped
                .entry(message_id)
                .or_default()
                .push(ReactionGroup { emoji, count });
        }

        let mut mine: HashMap<i64, Vec<String>> = HashMap::new();
        for (message_id, emoji) in self.db.user_reactions(message_ids, viewer_id)? {
            mine.entry(message_id).or_default().push(emoji);
        }

        Ok((grouped, mine))
    }
}
