use std::collections::{HashMap, HashSet};

use agora_db::Database;
use agora_db::models::{MessageRow, UserRow};
use agora_types::api::{DirectMessageView, GroupMessageView, MessageKind, ReactionGroup};
use chrono::{DateTime, Utc};
use tracing::warn;

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC when the RFC 3339 parse fails.
pub(crate) fn parse_db_time(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn message_kind(row: &MessageRow) -> MessageKind {
    MessageKind::parse(&row.kind).unwrap_or_else(|| {
        warn!("Corrupt kind '{}' on message {}", row.kind, row.id);
        MessageKind::Text
    })
}

/// Batch-loaded sender display fields, keyed by user id.
pub(crate) struct UserDirectory {
    by_id: HashMap<i64, UserRow>,
}

impl UserDirectory {
    pub(crate) fn load(
        db: &Database,
        ids: impl IntoIterator<Item = i64>,
    ) -> anyhow::Result<Self> {
        let unique: Vec<i64> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
        let rows = db.get_users_by_ids(&unique)?;
        Ok(Self {
            by_id: rows.into_iter().map(|u| (u.id, u)).collect(),
        })
    }

    pub(crate) fn username(&self, id: i64) -> String {
        self.by_id
            .get(&id)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub(crate) fn nickname(&self, id: i64) -> Option<String> {
        self.by_id.get(&id).and_then(|u| u.nickname.clone())
    }

    pub(crate) fn profile_image(&self, id: i64) -> Option<String> {
        self.by_id.get(&id).and_then(|u| u.profile_image_url.clone())
    }
}

/// Cumulative read count derived from the cursor store: participants other
/// than the sender whose cursor has reached the message.
pub(crate) fn derived_read_count(
    cursors: &[(i64, Option<i64>)],
    sender_id: i64,
    message_id: i64,
) -> i64 {
    cursors
        .iter()
        .filter(|(user_id, cursor)| {
            *user_id != sender_id && cursor.map_or(false, |c| c >= message_id)
        })
        .count() as i64
}

/// Everything a page of group messages needs beyond the rows themselves.
pub(crate) struct GroupViewContext {
    pub users: UserDirectory,
    pub admin_ids: Vec<i64>,
    pub cursors: Vec<(i64, Option<i64>)>,
    pub reactions: HashMap<i64, Vec<ReactionGroup>>,
    pub my_emojis: HashMap<i64, Vec<String>>,
}

pub(crate) fn group_message_view(row: &MessageRow, ctx: &GroupViewContext) -> GroupMessageView {
    GroupMessageView {
        id: row.id,
        room_id: row.room_id,
        sender_id: row.sender_id,
        username: ctx.users.username(row.sender_id),
        nickname: ctx.users.nickname(row.sender_id),
        profile_image_url: ctx.users.profile_image(row.sender_id),
        is_admin: ctx.admin_ids.contains(&row.sender_id),
        kind: message_kind(row),
        message: row.body.clone(),
        file_url: row.file_url.clone(),
        file_name: row.file_name.clone(),
        file_size: row.file_size,
        reply_to_message_id: row.reply_to_id,
        read_count: derived_read_count(&ctx.cursors, row.sender_id, row.id),
        reactions: ctx.reactions.get(&row.id).cloned().unwrap_or_default(),
        my_emojis: ctx.my_emojis.get(&row.id).cloned().unwrap_or_default(),
        created_at: parse_db_time(&row.created_at),
    }
}

/// Direct-room view: own messages are read once the *other* participant's
/// cursor reaches them, received messages once the viewer's own does.
pub(crate) fn direct_message_view(
    row: &MessageRow,
    users: &UserDirectory,
    viewer_id: i64,
    my_cursor: Option<i64>,
    other_cursor: Option<i64>,
) -> DirectMessageView {
    let is_read = if row.sender_id == viewer_id {
        other_cursor.map_or(false, |c| c >= row.id)
    } else {
        my_cursor.map_or(false, |c| c >= row.id)
    };

    DirectMessageView {
        id: row.id,
        room_id: row.room_id,
        sender_id: row.sender_id,
        username: users.username(row.sender_id),
        nickname: users.nickname(row.sender_id),
        profile_image_url: users.profile_image(row.sender_id),
        kind: message_kind(row),
        message: row.body.clone(),
        file_url: row.file_url.clone(),
        file_name: row.file_name.clone(),
        file_size: row.file_size,
        reply_to_message_id: row.reply_to_id,
        is_read,
        created_at: parse_db_time(&row.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_count_ignores_sender_and_unset_cursors() {
        let cursors = vec![(1, Some(10)), (2, Some(4)), (3, None), (4, Some(7))];
        assert_eq!(derived_read_count(&cursors, 1, 7), 1);
        assert_eq!(derived_read_count(&cursors, 4, 7), 1);
        assert_eq!(derived_read_count(&cursors, 9, 5), 2);
    }

    #[test]
    fn db_times_parse_with_naive_fallback() {
        let naive = parse_db_time("2026-08-04 12:30:00");
        assert_eq!(naive.to_rfc3339(), "2026-08-04T12:30:00+00:00");

        let rfc = parse_db_time("2026-08-04T12:30:00Z");
        assert_eq!(naive, rfc);
    }
}
