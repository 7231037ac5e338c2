use crate::Database;
use crate::models::{MessageRow, NewMessage};
use anyhow::Result;
use rusqlite::OptionalExtension;

impl Database {
    /// Append a message; the returned rowid is the room's ordering key.
    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                     (room_kind, room_id, sender_id, kind, body,
                      file_url, file_name, file_size, reply_to_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    msg.room_kind,
                    msg.room_id,
                    msg.sender_id,
                    msg.kind,
                    msg.body,
                    msg.file_url,
                    msg.file_name,
                    msg.file_size,
                    msg.reply_to_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Fetch by id, deleted rows included — callers decide whether a
    /// deleted message is visible (reply/cursor anchors stay valid).
    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE id = ?1",
                MESSAGE_COLS
            ))?;
            let row = stmt.query_row([id], row_to_message).optional()?;
            Ok(row)
        })
    }

    /// One page of non-deleted messages plus the total count.
    /// Ordering is always by id, never wall-clock.
    pub fn page_messages(
        &self,
        room_kind: &str,
        room_id: i64,
        page: u32,
        size: u32,
        ascending: bool,
    ) -> Result<(Vec<MessageRow>, i64)> {
        let order = if ascending { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT {} FROM messages
             WHERE room_kind = ?1 AND room_id = ?2 AND is_deleted = 0
             ORDER BY id {}
             LIMIT ?3 OFFSET ?4",
            MESSAGE_COLS, order
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![room_kind, room_id, size, page * size],
                    row_to_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE room_kind = ?1 AND room_id = ?2 AND is_deleted = 0",
                rusqlite::params![room_kind, room_id],
                |row| row.get(0),
            )?;

            Ok((rows, total))
        })
    }

    /// Substring search, newest-first, non-deleted only.
    pub fn search_messages(
        &self,
        room_kind: &str,
        room_id: i64,
        query: &str,
        page: u32,
        size: u32,
    ) -> Result<(Vec<MessageRow>, i64)> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages
                 WHERE room_kind = ?1 AND room_id = ?2 AND is_deleted = 0
                   AND body IS NOT NULL AND body LIKE '%' || ?3 || '%'
                 ORDER BY id DESC
                 LIMIT ?4 OFFSET ?5",
                MESSAGE_COLS
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![room_kind, room_id, query, size, page * size],
                    row_to_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE room_kind = ?1 AND room_id = ?2 AND is_deleted = 0
                   AND body IS NOT NULL AND body LIKE '%' || ?3 || '%'",
                rusqlite::params![room_kind, room_id, query],
                |row| row.get(0),
            )?;

            Ok((rows, total))
        })
    }

    /// Newest non-deleted message of a room, for room-list previews.
    pub fn last_message(&self, room_kind: &str, room_id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages
                 WHERE room_kind = ?1 AND room_id = ?2 AND is_deleted = 0
                 ORDER BY id DESC LIMIT 1",
                MESSAGE_COLS
            ))?;
            let row = stmt
                .query_row(rusqlite::params![room_kind, room_id], row_to_message)
                .optional()?;
            Ok(row)
        })
    }

    pub fn soft_delete_message(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE messages SET is_deleted = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Unread count: non-deleted messages above the cursor that the user
    /// did not send. A missing cursor means nothing has been read.
    pub fn count_unread(
        &self,
        room_kind: &str,
        room_id: i64,
        user_id: i64,
        last_read_message_id: Option<i64>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE room_kind = ?1 AND room_id = ?2 AND is_deleted = 0
                   AND sender_id <> ?3
                   AND (?4 IS NULL OR id > ?4)",
                rusqlite::params![room_kind, room_id, user_id, last_read_message_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

const MESSAGE_COLS: &str = "id, room_kind, room_id, sender_id, kind, body, \
     file_url, file_name, file_size, reply_to_id, is_deleted, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        room_kind: row.get(1)?,
        room_id: row.get(2)?,
        sender_id: row.get(3)?,
        kind: row.get(4)?,
        body: row.get(5)?,
        file_url: row.get(6)?,
        file_name: row.get(7)?,
        file_size: row.get(8)?,
        reply_to_id: row.get(9)?,
        is_deleted: row.get(10)?,
        created_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::models::NewMessage;

    fn text(room_id: i64, sender_id: i64, body: &str) -> NewMessage<'_> {
        NewMessage {
            room_kind: "direct",
            room_id,
            sender_id,
            kind: "TEXT",
            body: Some(body),
            file_url: None,
            file_name: None,
            file_size: None,
            reply_to_id: None,
        }
    }

    #[test]
    fn soft_deleted_messages_leave_pages_but_stay_fetchable() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_user("ana", None, None).unwrap();
        let b = db.insert_user("ben", None, None).unwrap();
        db.insert_direct_room_if_absent(a.min(b), a.max(b)).unwrap();
        let room = db.find_direct_room_by_pair(a.min(b), a.max(b)).unwrap().unwrap();

        let m1 = db.insert_message(&text(room.id, a, "first")).unwrap();
        let m2 = db.insert_message(&text(room.id, a, "second")).unwrap();
        assert!(m2 > m1);

        db.soft_delete_message(m1).unwrap();

        let (page, total) = db.page_messages("direct", room.id, 0, 50, false).unwrap();
        assert_eq!(total, 1);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, m2);

        // The id remains a valid anchor.
        let deleted = db.get_message(m1).unwrap().unwrap();
        assert!(deleted.is_deleted);
    }

    #[test]
    fn unread_count_skips_own_messages_and_respects_cursor() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_user("ana", None, None).unwrap();
        let b = db.insert_user("ben", None, None).unwrap();
        db.insert_direct_room_if_absent(a.min(b), a.max(b)).unwrap();
        let room = db.find_direct_room_by_pair(a.min(b), a.max(b)).unwrap().unwrap();

        let m1 = db.insert_message(&text(room.id, a, "hi")).unwrap();
        db.insert_message(&text(room.id, a, "there")).unwrap();

        assert_eq!(db.count_unread("direct", room.id, b, None).unwrap(), 2);
        assert_eq!(db.count_unread("direct", room.id, a, None).unwrap(), 0);
        assert_eq!(db.count_unread("direct", room.id, b, Some(m1)).unwrap(), 1);
    }

    #[test]
    fn search_matches_substrings_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_user("ana", None, None).unwrap();
        let b = db.insert_user("ben", None, None).unwrap();
        db.insert_direct_room_if_absent(a.min(b), a.max(b)).unwrap();
        let room = db.find_direct_room_by_pair(a.min(b), a.max(b)).unwrap().unwrap();

        db.insert_message(&text(room.id, a, "see you tomorrow")).unwrap();
        let hit = db.insert_message(&text(room.id, b, "tomorrow works")).unwrap();
        db.insert_message(&text(room.id, a, "great")).unwrap();

        let (rows, total) = db.search_messages("direct", room.id, "tomorrow", 0, 20).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].id, hit);
    }
}
