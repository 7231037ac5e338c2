use crate::Database;
use anyhow::Result;
use rusqlite::OptionalExtension;

impl Database {
    /// The user's cursor in a room. Collapses "no row" and "row with no
    /// acknowledged message yet" into None: both mean nothing read.
    pub fn read_cursor(&self, room_kind: &str, room_id: i64, user_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let cursor: Option<Option<i64>> = conn
                .query_row(
                    "SELECT last_read_message_id FROM read_cursors
                     WHERE room_kind = ?1 AND room_id = ?2 AND user_id = ?3",
                    rusqlite::params![room_kind, room_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(cursor.flatten())
        })
    }

    /// Atomic write-if-greater upsert: stale and duplicate acknowledgements
    /// are no-ops, so the cursor never regresses.
    pub fn advance_cursor(
        &self,
        room_kind: &str,
        room_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO read_cursors (room_kind, room_id, user_id, last_read_message_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(room_kind, room_id, user_id) DO UPDATE
                 SET last_read_message_id = excluded.last_read_message_id
                 WHERE excluded.last_read_message_id
                       > COALESCE(read_cursors.last_read_message_id, -1)",
                rusqlite::params![room_kind, room_id, user_id, message_id],
            )?;
            Ok(())
        })
    }

    /// All cursors of a room, for deriving per-message read state in one pass.
    pub fn room_cursors(&self, room_kind: &str, room_id: i64) -> Result<Vec<(i64, Option<i64>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, last_read_message_id FROM read_cursors
                 WHERE room_kind = ?1 AND room_id = ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![room_kind, room_id], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Cumulative read count for one message: participants other than the
    /// sender whose cursor has reached it.
    pub fn read_count_for_message(
        &self,
        room_kind: &str,
        room_id: i64,
        sender_id: i64,
        message_id: i64,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM read_cursors
                 WHERE room_kind = ?1 AND room_id = ?2
                   AND user_id <> ?3
                   AND last_read_message_id >= ?4",
                rusqlite::params![room_kind, room_id, sender_id, message_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn cursor_is_monotonic() {
        let db = Database::open_in_memory().unwrap();
        let user = db.insert_user("ana", None, None).unwrap();

        assert_eq!(db.read_cursor("direct", 1, user).unwrap(), None);

        db.advance_cursor("direct", 1, user, 5).unwrap();
        assert_eq!(db.read_cursor("direct", 1, user).unwrap(), Some(5));

        // Stale ack is a no-op.
        db.advance_cursor("direct", 1, user, 3).unwrap();
        assert_eq!(db.read_cursor("direct", 1, user).unwrap(), Some(5));

        db.advance_cursor("direct", 1, user, 9).unwrap();
        assert_eq!(db.read_cursor("direct", 1, user).unwrap(), Some(9));
    }

    #[test]
    fn read_count_excludes_the_sender() {
        let db = Database::open_in_memory().unwrap();
        let sender = db.insert_user("ana", None, None).unwrap();
        let reader = db.insert_user("ben", None, None).unwrap();

        db.advance_cursor("group", 1, sender, 10).unwrap();
        assert_eq!(db.read_count_for_message("group", 1, sender, 10).unwrap(), 0);

        db.advance_cursor("group", 1, reader, 10).unwrap();
        assert_eq!(db.read_count_for_message("group", 1, sender, 10).unwrap(), 1);
        assert_eq!(db.read_count_for_message("group", 1, sender, 11).unwrap(), 0);
    }
}
