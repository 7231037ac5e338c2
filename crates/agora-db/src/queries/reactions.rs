use crate::Database;
use anyhow::Result;

impl Database {
    pub fn reaction_exists(&self, message_id: i64, user_id: i64, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM reactions
                     WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3
                 )",
                rusqlite::params![message_id, user_id, emoji],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Returns true if a row was actually written. `INSERT OR IGNORE`
    /// against the unique index is the backstop for racing toggles.
    pub fn insert_reaction(&self, message_id: i64, user_id: i64, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO reactions (message_id, user_id, emoji)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![message_id, user_id, emoji],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_reaction(&self, message_id: i64, user_id: i64, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM reactions
                 WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                rusqlite::params![message_id, user_id, emoji],
            )?;
            Ok(changed > 0)
        })
    }

    /// Grouped (message, emoji, count) aggregation over a batch of ids.
    /// Counted fresh on every call; there is no running counter to drift.
    pub fn reaction_counts(&self, message_ids: &[i64]) -> Result<Vec<(i64, String, i64)>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, emoji, COUNT(*) FROM reactions
                 WHERE message_id IN ({})
                 GROUP BY message_id, emoji
                 ORDER BY message_id, emoji",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// The (message, emoji) pairs one viewer applied within a batch of ids.
    pub fn user_reactions(&self, message_ids: &[i64], user_id: i64) -> Result<Vec<(i64, String)>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..=message_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, emoji FROM reactions
                 WHERE user_id = ?1 AND message_id IN ({})
                 ORDER BY message_id, emoji",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&user_id];
            params.extend(
                message_ids
                    .iter()
                    .map(|id| id as &dyn rusqlite::types::ToSql),
            );

            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::models::NewMessage;

    #[test]
    fn double_insert_is_absorbed_by_the_unique_index() {
        let db = Database::open_in_memory().unwrap();
        let user = db.insert_user("ana", None, None).unwrap();
        let other = db.insert_user("ben", None, None).unwrap();
        db.insert_direct_room_if_absent(user.min(other), user.max(other))
            .unwrap();
        let room = db
            .find_direct_room_by_pair(user.min(other), user.max(other))
            .unwrap()
            .unwrap();
        let msg = db
            .insert_message(&NewMessage {
                room_kind: "direct",
                room_id: room.id,
                sender_id: other,
                kind: "TEXT",
                body: Some("hello"),
                file_url: None,
                file_name: None,
                file_size: None,
                reply_to_id: None,
            })
            .unwrap();

        assert!(db.insert_reaction(msg, user, "👍").unwrap());
        assert!(!db.insert_reaction(msg, user, "👍").unwrap());

        let counts = db.reaction_counts(&[msg]).unwrap();
        assert_eq!(counts, vec![(msg, "👍".to_string(), 1)]);

        assert!(db.delete_reaction(msg, user, "👍").unwrap());
        assert!(!db.delete_reaction(msg, user, "👍").unwrap());
        assert!(db.reaction_counts(&[msg]).unwrap().is_empty());
    }
}
