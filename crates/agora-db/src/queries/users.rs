use crate::Database;
use crate::models::UserRow;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    /// Seed a user row. The identity store owns this table in production;
    /// this exists for test setup and offline sync.
    pub fn insert_user(
        &self,
        username: &str,
        nickname: Option<&str>,
        profile_image_url: Option<&str>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, nickname, profile_image_url) VALUES (?1, ?2, ?3)",
                rusqlite::params![username, nickname, profile_image_url],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", rusqlite::params![id]))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", rusqlite::params![username]))
    }

    /// Batch-fetch users for view assembly (eliminates N+1 on page reads).
    pub fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, username, nickname, profile_image_url, created_at
                 FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

            let rows = stmt
                .query_map(params.as_slice(), row_to_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, nickname, profile_image_url, created_at FROM users WHERE {}",
        filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row(params, row_to_user).optional()?;
    Ok(row)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        nickname: row.get(2)?,
        profile_image_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn users_resolve_by_id_and_username() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_user("ana", Some("Ana"), Some("https://cdn.example/ana.png"))
            .unwrap();

        let by_id = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(by_id.username, "ana");
        assert_eq!(by_id.nickname.as_deref(), Some("Ana"));

        let by_name = db.get_user_by_username("ana").unwrap().unwrap();
        assert_eq!(by_name.id, id);

        assert!(db.get_user_by_username("nobody").unwrap().is_none());

        let batch = db.get_users_by_ids(&[id, 9999]).unwrap();
        assert_eq!(batch.len(), 1);
    }
}
