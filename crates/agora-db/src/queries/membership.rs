use crate::Database;
use anyhow::Result;
use rusqlite::OptionalExtension;

/// Membership oracle queries. The external group module owns the
/// `groups`/`group_members` tables; the chat core only reads them, with one
/// canonical rule: the owner is always an implicit admin member.
impl Database {
    pub fn insert_group(&self, name: &str, owner_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO groups (name, owner_id) VALUES (?1, ?2)",
                rusqlite::params![name, owner_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn insert_group_member(&self, group_id: i64, user_id: i64, is_admin: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO group_members (group_id, user_id, is_admin)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![group_id, user_id, is_admin],
            )?;
            Ok(())
        })
    }

    pub fn group_exists(&self, group_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1 AND is_deleted = 0)",
                [group_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn is_group_member(&self, group_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let member: bool = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM groups
                     WHERE id = ?1 AND owner_id = ?2 AND is_deleted = 0
                 ) OR EXISTS(
                     SELECT 1 FROM group_members
                     WHERE group_id = ?1 AND user_id = ?2
                 )",
                rusqlite::params![group_id, user_id],
                |row| row.get(0),
            )?;
            Ok(member)
        })
    }

    pub fn is_group_admin(&self, group_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let admin: bool = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM groups
                     WHERE id = ?1 AND owner_id = ?2 AND is_deleted = 0
                 ) OR EXISTS(
                     SELECT 1 FROM group_members
                     WHERE group_id = ?1 AND user_id = ?2 AND is_admin = 1
                 )",
                rusqlite::params![group_id, user_id],
                |row| row.get(0),
            )?;
            Ok(admin)
        })
    }

    /// Owner plus flagged admins, for per-sender admin badges.
    pub fn group_admin_ids(&self, group_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let owner: Option<i64> = conn
                .query_row(
                    "SELECT owner_id FROM groups WHERE id = ?1 AND is_deleted = 0",
                    [group_id],
                    |row| row.get(0),
                )
                .optional()?;

            let mut stmt = conn.prepare(
                "SELECT user_id FROM group_members WHERE group_id = ?1 AND is_admin = 1",
            )?;
            let mut ids: Vec<i64> = stmt
                .query_map([group_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if let Some(owner_id) = owner {
                if !ids.contains(&owner_id) {
                    ids.push(owner_id);
                }
            }

            Ok(ids)
        })
    }

    /// Groups the user belongs to (membership row or ownership).
    pub fn member_group_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM groups
                 WHERE is_deleted = 0
                   AND (owner_id = ?1
                        OR id IN (SELECT group_id FROM group_members WHERE user_id = ?1))
                 ORDER BY id",
            )?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}
