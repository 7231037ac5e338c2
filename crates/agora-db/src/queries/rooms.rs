use crate::Database;
use crate::models::{DirectRoomRow, GroupRoomRow};
use anyhow::Result;
use rusqlite::OptionalExtension;

impl Database {
    // -- Group rooms --

    pub fn insert_group_room(
        &self,
        group_id: i64,
        name: &str,
        description: Option<&str>,
        is_admin_room: bool,
        is_general: bool,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO group_rooms (group_id, name, description, is_admin_room, is_general)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![group_id, name, description, is_admin_room, is_general],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Live (non-deleted) group room by id.
    pub fn get_group_room(&self, room_id: i64) -> Result<Option<GroupRoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM group_rooms WHERE id = ?1 AND is_deleted = 0",
                GROUP_ROOM_COLS
            ))?;
            let row = stmt.query_row([room_id], row_to_group_room).optional()?;
            Ok(row)
        })
    }

    pub fn list_group_rooms(&self, group_id: i64) -> Result<Vec<GroupRoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM group_rooms
                 WHERE group_id = ?1 AND is_deleted = 0
                 ORDER BY id",
                GROUP_ROOM_COLS
            ))?;
            let rows = stmt
                .query_map([group_id], row_to_group_room)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_group_room(
        &self,
        room_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE group_rooms
                 SET name = ?2, description = ?3, updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![room_id, name, description],
            )?;
            Ok(())
        })
    }

    pub fn soft_delete_group_room(&self, room_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE group_rooms
                 SET is_deleted = 1, updated_at = datetime('now')
                 WHERE id = ?1",
                [room_id],
            )?;
            Ok(())
        })
    }

    // -- Direct rooms --

    /// Insert the canonical pair row if absent. The UNIQUE(user_a, user_b)
    /// constraint makes concurrent first calls converge on one row; callers
    /// re-select after this returns.
    pub fn insert_direct_room_if_absent(&self, user_a: i64, user_b: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO direct_rooms (user_a, user_b) VALUES (?1, ?2)",
                rusqlite::params![user_a, user_b],
            )?;
            Ok(())
        })
    }

    pub fn find_direct_room_by_pair(&self, user_a: i64, user_b: i64) -> Result<Option<DirectRoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM direct_rooms WHERE user_a = ?1 AND user_b = ?2",
                DIRECT_ROOM_COLS
            ))?;
            let row = stmt
                .query_row(rusqlite::params![user_a, user_b], row_to_direct_room)
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_direct_room(&self, room_id: i64) -> Result<Option<DirectRoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM direct_rooms WHERE id = ?1",
                DIRECT_ROOM_COLS
            ))?;
            let row = stmt.query_row([room_id], row_to_direct_room).optional()?;
            Ok(row)
        })
    }

    pub fn list_direct_rooms(&self, user_id: i64) -> Result<Vec<DirectRoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM direct_rooms
                 WHERE user_a = ?1 OR user_b = ?1
                 ORDER BY updated_at DESC, id DESC",
                DIRECT_ROOM_COLS
            ))?;
            let rows = stmt
                .query_map([user_id], row_to_direct_room)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Bump the room's activity timestamp (drives the room-list order).
    pub fn touch_direct_room(&self, room_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE direct_rooms SET updated_at = datetime('now') WHERE id = ?1",
                [room_id],
            )?;
            Ok(())
        })
    }
}

const GROUP_ROOM_COLS: &str =
    "id, group_id, name, description, is_admin_room, is_general, is_deleted, created_at, updated_at";

const DIRECT_ROOM_COLS: &str = "id, user_a, user_b, created_at, updated_at";

fn row_to_group_room(row: &rusqlite::Row<'_>) -> std::result::Result<GroupRoomRow, rusqlite::Error> {
    Ok(GroupRoomRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        is_admin_room: row.get(4)?,
        is_general: row.get(5)?,
        is_deleted: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_direct_room(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<DirectRoomRow, rusqlite::Error> {
    Ok(DirectRoomRow {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn direct_room_pair_is_unique_under_repeat_inserts() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_user("ana", None, None).unwrap();
        let b = db.insert_user("ben", None, None).unwrap();
        let (lo, hi) = (a.min(b), a.max(b));

        db.insert_direct_room_if_absent(lo, hi).unwrap();
        db.insert_direct_room_if_absent(lo, hi).unwrap();

        let room = db.find_direct_room_by_pair(lo, hi).unwrap().unwrap();
        let rooms = db.list_direct_rooms(a).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, room.id);
        assert!(room.is_participant(a) && room.is_participant(b));
        assert_eq!(room.other_user(a), b);
    }
}
