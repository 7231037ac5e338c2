/// Database row types — these map directly to SQLite rows.
/// Distinct from the agora-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: String,
}

pub struct GroupRoomRow {
    pub id: i64,
    pub group_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_admin_room: bool,
    pub is_general: bool,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct DirectRoomRow {
    pub id: i64,
    pub user_a: i64,
    pub user_b: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl DirectRoomRow {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    pub fn other_user(&self, user_id: i64) -> i64 {
        if self.user_a == user_id {
            self.user_b
        } else {
            self.user_a
        }
    }
}

pub struct MessageRow {
    pub id: i64,
    pub room_kind: String,
    pub room_id: i64,
    pub sender_id: i64,
    pub kind: String,
    pub body: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to_id: Option<i64>,
    pub is_deleted: bool,
    pub created_at: String,
}

/// Insert parameters for a message; the id and timestamp are
/// server-assigned.
pub struct NewMessage<'a> {
    pub room_kind: &'a str,
    pub room_id: i64,
    pub sender_id: i64,
    pub kind: &'a str,
    pub body: Option<&'a str>,
    pub file_url: Option<&'a str>,
    pub file_name: Option<&'a str>,
    pub file_size: Option<i64>,
    pub reply_to_id: Option<i64>,
}
