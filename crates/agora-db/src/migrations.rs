use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Owned by the external identity store; read-only here apart from
        -- test seeding.
        CREATE TABLE IF NOT EXISTS users (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            username            TEXT NOT NULL UNIQUE,
            nickname            TEXT,
            profile_image_url   TEXT,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Owned by the external group module; consulted through the
        -- membership oracle.
        CREATE TABLE IF NOT EXISTS groups (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            owner_id    INTEGER NOT NULL REFERENCES users(id),
            is_deleted  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS group_members (
            group_id    INTEGER NOT NULL REFERENCES groups(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            is_admin    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(group_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS group_rooms (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id        INTEGER NOT NULL REFERENCES groups(id),
            name            TEXT NOT NULL,
            description     TEXT,
            is_admin_room   INTEGER NOT NULL DEFAULT 0,
            is_general      INTEGER NOT NULL DEFAULT 0,
            is_deleted      INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_group_rooms_group
            ON group_rooms(group_id);

        -- Canonical pairing: user_a < user_b, one row per pair.
        CREATE TABLE IF NOT EXISTS direct_rooms (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_a      INTEGER NOT NULL REFERENCES users(id),
            user_b      INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_a, user_b),
            CHECK(user_a < user_b)
        );

        -- One table for both topologies; the rowid is the ordering key.
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            room_kind   TEXT NOT NULL CHECK(room_kind IN ('group', 'direct')),
            room_id     INTEGER NOT NULL,
            sender_id   INTEGER NOT NULL REFERENCES users(id),
            kind        TEXT NOT NULL CHECK(kind IN ('TEXT', 'IMAGE', 'FILE')),
            body        TEXT,
            file_url    TEXT,
            file_name   TEXT,
            file_size   INTEGER,
            reply_to_id INTEGER REFERENCES messages(id),
            is_deleted  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_kind, room_id, id);

        CREATE TABLE IF NOT EXISTS read_cursors (
            room_kind               TEXT NOT NULL,
            room_id                 INTEGER NOT NULL,
            user_id                 INTEGER NOT NULL REFERENCES users(id),
            last_read_message_id    INTEGER,
            UNIQUE(room_kind, room_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS reactions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id  INTEGER NOT NULL REFERENCES messages(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(message_id, user_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
