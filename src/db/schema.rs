//! SQL DDL for all memoria tables.
//!
//! Defines `chunks` (knowledge store), `users` (profiles and rolling summary),
//! `messages` (per-user conversation log) and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// Schema version 1. Later changes arrive through [`super::migrations`].
const SCHEMA_SQL: &str = r#"
-- Knowledge chunks. `id` is caller-supplied and intentionally not unique;
-- `seq` carries insertion order.
CREATE TABLE IF NOT EXISTS chunks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    text TEXT NOT NULL,
    metadata TEXT,
    embedding BLOB,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_id ON chunks(id);

-- User profiles, including the rolling conversation summary
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE,
    password_hash TEXT,
    name TEXT,
    created_at TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    visits INTEGER NOT NULL DEFAULT 0,
    preferences TEXT NOT NULL DEFAULT '{}'
);

-- Conversation log, chronological per user by `seq`
CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK(role IN ('user','agent')),
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_id, seq);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"chunks".to_string()));
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"messages".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn duplicate_chunk_ids_are_allowed() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        for _ in 0..2 {
            conn.execute(
                "INSERT INTO chunks (id, text, created_at) VALUES ('same', 'x', '2026-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks WHERE id = 'same'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
