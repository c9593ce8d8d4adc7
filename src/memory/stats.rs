use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

use super::documents;

/// Store-wide counts reported by `memoria stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_chunks: u64,
    pub embedded_chunks: u64,
    pub users: u64,
    pub registered_users: u64,
    pub messages: u64,
    /// Users whose log has been folded at least once.
    pub summarized_users: u64,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

/// Compute store statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn store_stats(conn: &Connection, db_path: Option<&Path>) -> Result<StatsResponse> {
    let (total_chunks, embedded_chunks) = documents::count_chunks(conn)?;
    let users = count(conn, "SELECT COUNT(*) FROM users")?;
    let registered_users = count(conn, "SELECT COUNT(*) FROM users WHERE username IS NOT NULL")?;
    let summarized_users = count(conn, "SELECT COUNT(*) FROM users WHERE summary != ''")?;
    let messages = count(conn, "SELECT COUNT(*) FROM messages")?;
    let embedding_model = crate::db::migrations::get_embedding_model(conn)?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_chunks,
        embedded_chunks,
        users,
        registered_users,
        messages,
        summarized_users,
        db_size_bytes,
        embedding_model,
    })
}

fn count(conn: &Connection, sql: &str) -> Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}
