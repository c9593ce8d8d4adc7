//! Per-user conversation log.
//!
//! Entries are ordered by a global autoincrement `seq`, so each user's log is
//! strictly chronological. Normal turns append a (user, agent) pair in one
//! transaction; [`fold_into_summary`] is the only operation that removes
//! entries, and it does so together with the summary write.

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use super::profiles;
use super::types::{ChatEntry, Role};

fn row_to_entry(row: &Row) -> rusqlite::Result<ChatEntry> {
    let role: String = row.get(1)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
    Ok(ChatEntry {
        seq: row.get(0)?,
        role,
        text: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

/// Append a single entry. Returns its sequence number.
pub fn append_entry(conn: &Connection, user_id: &str, role: Role, text: &str) -> Result<i64> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO messages (user_id, role, text, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, role.as_str(), text, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Persist a user message immediately followed by the agent reply.
pub fn append_turn(
    conn: &mut Connection,
    user_id: &str,
    user_text: &str,
    agent_text: &str,
) -> Result<()> {
    let tx = conn.transaction()?;
    append_entry(&tx, user_id, Role::User, user_text)?;
    append_entry(&tx, user_id, Role::Agent, agent_text)?;
    tx.commit()?;
    Ok(())
}

/// The last `n` entries, oldest first.
pub fn recent_entries(conn: &Connection, user_id: &str, n: usize) -> Result<Vec<ChatEntry>> {
    let mut stmt = conn.prepare(
        "SELECT seq, role, text, created_at FROM messages \
         WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2",
    )?;
    let mut entries = stmt
        .query_map(params![user_id, n as i64], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    entries.reverse();
    Ok(entries)
}

/// The first `n` entries, oldest first.
pub fn oldest_entries(conn: &Connection, user_id: &str, n: usize) -> Result<Vec<ChatEntry>> {
    let mut stmt = conn.prepare(
        "SELECT seq, role, text, created_at FROM messages \
         WHERE user_id = ?1 ORDER BY seq ASC LIMIT ?2",
    )?;
    let entries = stmt
        .query_map(params![user_id, n as i64], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn history_len(conn: &Connection, user_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Atomically drop `folded` from the head of the log and store `summary`.
///
/// `folded` must still be exactly the oldest entries of the user's log;
/// otherwise nothing is changed and `false` is returned.
pub fn fold_into_summary(
    conn: &mut Connection,
    user_id: &str,
    folded: &[ChatEntry],
    summary: &str,
) -> Result<bool> {
    let Some(last) = folded.last() else {
        return Ok(false);
    };

    let tx = conn.transaction()?;

    let current: Vec<i64> = oldest_entries(&tx, user_id, folded.len())?
        .into_iter()
        .map(|e| e.seq)
        .collect();
    let expected: Vec<i64> = folded.iter().map(|e| e.seq).collect();
    if current != expected {
        tracing::warn!(user_id, "conversation head changed before fold, skipping");
        return Ok(false);
    }

    tx.execute(
        "DELETE FROM messages WHERE user_id = ?1 AND seq <= ?2",
        params![user_id, last.seq],
    )?;
    profiles::set_summary(&tx, user_id, summary)?;
    tx.commit()?;

    Ok(true)
}
