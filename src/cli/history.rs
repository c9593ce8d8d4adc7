use anyhow::Result;

use memoria::config::MemoriaConfig;
use memoria::memory::{conversation, profiles};

use super::preview;

/// Print a user's rolling summary and recent conversation.
pub fn history(config: &MemoriaConfig, user_id: &str) -> Result<()> {
    let conn = memoria::db::open_database(config.resolved_db_path())?;

    let total = conversation::history_len(&conn, user_id)?;
    let entries = conversation::recent_entries(&conn, user_id, config.memory.history_window)?;
    let summary = profiles::get_summary(&conn, user_id)?;

    println!("User: {user_id}");
    println!(
        "Summary: {}",
        if summary.is_empty() { "(none)" } else { summary.as_str() }
    );
    println!("Messages: {total} stored, showing last {}\n", entries.len());

    for entry in &entries {
        println!(
            "  [{}] {:<5} {}",
            entry.timestamp,
            entry.role.as_str(),
            preview(&entry.text, 100)
        );
    }

    Ok(())
}
