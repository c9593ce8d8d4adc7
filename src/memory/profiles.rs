//! User profiles: lookup, shallow merge, registration, and the rolling summary.
//!
//! A profile row is created on first write (registration, profile update, or
//! the first summary fold). Updates replace named top-level fields wholesale.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{Preferences, ProfileUpdate, UserProfile};

const PROFILE_COLUMNS: &str =
    "id, username, name, created_at, last_seen, summary, visits, preferences";

/// Result of [`register_user`].
#[derive(Debug)]
pub enum RegisterOutcome {
    Created(UserProfile),
    UsernameTaken,
}

fn row_to_profile(row: &Row) -> rusqlite::Result<UserProfile> {
    let id: String = row.get(0)?;
    let preferences_json: String = row.get(7)?;
    let preferences = serde_json::from_str::<Preferences>(&preferences_json).unwrap_or_else(|e| {
        tracing::warn!(user_id = %id, error = %e, "unreadable preferences, using empty");
        Preferences::new()
    });
    Ok(UserProfile {
        id,
        username: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        last_seen: row.get(4)?,
        summary: row.get(5)?,
        visits: row.get::<_, i64>(6)?.max(0) as u64,
        preferences,
    })
}

/// Fetch a stored profile.
pub fn get_profile(conn: &Connection, user_id: &str) -> Result<Option<UserProfile>> {
    let profile = conn
        .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            row_to_profile,
        )
        .optional()?;
    Ok(profile)
}

/// Create an empty profile row if none exists.
pub fn ensure_profile(conn: &Connection, user_id: &str) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO users (id, created_at, last_seen) VALUES (?1, ?2, ?2)",
        params![user_id, now],
    )?;
    Ok(())
}

/// The user's rolling summary, empty when none has been written.
pub fn get_summary(conn: &Connection, user_id: &str) -> Result<String> {
    let summary: Option<String> = conn
        .query_row(
            "SELECT summary FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(summary.unwrap_or_default())
}

/// Replace the rolling summary, creating the profile if needed.
pub fn set_summary(conn: &Connection, user_id: &str, summary: &str) -> Result<()> {
    ensure_profile(conn, user_id)?;
    conn.execute(
        "UPDATE users SET summary = ?1 WHERE id = ?2",
        params![summary, user_id],
    )?;
    Ok(())
}

/// Shallow-merge client fields into the profile and stamp `last_seen`.
pub fn merge_profile(
    conn: &mut Connection,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<UserProfile> {
    let tx = conn.transaction()?;
    ensure_profile(&tx, user_id)?;

    if let Some(ref name) = update.name {
        tx.execute("UPDATE users SET name = ?1 WHERE id = ?2", params![name, user_id])?;
    }
    if let Some(visits) = update.visits {
        tx.execute(
            "UPDATE users SET visits = ?1 WHERE id = ?2",
            params![visits as i64, user_id],
        )?;
    }
    if let Some(ref preferences) = update.preferences {
        tx.execute(
            "UPDATE users SET preferences = ?1 WHERE id = ?2",
            params![serde_json::to_string(preferences)?, user_id],
        )?;
    }
    touch_last_seen(&tx, user_id)?;

    let profile = get_profile(&tx, user_id)?
        .ok_or_else(|| anyhow::anyhow!("profile vanished during merge: {user_id}"))?;
    tx.commit()?;
    Ok(profile)
}

/// Create a registered user. Fails softly when the username is taken.
pub fn register_user(
    conn: &mut Connection,
    username: &str,
    password_hash: &str,
    name: Option<&str>,
) -> Result<RegisterOutcome> {
    let tx = conn.transaction()?;

    let taken: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        params![username],
        |row| row.get(0),
    )?;
    if taken {
        return Ok(RegisterOutcome::UsernameTaken);
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO users (id, username, password_hash, name, created_at, last_seen) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, username, password_hash, name, now],
    )?;

    let profile = get_profile(&tx, &id)?
        .ok_or_else(|| anyhow::anyhow!("registered user missing: {id}"))?;
    tx.commit()?;
    Ok(RegisterOutcome::Created(profile))
}

/// Look up `(user_id, password_hash)` for a username with a password set.
pub fn find_credentials(conn: &Connection, username: &str) -> Result<Option<(String, String)>> {
    let creds = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1 AND password_hash IS NOT NULL",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(creds)
}

pub fn touch_last_seen(conn: &Connection, user_id: &str) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE users SET last_seen = ?1 WHERE id = ?2",
        params![now, user_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::types::PreferenceValue;

    #[test]
    fn missing_profile_is_none() {
        let conn = db::open_memory_database().unwrap();
        assert!(get_profile(&conn, "nobody").unwrap().is_none());
        assert_eq!(get_summary(&conn, "nobody").unwrap(), "");
    }

    #[test]
    fn merge_creates_and_preserves_unrelated_fields() {
        let mut conn = db::open_memory_database().unwrap();
        let mut prefs = Preferences::new();
        prefs.insert("x".into(), PreferenceValue::Number(1.0));

        merge_profile(
            &mut conn,
            "u1",
            &ProfileUpdate {
                preferences: Some(prefs),
                ..Default::default()
            },
        )
        .unwrap();
        let profile = merge_profile(
            &mut conn,
            "u1",
            &ProfileUpdate {
                name: Some("A".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(profile.name.as_deref(), Some("A"));
        assert_eq!(profile.preferences["x"], PreferenceValue::Number(1.0));
        assert!(profile.last_seen.is_some());
    }

    #[test]
    fn merging_preferences_replaces_the_whole_map() {
        let mut conn = db::open_memory_database().unwrap();
        let first: Preferences = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let second: Preferences = serde_json::from_str(r#"{"z": 3}"#).unwrap();

        for prefs in [first, second] {
            merge_profile(
                &mut conn,
                "u1",
                &ProfileUpdate {
                    preferences: Some(prefs),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let profile = get_profile(&conn, "u1").unwrap().unwrap();
        assert_eq!(profile.preferences.len(), 1);
        assert!(profile.preferences.contains_key("z"));
    }

    #[test]
    fn summary_is_written_on_demand() {
        let conn = db::open_memory_database().unwrap();
        set_summary(&conn, "u1", "likes travel").unwrap();
        assert_eq!(get_summary(&conn, "u1").unwrap(), "likes travel");
        set_summary(&conn, "u1", "likes trains").unwrap();
        assert_eq!(get_summary(&conn, "u1").unwrap(), "likes trains");
    }

    #[test]
    fn register_rejects_duplicate_usernames() {
        let mut conn = db::open_memory_database().unwrap();
        let first = register_user(&mut conn, "fan", "$hash", Some("Fan")).unwrap();
        let RegisterOutcome::Created(profile) = first else {
            panic!("first registration should succeed");
        };
        assert_eq!(profile.username.as_deref(), Some("fan"));

        let second = register_user(&mut conn, "fan", "$other", None).unwrap();
        assert!(matches!(second, RegisterOutcome::UsernameTaken));

        let (id, hash) = find_credentials(&conn, "fan").unwrap().unwrap();
        assert_eq!(id, profile.id);
        assert_eq!(hash, "$hash");
    }
}
