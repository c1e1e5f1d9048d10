//! On-disk layout, version check and recovery of the user database

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::text::{display_form, lookup_key};

/// Bump when the `phrases` layout changes incompatibly.
pub const SCHEMA_VERSION: &str = "1.0";

/// How long a connection waits on a locked database before SQLITE_BUSY
pub(crate) const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection to `path` that waits out other writers.
pub(crate) fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

pub(crate) fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS desc (
            name TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE TABLE IF NOT EXISTS phrases (
            id INTEGER PRIMARY KEY,
            input_phrase TEXT NOT NULL,
            phrase TEXT NOT NULL,
            p_phrase TEXT NOT NULL DEFAULT '',
            pp_phrase TEXT NOT NULL DEFAULT '',
            user_freq INTEGER NOT NULL DEFAULT 0,
            timestamp REAL NOT NULL,
            UNIQUE (input_phrase, phrase, p_phrase, pp_phrase)
        );

        CREATE INDEX IF NOT EXISTS idx_phrases_input ON phrases(input_phrase);
        CREATE INDEX IF NOT EXISTS idx_phrases_context ON phrases(p_phrase, pp_phrase);
        CREATE INDEX IF NOT EXISTS idx_phrases_phrase ON phrases(phrase);
        ",
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO desc (name, value) VALUES ('version', ?1)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

pub(crate) fn read_version(conn: &Connection) -> Result<Option<String>> {
    let value = conn.query_row("SELECT value FROM desc WHERE name = 'version'", [], |row| {
        row.get::<_, Option<String>>(0)
    });
    match value {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn check_version(conn: &Connection) -> Result<()> {
    let found = read_version(conn)?;
    if found.as_deref() == Some(SCHEMA_VERSION) {
        Ok(())
    } else {
        Err(StoreError::SchemaMismatch {
            found,
            expected: SCHEMA_VERSION.to_string(),
        })
    }
}

/// Open `path`, recovering from a corrupt or incompatible file.
pub(crate) fn open_checked(path: &Path) -> Result<Connection> {
    if !path.exists() {
        let conn = connect(path)?;
        init_tables(&conn)?;
        return Ok(conn);
    }

    let checked = connect(path).and_then(|conn| check_version(&conn).map(|_| conn));

    match checked {
        Ok(conn) => {
            init_tables(&conn)?;
            Ok(conn)
        }
        Err(e) => {
            log::warn!("User database {} unusable ({}), recovering", path.display(), e);
            recover(path)
        }
    }
}

/// `<name>.<micros>.bak`, with a counter appended while that name is taken
fn backup_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "user.db".to_string());
    let stamp = chrono::Utc::now().timestamp_micros();
    let mut backup = path.with_file_name(format!("{}.{}.bak", name, stamp));
    let mut counter = 1u32;
    while backup.exists() {
        backup = path.with_file_name(format!("{}.{}.{}.bak", name, stamp, counter));
        counter += 1;
    }
    backup
}

/// Move the old file aside, create a fresh store and seed it with unigrams
/// extracted from the old one.
fn recover(path: &Path) -> Result<Connection> {
    let backup = backup_path(path);
    std::fs::rename(path, &backup)?;
    log::warn!("Moved old user database to {}", backup.display());

    let mut conn = connect(path)?;
    init_tables(&conn)?;

    match extract_unigrams(&backup) {
        Ok(pairs) => {
            let tx = conn.transaction()?;
            let now = super::now_timestamp();
            for (phrase, freq) in &pairs {
                let display = display_form(phrase);
                tx.execute(
                    "INSERT INTO phrases (input_phrase, phrase, p_phrase, pp_phrase, user_freq, timestamp)
                     VALUES (?1, ?2, '', '', ?3, ?4)
                     ON CONFLICT (input_phrase, phrase, p_phrase, pp_phrase)
                     DO UPDATE SET user_freq = user_freq + excluded.user_freq",
                    params![lookup_key(&display), display, (*freq).max(1), now],
                )?;
            }
            tx.commit()?;
            log::info!("Recovered {} phrases from {}", pairs.len(), backup.display());
        }
        Err(e) => {
            log::warn!("Could not extract phrases from {}: {}", backup.display(), e);
        }
    }

    Ok(conn)
}

fn extract_unigrams(path: &Path) -> rusqlite::Result<Vec<(String, i64)>> {
    let old = Connection::open(path)?;
    let mut stmt = old.prepare(
        "SELECT phrase, SUM(user_freq) FROM phrases
         WHERE phrase IS NOT NULL AND phrase != ''
         GROUP BY phrase",
    )?;
    let pairs = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    pairs.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_path_never_reuses_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.db");

        let first = backup_path(&path);
        std::fs::write(&first, b"old").unwrap();
        let second = backup_path(&path);
        std::fs::write(&second, b"older").unwrap();

        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with(".bak"));
        assert_eq!(std::fs::read(&first).unwrap(), b"old");
    }

    #[test]
    fn test_recovering_twice_keeps_both_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.db");

        std::fs::write(&path, b"garbage, not sqlite at all, first copy....").unwrap();
        drop(open_checked(&path).unwrap());
        std::fs::write(&path, b"garbage, not sqlite at all, second copy...").unwrap();
        drop(open_checked(&path).unwrap());

        let backups = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
            .count();
        assert_eq!(backups, 2);
    }
}
