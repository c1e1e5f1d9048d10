//! User Phrase Database
//!
//! Decaying n-gram frequency table learned from committed text. Every row is
//! a (typed key, phrase, previous word, word before that) tuple with a usage
//! count; completion queries blend unigram, bigram and trigram frequencies.

mod maintenance;
mod schema;
mod worker;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::MaintenanceConfig;
use crate::error::{Result, StoreError};
use crate::text::{self, display_form, lookup_key, split_words};

pub use maintenance::{
    select_rows_to_decay, select_rows_to_evict, DecayAction, DecayDecision, MaintenancePlan, MaintenanceRow,
};
pub use schema::SCHEMA_VERSION;
pub use worker::MaintenanceWorker;

/// Frequencies at or above this mark permanent user shortcuts.
pub const SHORTCUT_THRESHOLD: i64 = 1_000_000;

/// Maximum results returned by [`PhraseStore::query`]
pub const MAX_QUERY_RESULTS: usize = 20;

/// One row of the user database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseRecord {
    pub id: i64,
    pub input_phrase: String,
    pub phrase: String,
    pub p_phrase: String,
    pub pp_phrase: String,
    pub user_freq: i64,
    pub timestamp: f64,
}

impl PhraseRecord {
    pub fn is_shortcut(&self) -> bool {
        self.user_freq >= SHORTCUT_THRESHOLD
    }
}

/// Outcome of one [`PhraseStore::maintain`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Rows removed for exceeding `max_rows`
    pub evicted: usize,
    /// Rows whose frequency was halved
    pub decayed: usize,
    /// Singleton rows removed by decay
    pub deleted_by_decay: usize,
    /// Selected rows that changed since the snapshot or failed to apply
    pub skipped: usize,
}

pub(crate) fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Persistent storage for learned phrases
pub struct PhraseStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl PhraseStore {
    /// Open (or create) the database at `path`.
    ///
    /// An unreadable file or one with a different schema version is renamed
    /// aside and replaced; its phrases are replayed as unigrams when possible.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = schema::open_checked(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open the database in the platform data directory
    pub fn open_default() -> Result<Self> {
        Self::open(Self::get_db_path()?)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn get_db_path() -> Result<PathBuf> {
        let data_dir = dirs_next::data_dir().ok_or(StoreError::DataDir)?;
        Ok(data_dir.join("TypingBooster").join("user.db"))
    }

    /// File backing this store, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Record a committed phrase, adding `increment` to its frequency.
    pub fn record(
        &self,
        input_phrase: &str,
        phrase: &str,
        p_phrase: &str,
        pp_phrase: &str,
        increment: i64,
    ) -> Result<()> {
        let conn = self.lock()?;
        upsert(&conn, input_phrase, phrase, p_phrase, pp_phrase, increment, false)
    }

    /// Store `phrase` as a permanent shortcut for `input_phrase`.
    ///
    /// Weights below [`SHORTCUT_THRESHOLD`] are raised to it.
    pub fn define_shortcut(&self, input_phrase: &str, phrase: &str, weight: i64) -> Result<()> {
        let conn = self.lock()?;
        upsert(&conn, input_phrase, phrase, "", "", weight.max(SHORTCUT_THRESHOLD), true)
    }

    /// Completion candidates for `prefix` in the context of the two
    /// preceding words, best first, at most [`MAX_QUERY_RESULTS`].
    pub fn query(
        &self,
        prefix: &str,
        p_phrase: &str,
        pp_phrase: &str,
        title_case: bool,
    ) -> Result<Vec<(String, f64)>> {
        let prefix = lookup_key(prefix);
        let p_phrase = lookup_key(p_phrase);
        let pp_phrase = lookup_key(pp_phrase);

        let conn = self.lock()?;
        let scores = if prefix.is_empty() {
            if p_phrase.is_empty() {
                return Ok(Vec::new());
            }
            let followers = grouped_frequencies(
                &conn,
                "SELECT phrase, SUM(user_freq) FROM phrases
                 WHERE p_phrase = ?1 AND pp_phrase = ?2
                 GROUP BY phrase",
                params![p_phrase, pp_phrase],
            )?;
            normalize(&followers)
        } else {
            let upper = format!("{}\u{10FFFF}", prefix);
            let unigrams = grouped_frequencies(
                &conn,
                "SELECT phrase, SUM(user_freq) FROM phrases
                 WHERE input_phrase >= ?1 AND input_phrase < ?2
                 GROUP BY phrase",
                params![prefix, upper],
            )?;
            let mut scores = normalize(&unigrams);

            if !p_phrase.is_empty() {
                let bigrams = normalize(&grouped_frequencies(
                    &conn,
                    "SELECT phrase, SUM(user_freq) FROM phrases
                     WHERE input_phrase >= ?1 AND input_phrase < ?2 AND p_phrase = ?3
                     GROUP BY phrase",
                    params![prefix, upper, p_phrase],
                )?);
                blend(&mut scores, &bigrams);

                if !pp_phrase.is_empty() {
                    let trigrams = normalize(&grouped_frequencies(
                        &conn,
                        "SELECT phrase, SUM(user_freq) FROM phrases
                         WHERE input_phrase >= ?1 AND input_phrase < ?2
                           AND p_phrase = ?3 AND pp_phrase = ?4
                         GROUP BY phrase",
                        params![prefix, upper, p_phrase, pp_phrase],
                    )?);
                    blend(&mut scores, &trigrams);
                }
            }
            scores
        };
        drop(conn);

        if title_case {
            let mut ranked = rank_phrases(scores, usize::MAX);
            let mut seen = HashSet::new();
            ranked = ranked
                .into_iter()
                .map(|(phrase, score)| (text::title_case(&phrase), score))
                .filter(|(phrase, _)| seen.insert(phrase.clone()))
                .collect();
            ranked.truncate(MAX_QUERY_RESULTS);
            Ok(ranked)
        } else {
            Ok(rank_phrases(scores, MAX_QUERY_RESULTS))
        }
    }

    /// Exact-key shortcut rows for `input_phrase`, highest weight first
    pub fn shortcuts(&self, input_phrase: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT phrase, MAX(user_freq) FROM phrases
             WHERE input_phrase = ?1 AND user_freq >= ?2
             GROUP BY phrase
             ORDER BY 2 DESC, phrase ASC",
        )?;
        let rows = stmt.query_map(params![lookup_key(input_phrase), SHORTCUT_THRESHOLD], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete every row for `phrase`, optionally only under one typed key.
    ///
    /// Returns the number of rows removed.
    pub fn remove(&self, phrase: &str, input_phrase: Option<&str>) -> Result<usize> {
        let phrase = display_form(phrase);
        let conn = self.lock()?;
        let removed = match input_phrase {
            Some(input) => conn.execute(
                "DELETE FROM phrases WHERE phrase = ?1 AND input_phrase = ?2",
                params![phrase, lookup_key(input)],
            )?,
            None => conn.execute("DELETE FROM phrases WHERE phrase = ?1", [phrase])?,
        };
        log::debug!("Removed {} rows for phrase", removed);
        Ok(removed)
    }

    /// Delete everything the user taught the store, shortcuts included.
    pub fn remove_all(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM phrases", [])?;
        Ok(())
    }

    /// Whether `phrase` was ever committed (or defined as shortcut)
    pub fn phrase_exists(&self, phrase: &str) -> Result<bool> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM phrases WHERE phrase = ?1)",
            [display_form(phrase)],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn number_of_rows(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM phrases", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All rows for `phrase`, mainly for inspection and tests
    pub fn records_for(&self, phrase: &str) -> Result<Vec<PhraseRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, input_phrase, phrase, p_phrase, pp_phrase, user_freq, timestamp
             FROM phrases WHERE phrase = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([display_form(phrase)], |row| {
            Ok(PhraseRecord {
                id: row.get(0)?,
                input_phrase: row.get(1)?,
                phrase: row.get(2)?,
                p_phrase: row.get(3)?,
                pp_phrase: row.get(4)?,
                user_freq: row.get(5)?,
                timestamp: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Learn every word of `text` together with its two preceding words.
    ///
    /// Returns the number of words recorded.
    pub fn learn_from_text(&self, text: &str) -> Result<usize> {
        let words = split_words(text);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (i, word) in words.iter().enumerate() {
            let p_phrase = if i >= 1 { words[i - 1].as_str() } else { "" };
            let pp_phrase = if i >= 2 { words[i - 2].as_str() } else { "" };
            upsert(&tx, word, word, p_phrase, pp_phrase, 1, false)?;
        }
        tx.commit()?;
        Ok(words.len())
    }

    pub fn learn_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        self.learn_from_text(&text)
    }

    /// Evict and decay rows, then reclaim space.
    ///
    /// Runs [`PhraseStore::plan_maintenance`] and
    /// [`PhraseStore::apply_maintenance`]; rows touched in between are left
    /// alone.
    pub fn maintain(&self, settings: &MaintenanceConfig) -> Result<MaintenanceReport> {
        let plan = self.plan_maintenance(settings)?;
        let report = self.apply_maintenance(&plan)?;
        if report.evicted + report.deleted_by_decay > 0 {
            self.reclaim_space();
        }

        log::info!(
            "Phrase maintenance: {} rows, evicted {}, decayed {}, deleted {}, skipped {}",
            plan.rows,
            report.evicted,
            report.decayed,
            report.deleted_by_decay,
            report.skipped
        );
        Ok(report)
    }

    /// Select rows to evict and decay from a snapshot taken under a short lock.
    pub fn plan_maintenance(&self, settings: &MaintenanceConfig) -> Result<MaintenancePlan> {
        let snapshot = self.snapshot()?;
        Ok(MaintenancePlan::select(&snapshot, settings))
    }

    /// Apply `plan` in one transaction.
    ///
    /// Every change is guarded by the row's snapshot frequency and timestamp,
    /// so a row recorded after the plan was made counts as skipped.
    pub fn apply_maintenance(&self, plan: &MaintenancePlan) -> Result<MaintenanceReport> {
        let mut report = MaintenanceReport::default();
        if plan.is_empty() {
            return Ok(report);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for row in &plan.evict {
            let result = tx.execute(
                "DELETE FROM phrases WHERE id = ?1 AND user_freq = ?2 AND timestamp = ?3",
                params![row.id, row.user_freq, row.timestamp],
            );
            match result {
                Ok(1) => report.evicted += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    log::warn!("Failed to evict phrase row {}: {}", row.id, e);
                    report.skipped += 1;
                }
            }
        }

        let now = now_timestamp();
        for decision in &plan.decay {
            let row = decision.row;
            let result = match decision.action {
                DecayAction::Delete => tx.execute(
                    "DELETE FROM phrases WHERE id = ?1 AND user_freq = ?2 AND timestamp = ?3",
                    params![row.id, row.user_freq, row.timestamp],
                ),
                DecayAction::Halve { new_freq } => tx.execute(
                    "UPDATE phrases SET user_freq = ?1, timestamp = ?2
                     WHERE id = ?3 AND user_freq = ?4 AND timestamp = ?5",
                    params![new_freq, now, row.id, row.user_freq, row.timestamp],
                ),
            };
            match (result, decision.action) {
                (Ok(1), DecayAction::Delete) => report.deleted_by_decay += 1,
                (Ok(1), DecayAction::Halve { .. }) => report.decayed += 1,
                (Ok(_), _) => report.skipped += 1,
                (Err(e), _) => {
                    log::warn!("Failed to decay phrase row {}: {}", row.id, e);
                    report.skipped += 1;
                }
            }
        }

        tx.commit()?;
        Ok(report)
    }

    /// VACUUM the database.
    ///
    /// A file-backed store vacuums on its own connection so `record` and
    /// `query` keep working meanwhile; either side waits out the other for
    /// up to the busy timeout. Failures are logged and ignored.
    fn reclaim_space(&self) {
        let result = match &self.path {
            Some(path) => schema::connect(path).and_then(|conn| Ok(conn.execute_batch("VACUUM")?)),
            None => self.lock().and_then(|conn| Ok(conn.execute_batch("VACUUM")?)),
        };
        if let Err(e) = result {
            log::warn!("VACUUM after maintenance failed: {}", e);
        }
    }

    fn snapshot(&self) -> Result<Vec<MaintenanceRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, user_freq, timestamp FROM phrases")?;
        let rows = stmt.query_map([], |row| {
            Ok(MaintenanceRow {
                id: row.get(0)?,
                user_freq: row.get(1)?,
                timestamp: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn upsert(
    conn: &Connection,
    input_phrase: &str,
    phrase: &str,
    p_phrase: &str,
    pp_phrase: &str,
    freq: i64,
    overwrite: bool,
) -> Result<()> {
    let phrase = display_form(phrase);
    if phrase.is_empty() {
        return Ok(());
    }
    let input = lookup_key(input_phrase);
    let input = if input.is_empty() { lookup_key(&phrase) } else { input };

    let sql = if overwrite {
        "INSERT INTO phrases (input_phrase, phrase, p_phrase, pp_phrase, user_freq, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (input_phrase, phrase, p_phrase, pp_phrase)
         DO UPDATE SET user_freq = excluded.user_freq, timestamp = excluded.timestamp"
    } else {
        "INSERT INTO phrases (input_phrase, phrase, p_phrase, pp_phrase, user_freq, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (input_phrase, phrase, p_phrase, pp_phrase)
         DO UPDATE SET user_freq = user_freq + excluded.user_freq, timestamp = excluded.timestamp"
    };
    conn.execute(
        sql,
        params![
            input,
            phrase,
            lookup_key(p_phrase),
            lookup_key(pp_phrase),
            freq,
            now_timestamp()
        ],
    )?;
    Ok(())
}

fn grouped_frequencies<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn normalize(frequencies: &[(String, i64)]) -> HashMap<String, f64> {
    let total: i64 = frequencies.iter().map(|(_, freq)| (*freq).max(0)).sum();
    frequencies
        .iter()
        .map(|(phrase, freq)| {
            let score = if total > 0 { (*freq).max(0) as f64 / total as f64 } else { 0.0 };
            (phrase.clone(), score)
        })
        .collect()
}

/// 0.5 * context score + 0.5 * previous score, for every phrase already scored
fn blend(scores: &mut HashMap<String, f64>, context: &HashMap<String, f64>) {
    for (phrase, score) in scores.iter_mut() {
        let context_score = context.get(phrase).copied().unwrap_or(0.0);
        *score = 0.5 * context_score + 0.5 * *score;
    }
}

fn compare_ranked(a: &(String, f64), b: &(String, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.chars().count().cmp(&b.0.chars().count()))
        .then_with(|| a.0.cmp(&b.0))
}

/// Best `limit` entries by (score desc, length asc, phrase asc)
pub(crate) fn rank_phrases(scores: HashMap<String, f64>, limit: usize) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
    if limit < ranked.len() {
        if limit == 0 {
            return Vec::new();
        }
        ranked.select_nth_unstable_by(limit - 1, compare_ranked);
        ranked.truncate(limit);
    }
    ranked.sort_by(compare_ranked);
    ranked
}
