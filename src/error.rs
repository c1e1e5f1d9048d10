//! Error types for the phrase store
//!
//! Everything above the store (composer, matcher) swallows failures and
//! degrades to "no candidates", so this is the only typed error surface.

use thiserror::Error;

/// Errors raised by [`crate::PhraseStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not find data directory")]
    DataDir,

    #[error("schema version mismatch: found {found:?}, expected {expected:?}")]
    SchemaMismatch { found: Option<String>, expected: String },

    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
