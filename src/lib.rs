//! Typing Booster Core - predictive completion engine
//!
//! - Phrases: learned n-gram store with decay and background maintenance
//! - Emoji: symbol catalog and fuzzy label matching
//! - Composer: merges both with dictionary suggestions into one candidate list

mod composer;
mod config;
mod dictionary;
mod emoji;
mod error;
mod phrases;
mod text;

pub use composer::{
    Candidate, CandidateComposer, CandidateList, CaseMode, CompositionRequest, SHORTCUT_CANDIDATE_SCORE,
};
pub use config::{EngineConfig, MaintenanceConfig, RecordMode};
pub use dictionary::{
    DictionarySet, DictionarySuggester, WordListDictionary, DICTIONARY_COMPLETION_SCORE, SPELL_CORRECTION_SCORE,
};
pub use emoji::{
    general_category_labels, load_cldr_annotations, load_emoji_data, load_emoji_test, load_unicode_data,
    match_label, skin_tone_variants, EmojiCandidate, EmojiCatalog, EmojiCatalogBuilder, EmojiLabelEntry,
    EmojiProperty, FuzzyLabelMatcher, MatchCache, SimilarEmoji, CODE_POINT_SCORE, FITZPATRICK_MODIFIERS,
};
pub use error::{Result, StoreError};
pub use phrases::{
    select_rows_to_decay, select_rows_to_evict, DecayAction, DecayDecision, MaintenancePlan, MaintenanceReport,
    MaintenanceRow,
    MaintenanceWorker, PhraseRecord, PhraseStore, MAX_QUERY_RESULTS, SCHEMA_VERSION, SHORTCUT_THRESHOLD,
};
pub use text::{display_form, lookup_key, title_case};

/// Install the `env_logger` backend (configured through `RUST_LOG`).
///
/// Safe to call more than once.
pub fn init_logging() {
    if env_logger::try_init().is_ok() {
        log::info!("Typing Booster core v{} logging initialised", env!("CARGO_PKG_VERSION"));
    }
}
