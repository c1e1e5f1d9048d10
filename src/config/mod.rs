//! Engine configuration module

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prediction engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Offer word completions from the user database and dictionaries
    pub word_predictions: bool,

    /// Offer emoji and symbol candidates on every keystroke
    pub emoji_predictions: bool,

    /// Minimum typed characters before word completion kicks in
    pub min_char_complete: usize,

    /// Candidates shown per page
    pub page_size: usize,

    /// Preselect the first candidate
    pub auto_select: bool,

    /// Never learn from committed text
    pub off_the_record: bool,

    /// When committed text is learned
    pub record_mode: RecordMode,

    /// Characters that force emoji lookup when typed at either end ("_", ":")
    pub emoji_trigger_characters: String,

    /// Emoji annotation languages in preference order
    pub emoji_languages: Vec<String>,

    /// Maximum emoji candidates per keystroke
    pub emoji_match_limit: usize,

    /// Skip the slow character-alignment pass in the emoji matcher
    pub quick_match: bool,

    /// Spelling suggestions appended per misspelled emoji query word
    pub spell_alias_limit: usize,

    /// Background maintenance settings
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Controls which committed phrases are written to the user database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RecordMode {
    /// Record everything
    Always,
    /// Record if already in the user database or spelled correctly
    KnownOrCorrect,
    /// Record only correctly spelled phrases
    CorrectOnly,
    /// Never record
    Never,
}

impl TryFrom<u8> for RecordMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RecordMode::Always),
            1 => Ok(RecordMode::KnownOrCorrect),
            2 => Ok(RecordMode::CorrectOnly),
            3 => Ok(RecordMode::Never),
            other => Err(format!("invalid record mode {}", other)),
        }
    }
}

impl From<RecordMode> for u8 {
    fn from(mode: RecordMode) -> Self {
        match mode {
            RecordMode::Always => 0,
            RecordMode::KnownOrCorrect => 1,
            RecordMode::CorrectOnly => 2,
            RecordMode::Never => 3,
        }
    }
}

/// Settings for the periodic decay pass over the user database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Non-shortcut rows kept after eviction
    pub max_rows: usize,
    /// Share of the oldest rows decayed per pass
    pub decay_fraction: f64,
    /// Seconds between passes
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            max_rows: 50_000,
            decay_fraction: 0.001,
            interval_secs: 600,
        }
    }
}

impl EngineConfig {
    fn storage_path() -> Result<PathBuf, String> {
        let data_dir =
            dirs_next::data_dir().ok_or_else(|| "Could not find data directory".to_string())?;
        Ok(data_dir.join("TypingBooster").join("engine_config.json"))
    }

    pub fn load_from_disk() -> Option<Self> {
        let path = Self::storage_path().ok()?;
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring unreadable engine config: {}", e);
                None
            }
        }
    }

    pub fn save_to_disk(&self) -> Result<(), String> {
        let path = Self::storage_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let payload = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize engine config: {}", e))?;
        std::fs::write(&path, payload)
            .map_err(|e| format!("Failed to write engine config: {}", e))?;
        Ok(())
    }

    /// Configured trigger characters as a list
    pub fn trigger_chars(&self) -> Vec<char> {
        self.emoji_trigger_characters.chars().collect()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            word_predictions: true,
            emoji_predictions: true,
            min_char_complete: 1,
            page_size: 6,
            auto_select: false,
            off_the_record: false,
            record_mode: RecordMode::Always,
            emoji_trigger_characters: "_".to_string(),
            emoji_languages: vec!["en".to_string()],
            emoji_match_limit: 20,
            quick_match: true,
            spell_alias_limit: 3,
            maintenance: MaintenanceConfig::default(),
        }
    }
}
