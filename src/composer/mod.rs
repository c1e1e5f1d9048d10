//! Candidate composition
//!
//! Combines user-database predictions, dictionary suggestions and emoji
//! matches into the candidate list shown for one keystroke.

mod case_mode;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{EngineConfig, RecordMode};
use crate::dictionary::DictionarySuggester;
use crate::emoji::{EmojiCandidate, FuzzyLabelMatcher};
use crate::phrases::{rank_phrases, PhraseStore};
use crate::text::lookup_key;

pub use case_mode::{CandidateList, CaseMode};

/// Score of a user-defined shortcut, above any normalized prediction
pub const SHORTCUT_CANDIDATE_SCORE: f64 = 2.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub phrase: String,
    pub score: f64,
    /// Dictionary ids or the emoji name
    pub comment: String,
    /// Score comes from the user database
    pub from_user_db: bool,
    /// Score comes from a spelling correction
    pub spell_checking: bool,
    pub is_shortcut: bool,
    pub is_emoji: bool,
}

/// Input state for one keystroke
#[derive(Debug, Clone, Default)]
pub struct CompositionRequest {
    /// Transliterated text typed so far
    pub typed: String,
    pub p_phrase: String,
    pub pp_phrase: String,
    /// Candidates were asked for explicitly (e.g. with Tab)
    pub explicit_request: bool,
    pub on_screen_keyboard: bool,
    pub case_mode: CaseMode,
}

impl CompositionRequest {
    pub fn new(typed: impl Into<String>) -> Self {
        Self {
            typed: typed.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, p_phrase: impl Into<String>, pp_phrase: impl Into<String>) -> Self {
        self.p_phrase = p_phrase.into();
        self.pp_phrase = pp_phrase.into();
        self
    }
}

/// Where a word candidate's score came from
#[derive(Debug, Default)]
struct WordSources {
    store: Option<f64>,
    dictionary: Option<f64>,
    shortcut: bool,
}

impl WordSources {
    fn score(&self) -> f64 {
        let mut score = f64::NEG_INFINITY;
        if let Some(s) = self.store {
            score = score.max(s);
        }
        if let Some(d) = self.dictionary {
            score = score.max(d);
        }
        if self.shortcut {
            score = score.max(SHORTCUT_CANDIDATE_SCORE);
        }
        score
    }

    fn from_user_db(&self) -> bool {
        self.store
            .is_some_and(|s| s > 0.0 && self.dictionary.map_or(true, |d| s >= d))
    }

    fn spell_checking(&self) -> bool {
        self.store.is_none() && !self.shortcut && self.dictionary.is_some_and(|d| d < 0.0)
    }
}

/// Builds candidate lists from the phrase store and the optional
/// dictionary and emoji collaborators.
pub struct CandidateComposer {
    store: Arc<PhraseStore>,
    dictionary: Option<Arc<dyn DictionarySuggester>>,
    matcher: Option<Arc<FuzzyLabelMatcher>>,
    config: EngineConfig,
}

impl CandidateComposer {
    pub fn new(store: Arc<PhraseStore>, config: EngineConfig) -> Self {
        Self {
            store,
            dictionary: None,
            matcher: None,
            config,
        }
    }

    pub fn with_dictionary(mut self, dictionary: Arc<dyn DictionarySuggester>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<FuzzyLabelMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PhraseStore> {
        &self.store
    }

    /// Candidates for the current input. Failing sources are logged and
    /// contribute nothing.
    pub fn compose(&self, request: &CompositionRequest) -> CandidateList {
        let typed = request.typed.as_str();
        let triggers = self.config.trigger_chars();

        let sources = self.gather_words(request);
        let mut words = rank_words(&sources);
        boost_extensions(&mut words, typed);

        let mut emoji = self.emoji_candidates(typed, &triggers);
        merge_emoji_words(&mut emoji, &mut words, &triggers);

        let word_candidates: Vec<Candidate> = words
            .into_iter()
            .map(|(phrase, score)| {
                let source = sources.get(&phrase);
                Candidate {
                    comment: self.dictionary_comment(&phrase),
                    from_user_db: source.is_some_and(WordSources::from_user_db),
                    spell_checking: source.is_some_and(WordSources::spell_checking),
                    is_shortcut: source.is_some_and(|s| s.shortcut),
                    is_emoji: false,
                    phrase,
                    score,
                }
            })
            .collect();
        let emoji_candidates: Vec<Candidate> = emoji
            .into_iter()
            .map(|e| Candidate {
                phrase: e.symbol,
                score: e.score,
                comment: e.name,
                is_emoji: true,
                ..Default::default()
            })
            .collect();

        let candidates = interleave(word_candidates, emoji_candidates, self.config.page_size);
        log::trace!("Composed {} candidates", candidates.len());
        CandidateList::new(candidates, request.case_mode, self.config.auto_select)
    }

    fn gather_words(&self, request: &CompositionRequest) -> HashMap<String, WordSources> {
        let typed = request.typed.as_str();
        let mut sources: HashMap<String, WordSources> = HashMap::new();

        let continuation = typed.is_empty() && !request.p_phrase.is_empty();
        let long_enough = !typed.is_empty() && typed.chars().count() >= self.config.min_char_complete;
        let wanted = long_enough || continuation || request.explicit_request || request.on_screen_keyboard;

        if self.config.word_predictions && wanted {
            match self.store.query(typed, &request.p_phrase, &request.pp_phrase, false) {
                Ok(found) => {
                    for (phrase, score) in found {
                        sources.entry(phrase).or_default().store = Some(score);
                    }
                }
                Err(e) => log::warn!("User database query failed: {}", e),
            }

            if let (Some(dictionary), false) = (&self.dictionary, typed.is_empty()) {
                match dictionary.suggest(typed) {
                    Ok(found) => {
                        for (phrase, score) in found {
                            let entry = sources.entry(phrase).or_default();
                            entry.dictionary = Some(entry.dictionary.map_or(score, |d| d.max(score)));
                        }
                    }
                    Err(e) => log::warn!("Dictionary suggestions failed: {}", e),
                }
            }
        }

        if !typed.is_empty() {
            match self.store.shortcuts(typed) {
                Ok(found) => {
                    for (phrase, _) in found {
                        sources.entry(phrase).or_default().shortcut = true;
                    }
                }
                Err(e) => log::warn!("Shortcut lookup failed: {}", e),
            }
        }

        sources
    }

    fn emoji_candidates(&self, typed: &str, triggers: &[char]) -> Vec<EmojiCandidate> {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };
        let triggered = typed.starts_with(triggers) || typed.ends_with(triggers);
        if typed.is_empty() || !(self.config.emoji_predictions || triggered) {
            return Vec::new();
        }
        matcher.candidates(typed, self.config.emoji_match_limit, triggers)
    }

    fn dictionary_comment(&self, phrase: &str) -> String {
        self.dictionary
            .as_ref()
            .map(|d| d.spellcheck_match_list(phrase).join(", "))
            .unwrap_or_default()
    }

    fn spelled_correctly(&self, phrase: &str) -> bool {
        let Some(dictionary) = &self.dictionary else {
            return false;
        };
        let words: Vec<&str> = phrase.split_whitespace().collect();
        !words.is_empty() && dictionary.spellcheck_single_dictionary(&words)
    }

    /// Learn a committed phrase when the record settings allow it.
    ///
    /// Returns whether the phrase was recorded.
    pub fn commit(&self, phrase: &str, typed: &str, p_phrase: &str, pp_phrase: &str) -> bool {
        if self.config.off_the_record || phrase.trim().is_empty() {
            return false;
        }

        let allowed = match self.config.record_mode {
            RecordMode::Always => true,
            RecordMode::KnownOrCorrect => {
                let known = self.store.phrase_exists(phrase).unwrap_or_else(|e| {
                    log::warn!("User database lookup failed: {}", e);
                    false
                });
                known || self.spelled_correctly(phrase)
            }
            RecordMode::CorrectOnly => self.spelled_correctly(phrase),
            RecordMode::Never => false,
        };
        if !allowed {
            log::debug!("Not recording phrase under {:?}", self.config.record_mode);
            return false;
        }

        match self.store.record(typed, phrase, p_phrase, pp_phrase, 1) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to record phrase: {}", e);
                false
            }
        }
    }

    /// Forget `phrase` entirely. Returns whether anything was removed.
    pub fn remove_candidate(&self, phrase: &str) -> bool {
        match self.store.remove(phrase, None) {
            Ok(removed) => removed > 0,
            Err(e) => {
                log::warn!("Failed to remove phrase: {}", e);
                false
            }
        }
    }
}

fn rank_words(sources: &HashMap<String, WordSources>) -> Vec<(String, f64)> {
    let scores = sources
        .iter()
        .map(|(phrase, source)| (phrase.clone(), source.score()))
        .collect();
    rank_phrases(scores, usize::MAX)
}

/// When the best candidate is exactly the typed text, lift the candidates
/// that extend it above it.
fn boost_extensions(words: &mut Vec<(String, f64)>, typed: &str) {
    let Some((top, bonus)) = words.first().map(|(p, s)| (p.clone(), *s)) else {
        return;
    };
    if typed.is_empty() || top != typed {
        return;
    }
    let key = lookup_key(typed);
    let mut boosted = false;
    for (phrase, score) in words.iter_mut() {
        let candidate = lookup_key(phrase);
        if candidate.len() > key.len() && candidate.starts_with(&key) {
            *score += bonus;
            boosted = true;
        }
    }
    if boosted {
        let scores = words.drain(..).collect();
        *words = rank_phrases(scores, usize::MAX);
    }
}

fn strip_one_trigger<'p>(phrase: &'p str, triggers: &[char]) -> &'p str {
    let phrase = phrase.strip_prefix(triggers).unwrap_or(phrase);
    phrase.strip_suffix(triggers).unwrap_or(phrase)
}

/// Fold word candidates that are emoji symbols into the emoji scores.
fn merge_emoji_words(emoji: &mut [EmojiCandidate], words: &mut Vec<(String, f64)>, triggers: &[char]) {
    if emoji.is_empty() {
        return;
    }
    let mut merged = false;
    words.retain(|(phrase, score)| {
        let bare = strip_one_trigger(phrase, triggers);
        match emoji.iter_mut().find(|e| e.symbol == *phrase || e.symbol == bare) {
            Some(candidate) => {
                candidate.score += score;
                merged = true;
                false
            }
            None => true,
        }
    });
    if merged {
        emoji.sort_by(|a, b| b.score.total_cmp(&a.score));
    }
}

/// First `page_size - 1` words, then up to a page of emoji, then the rest.
fn interleave(words: Vec<Candidate>, emoji: Vec<Candidate>, page_size: usize) -> Vec<Candidate> {
    let lead_words = page_size.saturating_sub(1).min(words.len());
    let lead_emoji = page_size.max(1).min(emoji.len());

    let mut words = words.into_iter();
    let mut emoji = emoji.into_iter();
    let mut out = Vec::with_capacity(words.len() + emoji.len());
    out.extend(words.by_ref().take(lead_words));
    out.extend(emoji.by_ref().take(lead_emoji));
    out.extend(words);
    out.extend(emoji);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{DictionarySet, WordListDictionary};
    use crate::emoji::EmojiCatalogBuilder;
    use crate::phrases::SHORTCUT_THRESHOLD;

    fn store() -> Arc<PhraseStore> {
        Arc::new(PhraseStore::open_in_memory().unwrap())
    }

    fn phrases(list: &CandidateList) -> Vec<&str> {
        list.candidates().iter().map(|c| c.phrase.as_str()).collect()
    }

    fn dictionary() -> Arc<dyn DictionarySuggester> {
        Arc::new(DictionarySet::new(vec![WordListDictionary::new(
            "en_US",
            ["color", "colour", "cold"],
        )]))
    }

    fn heart_matcher() -> Arc<FuzzyLabelMatcher> {
        let mut builder = EmojiCatalogBuilder::new();
        builder
            .add_names("❤\u{FE0F}", "en", &["red heart"])
            .add_keywords("❤\u{FE0F}", "en", &["heart"])
            .add_categories("❤\u{FE0F}", "en", &["heart"])
            .set_cldr_order("❤\u{FE0F}", 1)
            .add_names("♥\u{FE0F}", "en", &["heart suit"])
            .set_cldr_order("♥\u{FE0F}", 2);
        Arc::new(FuzzyLabelMatcher::new(Arc::new(builder.build()), &["en".to_string()]))
    }

    struct FailingDictionary;

    impl DictionarySuggester for FailingDictionary {
        fn suggest(&self, _word: &str) -> anyhow::Result<HashMap<String, f64>> {
            Err(anyhow::anyhow!("dictionary unavailable"))
        }
        fn spellcheck(&self, _word: &str) -> bool {
            false
        }
        fn spellcheck_match_list(&self, _word: &str) -> Vec<String> {
            Vec::new()
        }
        fn spellcheck_single_dictionary(&self, _words: &[&str]) -> bool {
            false
        }
    }

    #[test]
    fn test_user_db_words_ranked() {
        let store = store();
        store.record("co", "colour", "", "", 4).unwrap();
        store.record("co", "cold", "", "", 1).unwrap();
        store.record("co", "conspiracy", "", "", 6).unwrap();

        let composer = CandidateComposer::new(store, EngineConfig::default());
        let list = composer.compose(&CompositionRequest::new("co"));
        assert_eq!(phrases(&list), vec!["conspiracy", "colour", "cold"]);
        assert!(list.candidates().iter().all(|c| c.from_user_db && !c.spell_checking));
        assert!((list.candidates()[0].score - 6.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_chars_and_explicit_request() {
        let store = store();
        store.record("c", "colour", "", "", 1).unwrap();
        let config = EngineConfig {
            min_char_complete: 3,
            ..Default::default()
        };
        let composer = CandidateComposer::new(store, config);

        assert!(composer.compose(&CompositionRequest::new("c")).is_empty());

        let explicit = CompositionRequest {
            explicit_request: true,
            ..CompositionRequest::new("c")
        };
        assert_eq!(phrases(&composer.compose(&explicit)), vec!["colour"]);
    }

    #[test]
    fn test_shortcuts_ignore_min_chars() {
        let store = store();
        store.define_shortcut("bb", "be back soon", SHORTCUT_THRESHOLD).unwrap();
        store.record("bb", "bbq", "", "", 3).unwrap();
        let config = EngineConfig {
            min_char_complete: 5,
            ..Default::default()
        };
        let composer = CandidateComposer::new(store, config);

        let list = composer.compose(&CompositionRequest::new("bb"));
        assert_eq!(phrases(&list), vec!["be back soon"]);
        assert!(list.candidates()[0].is_shortcut);
        assert_eq!(list.candidates()[0].score, SHORTCUT_CANDIDATE_SCORE);
    }

    #[test]
    fn test_extensions_lifted_above_typed_text() {
        let store = store();
        store.record("the", "the", "", "", 5).unwrap();
        store.record("the", "theme", "", "", 1).unwrap();
        store.record("the", "there", "", "", 1).unwrap();

        let composer = CandidateComposer::new(store, EngineConfig::default());
        let list = composer.compose(&CompositionRequest::new("the"));
        assert_eq!(phrases(&list), vec!["theme", "there", "the"]);
    }

    #[test]
    fn test_dictionary_merge_and_annotations() {
        let store = store();
        store.record("colo", "colour", "", "", 2).unwrap();
        let composer = CandidateComposer::new(store, EngineConfig::default()).with_dictionary(dictionary());

        let list = composer.compose(&CompositionRequest::new("colo"));
        assert_eq!(phrases(&list), vec!["colour", "color", "cold"]);
        let [colour, color, cold] = list.candidates() else {
            panic!("expected three candidates");
        };
        assert!(colour.from_user_db);
        assert_eq!(colour.comment, "en_US");
        assert!(!color.from_user_db && !color.spell_checking);
        assert!(cold.spell_checking);
    }

    #[test]
    fn test_failing_dictionary_keeps_store_words() {
        let store = store();
        store.record("co", "colour", "", "", 1).unwrap();
        let composer =
            CandidateComposer::new(store, EngineConfig::default()).with_dictionary(Arc::new(FailingDictionary));
        assert_eq!(phrases(&composer.compose(&CompositionRequest::new("co"))), vec!["colour"]);
    }

    #[test]
    fn test_empty_input_continues_context() {
        let store = store();
        store.learn_from_text("I like tea").unwrap();
        let composer = CandidateComposer::new(store, EngineConfig::default());

        let request = CompositionRequest::new("").with_context("i", "");
        assert_eq!(phrases(&composer.compose(&request)), vec!["like"]);
        assert!(composer.compose(&CompositionRequest::new("")).is_empty());
    }

    #[test]
    fn test_emoji_interleaved_after_first_words() {
        let store = store();
        for word in ["heat", "head", "heal", "heap", "hear"] {
            store.record("hea", word, "", "", 1).unwrap();
        }
        let config = EngineConfig {
            page_size: 3,
            ..Default::default()
        };
        let composer = CandidateComposer::new(store, config).with_matcher(heart_matcher());

        let list = composer.compose(&CompositionRequest::new("hea"));
        assert_eq!(
            phrases(&list),
            vec!["head", "heal", "❤\u{FE0F}", "♥\u{FE0F}", "heap", "hear", "heat"]
        );
        assert!(list.candidates()[2].is_emoji);
        assert!(list.candidates()[2].comment.starts_with("red heart"));
    }

    #[test]
    fn test_learned_emoji_merged_into_emoji_score() {
        let store = store();
        store.record("_hea", "❤\u{FE0F}", "", "", 1).unwrap();
        let composer = CandidateComposer::new(store, EngineConfig::default()).with_matcher(heart_matcher());

        let list = composer.compose(&CompositionRequest::new("_hea"));
        let hearts: Vec<&Candidate> = list
            .candidates()
            .iter()
            .filter(|c| c.phrase == "❤\u{FE0F}")
            .collect();
        assert_eq!(hearts.len(), 1);
        assert!(hearts[0].is_emoji);

        let unmerged = heart_matcher().candidates("hea", 5, &['_']);
        assert_eq!(hearts[0].score, unmerged[0].score + 1.0);
    }

    #[test]
    fn test_trigger_forces_emoji() {
        let config = EngineConfig {
            emoji_predictions: false,
            ..Default::default()
        };
        let composer = CandidateComposer::new(store(), config).with_matcher(heart_matcher());
        assert!(composer.compose(&CompositionRequest::new("hea")).is_empty());
        assert_eq!(composer.compose(&CompositionRequest::new("hea_")).len(), 2);
    }

    #[test]
    fn test_commit_respects_record_mode() {
        let store = store();
        let composer = |record_mode: RecordMode, off_the_record: bool| {
            let config = EngineConfig {
                record_mode,
                off_the_record,
                ..Default::default()
            };
            CandidateComposer::new(store.clone(), config).with_dictionary(dictionary())
        };

        assert!(!composer(RecordMode::Always, true).commit("colr", "col", "", ""));
        assert!(!composer(RecordMode::Never, false).commit("colr", "col", "", ""));
        assert!(!composer(RecordMode::CorrectOnly, false).commit("colr", "col", "", ""));
        assert!(composer(RecordMode::CorrectOnly, false).commit("colour", "col", "", ""));
        assert!(!composer(RecordMode::KnownOrCorrect, false).commit("colr", "col", "", ""));
        assert!(!store.phrase_exists("colr").unwrap());

        assert!(composer(RecordMode::Always, false).commit("colr", "col", "", ""));
        assert!(composer(RecordMode::KnownOrCorrect, false).commit("colr", "col", "", ""));
        assert_eq!(store.records_for("colr").unwrap()[0].user_freq, 2);
    }

    #[test]
    fn test_remove_candidate() {
        let store = store();
        store.record("co", "colour", "", "", 3).unwrap();
        let composer = CandidateComposer::new(store, EngineConfig::default());
        assert!(composer.remove_candidate("colour"));
        assert!(!composer.remove_candidate("colour"));
        assert!(composer.compose(&CompositionRequest::new("co")).is_empty());
    }

    #[test]
    fn test_case_mode_from_request() {
        let store = store();
        store.record("ne", "new york", "", "", 1).unwrap();
        let composer = CandidateComposer::new(store, EngineConfig::default());
        let request = CompositionRequest {
            case_mode: CaseMode::Title,
            ..CompositionRequest::new("ne")
        };
        let list = composer.compose(&request);
        assert_eq!(phrases(&list), vec!["New York"]);
        assert_eq!(list.originals()[0].phrase, "new york");
    }
}
