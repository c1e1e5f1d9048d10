//! Fuzzy matching of typed text against emoji and symbol labels

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{normalize_label, skin_tone, EmojiCatalog, EmojiLabelEntry};
use crate::config::EngineConfig;
use crate::dictionary::DictionarySuggester;

/// Score of a query naming a code point in hex ("1f600", "u+2764")
pub const CODE_POINT_SCORE: f64 = 5000.0;

const SET_EQUALITY_BONUS: f64 = 1000.0;
const MAX_ALIGNMENT_BONUS: f64 = 500.0;
/// Only longer words are worth spell checking for aliases
const SPELL_ALIAS_MIN_CHARS: usize = 6;
const NAME_WEIGHT: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EmojiCandidate {
    pub symbol: String,
    /// Display name, annotated with the labels that matched
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarEmoji {
    pub symbol: String,
    pub name: String,
    /// Labels shared with the reference symbol (+1 for the symbol itself)
    pub shared: usize,
}

/// Label scores for one query, filled lazily during a single match call
pub struct MatchCache<'a> {
    words: Vec<String>,
    quick: bool,
    scores: HashMap<&'a str, f64>,
}

impl<'a> MatchCache<'a> {
    pub fn new(words: Vec<String>, quick: bool) -> Self {
        Self {
            words,
            quick,
            scores: HashMap::new(),
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn score(&mut self, label: &'a str) -> f64 {
        if let Some(score) = self.scores.get(label) {
            return *score;
        }
        let score = match_label(label, &self.words, self.quick);
        self.scores.insert(label, score);
        score
    }
}

/// Score how well a normalized `label` matches the normalized query `words`.
pub fn match_label(label: &str, words: &[String], quick: bool) -> f64 {
    if label.is_empty() || words.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;
    let label_words: HashSet<&str> = label.split(' ').collect();
    let query_words: HashSet<&str> = words.iter().map(String::as_str).collect();
    if label_words == query_words {
        score += SET_EQUALITY_BONUS;
    }

    let whole_label = if words.len() == 1 { 300.0 } else { 200.0 };
    let compact: String = label.chars().filter(|c| *c != ' ').collect();
    let mut remaining = label.to_string();

    for word in words.iter().filter(|w| !w.is_empty()) {
        let len = word.chars().count() as f64;
        if word == label {
            score += whole_label;
            continue;
        }
        if let Some(pos) = anchored_position(&remaining, word) {
            score += (if pos == 0 { 120.0 } else { 100.0 }) + len;
            remaining.replace_range(pos..pos + word.len(), "");
            continue;
        }
        if let Some(pos) = compact.find(word.as_str()) {
            score += (if pos == 0 { 40.0 } else { 20.0 }) + len;
        }
    }

    if !quick {
        score += alignment_bonus(label, &words.join(" "));
    }
    score
}

/// First occurrence of `word` at the start of `text` or right after a space
fn anchored_position(text: &str, word: &str) -> Option<usize> {
    text.match_indices(word)
        .map(|(pos, _)| pos)
        .find(|&pos| pos == 0 || text[..pos].ends_with(' '))
}

/// Longest common substring relative to the longer string
fn alignment_bonus(label: &str, query: &str) -> f64 {
    let a: Vec<char> = label.chars().collect();
    let b: Vec<char> = query.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut longest = 0usize;
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb { previous[j] + 1 } else { 0 };
            longest = longest.max(current[j + 1]);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    if longest < 2 {
        return 0.0;
    }
    MAX_ALIGNMENT_BONUS * longest as f64 / a.len().max(b.len()) as f64
}

/// "en_US" -> ["en_US", "en"], always ending with English
fn expand_languages(languages: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    let mut push = |language: &str| {
        if !language.is_empty() && !expanded.iter().any(|l| l == language) {
            expanded.push(language.to_string());
        }
    };
    for language in languages {
        push(language);
        if let Some((base, _)) = language.split_once(['_', '-']) {
            push(base);
        }
    }
    push("en");
    expanded
}

fn strip_triggers<'q>(query: &'q str, triggers: &[char]) -> &'q str {
    let mut stripped = query.trim();
    if let Some(first) = stripped.chars().next() {
        if triggers.contains(&first) {
            stripped = &stripped[first.len_utf8()..];
        }
    }
    if let Some(last) = stripped.chars().next_back() {
        if triggers.contains(&last) {
            stripped = &stripped[..stripped.len() - last.len_utf8()];
        }
    }
    stripped
}

/// A hex query naming a Unicode scalar value, with or without a "u+" or
/// "0x" prefix. Surrogates and private use code points never match.
fn code_point_query(query: &str) -> Option<char> {
    let digits = query
        .strip_prefix("u+")
        .or_else(|| query.strip_prefix("0x"))
        .unwrap_or(query);
    if digits.is_empty() || digits.len() > 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let c = u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)?;
    let value = c as u32;
    let private_use = (0xE000..=0xF8FF).contains(&value) || value >= 0xF0000;
    (!private_use).then_some(c)
}

struct Ranked<'a> {
    entry: Option<&'a EmojiLabelEntry>,
    symbol: String,
    name: String,
    score: f64,
    language_index: usize,
}

impl Ranked<'_> {
    fn cldr_order(&self) -> u32 {
        self.entry.map_or(u32::MAX, |e| e.cldr_order)
    }

    fn sequence_length(&self) -> usize {
        self.symbol.chars().count()
    }
}

fn compare_ranked(a: &Ranked<'_>, b: &Ranked<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.cldr_order().cmp(&b.cldr_order()))
        .then_with(|| b.sequence_length().cmp(&a.sequence_length()))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Best matching label of one field, by index into that field
#[derive(Default)]
struct FieldBest {
    best: Option<(f64, usize)>,
}

impl FieldBest {
    fn offer(&mut self, score: f64, index: usize) {
        if score > 0.0 && self.best.map_or(true, |(best, _)| score > best) {
            self.best = Some((score, index));
        }
    }

    fn label<'e>(&self, labels: &'e [String]) -> Option<&'e str> {
        self.best.and_then(|(_, i)| labels.get(i)).map(String::as_str)
    }
}

/// Ranks catalog entries against free text and finds related symbols
pub struct FuzzyLabelMatcher {
    catalog: Arc<EmojiCatalog>,
    languages: Vec<String>,
    dictionary: Option<Arc<dyn DictionarySuggester>>,
    quick: bool,
    spell_alias_limit: usize,
}

impl FuzzyLabelMatcher {
    pub fn new(catalog: Arc<EmojiCatalog>, languages: &[String]) -> Self {
        Self {
            catalog,
            languages: expand_languages(languages),
            dictionary: None,
            quick: true,
            spell_alias_limit: 3,
        }
    }

    pub fn from_config(
        catalog: Arc<EmojiCatalog>,
        config: &EngineConfig,
        dictionary: Option<Arc<dyn DictionarySuggester>>,
    ) -> Self {
        let mut matcher = Self::new(catalog, &config.emoji_languages)
            .with_quick(config.quick_match)
            .with_spell_alias_limit(config.spell_alias_limit);
        matcher.dictionary = dictionary;
        matcher
    }

    pub fn with_dictionary(mut self, dictionary: Arc<dyn DictionarySuggester>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Quick mode skips the alignment bonus
    pub fn with_quick(mut self, quick: bool) -> Self {
        self.quick = quick;
        self
    }

    pub fn with_spell_alias_limit(mut self, limit: usize) -> Self {
        self.spell_alias_limit = limit;
        self
    }

    pub fn catalog(&self) -> &EmojiCatalog {
        &self.catalog
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    fn language_index(&self, language: &str) -> Option<usize> {
        self.languages.iter().position(|l| l == language)
    }

    /// Entry of `symbol` in the most preferred language that has one
    pub fn entry(&self, symbol: &str) -> Option<&EmojiLabelEntry> {
        self.languages
            .iter()
            .find_map(|language| self.catalog.get(symbol, language))
    }

    /// Display name of `symbol` in the most preferred language
    pub fn name_of(&self, symbol: &str) -> Option<&str> {
        self.entry(symbol).map(EmojiLabelEntry::display_name)
    }

    pub fn skin_tone_variants(&self, symbol: &str) -> Vec<String> {
        skin_tone::skin_tone_variants(&self.catalog, symbol)
    }

    /// Up to `limit` symbols matching `query`, best first. One trigger
    /// character is stripped from each end of the query.
    pub fn candidates(&self, query: &str, limit: usize, trigger_chars: &[char]) -> Vec<EmojiCandidate> {
        let stripped = strip_triggers(query, trigger_chars);
        if stripped.is_empty() || limit == 0 {
            return Vec::new();
        }
        if self.catalog.contains(stripped) {
            return self
                .similar(stripped, limit, false)
                .into_iter()
                .map(|similar| EmojiCandidate {
                    symbol: similar.symbol,
                    name: similar.name,
                    score: similar.shared as f64,
                })
                .collect();
        }

        let normalized = normalize_label(stripped);
        if normalized.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<Ranked<'_>> = Vec::new();
        let code_point = code_point_query(&normalized).map(|c| c.to_string());
        if let Some(symbol) = &code_point {
            let entry = self.entry(symbol);
            let code = format!("U+{:04X}", symbol.chars().next().map_or(0, |c| c as u32));
            let name = match entry.map(EmojiLabelEntry::display_name) {
                Some(name) if !name.is_empty() => format!("{} {}", code, name),
                _ => code,
            };
            ranked.push(Ranked {
                entry,
                symbol: symbol.clone(),
                name,
                score: CODE_POINT_SCORE,
                language_index: 0,
            });
        }

        let words = self.query_words(&normalized);
        let mut cache = MatchCache::new(words, self.quick);
        let mut best_by_symbol: HashMap<&str, Ranked<'_>> = HashMap::new();

        for entry in self.catalog.entries() {
            let Some(language_index) = self.language_index(&entry.language) else {
                continue;
            };
            if code_point.as_deref() == Some(entry.symbol.as_str()) {
                continue;
            }
            let Some(scored) = self.score_entry(entry, language_index, &mut cache) else {
                continue;
            };
            let replace = best_by_symbol.get(entry.symbol.as_str()).map_or(true, |existing| {
                scored.score > existing.score
                    || (scored.score == existing.score && language_index < existing.language_index)
            });
            if replace {
                best_by_symbol.insert(entry.symbol.as_str(), scored);
            }
        }

        ranked.extend(best_by_symbol.into_values());
        ranked.sort_by(compare_ranked);
        ranked.truncate(limit);
        ranked
            .into_iter()
            .map(|r| EmojiCandidate {
                symbol: r.symbol,
                name: r.name,
                score: r.score,
            })
            .collect()
    }

    /// Query words plus spelling corrections of long misspelled words
    fn query_words(&self, normalized: &str) -> Vec<String> {
        let mut words: Vec<String> = normalized.split(' ').map(str::to_string).collect();
        let Some(dictionary) = &self.dictionary else {
            return words;
        };

        let long_words: Vec<String> = words
            .iter()
            .filter(|w| w.chars().count() >= SPELL_ALIAS_MIN_CHARS)
            .cloned()
            .collect();
        for word in long_words {
            if dictionary.spellcheck(&word) {
                continue;
            }
            let mut suggestions: Vec<(String, f64)> = match dictionary.suggest(&word) {
                Ok(suggestions) => suggestions.into_iter().collect(),
                Err(e) => {
                    log::warn!("Spelling suggestions for {:?} failed: {}", word, e);
                    continue;
                }
            };
            suggestions.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            for (alias, _) in suggestions.into_iter().take(self.spell_alias_limit) {
                let alias = normalize_label(&alias);
                if !alias.is_empty() && !words.contains(&alias) {
                    log::trace!("Matching {:?} also as {:?}", word, alias);
                    words.push(alias);
                }
            }
        }
        words
    }

    fn score_entry<'e>(
        &self,
        entry: &'e EmojiLabelEntry,
        language_index: usize,
        cache: &mut MatchCache<'e>,
    ) -> Option<Ranked<'e>> {
        let mut total = 0.0;
        let mut names = FieldBest::default();
        let mut ucategories = FieldBest::default();
        let mut categories = FieldBest::default();
        let mut keywords = FieldBest::default();

        for (i, label) in entry.search.names.iter().enumerate() {
            let score = cache.score(label);
            total += NAME_WEIGHT * score;
            names.offer(score, i);
        }
        for (i, label) in entry.search.ucategories.iter().enumerate() {
            let score = cache.score(label);
            total += score;
            ucategories.offer(score, i);
        }
        for (i, label) in entry.search.categories.iter().enumerate() {
            let score = cache.score(label);
            total += score;
            categories.offer(score, i);
        }
        for (i, label) in entry.search.keywords.iter().enumerate() {
            let score = cache.score(label);
            total += score;
            keywords.offer(score, i);
        }

        if total <= 0.0 {
            return None;
        }

        let display = entry.display_name();
        let mut name = display.to_string();
        if let Some(alias) = names.label(&entry.names).filter(|alias| *alias != display) {
            name.push_str(&format!(" “{}”", alias));
        }
        if let Some(category) = ucategories.label(&entry.ucategories) {
            name.push_str(&format!(" ({})", category));
        }
        if let Some(category) = categories.label(&entry.categories) {
            name.push_str(&format!(" [{}]", category));
        }
        if let Some(keyword) = keywords.label(&entry.keywords) {
            name.push_str(&format!(" {{{}}}", keyword));
        }

        Some(Ranked {
            entry: Some(entry),
            symbol: entry.symbol.clone(),
            name,
            score: total,
            language_index,
        })
    }

    /// Symbols sharing labels with `symbol`, the symbol itself first.
    pub fn similar(&self, symbol: &str, limit: usize, show_keywords: bool) -> Vec<SimilarEmoji> {
        let reference: Vec<Option<(HashSet<&str>, u32)>> = self
            .languages
            .iter()
            .map(|language| {
                self.catalog
                    .get(symbol, language)
                    .map(|entry| (related_labels(entry).collect(), entry.cldr_order))
            })
            .collect();
        if reference.iter().all(Option::is_none) {
            return Vec::new();
        }

        struct Related<'e> {
            entry: &'e EmojiLabelEntry,
            language_index: usize,
            shared: Vec<&'e str>,
            count: usize,
            distance: u64,
        }

        let mut related: Vec<Related<'_>> = Vec::new();
        for entry in self.catalog.entries() {
            let Some(language_index) = self.language_index(&entry.language) else {
                continue;
            };
            let Some((labels, origin_order)) = &reference[language_index] else {
                continue;
            };
            let mut shared: Vec<&str> = Vec::new();
            for label in related_labels(entry) {
                if labels.contains(label) && !shared.contains(&label) {
                    shared.push(label);
                }
            }
            let count = shared.len() + usize::from(entry.symbol == symbol);
            if count == 0 {
                continue;
            }
            related.push(Related {
                entry,
                language_index,
                shared,
                count,
                distance: u64::from(entry.cldr_order.abs_diff(*origin_order)),
            });
        }

        related.sort_by(|a, b| {
            a.language_index
                .cmp(&b.language_index)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a.distance.cmp(&b.distance))
                .then_with(|| a.entry.cldr_order.cmp(&b.entry.cldr_order))
                .then_with(|| b.entry.sequence_length().cmp(&a.entry.sequence_length()))
                .then_with(|| a.entry.display_name().cmp(b.entry.display_name()))
        });

        let mut seen = HashSet::new();
        related
            .into_iter()
            .filter(|r| seen.insert(r.entry.symbol.as_str()))
            .take(limit)
            .map(|r| {
                let mut name = r.entry.display_name().to_string();
                if show_keywords && !r.shared.is_empty() {
                    name.push_str(&format!(" [{}]", r.shared.join(", ")));
                }
                SimilarEmoji {
                    symbol: r.entry.symbol.clone(),
                    name,
                    shared: r.count,
                }
            })
            .collect()
    }
}

fn related_labels(entry: &EmojiLabelEntry) -> impl Iterator<Item = &str> {
    entry
        .categories
        .iter()
        .chain(&entry.keywords)
        .chain(&entry.ucategories)
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{DictionarySet, WordListDictionary};
    use crate::emoji::EmojiCatalogBuilder;

    fn words(query: &str) -> Vec<String> {
        query.split(' ').map(str::to_string).collect()
    }

    fn catalog() -> Arc<EmojiCatalog> {
        let mut builder = EmojiCatalogBuilder::new();
        let mut add = |symbol: &str, name: &str, keywords: &[&str], categories: &[&str], order: u32| {
            builder
                .add_names(symbol, "en", &[name])
                .add_keywords(symbol, "en", keywords)
                .add_categories(symbol, "en", categories)
                .set_cldr_order(symbol, order);
        };
        add("😀", "grinning face", &["face", "grin"], &["Smileys & Emotion", "face smiling"], 1);
        add("❤\u{FE0F}", "red heart", &["heart", "love"], &["Smileys & Emotion", "heart"], 2);
        add("♥\u{FE0F}", "heart suit", &["card", "game"], &["Activities", "game"], 3);
        add("🏸", "badminton", &["game", "racquet", "shuttlecock"], &["Activities", "sport"], 4);
        add("👩", "woman", &["adult"], &["People & Body", "person"], 5);
        builder.add_names("😀", "de", &["grinsendes Gesicht"]);
        builder.add_property("👩", crate::emoji::EmojiProperty::ModifierBase);
        Arc::new(builder.build())
    }

    fn matcher() -> FuzzyLabelMatcher {
        FuzzyLabelMatcher::new(catalog(), &["en".to_string()])
    }

    fn symbols(candidates: &[EmojiCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.symbol.as_str()).collect()
    }

    #[test]
    fn test_match_label_prefers_exact_labels() {
        let exact = match_label("heart", &words("heart"), true);
        let prefix = match_label("heart suit", &words("heart"), true);
        let after_space = match_label("red heart", &words("heart"), true);
        let inside = match_label("sweetheart", &words("heart"), true);
        assert_eq!(exact, 1300.0);
        assert_eq!(prefix, 125.0);
        assert_eq!(after_space, 105.0);
        assert_eq!(inside, 25.0);
        assert_eq!(match_label("red heart", &words("red heart"), true), 1000.0 + 123.0 + 105.0);
        assert_eq!(match_label("red heart", &words("moon"), true), 0.0);
    }

    #[test]
    fn test_alignment_bonus_only_when_not_quick() {
        let quick = match_label("badminton", &words("badmin"), true);
        let slow = match_label("badminton", &words("badmin"), false);
        assert!(slow > quick);
        assert!(slow - quick <= MAX_ALIGNMENT_BONUS);
    }

    #[test]
    fn test_exact_label_outranks_partial_matches() {
        let found = matcher().candidates("heart", 10, &['_']);
        assert_eq!(symbols(&found), vec!["❤\u{FE0F}", "♥\u{FE0F}"]);
        assert!(found[0].name.starts_with("red heart"));
        assert!(found[0].score > found[1].score);
    }

    #[test]
    fn test_triggers_and_accents_are_ignored() {
        let matcher = matcher();
        assert_eq!(symbols(&matcher.candidates("_Grïn_", 5, &['_'])), vec!["😀"]);
        assert!(matcher.candidates("_", 5, &['_']).is_empty());
        assert!(matcher.candidates("", 5, &['_']).is_empty());
    }

    #[test]
    fn test_limit_and_tie_break_by_order() {
        let found = matcher().candidates("activities", 1, &[]);
        assert_eq!(found.len(), 1);
        // equal scores, earlier display order wins
        assert_eq!(found[0].symbol, "♥\u{FE0F}");

        let both = matcher().candidates("activities", 5, &[]);
        assert_eq!(symbols(&both), vec!["♥\u{FE0F}", "🏸"]);
        assert_eq!(both[0].score, both[1].score);
    }

    #[test]
    fn test_spelling_aliases_find_misspelled_names() {
        let dictionary = DictionarySet::new(vec![WordListDictionary::new("en_US", ["badminton", "heart"])]);
        let matcher = matcher().with_dictionary(Arc::new(dictionary));
        let found = matcher.candidates("badmynton", 5, &[]);
        assert_eq!(found.first().map(|c| c.symbol.as_str()), Some("🏸"));

        assert!(FuzzyLabelMatcher::new(catalog(), &[]).candidates("badmynton", 5, &[]).is_empty());
    }

    #[test]
    fn test_code_point_queries() {
        let matcher = matcher();
        let found = matcher.candidates("1f600", 5, &[]);
        assert_eq!(found[0].symbol, "😀");
        assert_eq!(found[0].score, CODE_POINT_SCORE);
        assert_eq!(found[0].name, "U+1F600 grinning face");

        let arrow = matcher.candidates("u+2192", 5, &[]);
        assert_eq!(arrow[0].symbol, "→");
        assert_eq!(arrow[0].name, "U+2192");

        assert!(matcher.candidates("e000", 5, &[]).is_empty());
        assert!(matcher.candidates("d800", 5, &[]).is_empty());
        assert!(matcher.candidates("u+10ffff", 5, &[]).is_empty());
        assert_eq!(code_point_query("0007"), Some('\u{7}'));
        assert_eq!(code_point_query("110000"), None);
        assert_eq!(code_point_query("1234567"), None);
    }

    #[test]
    fn test_hex_words_resolve_as_code_points() {
        let found = matcher().candidates("face", 5, &[]);
        assert_eq!(found[0].symbol, "\u{FACE}");
        assert_eq!(found[0].name, "U+FACE");
        assert_eq!(found[0].score, CODE_POINT_SCORE);
        // label matches still follow the code point
        assert_eq!(found[1].symbol, "😀");
        assert!(found[1].score < CODE_POINT_SCORE);

        assert_eq!(code_point_query("cafe"), Some('\u{CAFE}'));
        assert_eq!(code_point_query("abcd"), Some('\u{ABCD}'));
    }

    #[test]
    fn test_symbol_query_returns_related() {
        let matcher = matcher();
        let similar = matcher.similar("🏸", 5, true);
        assert_eq!(similar[0].symbol, "🏸");
        assert_eq!(similar[0].shared, 6);
        assert_eq!(similar[1].symbol, "♥\u{FE0F}");
        assert_eq!(similar[1].shared, 2);
        assert_eq!(similar[1].name, "heart suit [Activities, game]");
        assert_eq!(similar.len(), 2);

        let found = matcher.candidates("🏸", 5, &[]);
        assert_eq!(symbols(&found), vec!["🏸", "♥\u{FE0F}"]);
        assert!(matcher.similar("🦄", 5, false).is_empty());
    }

    #[test]
    fn test_language_preference() {
        let matcher = FuzzyLabelMatcher::new(catalog(), &["de_DE".to_string()]);
        assert_eq!(matcher.languages(), ["de_DE", "de", "en"]);
        assert_eq!(matcher.name_of("😀"), Some("grinsendes Gesicht"));
        assert_eq!(matcher.name_of("🏸"), Some("badminton"));
        let found = matcher.candidates("gesicht", 5, &[]);
        assert_eq!(symbols(&found), vec!["😀"]);
    }

    #[test]
    fn test_skin_tones_through_matcher() {
        assert_eq!(matcher().skin_tone_variants("👩").len(), 6);
    }
}
