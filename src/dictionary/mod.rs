//! Spelling dictionaries
//!
//! Word completion and spelling correction for the composer and the emoji
//! matcher. The engine only relies on the [`DictionarySuggester`] trait;
//! [`WordListDictionary`] and [`DictionarySet`] are plain word-list backends.

use anyhow::Context;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::text::lookup_key;

/// Score of a dictionary word completing the typed prefix
pub const DICTIONARY_COMPLETION_SCORE: f64 = 0.0;

/// Score of a correction at edit distance 1; distance 2 scores one lower.
/// Negative scores mark spell-checking results.
pub const SPELL_CORRECTION_SCORE: f64 = -1.0;

const MAX_COMPLETIONS: usize = 20;
const MAX_CORRECTIONS: usize = 5;
const MAX_EDIT_DISTANCE: usize = 2;
/// Deletes are generated from this many leading characters of a key
const DELETE_PREFIX_LENGTH: usize = 7;

/// Source of dictionary completions and spell checks
pub trait DictionarySuggester: Send + Sync {
    /// Completions and corrections for `word`, mapped to a score.
    fn suggest(&self, word: &str) -> anyhow::Result<HashMap<String, f64>>;

    /// Whether `word` is spelled correctly in any dictionary
    fn spellcheck(&self, word: &str) -> bool;

    /// Ids of the dictionaries accepting `word`
    fn spellcheck_match_list(&self, word: &str) -> Vec<String>;

    /// Whether one single dictionary accepts every word
    fn spellcheck_single_dictionary(&self, words: &[&str]) -> bool;
}

/// One language's word list
#[derive(Debug, Clone, Default)]
pub struct WordListDictionary {
    id: String,
    /// lookup key -> display forms
    by_key: BTreeMap<String, Vec<String>>,
    /// key prefix with up to two characters deleted -> lookup keys
    deletes: HashMap<String, Vec<String>>,
    lowercase: HashSet<String>,
}

impl WordListDictionary {
    pub fn new<I, S>(id: impl Into<String>, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dictionary = Self {
            id: id.into(),
            ..Default::default()
        };
        for word in words {
            dictionary.add_word(word.as_ref());
        }
        dictionary
    }

    /// Load a hunspell `.dic` file: a count line followed by `word/FLAGS`.
    pub fn load_dic(id: impl Into<String>, path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dictionary {}", path.display()))?;

        let words = content
            .lines()
            .enumerate()
            .filter(|(i, line)| !(*i == 0 && line.trim().parse::<usize>().is_ok()))
            .filter_map(|(_, line)| {
                let entry = line.split(['/', '\t']).next()?.trim();
                (!entry.is_empty() && !entry.starts_with('#')).then_some(entry)
            });
        let dictionary = Self::new(id, words);
        log::info!("Loaded dictionary {} with {} words", dictionary.id, dictionary.len());
        Ok(dictionary)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.lowercase.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lowercase.is_empty()
    }

    pub fn add_word(&mut self, word: &str) {
        let word = word.trim();
        if word.is_empty() || !self.lowercase.insert(word.to_lowercase()) {
            return;
        }
        let key = lookup_key(word);
        let forms = self.by_key.entry(key.clone()).or_default();
        forms.push(word.to_string());
        if forms.len() == 1 {
            self.index_deletes(key);
        }
    }

    fn index_deletes(&mut self, key: String) {
        let prefix: String = key.chars().take(DELETE_PREFIX_LENGTH).collect();
        for variant in deletes_within(&prefix, MAX_EDIT_DISTANCE) {
            self.deletes.entry(variant).or_default().push(key.clone());
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.lowercase.contains(&word.to_lowercase())
    }

    /// Words whose lookup key starts with the key of `prefix`
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        let key = lookup_key(prefix);
        if key.is_empty() {
            return Vec::new();
        }
        self.by_key
            .range(key.clone()..)
            .take_while(|(candidate, _)| candidate.starts_with(&key))
            .flat_map(|(_, words)| words.iter().cloned())
            .take(MAX_COMPLETIONS)
            .collect()
    }

    /// Words within edit distance 2 of `word`, closest first
    ///
    /// Candidates share a delete variant of their key prefix with the query;
    /// only those are measured.
    pub fn corrections(&self, word: &str) -> Vec<(String, usize)> {
        let key = lookup_key(word);
        if key.is_empty() {
            return Vec::new();
        }

        let prefix: String = key.chars().take(DELETE_PREFIX_LENGTH).collect();
        let mut candidates: HashSet<&str> = HashSet::new();
        for variant in deletes_within(&prefix, MAX_EDIT_DISTANCE) {
            if let Some(keys) = self.deletes.get(&variant) {
                candidates.extend(keys.iter().map(String::as_str));
            }
        }

        let key: Vec<char> = key.chars().collect();
        let mut found: Vec<(String, usize)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let words = self.by_key.get(candidate)?;
                let candidate: Vec<char> = candidate.chars().collect();
                if candidate.len().abs_diff(key.len()) > MAX_EDIT_DISTANCE {
                    return None;
                }
                let distance = edit_distance(&key, &candidate);
                (distance <= MAX_EDIT_DISTANCE).then(|| (words[0].clone(), distance))
            })
            .collect();
        found.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        found.truncate(MAX_CORRECTIONS);
        found
    }
}

/// `word` and every string reachable from it by deleting up to `depth`
/// characters
fn deletes_within(word: &str, depth: usize) -> HashSet<String> {
    let mut variants = HashSet::new();
    variants.insert(word.to_string());
    collect_deletes(word, depth, &mut variants);
    variants
}

fn collect_deletes(word: &str, depth: usize, variants: &mut HashSet<String>) {
    if depth == 0 {
        return;
    }
    for (index, c) in word.char_indices() {
        let mut shorter = String::with_capacity(word.len());
        shorter.push_str(&word[..index]);
        shorter.push_str(&word[index + c.len_utf8()..]);
        if variants.insert(shorter.clone()) {
            collect_deletes(&shorter, depth - 1, variants);
        }
    }
}

/// Several dictionaries consulted together
#[derive(Debug, Clone, Default)]
pub struct DictionarySet {
    dictionaries: Vec<WordListDictionary>,
}

impl DictionarySet {
    pub fn new(dictionaries: Vec<WordListDictionary>) -> Self {
        Self { dictionaries }
    }

    pub fn push(&mut self, dictionary: WordListDictionary) {
        self.dictionaries.push(dictionary);
    }

    pub fn ids(&self) -> Vec<&str> {
        self.dictionaries.iter().map(|d| d.id()).collect()
    }
}

impl DictionarySuggester for DictionarySet {
    fn suggest(&self, word: &str) -> anyhow::Result<HashMap<String, f64>> {
        let mut suggestions: HashMap<String, f64> = HashMap::new();
        let mut merge = |phrase: String, score: f64| {
            let entry = suggestions.entry(phrase).or_insert(score);
            if score > *entry {
                *entry = score;
            }
        };

        for dictionary in &self.dictionaries {
            for completion in dictionary.completions(word) {
                merge(completion, DICTIONARY_COMPLETION_SCORE);
            }
        }

        if !self.spellcheck(word) {
            for dictionary in &self.dictionaries {
                for (correction, distance) in dictionary.corrections(word) {
                    merge(correction, SPELL_CORRECTION_SCORE - (distance as f64 - 1.0));
                }
            }
        }

        Ok(suggestions)
    }

    fn spellcheck(&self, word: &str) -> bool {
        self.dictionaries.iter().any(|d| d.contains(word))
    }

    fn spellcheck_match_list(&self, word: &str) -> Vec<String> {
        self.dictionaries
            .iter()
            .filter(|d| d.contains(word))
            .map(|d| d.id().to_string())
            .collect()
    }

    fn spellcheck_single_dictionary(&self, words: &[&str]) -> bool {
        self.dictionaries
            .iter()
            .any(|d| words.iter().all(|w| d.contains(w)))
    }
}

/// Optimal string alignment distance (Damerau-Levenshtein without
/// repeated edits of one substring)
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let width = b.len() + 1;
    let mut table = vec![0usize; (a.len() + 1) * width];
    for i in 0..=a.len() {
        table[i * width] = i;
    }
    for (j, cell) in table.iter_mut().enumerate().take(width) {
        *cell = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (table[(i - 1) * width + j] + 1)
                .min(table[i * width + j - 1] + 1)
                .min(table[(i - 1) * width + j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(table[(i - 2) * width + j - 2] + 1);
            }
            table[i * width + j] = best;
        }
    }
    table[a.len() * width + b.len()]
}
