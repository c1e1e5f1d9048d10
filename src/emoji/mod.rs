//! Emoji and Symbol Catalog
//!
//! Immutable label data keyed by (symbol, language), plus the fuzzy matcher
//! that ranks free-text queries against it.

mod loader;
mod matcher;
mod skin_tone;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::text::{collapse_separators, lookup_key};

pub use loader::{
    general_category_labels, load_cldr_annotations, load_emoji_data, load_emoji_test, load_unicode_data,
};
pub use matcher::{
    match_label, EmojiCandidate, FuzzyLabelMatcher, MatchCache, SimilarEmoji, CODE_POINT_SCORE,
};
pub use skin_tone::{skin_tone_variants, FITZPATRICK_MODIFIERS};

/// Unicode emoji properties the engine cares about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmojiProperty {
    ModifierBase,
    Modifier,
    Component,
    Presentation,
    ZwjSequence,
    KeycapSequence,
    Other(String),
}

impl EmojiProperty {
    /// Map an `emoji-data.txt` property name
    pub fn from_data_name(name: &str) -> Self {
        match name {
            "Emoji_Modifier_Base" => EmojiProperty::ModifierBase,
            "Emoji_Modifier" => EmojiProperty::Modifier,
            "Emoji_Component" => EmojiProperty::Component,
            "Emoji_Presentation" => EmojiProperty::Presentation,
            other => EmojiProperty::Other(other.to_string()),
        }
    }
}

/// Labels of one symbol in one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmojiLabelEntry {
    pub symbol: String,
    pub language: String,
    /// First name is the canonical display name
    pub names: Vec<String>,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    /// Words derived from the Unicode general category
    pub ucategories: Vec<String>,
    pub properties: Vec<EmojiProperty>,
    /// Position in the emoji-test ordering, `u32::MAX` when unknown
    pub cldr_order: u32,
    pub emoji_order: u32,
    pub uversion: Option<String>,
    #[serde(skip)]
    pub(crate) search: SearchLabels,
}

impl EmojiLabelEntry {
    /// Canonical display name, empty when the symbol has none
    pub fn display_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    /// Number of code points in the symbol
    pub fn sequence_length(&self) -> usize {
        self.symbol.chars().count()
    }

    pub fn has_property(&self, property: &EmojiProperty) -> bool {
        self.properties.contains(property)
    }
}

/// Normalized copies of the label fields, computed once at build time
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SearchLabels {
    pub names: Vec<String>,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub ucategories: Vec<String>,
}

pub(crate) fn normalize_label(label: &str) -> String {
    collapse_separators(&lookup_key(label))
}

fn normalize_all(labels: &[String]) -> Vec<String> {
    labels.iter().map(|l| normalize_label(l)).collect()
}

/// Language-independent facets of a symbol
#[derive(Debug, Clone, Default)]
struct SymbolFacets {
    ucategories: Vec<String>,
    properties: Vec<EmojiProperty>,
    cldr_order: Option<u32>,
    emoji_order: Option<u32>,
    uversion: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct LanguageLabels {
    names: Vec<String>,
    keywords: Vec<String>,
    categories: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Collects catalog data from the various sources before freezing it
#[derive(Debug, Default)]
pub struct EmojiCatalogBuilder {
    symbols: HashMap<String, SymbolFacets>,
    labels: HashMap<String, HashMap<String, LanguageLabels>>,
}

impl EmojiCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn labels_mut(&mut self, symbol: &str, language: &str) -> &mut LanguageLabels {
        self.labels
            .entry(symbol.to_string())
            .or_default()
            .entry(language.to_string())
            .or_default()
    }

    fn facets_mut(&mut self, symbol: &str) -> &mut SymbolFacets {
        self.symbols.entry(symbol.to_string()).or_default()
    }

    pub fn add_names<S: AsRef<str>>(&mut self, symbol: &str, language: &str, names: &[S]) -> &mut Self {
        let labels = self.labels_mut(symbol, language);
        for name in names {
            push_unique(&mut labels.names, name.as_ref());
        }
        self
    }

    pub fn add_keywords<S: AsRef<str>>(&mut self, symbol: &str, language: &str, keywords: &[S]) -> &mut Self {
        let labels = self.labels_mut(symbol, language);
        for keyword in keywords {
            push_unique(&mut labels.keywords, keyword.as_ref());
        }
        self
    }

    pub fn add_categories<S: AsRef<str>>(&mut self, symbol: &str, language: &str, categories: &[S]) -> &mut Self {
        let labels = self.labels_mut(symbol, language);
        for category in categories {
            push_unique(&mut labels.categories, category.as_ref());
        }
        self
    }

    pub fn add_ucategories<S: AsRef<str>>(&mut self, symbol: &str, ucategories: &[S]) -> &mut Self {
        let facets = self.facets_mut(symbol);
        for category in ucategories {
            push_unique(&mut facets.ucategories, category.as_ref());
        }
        self
    }

    pub fn add_property(&mut self, symbol: &str, property: EmojiProperty) -> &mut Self {
        let facets = self.facets_mut(symbol);
        if !facets.properties.contains(&property) {
            facets.properties.push(property);
        }
        self
    }

    /// Keeps the first order seen for a symbol
    pub fn set_cldr_order(&mut self, symbol: &str, order: u32) -> &mut Self {
        self.facets_mut(symbol).cldr_order.get_or_insert(order);
        self
    }

    pub fn set_emoji_order(&mut self, symbol: &str, order: u32) -> &mut Self {
        self.facets_mut(symbol).emoji_order.get_or_insert(order);
        self
    }

    pub fn set_uversion(&mut self, symbol: &str, version: &str) -> &mut Self {
        self.facets_mut(symbol).uversion.get_or_insert_with(|| version.to_string());
        self
    }

    /// Whether anything is known about `symbol` yet
    pub fn knows(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol) || self.labels.contains_key(symbol)
    }

    pub fn build(self) -> EmojiCatalog {
        let mut entries = Vec::new();
        let mut index: HashMap<String, HashMap<String, usize>> = HashMap::new();

        for (symbol, languages) in self.labels {
            let facets = self.symbols.get(&symbol).cloned().unwrap_or_default();
            for (language, labels) in languages {
                let search = SearchLabels {
                    names: normalize_all(&labels.names),
                    keywords: normalize_all(&labels.keywords),
                    categories: normalize_all(&labels.categories),
                    ucategories: normalize_all(&facets.ucategories),
                };
                index
                    .entry(symbol.clone())
                    .or_default()
                    .insert(language.clone(), entries.len());
                entries.push(EmojiLabelEntry {
                    symbol: symbol.clone(),
                    language,
                    names: labels.names,
                    keywords: labels.keywords,
                    categories: labels.categories,
                    ucategories: facets.ucategories.clone(),
                    properties: facets.properties.clone(),
                    cldr_order: facets.cldr_order.unwrap_or(u32::MAX),
                    emoji_order: facets.emoji_order.unwrap_or(u32::MAX),
                    uversion: facets.uversion.clone(),
                    search,
                });
            }
        }

        let properties = self
            .symbols
            .into_iter()
            .filter(|(_, facets)| !facets.properties.is_empty())
            .map(|(symbol, facets)| (symbol, facets.properties))
            .collect();

        log::debug!("Built emoji catalog with {} entries", entries.len());
        EmojiCatalog {
            entries,
            index,
            properties,
        }
    }
}

/// Frozen (symbol, language) -> labels lookup
#[derive(Debug, Default)]
pub struct EmojiCatalog {
    entries: Vec<EmojiLabelEntry>,
    index: HashMap<String, HashMap<String, usize>>,
    /// Properties also for symbols without labels (bare modifiers and such)
    properties: HashMap<String, Vec<EmojiProperty>>,
}

impl EmojiCatalog {
    pub fn builder() -> EmojiCatalogBuilder {
        EmojiCatalogBuilder::new()
    }

    /// Load whichever Unicode and CLDR data files exist in `dir`.
    pub fn load_from_dir(dir: impl AsRef<std::path::Path>, languages: &[String]) -> anyhow::Result<Self> {
        loader::load_from_dir(dir, languages)
    }

    pub fn get(&self, symbol: &str, language: &str) -> Option<&EmojiLabelEntry> {
        let position = *self.index.get(symbol)?.get(language)?;
        self.entries.get(position)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn entries(&self) -> impl Iterator<Item = &EmojiLabelEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_property(&self, symbol: &str, property: &EmojiProperty) -> bool {
        self.properties
            .get(symbol)
            .is_some_and(|properties| properties.contains(property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_merges_sources() {
        let mut builder = EmojiCatalog::builder();
        builder
            .add_names("😀", "en", &["grinning face"])
            .add_keywords("😀", "en", &["face", "grin", "face"])
            .add_categories("😀", "en", &["Smileys & Emotion"])
            .add_ucategories("😀", &["symbol", "other"])
            .set_cldr_order("😀", 1)
            .set_cldr_order("😀", 99)
            .add_names("😀", "de", &["grinsendes Gesicht"])
            .add_property("🏻", EmojiProperty::Modifier);
        let catalog = builder.build();

        let entry = catalog.get("😀", "en").unwrap();
        assert_eq!(entry.display_name(), "grinning face");
        assert_eq!(entry.keywords, vec!["face", "grin"]);
        assert_eq!(entry.cldr_order, 1);
        assert_eq!(entry.ucategories, vec!["symbol", "other"]);
        assert_eq!(entry.search.categories, vec!["smileys & emotion"]);

        assert_eq!(catalog.get("😀", "de").unwrap().display_name(), "grinsendes Gesicht");
        assert!(catalog.get("😀", "fr").is_none());
        assert_eq!(catalog.len(), 2);
        assert!(catalog.has_property("🏻", &EmojiProperty::Modifier));
        assert!(!catalog.contains("🏻"));
    }
}
