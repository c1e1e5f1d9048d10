//! Text normalization shared by the phrase store, the emoji matcher and the
//! composer.
//!
//! Lookup keys are case-folded and accent-stripped; display forms are NFC.

use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Key form used for `input_phrase`, `p_phrase` and `pp_phrase`
///
/// Decomposes, drops nonspacing marks, lower-cases. "Café" -> "cafe".
pub fn lookup_key(text: &str) -> String {
    strip_accents(text).to_lowercase()
}

/// Remove nonspacing marks (Mn) after canonical decomposition, then recompose.
///
/// Spacing marks (Mc) are vowel signs in Indic scripts and stay.
pub fn strip_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_nonspacing_mark(*c)).nfc().collect()
}

fn is_nonspacing_mark(c: char) -> bool {
    get_general_category(c) == GeneralCategory::NonspacingMark
}

/// Display form stored in the `phrase` column
pub fn display_form(text: &str) -> String {
    text.nfc().collect()
}

/// Collapse runs of whitespace and underscores into single spaces and trim.
pub fn collapse_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() || c == '_' {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

/// Upper-case the first character, leave the rest untouched.
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Title-case every word.
///
/// The input is NFC-normalized first: in NFD a combining mark counts as a
/// word boundary and the following letter would be upper-cased ("CafÉ").
pub fn title_case(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let mut out = String::with_capacity(composed.len());
    let mut previous_cased = false;
    for c in composed.chars() {
        if c.is_alphabetic() {
            if previous_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_cased = true;
        } else {
            out.push(c);
            previous_cased = is_combining_mark(c) && previous_cased;
        }
    }
    out
}

/// Split committed text into words for training.
///
/// Punctuation at word edges is dropped; inner apostrophes and hyphens stay.
pub fn split_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(display_form)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_key_folds_case_and_accents() {
        assert_eq!(lookup_key("Café"), "cafe");
        assert_eq!(lookup_key("Cafe\u{301}"), "cafe");
        assert_eq!(lookup_key("ÜBER"), "uber");
    }

    #[test]
    fn test_lookup_key_keeps_spacing_marks() {
        // U+0902 anusvara is Mn, the vowel signs U+093F and U+0940 are Mc
        assert_eq!(lookup_key("हिंदी"), "हिदी");
        assert_ne!(lookup_key("हिंदी"), "हद");
        assert_eq!(lookup_key("தமிழ்"), "தமிழ");
    }

    #[test]
    fn test_display_form_composes() {
        assert_eq!(display_form("Cafe\u{301}"), "Café");
    }

    #[test]
    fn test_collapse_separators() {
        assert_eq!(collapse_separators("  red__heart  eyes "), "red heart eyes");
        assert_eq!(collapse_separators("_"), "");
    }

    #[test]
    fn test_title_case_handles_decomposed_input() {
        assert_eq!(title_case("cafe\u{301} au lait"), "Café Au Lait");
        assert_eq!(title_case("o'neil"), "O'Neil");
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("élan vital"), "Élan vital");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("Hello, world! it's fine."), vec!["Hello", "world", "it's", "fine"]);
    }
}
