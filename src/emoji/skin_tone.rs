//! Skin tone variants of modifiable emoji

use super::loader::is_fitzpatrick_modifier;
use super::{EmojiCatalog, EmojiProperty};

/// U+1F3FB..U+1F3FF, light to dark
pub const FITZPATRICK_MODIFIERS: [char; 5] = ['\u{1F3FB}', '\u{1F3FC}', '\u{1F3FD}', '\u{1F3FE}', '\u{1F3FF}'];

const ZWJ: char = '\u{200D}';
const VARIATION_SELECTOR_16: char = '\u{FE0F}';
const MAX_ZWJ_PARTS: usize = 4;

/// All skin tone variants of `symbol`, starting with the unmodified form.
///
/// Each part of a ZWJ sequence that is a modifier base is combined with
/// "no modifier" and each of the five modifiers, so a sequence with two
/// modifiable parts yields 36 variants. Symbols without a modifiable part
/// (or with more than four parts) come back unchanged.
pub fn skin_tone_variants(catalog: &EmojiCatalog, symbol: &str) -> Vec<String> {
    let parts: Vec<&str> = symbol.split(ZWJ).collect();
    if parts.len() > MAX_ZWJ_PARTS {
        return vec![symbol.to_string()];
    }

    let options: Vec<Vec<String>> = parts.iter().map(|part| part_variants(catalog, part)).collect();
    if options.iter().all(|choices| choices.len() == 1) {
        return vec![symbol.to_string()];
    }

    let mut variants = vec![String::new()];
    for (i, choices) in options.iter().enumerate() {
        let mut next = Vec::with_capacity(variants.len() * choices.len());
        for prefix in &variants {
            for choice in choices {
                let mut variant = prefix.clone();
                if i > 0 {
                    variant.push(ZWJ);
                }
                variant.push_str(choice);
                next.push(variant);
            }
        }
        variants = next;
    }
    variants
}

fn part_variants(catalog: &EmojiCatalog, part: &str) -> Vec<String> {
    let unmodified: String = part.chars().filter(|c| !is_fitzpatrick_modifier(*c)).collect();
    let bare: String = unmodified.chars().filter(|c| *c != VARIATION_SELECTOR_16).collect();
    if bare.is_empty() || !catalog.has_property(&bare, &EmojiProperty::ModifierBase) {
        return vec![part.to_string()];
    }

    let mut variants = Vec::with_capacity(FITZPATRICK_MODIFIERS.len() + 1);
    variants.push(unmodified);
    for modifier in FITZPATRICK_MODIFIERS {
        variants.push(format!("{}{}", bare, modifier));
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emoji::EmojiCatalogBuilder;

    fn catalog() -> EmojiCatalog {
        let mut builder = EmojiCatalogBuilder::new();
        builder
            .add_property("👩", EmojiProperty::ModifierBase)
            .add_property("👨", EmojiProperty::ModifierBase)
            .add_property("👋", EmojiProperty::ModifierBase);
        builder.build()
    }

    #[test]
    fn test_single_base_has_six_variants() {
        let variants = skin_tone_variants(&catalog(), "👩");
        assert_eq!(variants.len(), 6);
        assert_eq!(variants[0], "👩");
        assert_eq!(variants[1], "👩\u{1F3FB}");
        assert_eq!(variants[5], "👩\u{1F3FF}");
    }

    #[test]
    fn test_existing_modifier_is_replaced() {
        let variants = skin_tone_variants(&catalog(), "👋\u{1F3FD}");
        assert_eq!(variants.len(), 6);
        assert_eq!(variants[0], "👋");
        assert!(!variants[2].contains('\u{1F3FD}'));
    }

    #[test]
    fn test_two_modifiable_parts_cross_product() {
        let catalog = catalog();
        assert_eq!(skin_tone_variants(&catalog, "👩\u{200D}👨").len(), 36);

        let couple = "👩\u{200D}❤\u{FE0F}\u{200D}👨";
        let variants = skin_tone_variants(&catalog, couple);
        assert_eq!(variants.len(), 36);
        assert_eq!(variants[0], couple);
        assert!(variants.contains(&"👩\u{1F3FF}\u{200D}❤\u{FE0F}\u{200D}👨\u{1F3FB}".to_string()));
    }

    #[test]
    fn test_unmodifiable_symbols_unchanged() {
        let catalog = catalog();
        assert_eq!(skin_tone_variants(&catalog, "😀"), vec!["😀"]);
        let long = ["👩"; 5].join("\u{200D}");
        assert_eq!(skin_tone_variants(&catalog, &long), vec![long.clone()]);
    }
}
