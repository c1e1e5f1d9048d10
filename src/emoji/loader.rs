//! Parsers for the Unicode and CLDR data files feeding the emoji catalog

use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::{EmojiCatalog, EmojiCatalogBuilder, EmojiProperty};

const ZWJ: char = '\u{200D}';
const KEYCAP: char = '\u{20E3}';
const VARIATION_SELECTOR_16: char = '\u{FE0F}';
const ENGLISH: &str = "en";

pub(crate) fn is_fitzpatrick_modifier(c: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

/// Parse space separated hex code points ("1F44B 1F3FB") into a string
fn parse_code_points(field: &str) -> anyhow::Result<String> {
    field
        .split_whitespace()
        .map(|hex| {
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| anyhow!("invalid code point {:?}", hex))
        })
        .collect()
}

/// Parse "1F466" or "1F466..1F478" into an inclusive range
fn parse_range(field: &str) -> anyhow::Result<(u32, u32)> {
    let parse = |hex: &str| u32::from_str_radix(hex.trim(), 16).with_context(|| format!("bad code point {:?}", hex));
    match field.split_once("..") {
        Some((start, end)) => Ok((parse(start)?, parse(end)?)),
        None => {
            let single = parse(field)?;
            Ok((single, single))
        }
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Load `emoji-test.txt`: names, group/subgroup categories, display order,
/// emoji versions and sequence properties.
pub fn load_emoji_test(builder: &mut EmojiCatalogBuilder, path: impl AsRef<Path>) -> anyhow::Result<usize> {
    parse_emoji_test(builder, &read(path.as_ref())?)
}

pub(crate) fn parse_emoji_test(builder: &mut EmojiCatalogBuilder, content: &str) -> anyhow::Result<usize> {
    let mut group = String::new();
    let mut subgroup = String::new();
    let mut cldr_order = 0u32;
    let mut loaded = 0;

    for (line_number, line) in content.lines().enumerate() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("# group:") {
            group = name.trim().to_string();
            continue;
        }
        if let Some(name) = line.strip_prefix("# subgroup:") {
            subgroup = name.trim().replace('-', " ");
            continue;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((code_points, rest)) = line.split_once(';') else {
            continue;
        };
        let Some((status, comment)) = rest.split_once('#') else {
            continue;
        };
        let status = status.trim();
        if status != "fully-qualified" && status != "component" {
            continue;
        }

        let symbol = parse_code_points(code_points)
            .with_context(|| format!("emoji-test line {}", line_number + 1))?;

        // "# 👋🏻 E1.0 waving hand: light skin tone"
        let mut fields = comment.trim().splitn(3, ' ');
        let _rendered = fields.next();
        let version = fields.next().unwrap_or_default();
        let name = fields.next().unwrap_or_default().trim();

        cldr_order += 1;
        builder
            .set_cldr_order(&symbol, cldr_order)
            .set_emoji_order(&symbol, line_number as u32)
            .add_names(&symbol, ENGLISH, &[name])
            .add_categories(&symbol, ENGLISH, &[group.as_str(), subgroup.as_str()]);
        if let Some(version) = version.strip_prefix('E') {
            builder.set_uversion(&symbol, version);
        }
        if status == "component" {
            builder.add_property(&symbol, EmojiProperty::Component);
        }
        if symbol.contains(ZWJ) {
            builder.add_property(&symbol, EmojiProperty::ZwjSequence);
        }
        if symbol.contains(KEYCAP) {
            builder.add_property(&symbol, EmojiProperty::KeycapSequence);
        }

        // a modifier following a base marks that base as modifiable
        let chars: Vec<char> = symbol.chars().collect();
        for (i, c) in chars.iter().enumerate() {
            if is_fitzpatrick_modifier(*c) {
                if i == 0 {
                    builder.add_property(&symbol, EmojiProperty::Modifier);
                } else if chars[i - 1] != ZWJ {
                    builder.add_property(&chars[i - 1].to_string(), EmojiProperty::ModifierBase);
                }
            }
        }
        loaded += 1;
    }

    log::debug!("Loaded {} emoji-test entries", loaded);
    Ok(loaded)
}

/// Load `emoji-data.txt` property ranges.
pub fn load_emoji_data(builder: &mut EmojiCatalogBuilder, path: impl AsRef<Path>) -> anyhow::Result<usize> {
    parse_emoji_data(builder, &read(path.as_ref())?)
}

pub(crate) fn parse_emoji_data(builder: &mut EmojiCatalogBuilder, content: &str) -> anyhow::Result<usize> {
    let mut assigned = 0;
    for line in content.lines() {
        let data = line.split('#').next().unwrap_or_default().trim();
        let Some((range, property)) = data.split_once(';') else {
            continue;
        };
        let property = EmojiProperty::from_data_name(property.trim());
        let (start, end) = parse_range(range)?;
        for c in (start..=end).filter_map(char::from_u32) {
            builder.add_property(&c.to_string(), property.clone());
            assigned += 1;
        }
    }
    log::debug!("Assigned {} emoji properties", assigned);
    Ok(assigned)
}

/// Descriptive words for a Unicode general category
pub fn general_category_labels(category: &str) -> &'static [&'static str] {
    match category {
        "Lu" => &["letter", "uppercase"],
        "Ll" => &["letter", "lowercase"],
        "Lt" => &["letter", "titlecase"],
        "Lm" => &["letter", "modifier"],
        "Lo" => &["letter", "other"],
        "Mn" | "Mc" | "Me" => &["mark"],
        "Nd" => &["number", "decimal digit"],
        "Nl" => &["number", "letter"],
        "No" => &["number", "other"],
        "Pc" => &["punctuation", "connector"],
        "Pd" => &["punctuation", "dash"],
        "Ps" => &["punctuation", "open"],
        "Pe" => &["punctuation", "close"],
        "Pi" => &["punctuation", "initial quote"],
        "Pf" => &["punctuation", "final quote"],
        "Po" => &["punctuation", "other"],
        "Sm" => &["symbol", "math"],
        "Sc" => &["symbol", "currency"],
        "Sk" => &["symbol", "modifier"],
        "So" => &["symbol", "other"],
        "Zs" => &["separator", "space"],
        _ => &[],
    }
}

/// Categories whose characters get their own catalog entries
fn is_searchable_category(category: &str) -> bool {
    matches!(category.chars().next(), Some('S' | 'P')) || category == "No" || category == "Nl"
}

/// Load `UnicodeData.txt`: names and general categories. Symbols and
/// punctuation become searchable entries; other characters only
/// contribute categories to emoji already known.
pub fn load_unicode_data(builder: &mut EmojiCatalogBuilder, path: impl AsRef<Path>) -> anyhow::Result<usize> {
    parse_unicode_data(builder, &read(path.as_ref())?)
}

pub(crate) fn parse_unicode_data(builder: &mut EmojiCatalogBuilder, content: &str) -> anyhow::Result<usize> {
    let mut loaded = 0;
    for line in content.lines() {
        let mut fields = line.split(';');
        let (Some(code), Some(name), Some(category)) = (fields.next(), fields.next(), fields.next()) else {
            continue;
        };
        // "<control>" and range markers have no usable name
        if name.starts_with('<') {
            continue;
        }
        let Some(c) = u32::from_str_radix(code.trim(), 16).ok().and_then(char::from_u32) else {
            continue;
        };
        let symbol = c.to_string();
        let emoji_form = format!("{}{}", c, VARIATION_SELECTOR_16);
        let known = builder.knows(&symbol);
        if !known && !is_searchable_category(category) && !builder.knows(&emoji_form) {
            continue;
        }

        let labels = general_category_labels(category);
        builder.add_ucategories(&symbol, labels);
        if builder.knows(&emoji_form) {
            builder.add_ucategories(&emoji_form, labels);
        }
        builder.add_names(&symbol, ENGLISH, &[name.to_lowercase()]);
        loaded += 1;
    }
    log::debug!("Loaded {} UnicodeData entries", loaded);
    Ok(loaded)
}

#[derive(Debug, Deserialize)]
struct AnnotationsFile {
    annotations: AnnotationsBody,
}

#[derive(Debug, Deserialize)]
struct AnnotationsBody {
    #[serde(default)]
    annotations: HashMap<String, Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    default: Vec<String>,
    #[serde(default)]
    tts: Vec<String>,
}

/// Load a CLDR JSON annotations file for `language`. The `tts` entry becomes
/// a name, the `default` entries become keywords.
pub fn load_cldr_annotations(
    builder: &mut EmojiCatalogBuilder,
    language: &str,
    path: impl AsRef<Path>,
) -> anyhow::Result<usize> {
    parse_cldr_annotations(builder, language, &read(path.as_ref())?)
}

pub(crate) fn parse_cldr_annotations(
    builder: &mut EmojiCatalogBuilder,
    language: &str,
    content: &str,
) -> anyhow::Result<usize> {
    let file: AnnotationsFile = serde_json::from_str(content).context("invalid CLDR annotations JSON")?;
    let mut loaded = 0;
    for (key, annotation) in file.annotations.annotations {
        // CLDR keys omit the emoji variation selector
        let qualified = format!("{}{}", key, VARIATION_SELECTOR_16);
        let symbol = if !builder.knows(&key) && builder.knows(&qualified) {
            qualified
        } else {
            key
        };
        builder.add_names(&symbol, language, &annotation.tts);
        let keywords: Vec<&String> = annotation
            .default
            .iter()
            .filter(|keyword| !annotation.tts.contains(keyword))
            .collect();
        builder.add_keywords(&symbol, language, &keywords);
        loaded += 1;
    }
    log::debug!("Loaded {} CLDR annotations for {}", loaded, language);
    Ok(loaded)
}

/// Build a catalog from a data directory holding `emoji-test.txt`,
/// `emoji-data.txt`, `UnicodeData.txt` and `annotations/<lang>.json`.
/// Missing files are skipped.
pub(crate) fn load_from_dir(dir: impl AsRef<Path>, languages: &[String]) -> anyhow::Result<EmojiCatalog> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(anyhow!("emoji data directory {} does not exist", dir.display()));
    }

    let mut builder = EmojiCatalogBuilder::new();

    let test_file = dir.join("emoji-test.txt");
    if test_file.exists() {
        load_emoji_test(&mut builder, &test_file)?;
    } else {
        log::debug!("No emoji-test.txt in {}", dir.display());
    }

    let data_file = dir.join("emoji-data.txt");
    if data_file.exists() {
        load_emoji_data(&mut builder, &data_file)?;
    }

    let unicode_file = dir.join("UnicodeData.txt");
    if unicode_file.exists() {
        load_unicode_data(&mut builder, &unicode_file)?;
    }

    for language in languages {
        let annotations = dir.join("annotations").join(format!("{}.json", language));
        if annotations.exists() {
            if let Err(e) = load_cldr_annotations(&mut builder, language, &annotations) {
                log::warn!("Skipping annotations for {}: {}", language, e);
            }
        }
    }

    let catalog = builder.build();
    log::info!("Emoji catalog loaded from {} ({} entries)", dir.display(), catalog.len());
    Ok(catalog)
}
