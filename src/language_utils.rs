//! Language utilities for ISO language code handling
//!
//! This module validates and normalizes the language codes used in cache
//! keys and translator calls, and detects the writing script of a piece of
//! text so already-translated units can be recognized.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Source language placeholder meaning "let the translator detect it"
pub const AUTO_LANGUAGE: &str = "auto";

/// ISO 639-2/B codes that differ from their ISO 639-2/T form
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

pub fn is_auto(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(AUTO_LANGUAGE)
}

/// Primary subtag of a BCP 47 style tag: `zh-CN` and `pt_BR` become `zh`, `pt`
fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn lookup(code: &str) -> Option<Language> {
    let primary = primary_subtag(code);
    match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => {
            let part2t = PART2B_TO_PART2T
                .iter()
                .find(|(b, _)| *b == primary)
                .map(|(_, t)| *t)
                .unwrap_or(primary.as_str());
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Validate a language code (ISO 639-1, ISO 639-2/T or /B, optional region subtag)
pub fn validate_language_code(code: &str) -> Result<()> {
    lookup(code)
        .map(|_| ())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Normalize a language code to ISO 639-1 (2-letter) format if possible.
/// Falls back to ISO 639-3 if no ISO 639-1 code exists. `auto` passes through.
pub fn normalize_language(code: &str) -> Result<String> {
    if is_auto(code) {
        return Ok(AUTO_LANGUAGE.to_string());
    }

    let lang = lookup(code).ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))?;
    Ok(lang
        .to_639_1()
        .map(str::to_string)
        .unwrap_or_else(|| lang.to_639_3().to_string()))
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (lookup(code1), lookup(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    if is_auto(code) {
        return Ok("auto-detected".to_string());
    }
    let lang = lookup(code).ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;
    Ok(lang.to_name().to_string())
}

/// Writing systems distinguishable from code points alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Latin,
    Han,
    Kana,
    Hangul,
    Cyrillic,
    Greek,
    Arabic,
    Hebrew,
    Devanagari,
    Thai,
}

fn script_of(c: char) -> Option<Script> {
    let script = match c as u32 {
        0x0041..=0x005A | 0x0061..=0x007A | 0x00C0..=0x024F | 0x1E00..=0x1EFF => Script::Latin,
        0x0370..=0x03FF | 0x1F00..=0x1FFF => Script::Greek,
        0x0400..=0x052F => Script::Cyrillic,
        0x0590..=0x05FF => Script::Hebrew,
        0x0600..=0x06FF | 0x0750..=0x077F => Script::Arabic,
        0x0900..=0x097F => Script::Devanagari,
        0x0E00..=0x0E7F => Script::Thai,
        0x3040..=0x30FF | 0x31F0..=0x31FF => Script::Kana,
        0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF => Script::Hangul,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2FA1F => Script::Han,
        _ => return None,
    };
    Some(script)
}

/// Script with the most letters in `text`, if any letter is recognized
pub fn dominant_script(text: &str) -> Option<Script> {
    let mut counts: Vec<(Script, usize)> = Vec::new();
    for script in text.chars().filter_map(script_of) {
        match counts.iter_mut().find(|(s, _)| *s == script) {
            Some((_, n)) => *n += 1,
            None => counts.push((script, 1)),
        }
    }
    // Kana marks Japanese even when kanji outnumber it
    if counts.iter().any(|(s, _)| *s == Script::Kana) {
        return Some(Script::Kana);
    }
    counts.into_iter().max_by_key(|(_, n)| *n).map(|(s, _)| s)
}

/// Script a language is normally written in, where that is unambiguous
pub fn script_for_language(code: &str) -> Option<Script> {
    let lang = lookup(code)?;
    let code = lang.to_639_1().unwrap_or_else(|| lang.to_639_3());
    let script = match code {
        "zh" => Script::Han,
        "ja" => Script::Kana,
        "ko" => Script::Hangul,
        "ru" | "uk" | "be" | "bg" | "mk" | "sr" | "kk" | "ky" | "mn" | "tg" => Script::Cyrillic,
        "el" => Script::Greek,
        "ar" | "fa" | "ur" | "ps" => Script::Arabic,
        "he" | "yi" => Script::Hebrew,
        "hi" | "mr" | "ne" | "sa" => Script::Devanagari,
        "th" => Script::Thai,
        "en" | "de" | "fr" | "es" | "it" | "pt" | "nl" | "sv" | "da" | "no" | "nb" | "nn"
        | "fi" | "pl" | "cs" | "sk" | "sl" | "hr" | "hu" | "ro" | "tr" | "id" | "ms"
        | "vi" | "ca" | "eu" | "gl" | "et" | "lv" | "lt" | "is" | "ga" | "cy" | "sq"
        | "af" | "sw" | "tl" | "eo" | "la" => Script::Latin,
        _ => return None,
    };
    Some(script)
}

/// Whether `text` is evidently already written for `target_language`.
///
/// Only decidable when source and target use different scripts. An `auto`
/// source counts as different, so text in the target's script is left alone.
pub fn is_already_in_language(text: &str, source_language: &str, target_language: &str) -> bool {
    let Some(target_script) = script_for_language(target_language) else {
        return false;
    };
    if !is_auto(source_language) {
        match script_for_language(source_language) {
            Some(source_script) if source_script != target_script => {}
            _ => return false,
        }
    }
    dominant_script(text) == Some(target_script)
}
