/*!
 * Eligibility rules for extracted units.
 *
 * Parsers extract everything that is syntactically prose. The filter then
 * decides which units are worth a translator call; the rest resolve to
 * `Skipped(reason)` and keep their original text.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::FilterConfig;
use crate::extraction::{Outcomes, SkipReason, TranslatableUnit, TranslationOutcome};
use crate::language_utils;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<?(?:https?|ftp)://\S+>?|\bwww\.\S+|\[[^\]]*\]\([^)]*\)|\b[\w.+-]+@[\w-]+\.[\w.]+\b")
        .expect("valid regex")
});

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(?:TODO|FIXME|NOTE|HACK|XXX|BUG|SAFETY)(?:\([^)]*\))?[:.!\s-]*$")
        .expect("valid regex")
});

/// Tool directives whose exact wording other programs depend on
static PRAGMA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^(?:
            -\*-.*-\*-
            | vim?:.*
            | (?:en)?coding[:=]\s*[\w.-]+
            | noqa\b.*
            | type:\s*ignore\b.*
            | (?:pylint|mypy|flake8|pyright|ruff|isort|fmt|yapf):.*
            | pragma:?\s.*
            | eslint(?:-disable|-enable)?(?:-next-line|-line)?\b.*
            | prettier-ignore\b.*
            | @ts-(?:ignore|expect-error|nocheck|check)\b.*
            | go:[a-z]+\b.*
            | nolint\b.*
            | clang-format\s+(?:on|off)\b.*
            | NOLINT\w*\b.*
            | \#?\s*(?:end)?region(?:\s+\w+)?
            | shellcheck\s+\w+=.*
            | @(?:formatter|format):(?:on|off)\b.*
        )$",
    )
    .expect("valid regex")
});

static CODE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^(?:
            .*[;{}]
            | [\w.:]+(?:\[[^\]]*\])*\s*(?:[-+*/%|&^]?=|==|!=|=>|->|<=|>=)\s*\S.*
            | [\w.:]+\(.*\)[?!]?
            | (?:def|fn|func|function|let\s+mut|import|from|use|pub\s+fn|\#include|\#define|\#if|\#endif|package)\s+[\w.:<>*\x22]+.*
            | return\s+[\w.]+(?:\(.*\))?
            | @\w+(?:\(.*\))?
            | </?\w+[^>]*>
        )$",
    )
    .expect("valid regex")
});

/// Decides per unit whether it is eligible for translation
#[derive(Debug, Clone)]
pub struct UnitFilter {
    config: FilterConfig,
    patterns: Vec<Regex>,
    source_language: String,
    target_language: String,
}

impl UnitFilter {
    pub fn new(config: &FilterConfig, source_language: &str, target_language: &str) -> Result<Self, regex::Error> {
        let patterns = config
            .skip_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config: config.clone(),
            patterns,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        })
    }

    /// Reason to skip `unit`, or `None` when it should be translated
    pub fn check(&self, unit: &TranslatableUnit) -> Option<SkipReason> {
        let text = unit.text.trim();

        if text.is_empty() {
            return Some(SkipReason::Empty);
        }
        if unit.context.priority < self.config.min_priority {
            return Some(SkipReason::BelowPriority);
        }
        if text.chars().count() < self.config.min_length {
            return Some(SkipReason::TooShort);
        }
        if PRAGMA_RE.is_match(text) {
            return Some(SkipReason::CodeLike);
        }
        if self.config.skip_urls && is_url_only(text) {
            return Some(SkipReason::Url);
        }
        if MARKER_RE.is_match(text) {
            return Some(SkipReason::MarkerOnly);
        }
        if !text.chars().any(char::is_alphabetic) {
            return Some(SkipReason::CodeLike);
        }
        if self.config.skip_code_like && is_code_like(text) {
            return Some(SkipReason::CodeLike);
        }
        if self.patterns.iter().any(|p| p.is_match(text)) {
            return Some(SkipReason::Pattern);
        }
        let prose = URL_RE.replace_all(text, "");
        if language_utils::is_already_in_language(&prose, &self.source_language, &self.target_language) {
            return Some(SkipReason::AlreadyTargetLanguage);
        }
        None
    }

    /// `Skipped` outcomes for every ineligible unit
    pub fn apply(&self, units: &[TranslatableUnit]) -> Outcomes {
        let mut skipped = Outcomes::new();
        for unit in units {
            if let Some(reason) = self.check(unit) {
                debug!("Skipping unit {} at line {}: {}", unit.id, unit.span.line, reason);
                skipped.insert(unit.id, TranslationOutcome::Skipped(reason));
            }
        }
        skipped
    }
}

/// Text made only of links, addresses and punctuation
fn is_url_only(text: &str) -> bool {
    if !URL_RE.is_match(text) {
        return false;
    }
    let rest = URL_RE.replace_all(text, "");
    !rest.chars().any(char::is_alphabetic)
}

/// Commented-out code: every non-empty line reads as a statement
fn is_code_like(text: &str) -> bool {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    if lines.peek().is_none() {
        return false;
    }
    lines.all(|line| {
        // Natural-language scripts outside ASCII are prose even next to punctuation
        let foreign = line.chars().any(|c| c.is_alphabetic() && !c.is_ascii());
        if foreign {
            return false;
        }
        let significant = line.chars().filter(|c| !c.is_whitespace()).count();
        let letters = line.chars().filter(|c| c.is_ascii_alphabetic()).count();
        letters * 3 < significant || CODE_LINE_RE.is_match(line)
    })
}
