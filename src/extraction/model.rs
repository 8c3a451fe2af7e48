/*!
 * Unit model shared by every format parser.
 *
 * A `TranslatableUnit` points at the translatable region of a file by byte
 * span. Delimiters and per-line decoration (comment markers, gutters, quotes)
 * sit outside the span, which keeps reconstruction a plain splice.
 */

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::TranslateError;

/// Identifier of a unit inside one extraction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub usize);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    LineComment,
    BlockComment,
    Docstring,
    MarkdownProse,
    NotebookMarkdownCell,
    NotebookCodeComment,
    ConfigValue,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::LineComment => "line-comment",
            UnitKind::BlockComment => "block-comment",
            UnitKind::Docstring => "docstring",
            UnitKind::MarkdownProse => "markdown-prose",
            UnitKind::NotebookMarkdownCell => "notebook-markdown-cell",
            UnitKind::NotebookCodeComment => "notebook-code-comment",
            UnitKind::ConfigValue => "config-value",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn all() -> [UnitKind; 7] {
        [
            UnitKind::LineComment,
            UnitKind::BlockComment,
            UnitKind::Docstring,
            UnitKind::MarkdownProse,
            UnitKind::NotebookMarkdownCell,
            UnitKind::NotebookCodeComment,
            UnitKind::ConfigValue,
        ]
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How important a unit is to translate. Ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// Half-open byte range into the decoded content, plus the 1-based line of `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize) -> Self {
        Self { start, end, line }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How rendered text must be escaped to stay inside its delimiters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum EscapeRule {
    #[default]
    None,
    /// Python string body closed by `quote` repeated (three times when `triple`)
    PythonString { quote: char, triple: bool, raw: bool },
    /// Block comment closed by `terminator`; `opener` is set when comments nest
    BlockComment {
        terminator: String,
        #[serde(default)]
        opener: Option<String>,
    },
    /// Quoted config value; `doubling` escapes the quote by repeating it
    QuotedValue { quote: char, doubling: bool },
    /// Markdown table cell
    TableCell,
}

/// Where a unit sits inside a notebook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLocation {
    pub index: usize,
    pub markdown: bool,
    /// Span inside the decoded cell source
    pub inner_start: usize,
    pub inner_end: usize,
}

/// Everything needed to put a translation back where the text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UnitContext {
    /// Comment marker or list/quote decoration for display (`#`, `//`, `>`, ...)
    pub prefix: String,
    /// Leading whitespace of the line the unit starts on
    pub indentation: String,
    /// Inserted between lines of a multi-line translation
    pub continuation: String,
    /// Collapse translated line breaks into spaces
    pub single_line: bool,
    pub escape: EscapeRule,
    pub priority: Priority,
    /// Info string of the nearest preceding fenced block (Markdown)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fence_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<CellLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatableUnit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub span: Span,
    pub text: String,
    pub context: UnitContext,
}

/// Ordered units of one file together with the content they index into
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub parser: &'static str,
    pub units: Vec<TranslatableUnit>,
    pub content: String,
}

impl ParseResult {
    pub fn new(parser: &'static str, content: &str, mut units: Vec<TranslatableUnit>) -> Self {
        units.sort_by_key(|unit| unit.span.start);
        for (index, unit) in units.iter_mut().enumerate() {
            unit.id = UnitId(index);
        }
        Self {
            parser,
            units,
            content: content.to_string(),
        }
    }

    /// The original bytes covered by a unit
    pub fn source_of(&self, unit: &TranslatableUnit) -> &str {
        self.content
            .get(unit.span.start..unit.span.end)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Empty,
    TooShort,
    Url,
    CodeLike,
    MarkerOnly,
    Pattern,
    AlreadyTargetLanguage,
    BelowPriority,
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::Empty => "empty",
            SkipReason::TooShort => "too short",
            SkipReason::Url => "url",
            SkipReason::CodeLike => "code-like",
            SkipReason::MarkerOnly => "marker only",
            SkipReason::Pattern => "skip pattern",
            SkipReason::AlreadyTargetLanguage => "already in target language",
            SkipReason::BelowPriority => "below priority",
            SkipReason::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Terminal state of one unit after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated(String),
    CacheHit(String),
    Skipped(SkipReason),
    Failed(TranslateError),
}

impl TranslationOutcome {
    /// Replacement text, if the unit resolved to one
    pub fn replacement(&self) -> Option<&str> {
        match self {
            TranslationOutcome::Translated(text) | TranslationOutcome::CacheHit(text) => {
                Some(text)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TranslationOutcome::Translated(_) => "translated",
            TranslationOutcome::CacheHit(_) => "cache-hit",
            TranslationOutcome::Skipped(_) => "skipped",
            TranslationOutcome::Failed(_) => "failed",
        }
    }
}

pub type Outcomes = HashMap<UnitId, TranslationOutcome>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parseResult_new_shouldSortAndRenumber() {
        let unit = |start: usize| TranslatableUnit {
            id: UnitId(99),
            kind: UnitKind::LineComment,
            span: Span::new(start, start + 1, 1),
            text: "x".into(),
            context: UnitContext::default(),
        };
        let result = ParseResult::new("test", "abcdef", vec![unit(4), unit(0), unit(2)]);
        let starts: Vec<usize> = result.units.iter().map(|u| u.span.start).collect();
        let ids: Vec<usize> = result.units.iter().map(|u| u.id.0).collect();
        assert_eq!(starts, vec![0, 2, 4]);
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_unitKind_parse_shouldRoundTripLabels() {
        for kind in UnitKind::all() {
            assert_eq!(UnitKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(UnitKind::parse("nope"), None);
    }

    #[test]
    fn test_priority_shouldOrderLowToHigh() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
    }
}
