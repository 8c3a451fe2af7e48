/*!
 * Extraction and reconstruction of translatable text.
 *
 * Each file family has one parser implementing `FormatParser`. `ParserKind`
 * is the closed dispatch table the dispatcher resolves once per file: the
 * first parser (in priority order) that accepts the path and content wins.
 *
 * - `model`: units, spans, outcomes
 * - `reconstruct`: shared span splicing
 * - `generic`, `python`, `markdown`, `notebook`, `config`: the parsers
 */

pub mod comments;
pub mod config;
pub mod generic;
pub mod markdown;
pub mod model;
pub mod notebook;
pub mod python;
pub mod reconstruct;
pub mod text;

use std::path::Path;

use crate::errors::{ParseError, ReconstructionError};

pub use config::{ConfigDialect, ConfigParser};
pub use generic::GenericCommentParser;
pub use markdown::MarkdownParser;
pub use model::{
    Outcomes, ParseResult, Priority, SkipReason, Span, TranslatableUnit, TranslationOutcome,
    UnitContext, UnitId, UnitKind,
};
pub use notebook::NotebookParser;
pub use python::PythonParser;

/// Shared contract of every format parser
pub trait FormatParser {
    fn name(&self) -> &'static str;

    fn can_parse(&self, path: &Path, content: &str) -> bool;

    /// Tokenize `content` into ordered, non-overlapping units
    fn extract(&self, content: &str) -> Result<ParseResult, ParseError>;

    /// Rebuild `content` with resolved units substituted in place
    fn reconstruct(
        &self,
        content: &str,
        units: &[TranslatableUnit],
        outcomes: &Outcomes,
    ) -> Result<String, ReconstructionError> {
        reconstruct::splice(content, units, outcomes)
    }
}

/// Closed set of parsers, in selection priority order
#[derive(Debug, Clone, Copy)]
pub enum ParserKind {
    Notebook(NotebookParser),
    Python(PythonParser),
    Markdown(MarkdownParser),
    Config(ConfigParser),
    Generic(GenericCommentParser),
}

impl ParserKind {
    /// Select the parser for a file, specific formats before the generic fallback
    pub fn detect(path: &Path, content: &str) -> Option<Self> {
        if NotebookParser.can_parse(path, content) {
            return Some(Self::Notebook(NotebookParser));
        }
        if PythonParser.can_parse(path, content) {
            return Some(Self::Python(PythonParser));
        }
        if MarkdownParser.can_parse(path, content) {
            return Some(Self::Markdown(MarkdownParser));
        }
        if let Some(parser) = ConfigParser::for_path(path) {
            return Some(Self::Config(parser));
        }
        GenericCommentParser::for_path(path, content).map(Self::Generic)
    }

    /// Whether any parser accepts the path by name alone
    pub fn supports_path(path: &Path) -> bool {
        Self::detect(path, "").is_some()
    }

    pub fn parser(&self) -> &dyn FormatParser {
        match self {
            Self::Notebook(parser) => parser,
            Self::Python(parser) => parser,
            Self::Markdown(parser) => parser,
            Self::Config(parser) => parser,
            Self::Generic(parser) => parser,
        }
    }

    pub fn name(&self) -> &'static str {
        self.parser().name()
    }

    pub fn extract(&self, content: &str) -> Result<ParseResult, ParseError> {
        self.parser().extract(content)
    }

    pub fn reconstruct(
        &self,
        content: &str,
        units: &[TranslatableUnit],
        outcomes: &Outcomes,
    ) -> Result<String, ReconstructionError> {
        self.parser().reconstruct(content, units, outcomes)
    }
}
