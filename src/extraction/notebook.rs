/*!
 * Jupyter notebooks.
 *
 * The document is deserialized with borrowed `RawValue`s so every cell's
 * `source` can be located byte-exactly in the file. Each source is decoded
 * with a map back to raw offsets, run through the Markdown rule (markdown
 * cells) or the kernel's comment rule (code cells), and only cells that
 * received a translation are re-encoded on the way out. Everything else,
 * outputs and metadata included, is copied verbatim.
 */

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::errors::{ParseError, ReconstructionError};
use crate::extraction::generic::{comment_units, syntax_for_language};
use crate::extraction::markdown::MarkdownParser;
use crate::extraction::model::{
    CellLocation, Outcomes, ParseResult, Span, TranslatableUnit, UnitKind,
};
use crate::extraction::python::PythonParser;
use crate::extraction::reconstruct::{splice, validate_spans};
use crate::extraction::text::LineIndex;
use crate::extraction::FormatParser;

const PARSER_NAME: &str = "notebook";

#[derive(Deserialize)]
struct RawNotebook<'a> {
    #[serde(borrow)]
    cells: Vec<RawCell<'a>>,
    #[serde(default, borrow)]
    metadata: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct RawCell<'a> {
    cell_type: String,
    #[serde(borrow)]
    source: &'a RawValue,
}

#[derive(Deserialize, Default)]
struct NotebookMetadata {
    #[serde(default)]
    kernelspec: Option<KernelSpec>,
    #[serde(default)]
    language_info: Option<LanguageInfo>,
}

#[derive(Deserialize)]
struct KernelSpec {
    #[serde(default)]
    language: Option<String>,
}

#[derive(Deserialize)]
struct LanguageInfo {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceShape {
    String,
    Lines,
}

/// A cell's decoded source and where it lives in the file
#[derive(Debug)]
struct CellSource {
    index: usize,
    cell_type: String,
    shape: SourceShape,
    /// Raw byte range of the `source` value
    raw_start: usize,
    raw_end: usize,
    /// Array layout: text between `[` and the first element, between
    /// elements, and between the last element and `]`
    lead: String,
    separator: String,
    trail: String,
    text: String,
    /// Raw offset of every decoded byte
    offsets: Vec<usize>,
}

#[derive(Debug)]
struct DecodedString {
    text: String,
    offsets: Vec<usize>,
}

fn offset_in(content: &str, part: &str) -> usize {
    part.as_ptr() as usize - content.as_ptr() as usize
}

fn malformed(message: impl Into<String>) -> ParseError {
    ParseError::malformed(PARSER_NAME, message)
}

fn hex4(raw: &str, at: usize) -> Result<u32, ParseError> {
    raw.get(at..at + 4)
        .and_then(|digits| u32::from_str_radix(digits, 16).ok())
        .ok_or_else(|| malformed("invalid \\u escape"))
}

/// Decode one JSON string literal, recording the raw offset of each output byte
fn decode_json_string(raw: &str, base: usize) -> Result<DecodedString, ParseError> {
    let bytes = raw.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'"' || bytes[bytes.len() - 1] != b'"' {
        return Err(malformed("cell source is not a string"));
    }
    let end = bytes.len() - 1;
    let mut text = String::with_capacity(end);
    let mut offsets = Vec::with_capacity(end);
    let mut i = 1;

    while i < end {
        if bytes[i] == b'\\' {
            let (decoded, consumed) = match bytes.get(i + 1) {
                Some(b'n') => ('\n', 2),
                Some(b't') => ('\t', 2),
                Some(b'r') => ('\r', 2),
                Some(b'b') => ('\u{8}', 2),
                Some(b'f') => ('\u{c}', 2),
                Some(b'"') => ('"', 2),
                Some(b'\\') => ('\\', 2),
                Some(b'/') => ('/', 2),
                Some(b'u') => {
                    let high = hex4(raw, i + 2)?;
                    if (0xD800..0xDC00).contains(&high) {
                        if raw.get(i + 6..i + 8) != Some("\\u") {
                            return Err(malformed("unpaired surrogate"));
                        }
                        let low = hex4(raw, i + 8)?;
                        let code = 0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
                        (char::from_u32(code).ok_or_else(|| malformed("invalid surrogate pair"))?, 12)
                    } else {
                        (char::from_u32(high).ok_or_else(|| malformed("invalid code point"))?, 6)
                    }
                }
                _ => return Err(malformed("invalid escape")),
            };
            text.push(decoded);
            offsets.extend(std::iter::repeat_n(base + i, decoded.len_utf8()));
            i += consumed;
        } else {
            let width = match bytes[i] {
                b if b < 0x80 => 1,
                b if b >= 0xF0 => 4,
                b if b >= 0xE0 => 3,
                _ => 2,
            };
            let piece = raw.get(i..i + width).ok_or_else(|| malformed("broken UTF-8 in string"))?;
            text.push_str(piece);
            offsets.extend((0..width).map(|k| base + i + k));
            i += width;
        }
    }
    offsets.push(base + end);
    Ok(DecodedString { text, offsets })
}

fn load_cells(content: &str) -> Result<(Vec<CellSource>, Option<String>), ParseError> {
    let notebook: RawNotebook<'_> =
        serde_json::from_str(content).map_err(|e| malformed(format!("invalid notebook JSON: {}", e)))?;

    let language = notebook
        .metadata
        .and_then(|raw| serde_json::from_str::<NotebookMetadata>(raw.get()).ok())
        .and_then(|meta| {
            meta.kernelspec
                .and_then(|k| k.language)
                .or_else(|| meta.language_info.and_then(|l| l.name))
        });

    let mut cells = Vec::with_capacity(notebook.cells.len());
    for (index, cell) in notebook.cells.iter().enumerate() {
        let raw = cell.source.get();
        let raw_start = offset_in(content, raw);
        let raw_end = raw_start + raw.len();

        let source = if raw.starts_with('[') {
            let elements: Vec<&RawValue> = serde_json::from_str(raw)
                .map_err(|e| malformed(format!("cell {} source: {}", index, e)))?;
            let mut text = String::new();
            let mut offsets = Vec::new();
            let mut bounds = Vec::with_capacity(elements.len());
            for element in &elements {
                let element_raw = element.get();
                let start = offset_in(content, element_raw);
                let mut decoded = decode_json_string(element_raw, start)?;
                decoded.offsets.pop();
                text.push_str(&decoded.text);
                offsets.extend(decoded.offsets);
                bounds.push((start, start + element_raw.len()));
            }
            offsets.push(bounds.last().map(|(_, end)| end - 1).unwrap_or(raw_end - 1));

            let (lead, separator, trail) = match (bounds.first(), bounds.last()) {
                (Some(&(first_start, first_end)), Some(&(_, last_end))) => {
                    let separator = match bounds.get(1) {
                        Some(&(second_start, _)) => content[first_end..second_start].to_string(),
                        None => format!(",{}", &content[raw_start + 1..first_start]),
                    };
                    (
                        content[raw_start + 1..first_start].to_string(),
                        separator,
                        content[last_end..raw_end - 1].to_string(),
                    )
                }
                _ => (String::new(), ", ".to_string(), String::new()),
            };
            CellSource {
                index,
                cell_type: cell.cell_type.clone(),
                shape: SourceShape::Lines,
                raw_start,
                raw_end,
                lead,
                separator,
                trail,
                text,
                offsets,
            }
        } else {
            let decoded = decode_json_string(raw, raw_start)?;
            CellSource {
                index,
                cell_type: cell.cell_type.clone(),
                shape: SourceShape::String,
                raw_start,
                raw_end,
                lead: String::new(),
                separator: String::new(),
                trail: String::new(),
                text: decoded.text,
                offsets: decoded.offsets,
            }
        };
        cells.push(source);
    }
    Ok((cells, language))
}

fn cell_units(cell: &CellSource, language: Option<&str>) -> Vec<TranslatableUnit> {
    match cell.cell_type.as_str() {
        "markdown" => {
            let mut units = MarkdownParser::prose_units(&cell.text);
            for unit in &mut units {
                unit.kind = UnitKind::NotebookMarkdownCell;
            }
            units
        }
        "code" => {
            let language = language.unwrap_or("python");
            if language.eq_ignore_ascii_case("python") {
                PythonParser::comment_units(&cell.text, UnitKind::NotebookCodeComment).unwrap_or_else(|e| {
                    debug!("Skipping comments of notebook cell {}: {}", cell.index, e);
                    Vec::new()
                })
            } else if let Some(syntax) = syntax_for_language(language) {
                let lines = LineIndex::new(&cell.text);
                comment_units(
                    &cell.text,
                    syntax,
                    &lines,
                    UnitKind::NotebookCodeComment,
                    UnitKind::NotebookCodeComment,
                )
            } else {
                debug!("No comment syntax for notebook language {}", language);
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Re-encode a cell's source value in its original shape
fn encode_source(cell: &CellSource, text: &str) -> Result<String, ReconstructionError> {
    let encode = |value: &str| {
        serde_json::to_string(value).map_err(|e| ReconstructionError::InvariantViolation(format!("cannot encode cell source: {}", e)))
    };
    match cell.shape {
        SourceShape::String => encode(text),
        SourceShape::Lines => {
            let elements = text
                .split_inclusive('\n')
                .map(encode)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}{}{}]", cell.lead, elements.join(&cell.separator), cell.trail))
        }
    }
}

/// Jupyter notebook parser
#[derive(Debug, Clone, Copy, Default)]
pub struct NotebookParser;

impl FormatParser for NotebookParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn can_parse(&self, path: &Path, _content: &str) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ipynb"))
    }

    fn extract(&self, content: &str) -> Result<ParseResult, ParseError> {
        let (cells, language) = load_cells(content)?;
        let lines = LineIndex::new(content);
        let mut units = Vec::new();

        for cell in &cells {
            for mut unit in cell_units(cell, language.as_deref()) {
                let inner = unit.span;
                let start = cell.offsets[inner.start];
                let end = cell.offsets[inner.end.saturating_sub(1).max(inner.start)] + 1;
                unit.span = Span::new(start, end, lines.line_of(start));
                unit.context.cell = Some(CellLocation {
                    index: cell.index,
                    markdown: cell.cell_type == "markdown",
                    inner_start: inner.start,
                    inner_end: inner.end,
                });
                units.push(unit);
            }
        }
        Ok(ParseResult::new(self.name(), content, units))
    }

    fn reconstruct(
        &self,
        content: &str,
        units: &[TranslatableUnit],
        outcomes: &Outcomes,
    ) -> Result<String, ReconstructionError> {
        validate_spans(content, units)?;
        let (cells, _) = load_cells(content).map_err(|e| ReconstructionError::InvariantViolation(e.to_string()))?;

        let mut by_cell: HashMap<usize, Vec<TranslatableUnit>> = HashMap::new();
        for unit in units {
            let Some(location) = unit.context.cell else {
                return Err(ReconstructionError::InvariantViolation(format!(
                    "notebook unit {} has no cell location",
                    unit.id
                )));
            };
            let mut inner = unit.clone();
            inner.span = Span::new(location.inner_start, location.inner_end, unit.span.line);
            by_cell.entry(location.index).or_default().push(inner);
        }

        let mut output = String::with_capacity(content.len());
        let mut cursor = 0;
        for cell in &cells {
            let Some(cell_units) = by_cell.get(&cell.index) else {
                continue;
            };
            let changed = cell_units
                .iter()
                .any(|unit| outcomes.get(&unit.id).and_then(|o| o.replacement()).is_some());
            if !changed {
                continue;
            }
            let text = splice(&cell.text, cell_units, outcomes)?;
            output.push_str(&content[cursor..cell.raw_start]);
            output.push_str(&encode_source(cell, &text)?);
            cursor = cell.raw_end;
        }
        output.push_str(&content[cursor..]);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::model::{TranslationOutcome, UnitId};

    const NOTEBOOK: &str = r##"{
 "cells": [
  {
   "cell_type": "markdown",
   "metadata": {"tags": ["intro"]},
   "source": [
    "# Analyse der Daten\n",
    "\n",
    "Wir laden die Datei."
   ]
  },
  {
   "cell_type": "code",
   "execution_count": 3,
   "metadata": {},
   "outputs": [{"name": "stdout", "text": ["# not a comment\n"]}],
   "source": "import pandas as pd  # Bibliothek laden\ndf = pd.read_csv(\"a#b.csv\")"
  }
 ],
 "metadata": {"kernelspec": {"language": "python", "name": "python3"}},
 "nbformat": 4,
 "nbformat_minor": 5
}
"##;

    #[test]
    fn test_decodeJsonString_shouldMapOffsets() {
        let raw = r#""a\nü\u00e9""#;
        let decoded = decode_json_string(raw, 10).unwrap();
        assert_eq!(decoded.text, "a\nüé");
        assert_eq!(decoded.offsets[0], 11);
        assert_eq!(decoded.offsets[1], 12);
        assert_eq!(decoded.offsets[2], 14);
        assert_eq!(*decoded.offsets.last().unwrap(), 10 + raw.len() - 1);
    }

    #[test]
    fn test_decodeJsonString_shouldHandleSurrogatePairs() {
        let decoded = decode_json_string(r#""\ud83d\ude00""#, 0).unwrap();
        assert_eq!(decoded.text, "\u{1F600}");
    }

    #[test]
    fn test_extract_shouldScopeUnitsToCells() {
        let result = NotebookParser.extract(NOTEBOOK).unwrap();
        let summary: Vec<(UnitKind, &str, usize)> = result
            .units
            .iter()
            .map(|u| (u.kind, u.text.as_str(), u.context.cell.unwrap().index))
            .collect();
        assert_eq!(
            summary,
            vec![
                (UnitKind::NotebookMarkdownCell, "Analyse der Daten", 0),
                (UnitKind::NotebookMarkdownCell, "Wir laden die Datei.", 0),
                (UnitKind::NotebookCodeComment, "Bibliothek laden", 1),
            ]
        );
        assert!(!result.units.iter().any(|u| u.text.contains("not a comment")));
    }

    #[test]
    fn test_reconstruct_withoutTranslations_shouldBeIdentity() {
        let result = NotebookParser.extract(NOTEBOOK).unwrap();
        let output = NotebookParser.reconstruct(NOTEBOOK, &result.units, &Outcomes::new()).unwrap();
        assert_eq!(output, NOTEBOOK);
    }

    #[test]
    fn test_reconstruct_shouldRewriteOnlyTranslatedCells() {
        let result = NotebookParser.extract(NOTEBOOK).unwrap();
        let mut outcomes = Outcomes::new();
        outcomes.insert(UnitId(0), TranslationOutcome::Translated("Data analysis".into()));
        outcomes.insert(UnitId(2), TranslationOutcome::Translated("load \"library\"".into()));

        let output = NotebookParser.reconstruct(NOTEBOOK, &result.units, &outcomes).unwrap();
        assert!(output.contains("    \"# Data analysis\\n\",\n    \"\\n\",\n    \"Wir laden die Datei.\"\n   ]"));
        assert!(output.contains(r#""source": "import pandas as pd  # load \"library\"\ndf = pd.read_csv(\"a#b.csv\")""#));
        assert!(output.contains(r##""outputs": [{"name": "stdout", "text": ["# not a comment\n"]}]"##));
        assert!(output.contains(r#""metadata": {"tags": ["intro"]}"#));

        let reparsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(reparsed["cells"].as_array().unwrap().len(), 2);
        assert_eq!(reparsed["nbformat"], 4);
    }

    #[test]
    fn test_extract_invalidJson_shouldBeMalformed() {
        let err = NotebookParser.extract("{\"cells\": [").unwrap_err();
        assert!(matches!(err, ParseError::MalformedInput { parser: "notebook", .. }));
    }

    #[test]
    fn test_extract_nonPythonKernel_shouldUseKernelSyntax() {
        let notebook = r#"{"cells": [{"cell_type": "code", "source": "x <- 1 # assign value"}], "metadata": {"kernelspec": {"language": "R"}}}"#;
        let result = NotebookParser.extract(notebook).unwrap();
        assert_eq!(result.units.len(), 1);
        assert_eq!(result.units[0].text, "assign value");
    }
}
