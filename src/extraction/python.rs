/*!
 * Python comments and docstrings.
 *
 * A light tokenizer tracks string literals, bracket depth and logical lines.
 * A string that forms a whole statement becomes a docstring when it opens a
 * module, `def` or `class` body; elsewhere a triple-quoted statement is kept
 * as a low-priority block comment.
 */

use std::path::Path;

use crate::errors::ParseError;
use crate::extraction::comments::{group_line_comments, LineComment};
use crate::extraction::model::{
    EscapeRule, ParseResult, Priority, Span, TranslatableUnit, UnitContext, UnitId, UnitKind,
};
use crate::extraction::text::{
    leading_whitespace, line_end_of, line_ending_near, line_start_of, strip_continuations, trim_range,
    LineIndex,
};
use crate::extraction::FormatParser;

const PARSER_NAME: &str = "python";

/// A string literal located by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
struct PyString {
    start: usize,
    body_start: usize,
    body_end: usize,
    /// Where scanning resumes
    end: usize,
    terminated: bool,
    quote: char,
    triple: bool,
    prefix: String,
}

impl PyString {
    fn can_be_docstring(&self) -> bool {
        self.terminated && !self.prefix.contains(['f', 'F', 'b', 'B'])
    }

    fn is_raw(&self) -> bool {
        self.prefix.contains(['r', 'R'])
    }
}

#[derive(Debug, Default)]
struct PyScan {
    comments: Vec<LineComment>,
    docstrings: Vec<PyString>,
    bare_strings: Vec<PyString>,
}

#[derive(Debug, Default)]
struct LogicalLine {
    has_code: bool,
    first_word: Option<String>,
    last_char: Option<char>,
    strings: Vec<PyString>,
}

fn is_identifier_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80
}

/// Length of a string prefix (`r`, `b`, `rb`, `f`, ...) directly followed by a quote
fn string_prefix_len(bytes: &[u8], i: usize) -> Option<usize> {
    if i > 0 && is_identifier_char(bytes[i - 1]) {
        return None;
    }
    let mut len = 0;
    while len < 2 && i + len < bytes.len() && matches!(bytes[i + len], b'r' | b'R' | b'b' | b'B' | b'u' | b'U' | b'f' | b'F') {
        len += 1;
    }
    match bytes.get(i + len) {
        Some(b'"') | Some(b'\'') if len > 0 => Some(len),
        _ => None,
    }
}

fn scan_python(content: &str, lines: &LineIndex) -> Result<PyScan, ParseError> {
    let bytes = content.as_bytes();
    let mut scan = PyScan::default();
    let mut line = LogicalLine::default();
    let mut expect_docstring = true;
    let mut depth = 0usize;
    let mut i = 0;

    if content.starts_with("#!") {
        i = line_end_of(content, 0);
    }

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'#' => {
                let line_start = line_start_of(content, i);
                let line_end = line_end_of(content, i);
                scan.comments.push(LineComment {
                    marker_start: i,
                    marker: "#".to_string(),
                    full_line: content[line_start..i].trim().is_empty(),
                    line: lines.line_of(i),
                    line_start,
                    line_end,
                });
                i = line_end;
            }
            b'\\' if matches!(bytes.get(i + 1), Some(b'\n')) => i += 2,
            b'\\' if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') => i += 3,
            b'\n' => {
                if depth == 0 {
                    finish_line(&mut line, &mut expect_docstring, &mut scan);
                }
                i += 1;
            }
            b' ' | b'\t' | b'\r' | b'\x0c' => i += 1,
            _ => {
                let prefix_len = if c == b'"' || c == b'\'' {
                    Some(0)
                } else {
                    string_prefix_len(bytes, i)
                };
                if let Some(prefix_len) = prefix_len {
                    let literal = read_string(content, i, prefix_len, lines)?;
                    i = literal.end;
                    line.last_char = Some(literal.quote);
                    line.strings.push(literal);
                    continue;
                }

                if !line.has_code && line.strings.is_empty() && (c.is_ascii_alphabetic() || c == b'_') {
                    let word_end = (i..bytes.len())
                        .find(|&j| !is_identifier_char(bytes[j]))
                        .unwrap_or(bytes.len());
                    line.first_word = Some(content[i..word_end].to_string());
                }
                match c {
                    b'(' | b'[' | b'{' => depth += 1,
                    b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                    _ => {}
                }
                line.has_code = true;
                line.last_char = Some(c as char);
                i += 1;
            }
        }
    }
    finish_line(&mut line, &mut expect_docstring, &mut scan);
    Ok(scan)
}

fn read_string(content: &str, start: usize, prefix_len: usize, lines: &LineIndex) -> Result<PyString, ParseError> {
    let bytes = content.as_bytes();
    let quote_at = start + prefix_len;
    let quote = bytes[quote_at];
    let triple = bytes.get(quote_at + 1) == Some(&quote) && bytes.get(quote_at + 2) == Some(&quote);
    let body_start = quote_at + if triple { 3 } else { 1 };

    let mut j = body_start;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => {
                if !triple {
                    break;
                }
                if bytes.get(j + 1) == Some(&quote) && bytes.get(j + 2) == Some(&quote) {
                    break;
                }
                j += 1;
            }
            b'\n' if !triple => break,
            _ => j += 1,
        }
    }

    if j >= bytes.len() && triple {
        return Err(ParseError::malformed(
            PARSER_NAME,
            format!("unterminated triple-quoted string starting on line {}", lines.line_of(start)),
        ));
    }
    let body_end = j.min(bytes.len());
    let terminated = bytes.get(body_end) == Some(&quote);
    let end = if terminated {
        body_end + if triple { 3 } else { 1 }
    } else {
        body_end
    };

    Ok(PyString {
        start,
        body_start,
        body_end,
        end,
        terminated,
        quote: quote as char,
        triple,
        prefix: content[start..quote_at].to_string(),
    })
}

fn finish_line(line: &mut LogicalLine, expect_docstring: &mut bool, scan: &mut PyScan) {
    let finished = std::mem::take(line);
    if !finished.has_code && finished.strings.is_empty() {
        return;
    }

    if !finished.has_code && finished.strings.len() == 1 {
        let literal = finished.strings.into_iter().next();
        if let Some(literal) = literal.filter(PyString::can_be_docstring) {
            if *expect_docstring {
                scan.docstrings.push(literal);
            } else if literal.triple {
                scan.bare_strings.push(literal);
            }
        }
        *expect_docstring = false;
        return;
    }

    let header = matches!(finished.first_word.as_deref(), Some("def" | "class" | "async"))
        && finished.last_char == Some(':');
    *expect_docstring = header;
}

fn string_unit(content: &str, lines: &LineIndex, literal: &PyString, kind: UnitKind, priority: Priority) -> Option<TranslatableUnit> {
    let (start, end) = trim_range(content, literal.body_start, literal.body_end);
    if start >= end {
        return None;
    }
    let source = &content[start..end];

    let indent_len = source
        .split('\n')
        .skip(1)
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).len())
        .min();
    let text = match indent_len {
        Some(width) => strip_continuations(source, |l| {
            let own = leading_whitespace(l).len();
            &l[own.min(width)..]
        }),
        None => source.replace("\r\n", "\n"),
    };

    let statement_line = &content[line_start_of(content, literal.start)..literal.start];
    let statement_indent = leading_whitespace(statement_line);
    let continuation_indent = match (indent_len, source.split('\n').skip(1).find(|l| !l.trim().is_empty())) {
        (Some(width), Some(l)) => leading_whitespace(l)[..width].to_string(),
        _ => statement_indent.to_string(),
    };

    Some(TranslatableUnit {
        id: UnitId(0),
        kind,
        span: Span::new(start, end, lines.line_of(start)),
        text,
        context: UnitContext {
            prefix: format!("{}{}", literal.prefix, literal.quote.to_string().repeat(if literal.triple { 3 } else { 1 })),
            indentation: statement_indent.to_string(),
            continuation: format!("{}{}", line_ending_near(content, start), continuation_indent),
            single_line: !literal.triple,
            escape: EscapeRule::PythonString {
                quote: literal.quote,
                triple: literal.triple,
                raw: literal.is_raw(),
            },
            priority,
            ..Default::default()
        },
    })
}

/// Python source parser
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonParser;

impl PythonParser {
    /// Comment units only, as used for notebook code cells
    pub fn comment_units(content: &str, kind: UnitKind) -> Result<Vec<TranslatableUnit>, ParseError> {
        let lines = LineIndex::new(content);
        let scan = scan_python(content, &lines)?;
        Ok(group_line_comments(content, &scan.comments, kind, &[]))
    }

    fn units(content: &str) -> Result<Vec<TranslatableUnit>, ParseError> {
        let lines = LineIndex::new(content);
        let scan = scan_python(content, &lines)?;
        let mut units = group_line_comments(content, &scan.comments, UnitKind::LineComment, &[]);
        units.extend(
            scan.docstrings
                .iter()
                .filter_map(|s| string_unit(content, &lines, s, UnitKind::Docstring, Priority::High)),
        );
        units.extend(
            scan.bare_strings
                .iter()
                .filter_map(|s| string_unit(content, &lines, s, UnitKind::BlockComment, Priority::Low)),
        );
        Ok(units)
    }
}

impl FormatParser for PythonParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn can_parse(&self, path: &Path, content: &str) -> bool {
        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "py" | "pyi" | "pyw"));
        let by_shebang = content
            .lines()
            .next()
            .is_some_and(|first| first.starts_with("#!") && first.contains("python"));
        by_extension || by_shebang
    }

    fn extract(&self, content: &str) -> Result<ParseResult, ParseError> {
        Ok(ParseResult::new(self.name(), content, Self::units(content)?))
    }
}
