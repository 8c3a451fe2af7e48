/*!
 * Key-value configuration files: TOML, YAML and INI-style.
 *
 * Comments and quoted string values are extracted line by line. Keys, bare
 * values, multi-line strings and YAML block scalars are left alone, and so
 * are single-token values, which are usually identifiers rather than prose.
 */

use std::path::Path;

use crate::errors::ParseError;
use crate::extraction::comments::{group_line_comments, LineComment};
use crate::extraction::model::{
    EscapeRule, ParseResult, Span, TranslatableUnit, UnitContext, UnitId, UnitKind,
};
use crate::extraction::text::leading_whitespace;
use crate::extraction::FormatParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigDialect {
    Toml,
    Yaml,
    Ini,
}

impl ConfigDialect {
    pub fn for_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "ini" | "cfg" | "conf" => Some(Self::Ini),
            _ => None,
        }
    }

    fn is_comment_marker(&self, c: u8) -> bool {
        c == b'#' || (*self == Self::Ini && c == b';')
    }
}

/// One physical line with offsets into the file
struct Line<'a> {
    number: usize,
    start: usize,
    /// Without the line ending
    text: &'a str,
}

fn physical_lines(content: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (index, raw) in content.split('\n').enumerate() {
        lines.push(Line {
            number: index + 1,
            start,
            text: raw.strip_suffix('\r').unwrap_or(raw),
        });
        start += raw.len() + 1;
    }
    lines
}

#[derive(Debug, Clone, Copy)]
struct QuotedValue {
    body_start: usize,
    body_end: usize,
    quote: u8,
}

/// Parser for config files
#[derive(Debug, Clone, Copy)]
pub struct ConfigParser {
    dialect: ConfigDialect,
}

impl ConfigParser {
    pub fn new(dialect: ConfigDialect) -> Self {
        Self { dialect }
    }

    pub fn for_path(path: &Path) -> Option<Self> {
        ConfigDialect::for_path(path).map(Self::new)
    }

    pub fn dialect(&self) -> ConfigDialect {
        self.dialect
    }

    /// Offset inside `text` where the value part starts, if the line has one
    fn value_start(&self, text: &str) -> Option<usize> {
        let bytes = text.as_bytes();
        let lead = leading_whitespace(text).len();
        if self.dialect == ConfigDialect::Yaml && text[lead..].starts_with("- ") {
            return Some(lead + 2);
        }
        let mut quote: Option<u8> = None;
        for (i, &c) in bytes.iter().enumerate() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None => match c {
                    b'"' | b'\'' => quote = Some(c),
                    b'=' if self.dialect != ConfigDialect::Yaml => return Some(i + 1),
                    b':' if self.dialect == ConfigDialect::Ini => return Some(i + 1),
                    b':' if self.dialect == ConfigDialect::Yaml
                        && matches!(bytes.get(i + 1), None | Some(b' ') | Some(b'\t')) =>
                    {
                        return Some(i + 1);
                    }
                    _ if self.dialect.is_comment_marker(c) => return None,
                    _ => {}
                },
            }
        }
        None
    }

    fn scan_value(
        &self,
        line: &Line<'_>,
        from: usize,
        values: &mut Vec<QuotedValue>,
    ) -> Option<usize> {
        let bytes = line.text.as_bytes();
        let mut i = from;
        while i < bytes.len() {
            let c = bytes[i];
            if c == b'"' || c == b'\'' {
                let close = self.closing_quote(bytes, i)?;
                values.push(QuotedValue {
                    body_start: line.start + i + 1,
                    body_end: line.start + close,
                    quote: c,
                });
                i = close + 1;
                continue;
            }
            let word_start = i == 0 || matches!(bytes[i - 1], b' ' | b'\t');
            if self.dialect.is_comment_marker(c) && word_start {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// Index of the closing quote on the same line; `None` means the value
    /// continues past this line and the rest is left alone
    fn closing_quote(&self, bytes: &[u8], open: usize) -> Option<usize> {
        let quote = bytes[open];
        let triple = bytes.get(open + 1) == Some(&quote) && bytes.get(open + 2) == Some(&quote);
        if triple {
            return None;
        }
        let mut j = open + 1;
        while j < bytes.len() {
            let c = bytes[j];
            if c == b'\\' && quote == b'"' {
                j += 2;
                continue;
            }
            if c == quote {
                if self.dialect == ConfigDialect::Yaml && quote == b'\'' && bytes.get(j + 1) == Some(&b'\'') {
                    j += 2;
                    continue;
                }
                return Some(j);
            }
            j += 1;
        }
        None
    }

    fn value_unit(&self, content: &str, line: &Line<'_>, value: &QuotedValue, key: &str) -> Option<TranslatableUnit> {
        let body = content.get(value.body_start..value.body_end)?;
        let trimmed = body.trim();
        let prose = trimmed.chars().any(char::is_alphabetic)
            && (trimmed.contains(char::is_whitespace) || !trimmed.is_ascii());
        if !prose || body.len() != trimmed.len() {
            return None;
        }
        Some(TranslatableUnit {
            id: UnitId(0),
            kind: UnitKind::ConfigValue,
            span: Span::new(value.body_start, value.body_end, line.number),
            text: body.to_string(),
            context: UnitContext {
                prefix: key.to_string(),
                indentation: leading_whitespace(line.text).to_string(),
                single_line: true,
                escape: EscapeRule::QuotedValue {
                    quote: value.quote as char,
                    doubling: self.dialect == ConfigDialect::Yaml && value.quote == b'\'',
                },
                ..Default::default()
            },
        })
    }

    fn units(&self, content: &str) -> Vec<TranslatableUnit> {
        let mut comments = Vec::new();
        let mut units = Vec::new();
        let mut block_scalar_indent: Option<usize> = None;
        let mut in_multiline: Option<&str> = None;

        for line in physical_lines(content) {
            let text = line.text;
            let indent = leading_whitespace(text).len();
            let body = text.trim();

            if let Some(delimiter) = in_multiline {
                if text.contains(delimiter) {
                    in_multiline = None;
                }
                continue;
            }
            if let Some(parent) = block_scalar_indent {
                if body.is_empty() || indent > parent {
                    continue;
                }
                block_scalar_indent = None;
            }
            if body.is_empty() {
                continue;
            }

            let first = body.as_bytes()[0];
            if self.dialect.is_comment_marker(first) {
                comments.push(LineComment {
                    marker_start: line.start + indent,
                    marker: (first as char).to_string(),
                    full_line: true,
                    line: line.number,
                    line_start: line.start,
                    line_end: line.start + text.len(),
                });
                continue;
            }
            if self.dialect == ConfigDialect::Ini && body.starts_with('[') {
                continue;
            }

            let Some(value_start) = self.value_start(text) else {
                continue;
            };
            let key = text[..value_start]
                .trim()
                .trim_end_matches(['=', ':'])
                .trim()
                .trim_matches(['"', '\''])
                .to_string();

            let value_part = text[value_start..].trim_start();
            for delimiter in ["\"\"\"", "'''"] {
                if value_part.starts_with(delimiter) && !value_part[3..].contains(delimiter) {
                    in_multiline = Some(delimiter);
                }
            }
            if in_multiline.is_some() {
                continue;
            }
            if self.dialect == ConfigDialect::Yaml {
                let scalar = value_part.split(" #").next().unwrap_or_default().trim_end();
                if matches!(scalar.chars().next(), Some('|') | Some('>')) {
                    block_scalar_indent = Some(indent);
                    continue;
                }
            }

            let mut values = Vec::new();
            let comment_at = self.scan_value(&line, value_start, &mut values);
            units.extend(
                values
                    .iter()
                    .filter_map(|value| self.value_unit(content, &line, value, &key)),
            );
            if let Some(at) = comment_at {
                comments.push(LineComment {
                    marker_start: line.start + at,
                    marker: (text.as_bytes()[at] as char).to_string(),
                    full_line: false,
                    line: line.number,
                    line_start: line.start,
                    line_end: line.start + text.len(),
                });
            }
        }

        units.extend(group_line_comments(content, &comments, UnitKind::LineComment, &[]));
        units
    }
}

impl FormatParser for ConfigParser {
    fn name(&self) -> &'static str {
        match self.dialect {
            ConfigDialect::Toml => "toml",
            ConfigDialect::Yaml => "yaml",
            ConfigDialect::Ini => "ini",
        }
    }

    fn can_parse(&self, path: &Path, _content: &str) -> bool {
        ConfigDialect::for_path(path) == Some(self.dialect)
    }

    fn extract(&self, content: &str) -> Result<ParseResult, ParseError> {
        Ok(ParseResult::new(self.name(), content, self.units(content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(dialect: ConfigDialect, content: &str) -> Vec<String> {
        ConfigParser::new(dialect)
            .extract(content)
            .unwrap()
            .units
            .into_iter()
            .map(|u| u.text)
            .collect()
    }

    #[test]
    fn test_extract_toml_shouldTakeValuesAndComments() {
        let content = "# Project settings\n[package]\nname = \"demo\"\ndescription = \"A small demo tool\" # shown on the index\n";
        assert_eq!(
            texts(ConfigDialect::Toml, content),
            vec!["Project settings", "A small demo tool", "shown on the index"]
        );
    }

    #[test]
    fn test_extract_yaml_shouldSkipKeysAndBlockScalars() {
        let content = "\"quoted key with spaces\": 1\ngreeting: 'Hello there, friend'\nscript: |\n  echo \"# not a comment\"\n  run it now\nitems:\n  - \"first list entry\"\n";
        let result = ConfigParser::new(ConfigDialect::Yaml).extract(content).unwrap();
        let texts: Vec<&str> = result.units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello there, friend", "first list entry"]);
        assert_eq!(result.units[0].context.prefix, "greeting");
        assert_eq!(
            result.units[0].context.escape,
            EscapeRule::QuotedValue { quote: '\'', doubling: true }
        );
    }

    #[test]
    fn test_extract_urlHash_shouldNotStartComment() {
        let content = "homepage = \"https://example.com/#intro page\"\n";
        assert_eq!(texts(ConfigDialect::Toml, content), vec!["https://example.com/#intro page"]);
    }

    #[test]
    fn test_extract_ini_shouldHandleSemicolonComments() {
        let content = "; Database section\n[db]\nlabel = \"Main database\"\nhost = localhost\n";
        assert_eq!(texts(ConfigDialect::Ini, content), vec!["Database section", "Main database"]);
    }

    #[test]
    fn test_extract_multilineString_shouldBeLeftAlone() {
        let content = "notes = \"\"\"\n# inside string\nline\n\"\"\"\n# after\n";
        assert_eq!(texts(ConfigDialect::Toml, content), vec!["after"]);
    }

    #[test]
    fn test_forPath_shouldMapExtensions() {
        assert_eq!(ConfigDialect::for_path(Path::new("a.yml")), Some(ConfigDialect::Yaml));
        assert_eq!(ConfigDialect::for_path(Path::new("setup.cfg")), Some(ConfigDialect::Ini));
        assert_eq!(ConfigDialect::for_path(Path::new("a.json")), None);
    }
}
