/*!
 * Comment extraction for source code that only needs a lexical view.
 *
 * A `CommentSyntax` lists the comment markers and string-literal rules of a
 * language family. The scanner walks the bytes once, skipping string
 * literals, and reports line and block comments. Anything it cannot place
 * with confidence (an unterminated block, an odd literal) ends extraction
 * for the rest of the file rather than risking a false positive.
 */

use std::path::Path;

use crate::errors::ParseError;
use crate::extraction::comments::{block_comment_unit, group_line_comments, BlockComment, LineComment};
use crate::extraction::model::{ParseResult, TranslatableUnit, UnitKind};
use crate::extraction::text::{line_end_of, line_start_of, LineIndex};
use crate::extraction::FormatParser;

/// A string literal form: skipped wholesale by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRule {
    pub open: &'static str,
    pub close: &'static str,
    pub escapes: bool,
    pub multiline: bool,
}

const fn quoted(open: &'static str, escapes: bool, multiline: bool) -> StringRule {
    StringRule {
        open,
        close: open,
        escapes,
        multiline,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharLiterals {
    /// `'` has no special meaning beyond any string rule
    None,
    /// `'x'` and `'\n'` are literals, any other `'` is a lifetime or label
    Rust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    pub language: &'static str,
    /// Longest marker first
    pub line_markers: &'static [&'static str],
    /// Longest opener first
    pub block_delimiters: &'static [(&'static str, &'static str)],
    pub doc_markers: &'static [&'static str],
    /// Longest opener first
    pub strings: &'static [StringRule],
    pub char_literals: CharLiterals,
    pub raw_strings: bool,
    /// `#` only opens a comment at the start of a word (shell, perl)
    pub hash_needs_word_start: bool,
    /// Block comments nest; each inner opener needs its own terminator
    pub nested_open: Option<&'static str>,
}

const C_BLOCKS: &[(&str, &str)] = &[("/**", "*/"), ("/*!", "*/"), ("/*", "*/")];
const C_DOCS: &[&str] = &["/**", "/*!"];
const C_STRINGS: &[StringRule] = &[quoted("\"", true, false), quoted("'", true, false)];

pub const RUST: CommentSyntax = CommentSyntax {
    language: "rust",
    line_markers: &["///", "//!", "//"],
    block_delimiters: C_BLOCKS,
    doc_markers: &["///", "//!", "/**", "/*!"],
    strings: &[quoted("\"", true, true)],
    char_literals: CharLiterals::Rust,
    raw_strings: true,
    hash_needs_word_start: false,
    nested_open: Some("/*"),
};

pub const C_LIKE: CommentSyntax = CommentSyntax {
    language: "c",
    line_markers: &["//"],
    block_delimiters: C_BLOCKS,
    doc_markers: C_DOCS,
    strings: C_STRINGS,
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: None,
};

pub const JVM_LIKE: CommentSyntax = CommentSyntax {
    language: "jvm",
    line_markers: &["//"],
    block_delimiters: C_BLOCKS,
    doc_markers: C_DOCS,
    strings: &[
        quoted("\"\"\"", false, true),
        quoted("\"", true, false),
        quoted("'", true, false),
    ],
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: None,
};

pub const JAVASCRIPT: CommentSyntax = CommentSyntax {
    language: "javascript",
    line_markers: &["//"],
    block_delimiters: C_BLOCKS,
    doc_markers: C_DOCS,
    strings: &[
        quoted("`", true, true),
        quoted("\"", true, false),
        quoted("'", true, false),
    ],
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: None,
};

pub const GO: CommentSyntax = CommentSyntax {
    language: "go",
    line_markers: &["//"],
    block_delimiters: &[("/*", "*/")],
    doc_markers: &[],
    strings: &[
        quoted("`", false, true),
        quoted("\"", true, false),
        quoted("'", true, false),
    ],
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: None,
};

pub const PHP: CommentSyntax = CommentSyntax {
    language: "php",
    line_markers: &["//", "#"],
    block_delimiters: C_BLOCKS,
    doc_markers: C_DOCS,
    strings: &[quoted("\"", true, true), quoted("'", true, true)],
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: None,
};

pub const CSS: CommentSyntax = CommentSyntax {
    language: "css",
    line_markers: &[],
    block_delimiters: &[("/*", "*/")],
    doc_markers: &[],
    strings: C_STRINGS,
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: None,
};

pub const SCSS: CommentSyntax = CommentSyntax {
    language: "scss",
    line_markers: &["//"],
    ..CSS
};

pub const SHELL: CommentSyntax = CommentSyntax {
    language: "shell",
    line_markers: &["#"],
    block_delimiters: &[],
    doc_markers: &[],
    strings: &[quoted("\"", true, true), quoted("'", false, true)],
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: true,
    nested_open: None,
};

pub const HASH: CommentSyntax = CommentSyntax {
    language: "hash",
    hash_needs_word_start: false,
    strings: &[quoted("\"", true, true), quoted("'", true, true)],
    ..SHELL
};

pub const PERL: CommentSyntax = CommentSyntax {
    language: "perl",
    hash_needs_word_start: true,
    ..HASH
};

pub const JULIA: CommentSyntax = CommentSyntax {
    language: "julia",
    block_delimiters: &[("#=", "=#")],
    strings: &[quoted("\"\"\"", true, true), quoted("\"", true, true)],
    ..HASH
};

pub const LUA: CommentSyntax = CommentSyntax {
    language: "lua",
    line_markers: &["--"],
    block_delimiters: &[("--[[", "]]")],
    doc_markers: &[],
    strings: &[
        quoted("\"", true, false),
        quoted("'", true, false),
        StringRule {
            open: "[[",
            close: "]]",
            escapes: false,
            multiline: true,
        },
    ],
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: None,
};

pub const SQL: CommentSyntax = CommentSyntax {
    language: "sql",
    line_markers: &["--"],
    block_delimiters: &[("/*", "*/")],
    doc_markers: &[],
    strings: &[quoted("'", false, true), quoted("\"", false, true)],
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: None,
};

pub const HASKELL: CommentSyntax = CommentSyntax {
    language: "haskell",
    line_markers: &["--"],
    block_delimiters: &[("{-", "-}")],
    doc_markers: &[],
    strings: &[quoted("\"", true, false)],
    char_literals: CharLiterals::None,
    raw_strings: false,
    hash_needs_word_start: false,
    nested_open: Some("{-"),
};

/// Comment syntax for a file extension
pub fn syntax_for_extension(extension: &str) -> Option<&'static CommentSyntax> {
    let syntax = match extension.to_ascii_lowercase().as_str() {
        "rs" => &RUST,
        "c" | "h" | "cc" | "cpp" | "cxx" | "hpp" | "hh" | "cs" | "m" | "dart" => &C_LIKE,
        "java" | "kt" | "kts" | "scala" | "swift" | "groovy" => &JVM_LIKE,
        "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => &JAVASCRIPT,
        "go" => &GO,
        "php" => &PHP,
        "css" => &CSS,
        "scss" | "less" => &SCSS,
        "sh" | "bash" | "zsh" => &SHELL,
        "rb" | "r" => &HASH,
        "pl" | "pm" => &PERL,
        "jl" => &JULIA,
        "lua" => &LUA,
        "sql" => &SQL,
        "hs" => &HASKELL,
        _ => return None,
    };
    Some(syntax)
}

/// Comment syntax for a notebook kernel language name
pub fn syntax_for_language(language: &str) -> Option<&'static CommentSyntax> {
    let syntax = match language.to_ascii_lowercase().as_str() {
        "r" | "ruby" => &HASH,
        "julia" => &JULIA,
        "bash" | "sh" | "shell" => &SHELL,
        "javascript" | "typescript" => &JAVASCRIPT,
        "scala" | "java" | "kotlin" => &JVM_LIKE,
        "rust" => &RUST,
        "c" | "c++" | "cpp" | "c#" | "csharp" => &C_LIKE,
        "go" => &GO,
        "sql" => &SQL,
        "lua" => &LUA,
        "haskell" => &HASKELL,
        _ => return None,
    };
    Some(syntax)
}

/// Raw comment positions found in one pass
#[derive(Debug, Default)]
pub struct CommentScan {
    pub line_comments: Vec<LineComment>,
    pub block_comments: Vec<BlockComment>,
}

/// Walk `content` once and collect comments outside string literals
pub fn scan_comments(content: &str, syntax: &CommentSyntax, lines: &LineIndex) -> CommentScan {
    let bytes = content.as_bytes();
    let mut scan = CommentScan::default();
    let mut i = 0;

    if content.starts_with("#!") {
        i = line_end_of(content, 0);
    }

    'outer: while i < bytes.len() {
        let rest = &bytes[i..];

        for (open, close) in syntax.block_delimiters {
            if rest.starts_with(open.as_bytes()) {
                let search_from = if open.len() >= 3 { i + open.len() - 1 } else { i + open.len() };
                let Some(found) = find_block_close(bytes, close, syntax.nested_open, search_from) else {
                    break 'outer;
                };
                let body_start = i + open.len();
                if found >= body_start {
                    scan.block_comments.push(BlockComment {
                        open_start: i,
                        open: open.to_string(),
                        body_start,
                        body_end: found,
                        close: close.to_string(),
                        nested_open: syntax.nested_open.map(str::to_string),
                    });
                }
                i = found + close.len();
                continue 'outer;
            }
        }

        for marker in syntax.line_markers {
            if rest.starts_with(marker.as_bytes()) {
                if *marker == "#" && syntax.hash_needs_word_start && !at_word_start(bytes, i) {
                    break;
                }
                let line_start = line_start_of(content, i);
                let line_end = line_end_of(content, i);
                scan.line_comments.push(LineComment {
                    marker_start: i,
                    marker: marker.to_string(),
                    full_line: content[line_start..i].trim().is_empty(),
                    line: lines.line_of(i),
                    line_start,
                    line_end,
                });
                i = line_end;
                continue 'outer;
            }
        }

        if syntax.raw_strings {
            if let Some(end) = skip_rust_raw_string(bytes, i) {
                i = end;
                continue;
            }
        }

        for rule in syntax.strings {
            if rest.starts_with(rule.open.as_bytes()) {
                match skip_string(bytes, i, rule) {
                    Some(end) => i = end,
                    None => break 'outer,
                }
                continue 'outer;
            }
        }

        if syntax.char_literals == CharLiterals::Rust && bytes[i] == b'\'' {
            i = skip_rust_char(bytes, i);
            continue;
        }

        i += 1;
    }
    scan
}

fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Start of the terminator matching an opener whose body starts at `from`.
/// With `nested_open`, inner openers must be closed first.
fn find_block_close(bytes: &[u8], close: &str, nested_open: Option<&str>, from: usize) -> Option<usize> {
    let Some(open) = nested_open else {
        return find_bytes(bytes, close.as_bytes(), from);
    };
    let mut depth = 1usize;
    let mut j = from;
    while j < bytes.len() {
        let rest = &bytes[j..];
        if rest.starts_with(close.as_bytes()) {
            depth -= 1;
            if depth == 0 {
                return Some(j);
            }
            j += close.len();
        } else if rest.starts_with(open.as_bytes()) {
            depth += 1;
            j += open.len();
        } else {
            j += 1;
        }
    }
    None
}

// No `{`: the `#` in `${#arr[@]}` is a length expansion
fn at_word_start(bytes: &[u8], i: usize) -> bool {
    i == 0 || matches!(bytes[i - 1], b' ' | b'\t' | b'\n' | b'\r' | b';' | b'(' | b'|' | b'&')
}

/// End offset of the literal starting at `start`, or `None` when it never
/// closes. Single-line literals stop at the end of the line.
fn skip_string(bytes: &[u8], start: usize, rule: &StringRule) -> Option<usize> {
    let close = rule.close.as_bytes();
    let mut j = start + rule.open.len();
    while j < bytes.len() {
        if rule.escapes && bytes[j] == b'\\' {
            j += 2;
            continue;
        }
        if bytes[j..].starts_with(close) {
            return Some(j + close.len());
        }
        if bytes[j] == b'\n' && !rule.multiline {
            return Some(j);
        }
        j += 1;
    }
    if rule.multiline { None } else { Some(bytes.len()) }
}

/// `r"..."`, `r#"..."#`, `br"..."`
fn skip_rust_raw_string(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes[i] != b'r' {
        return None;
    }
    if i > 0 {
        let previous = bytes[i - 1];
        let identifier = previous.is_ascii_alphanumeric() || previous == b'_';
        if identifier && !(previous == b'b' && (i < 2 || !bytes[i - 2].is_ascii_alphanumeric())) {
            return None;
        }
    }
    let mut j = i + 1;
    let mut hashes = 0;
    while j < bytes.len() && bytes[j] == b'#' {
        hashes += 1;
        j += 1;
    }
    if j >= bytes.len() || bytes[j] != b'"' {
        return None;
    }
    let mut closing = vec![b'"'];
    closing.extend(std::iter::repeat_n(b'#', hashes));
    find_bytes(bytes, &closing, j + 1)
        .map(|pos| pos + closing.len())
        .or(Some(bytes.len()))
}

/// Skip a char literal, or just the quote of a lifetime or label
fn skip_rust_char(bytes: &[u8], i: usize) -> usize {
    if bytes.get(i + 1) == Some(&b'\\') {
        let limit = (i + 12).min(bytes.len());
        return (i + 2..limit)
            .find(|&j| bytes[j] == b'\'')
            .map(|j| j + 1)
            .unwrap_or(i + 1);
    }
    // a single (possibly multi-byte) char followed by a closing quote
    let Some(first) = bytes.get(i + 1) else {
        return i + 1;
    };
    let width = match *first {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    };
    if bytes.get(i + 1 + width) == Some(&b'\'') {
        i + 2 + width
    } else {
        i + 1
    }
}

/// Build units from a finished scan
pub fn comment_units(
    content: &str,
    syntax: &CommentSyntax,
    lines: &LineIndex,
    line_kind: UnitKind,
    block_kind: UnitKind,
) -> Vec<TranslatableUnit> {
    let scan = scan_comments(content, syntax, lines);
    let mut units = group_line_comments(content, &scan.line_comments, line_kind, syntax.doc_markers);
    units.extend(
        scan.block_comments
            .iter()
            .filter_map(|block| block_comment_unit(content, lines, block, block_kind, syntax.doc_markers)),
    );
    units
}

/// Parser for code files handled through a `CommentSyntax` table
#[derive(Debug, Clone, Copy)]
pub struct GenericCommentParser {
    syntax: &'static CommentSyntax,
}

impl GenericCommentParser {
    pub fn new(syntax: &'static CommentSyntax) -> Self {
        Self { syntax }
    }

    /// Pick a syntax from the extension, or from a shell shebang
    pub fn for_path(path: &Path, content: &str) -> Option<Self> {
        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(syntax_for_extension);
        let by_shebang = || {
            let first = content.lines().next().unwrap_or_default();
            (first.starts_with("#!") && ["sh", "bash", "zsh"].iter().any(|shell| first.ends_with(shell)))
                .then_some(&SHELL)
        };
        by_extension.or_else(by_shebang).map(Self::new)
    }

    pub fn syntax(&self) -> &'static CommentSyntax {
        self.syntax
    }
}

impl FormatParser for GenericCommentParser {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn can_parse(&self, path: &Path, content: &str) -> bool {
        Self::for_path(path, content).is_some_and(|found| found.syntax == self.syntax)
    }

    fn extract(&self, content: &str) -> Result<ParseResult, ParseError> {
        let lines = LineIndex::new(content);
        let units = comment_units(content, self.syntax, &lines, UnitKind::LineComment, UnitKind::BlockComment);
        Ok(ParseResult::new(self.name(), content, units))
    }
}
