/*!
 * Comment unit builders shared by the code and config parsers.
 *
 * Scanners report raw comment positions; this module turns them into units:
 * runs of full-line comments become one unit, trailing comments stay single,
 * and block comments lose their `*` gutter.
 */

use crate::extraction::model::{
    EscapeRule, Priority, Span, TranslatableUnit, UnitContext, UnitId, UnitKind,
};
use crate::extraction::text::{leading_whitespace, line_ending_near, strip_continuations, LineIndex};

/// One line comment found by a scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineComment {
    /// Byte offset of the comment marker
    pub marker_start: usize,
    pub marker: String,
    /// Only whitespace precedes the marker on its line
    pub full_line: bool,
    pub line: usize,
    pub line_start: usize,
    /// End of the line, excluding any `\r\n`
    pub line_end: usize,
}

impl LineComment {
    fn indent<'a>(&self, content: &'a str) -> &'a str {
        if self.full_line {
            &content[self.line_start..self.marker_start]
        } else {
            ""
        }
    }

    fn content_range(&self, content: &str) -> (usize, usize) {
        let after_marker = self.marker_start + self.marker.len();
        let body = &content[after_marker..self.line_end];
        let start = after_marker + leading_whitespace(body).len();
        let end = after_marker + body.trim_end().len();
        (start, end.max(start))
    }

    fn is_blank(&self, content: &str) -> bool {
        let (start, end) = self.content_range(content);
        start == end
    }
}

/// Group consecutive full-line comments and turn each group into a unit
pub fn group_line_comments(
    content: &str,
    comments: &[LineComment],
    kind: UnitKind,
    doc_markers: &[&str],
) -> Vec<TranslatableUnit> {
    let mut units = Vec::new();
    let mut group: Vec<&LineComment> = Vec::new();

    for comment in comments {
        let joins = match group.last() {
            Some(last) => {
                last.full_line
                    && comment.full_line
                    && comment.line == last.line + 1
                    && comment.marker == last.marker
                    && comment.indent(content) == last.indent(content)
            }
            None => false,
        };
        if !joins && !group.is_empty() {
            units.extend(comment_group_unit(content, &group, kind, doc_markers));
            group.clear();
        }
        group.push(comment);
    }
    if !group.is_empty() {
        units.extend(comment_group_unit(content, &group, kind, doc_markers));
    }
    units
}

fn comment_group_unit(
    content: &str,
    group: &[&LineComment],
    kind: UnitKind,
    doc_markers: &[&str],
) -> Option<TranslatableUnit> {
    let first_filled = group.iter().position(|c| !c.is_blank(content))?;
    let last_filled = group.iter().rposition(|c| !c.is_blank(content))?;
    let lines = &group[first_filled..=last_filled];
    let first = lines[0];
    let last = lines[lines.len() - 1];

    let (start, _) = first.content_range(content);
    let (_, end) = last.content_range(content);
    let marker = first.marker.as_str();
    let indent = first.indent(content);
    let gap = &content[first.marker_start + marker.len()..start];

    let text = strip_continuations(&content[start..end], |line| {
        let rest = line.trim_start_matches([' ', '\t']);
        let rest = rest.strip_prefix(marker).unwrap_or(rest);
        rest.trim_start_matches([' ', '\t'])
    });

    let priority = if doc_markers.contains(&marker) {
        Priority::High
    } else {
        Priority::Medium
    };

    Some(TranslatableUnit {
        id: UnitId(0),
        kind,
        span: Span::new(start, end, first.line),
        text,
        context: UnitContext {
            prefix: marker.to_string(),
            indentation: indent.to_string(),
            continuation: format!(
                "{}{}{}{}",
                line_ending_near(content, start),
                indent,
                marker,
                if gap.is_empty() { " " } else { gap }
            ),
            single_line: !first.full_line,
            priority,
            ..Default::default()
        },
    })
}

/// A block comment located by a scanner, delimiters included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockComment {
    pub open_start: usize,
    pub open: String,
    /// First byte after the opening delimiter
    pub body_start: usize,
    /// First byte of the closing delimiter
    pub body_end: usize,
    pub close: String,
    /// Opener that nests inside this comment, if the language allows it
    pub nested_open: Option<String>,
}

/// Build a unit for a block comment, stripping a leading `*` gutter when
/// every continuation line carries one
pub fn block_comment_unit(
    content: &str,
    lines: &LineIndex,
    block: &BlockComment,
    kind: UnitKind,
    doc_openers: &[&str],
) -> Option<TranslatableUnit> {
    let body = &content[block.body_start..block.body_end];
    let gutter = body
        .split('\n')
        .skip(1)
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .all(|line| line.starts_with('*'))
        && body.contains('\n');

    let open_line = lines.line_of(block.open_start);
    let mut start = block.body_start;
    let mut end = block.body_end;

    loop {
        start += content[start..end].len() - content[start..end].trim_start().len();
        let on_later_line = lines.line_of(start) > open_line;
        if gutter && on_later_line && content[start..end].starts_with('*') {
            start += 1;
            continue;
        }
        break;
    }
    loop {
        end = start + content[start..end].trim_end().len();
        if gutter && end > start && content.as_bytes()[end - 1] == b'*' {
            let line_begin = content[..end - 1].rfind('\n').map(|i| i + 1).unwrap_or(0);
            if line_begin > block.body_start && content[line_begin..end - 1].trim().is_empty() {
                end -= 1;
                continue;
            }
        }
        break;
    }
    if start >= end {
        return None;
    }

    let source = &content[start..end];
    let text = strip_continuations(source, |line| {
        let rest = line.trim_start();
        if gutter {
            let rest = rest.strip_prefix('*').unwrap_or(rest);
            rest.strip_prefix(' ').unwrap_or(rest)
        } else {
            rest
        }
    });

    let line_start = content[..block.open_start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let indentation = leading_whitespace(&content[line_start..block.open_start]).to_string();
    let ending = line_ending_near(content, block.open_start);
    let continuation = match source.split('\n').nth(1) {
        Some(second) if gutter => format!("{}{}* ", ending, leading_whitespace(second)),
        Some(second) => format!("{}{}", ending, leading_whitespace(second)),
        None if block.close == "*/" => format!("{}{} * ", ending, indentation),
        None => format!("{}{}   ", ending, indentation),
    };

    let priority = if doc_openers.contains(&block.open.as_str()) {
        Priority::High
    } else {
        Priority::Medium
    };

    Some(TranslatableUnit {
        id: UnitId(0),
        kind,
        span: Span::new(start, end, lines.line_of(start)),
        text,
        context: UnitContext {
            prefix: block.open.clone(),
            indentation,
            continuation,
            escape: EscapeRule::BlockComment {
                terminator: block.close.clone(),
                opener: block.nested_open.clone(),
            },
            priority,
            ..Default::default()
        },
    })
}
