/*!
 * Markdown prose extraction.
 *
 * pulldown-cmark supplies block structure and source offsets. Each paragraph,
 * heading, tight list item and table cell becomes one unit spanning its
 * inline content. Code blocks, HTML blocks and front matter are never entered.
 * Inline code spans and link destinations split a block into several units
 * so their bytes are never part of a translation.
 */

use std::path::Path;

use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::errors::ParseError;
use crate::extraction::model::{
    EscapeRule, ParseResult, Span, TranslatableUnit, UnitContext, UnitId, UnitKind,
};
use crate::extraction::text::{line_ending_near, line_start_of, strip_continuations, trim_range, LineIndex};
use crate::extraction::FormatParser;

static QUOTE_DECORATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:>[ \t]?)*[ \t]*").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Paragraph,
    Heading,
    TableCell,
    /// Inline content directly inside a tight list item
    Loose,
}

#[derive(Debug)]
struct Run {
    kind: BlockKind,
    start: usize,
    end: usize,
    prose: bool,
}

struct Collector<'a> {
    content: &'a str,
    lines: &'a LineIndex,
    units: Vec<TranslatableUnit>,
    block: Option<BlockKind>,
    run: Option<Run>,
    fence_language: Option<String>,
}

impl<'a> Collector<'a> {
    fn extend(&mut self, range: std::ops::Range<usize>, prose: bool) {
        let kind = self.block.unwrap_or(BlockKind::Loose);
        let run = self.run.get_or_insert(Run {
            kind,
            start: range.start,
            end: range.end,
            prose: false,
        });
        run.start = run.start.min(range.start);
        run.end = run.end.max(range.end);
        run.prose |= prose;
    }

    /// End the current run but stay in the same block
    fn split(&mut self) {
        let block = self.block;
        self.flush();
        self.block = block;
    }

    fn flush(&mut self) {
        self.block = None;
        let Some(run) = self.run.take() else {
            return;
        };
        if !run.prose || run.end > self.content.len() {
            return;
        }
        if let Some(unit) = self.unit_for(&run) {
            self.units.push(unit);
        }
    }

    fn unit_for(&self, run: &Run) -> Option<TranslatableUnit> {
        let content = self.content;
        let (start, end) = trim_range(content, run.start, run.end);
        if start >= end || !content.is_char_boundary(start) || !content.is_char_boundary(end) {
            return None;
        }
        let source = &content[start..end];
        let lead = &content[line_start_of(content, start)..start];
        let quoted = lead.contains('>');
        let strip = |line: &'a str| -> &'a str {
            if quoted {
                let decoration = QUOTE_DECORATION.find(line).map(|m| m.end()).unwrap_or(0);
                &line[decoration..]
            } else {
                line.trim_start_matches([' ', '\t'])
            }
        };
        let text = strip_continuations(source, strip);

        let ending = line_ending_near(content, start);
        let decoration = match source.split('\n').nth(1) {
            Some(second) => {
                let second = second.trim_end_matches('\r');
                let kept = second.len() - strip(second).len();
                second[..kept].to_string()
            }
            None => lead
                .chars()
                .map(|c| if c == '>' || c == ' ' || c == '\t' { c } else { ' ' })
                .collect(),
        };

        let single_line = matches!(run.kind, BlockKind::Heading | BlockKind::TableCell);
        Some(TranslatableUnit {
            id: UnitId(0),
            kind: UnitKind::MarkdownProse,
            span: Span::new(start, end, self.lines.line_of(start)),
            text,
            context: UnitContext {
                prefix: lead.trim().to_string(),
                indentation: lead.chars().take_while(|c| *c == ' ' || *c == '\t').collect(),
                continuation: format!("{}{}", ending, decoration),
                single_line,
                escape: if run.kind == BlockKind::TableCell {
                    EscapeRule::TableCell
                } else {
                    EscapeRule::None
                },
                fence_language: self.fence_language.clone(),
                ..Default::default()
            },
        })
    }
}

/// Markdown document parser
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

impl MarkdownParser {
    /// Prose units of a Markdown document, unsorted
    pub fn prose_units(content: &str) -> Vec<TranslatableUnit> {
        let lines = LineIndex::new(content);
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);

        let mut collector = Collector {
            content,
            lines: &lines,
            units: Vec::new(),
            block: None,
            run: None,
            fence_language: None,
        };
        let mut opaque_depth = 0usize;
        let mut image_depth = 0usize;
        let mut opaque_links = Vec::new();

        for (event, range) in Parser::new_ext(content, options).into_offset_iter() {
            match event {
                Event::Start(tag) => match tag {
                    Tag::Paragraph => {
                        collector.flush();
                        collector.block = Some(BlockKind::Paragraph);
                    }
                    Tag::Heading { .. } => {
                        collector.flush();
                        collector.block = Some(BlockKind::Heading);
                    }
                    Tag::TableCell => {
                        collector.flush();
                        collector.block = Some(BlockKind::TableCell);
                    }
                    Tag::CodeBlock(kind) => {
                        collector.flush();
                        opaque_depth += 1;
                        if let CodeBlockKind::Fenced(info) = kind {
                            let language = info.split_whitespace().next().unwrap_or_default();
                            collector.fence_language =
                                (!language.is_empty()).then(|| language.to_string());
                        }
                    }
                    Tag::HtmlBlock | Tag::MetadataBlock(_) => {
                        collector.flush();
                        opaque_depth += 1;
                    }
                    Tag::Image { .. } => {
                        if opaque_depth == 0 {
                            collector.extend(range, false);
                        }
                        image_depth += 1;
                    }
                    Tag::Emphasis | Tag::Strong | Tag::Strikethrough => {
                        if opaque_depth == 0 {
                            collector.extend(range.start..range.start + 1, false);
                        }
                    }
                    Tag::Link { link_type, .. } => {
                        collector.split();
                        let opaque = matches!(link_type, LinkType::Autolink | LinkType::Email);
                        if opaque {
                            opaque_depth += 1;
                        }
                        opaque_links.push(opaque);
                    }
                    _ => collector.flush(),
                },
                Event::End(tag) => match tag {
                    TagEnd::CodeBlock | TagEnd::HtmlBlock | TagEnd::MetadataBlock(_) => {
                        opaque_depth = opaque_depth.saturating_sub(1);
                    }
                    TagEnd::Image => image_depth = image_depth.saturating_sub(1),
                    TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                        if opaque_depth == 0 && range.end > range.start {
                            collector.extend(range.end - 1..range.end, false);
                        }
                    }
                    TagEnd::Link => {
                        if opaque_links.pop().unwrap_or(false) {
                            opaque_depth = opaque_depth.saturating_sub(1);
                        }
                        collector.split();
                    }
                    _ => collector.flush(),
                },
                Event::Text(text) if opaque_depth == 0 => {
                    let prose = image_depth == 0 && text.chars().any(char::is_alphabetic);
                    collector.extend(range, prose);
                }
                Event::Code(_) if opaque_depth == 0 => collector.split(),
                Event::InlineHtml(_)
                | Event::InlineMath(_)
                | Event::FootnoteReference(_)
                | Event::SoftBreak
                | Event::HardBreak
                    if opaque_depth == 0 =>
                {
                    collector.extend(range, false);
                }
                Event::Rule | Event::TaskListMarker(_) => collector.flush(),
                _ => {}
            }
        }
        collector.flush();
        collector.units
    }
}

impl FormatParser for MarkdownParser {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn can_parse(&self, path: &Path, _content: &str) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "md" | "markdown" | "mdown" | "mkd"))
    }

    fn extract(&self, content: &str) -> Result<ParseResult, ParseError> {
        Ok(ParseResult::new(self.name(), content, Self::prose_units(content)))
    }
}
