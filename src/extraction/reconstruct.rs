/*!
 * Span splicing shared by every reconstructor.
 *
 * Gaps between spans are copied verbatim. A span is replaced by its rendered
 * translation when the unit resolved to one; otherwise its original bytes are
 * emitted untouched.
 */

use log::error;

use crate::errors::ReconstructionError;
use crate::extraction::model::{EscapeRule, Outcomes, TranslatableUnit};

/// Check that spans are sorted, disjoint, in bounds and on char boundaries
pub fn validate_spans(content: &str, units: &[TranslatableUnit]) -> Result<(), ReconstructionError> {
    let mut previous_end = 0;
    for unit in units {
        let span = unit.span;
        let problem = if span.start > span.end {
            Some(format!("unit {} has inverted span {}..{}", unit.id, span.start, span.end))
        } else if span.end > content.len() {
            Some(format!(
                "unit {} ends at {} beyond content length {}",
                unit.id,
                span.end,
                content.len()
            ))
        } else if span.start < previous_end {
            Some(format!(
                "unit {} starts at {} inside the previous span ending at {}",
                unit.id, span.start, previous_end
            ))
        } else if !content.is_char_boundary(span.start) || !content.is_char_boundary(span.end) {
            Some(format!("unit {} does not sit on character boundaries", unit.id))
        } else {
            None
        };

        if let Some(message) = problem {
            error!("Refusing to reconstruct: {}", message);
            return Err(ReconstructionError::InvariantViolation(message));
        }
        previous_end = span.end;
    }
    Ok(())
}

/// Rebuild `content` with every resolved unit replaced by its rendered translation
pub fn splice(
    content: &str,
    units: &[TranslatableUnit],
    outcomes: &Outcomes,
) -> Result<String, ReconstructionError> {
    validate_spans(content, units)?;

    let mut output = String::with_capacity(content.len() + content.len() / 4);
    let mut cursor = 0;
    for unit in units {
        output.push_str(&content[cursor..unit.span.start]);
        match outcomes.get(&unit.id).and_then(|outcome| outcome.replacement()) {
            Some(translated) => output.push_str(&render(unit, translated)),
            None => output.push_str(&content[unit.span.start..unit.span.end]),
        }
        cursor = unit.span.end;
    }
    output.push_str(&content[cursor..]);
    Ok(output)
}

/// Re-wrap a translation in the unit's delimiter style
pub fn render(unit: &TranslatableUnit, translated: &str) -> String {
    let context = &unit.context;
    let trimmed = translated.trim_end().trim_start_matches(['\n', '\r']);
    let escaped = escape(trimmed, &context.escape);

    if context.single_line {
        return escaped
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }

    let blank_continuation = context.continuation.trim_end_matches([' ', '\t']);
    let mut output = String::with_capacity(escaped.len() + 16);
    for (index, line) in escaped.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if index > 0 {
            if line.trim().is_empty() {
                output.push_str(blank_continuation);
                continue;
            }
            output.push_str(&context.continuation);
        }
        output.push_str(line);
    }
    output
}

fn escape(text: &str, rule: &EscapeRule) -> String {
    match rule {
        EscapeRule::None => text.to_string(),
        EscapeRule::PythonString { quote, triple, raw } => escape_python(text, *quote, *triple, *raw),
        EscapeRule::BlockComment { terminator, opener } => {
            let text = break_delimiter(text, terminator);
            match opener {
                Some(opener) => break_delimiter(&text, opener),
                None => text,
            }
        }
        EscapeRule::QuotedValue { quote, doubling } => {
            if *doubling {
                let doubled = format!("{0}{0}", quote);
                text.replace(doubled.as_str(), &quote.to_string())
                    .replace(*quote, &doubled)
            } else if *quote == '\'' {
                text.replace('\'', "\u{2019}")
            } else {
                guard_trailing_backslash(escape_unescaped(text, *quote), false)
            }
        }
        EscapeRule::TableCell => escape_unescaped(text, '|'),
    }
}

/// Insert a space after the first char of every `delimiter` occurrence
fn break_delimiter(text: &str, delimiter: &str) -> String {
    let mut chars = delimiter.chars();
    match (chars.next(), chars.as_str()) {
        (Some(first), rest) if !rest.is_empty() => text.replace(delimiter, &format!("{} {}", first, rest)),
        _ => text.to_string(),
    }
}

fn escape_python(text: &str, quote: char, triple: bool, raw: bool) -> String {
    let mut escaped = if triple {
        let closing = quote.to_string().repeat(3);
        let broken = format!("\\{}", closing);
        text.replace(closing.as_str(), &broken)
    } else {
        escape_unescaped(text, quote)
    };

    if escaped.ends_with(quote) && !escaped.ends_with(&format!("\\{}", quote)) {
        escaped.insert(escaped.len() - quote.len_utf8(), '\\');
    }
    guard_trailing_backslash(escaped, raw)
}

/// A lone trailing backslash would escape the closing quote
fn guard_trailing_backslash(mut escaped: String, raw: bool) -> String {
    let trailing_backslashes = escaped.chars().rev().take_while(|c| *c == '\\').count();
    if trailing_backslashes % 2 == 1 {
        if raw {
            escaped.push(' ');
        } else {
            escaped.push('\\');
        }
    }
    escaped
}

/// Backslash-escape `target` wherever it is not already escaped
fn escape_unescaped(text: &str, target: char) -> String {
    let mut output = String::with_capacity(text.len());
    let mut backslashes = 0usize;
    for c in text.chars() {
        if c == target && backslashes % 2 == 0 {
            output.push('\\');
        }
        if c == '\\' {
            backslashes += 1;
        } else {
            backslashes = 0;
        }
        output.push(c);
    }
    output
}
