/*!
 * Small text helpers shared by the parsers: line lookup, line endings,
 * and per-line decoration stripping.
 */

/// Maps byte offsets to 1-based line numbers
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(index) => index + 1,
            Err(index) => index,
        }
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.starts
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or(0)
    }
}

/// Line ending of the line that contains `offset`, falling back to the
/// file's first line ending, then to `\n`
pub fn line_ending_near(content: &str, offset: usize) -> &'static str {
    let tail = content.get(offset..).unwrap_or_default();
    let found = tail
        .find('\n')
        .map(|i| offset + i)
        .or_else(|| content.find('\n'));
    match found {
        Some(i) if i > 0 && content.as_bytes()[i - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

/// Byte offset of the start of the line containing `offset`
pub fn line_start_of(content: &str, offset: usize) -> usize {
    content[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Byte offset of the end of the line containing `offset`, excluding `\r\n`
pub fn line_end_of(content: &str, offset: usize) -> usize {
    let end = content[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(content.len());
    if end > offset && content.as_bytes()[end - 1] == b'\r' {
        end - 1
    } else {
        end
    }
}

pub fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

/// Split span source into lines without their `\r`
pub fn source_lines(source: &str) -> impl Iterator<Item = &str> {
    source
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Keep the first line as-is and pass the others through `strip`, joining with `\n`
pub fn strip_continuations<'a>(source: &'a str, strip: impl Fn(&'a str) -> &'a str) -> String {
    let mut out = String::with_capacity(source.len());
    for (index, line) in source_lines(source).enumerate() {
        if index == 0 {
            out.push_str(line);
        } else {
            out.push('\n');
            out.push_str(strip(line));
        }
    }
    out
}

/// Narrow `[start, end)` so it neither starts nor ends on whitespace
pub fn trim_range(content: &str, start: usize, end: usize) -> (usize, usize) {
    let slice = &content[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading == slice.len() {
        return (start, start);
    }
    (start + leading, end - trailing)
}
