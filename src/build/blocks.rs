//! Code region scanning.
//!
//! Bodies can carry two kinds of verbatim regions: CommonMark fenced code
//! blocks and Liquid-style `{% highlight lang %}` ... `{% endhighlight %}`
//! regions. pulldown-cmark silently closes an unterminated fence at the end of
//! its container, swallowing the rest of the post, so both kinds are checked
//! here first. Highlight regions are rewritten to fenced blocks so the renderer
//! only has to deal with one shape.

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

static HIGHLIGHT_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{%-?\s*highlight\s+([A-Za-z0-9_+#.-]+)(?:\s+[^%]*)?-?%\}$")
        .expect("valid highlight regex")
});

static HIGHLIGHT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{%-?\s*endhighlight\s*-?%\}$").expect("valid endhighlight regex"));

/// Lines indented this far or more are indented code, not block syntax.
const CODE_INDENT: usize = 4;

/// Which delimiter left a region open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Fence,
    Highlight,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Fence => f.write_str("fenced code block"),
            BlockKind::Highlight => f.write_str("highlight block"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unterminated {kind} opened on line {line}")]
pub struct UnterminatedBlock {
    pub kind: BlockKind,
    /// 1-based line number
    pub line: usize,
}

/// An open fenced block: the fence character and run length.
struct OpenFence {
    marker: char,
    len: usize,
}

/// Validate code regions and rewrite highlight regions to fenced blocks.
///
/// The returned text is plain CommonMark with the same line numbering as
/// `body`. Code inside either kind of region is copied through untouched.
/// Fences are checked with the same parser `options` the body is rendered
/// with, so containers like lists and block quotes are taken into account.
pub fn prepare_body(body: &str, options: Options) -> Result<String, UnterminatedBlock> {
    let mut output = String::with_capacity(body.len());
    let mut fence: Option<OpenFence> = None;
    let mut highlight: Option<(String, usize, Vec<&str>)> = None;

    for (index, line) in body.split_inclusive('\n').enumerate() {
        let number = index + 1;
        let content = line.trim_end_matches(['\n', '\r']);

        if let Some((lang, opened_on, mut code)) = highlight.take() {
            if HIGHLIGHT_CLOSE.is_match(content.trim()) {
                push_fenced(&mut output, &lang, &code);
            } else {
                code.push(line);
                highlight = Some((lang, opened_on, code));
            }
            continue;
        }

        // Top-level fences are tracked only so highlight tags inside them stay
        // code. Whether a fence is closed is left to the parser below.
        if let Some(open) = &fence {
            if closes_fence(content, open) {
                fence = None;
            }
            output.push_str(line);
            continue;
        }

        if let Some((marker, len)) = opening_fence(content) {
            fence = Some(OpenFence { marker, len });
            output.push_str(line);
            continue;
        }

        if indent_width(content) < CODE_INDENT
            && let Some(captures) = HIGHLIGHT_OPEN.captures(content.trim())
        {
            highlight = Some((captures[1].to_string(), number, Vec::new()));
            continue;
        }

        output.push_str(line);
    }

    if let Some((_, line, _)) = highlight {
        return Err(UnterminatedBlock {
            kind: BlockKind::Highlight,
            line,
        });
    }

    check_fences(&output, options)?;
    Ok(output)
}

/// Fail on the first fenced block the parser closed without a closing fence.
///
/// pulldown-cmark reports each fenced block's source range. A closed block's
/// range ends with its closing fence, after the last line of code; an
/// unterminated one ends with its code, or with the opening line when empty.
fn check_fences(text: &str, options: Options) -> Result<(), UnterminatedBlock> {
    let mut open: Option<(Range<usize>, usize)> = None;

    for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                let opening_end = text[range.start..]
                    .find('\n')
                    .map_or(range.end, |i| (range.start + i + 1).min(range.end));
                open = Some((range, opening_end));
            }
            Event::Text(_) => {
                if let Some((_, code_end)) = &mut open {
                    *code_end = (*code_end).max(range.end);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                let Some((block, code_end)) = open.take() else {
                    continue;
                };
                let marker = text[block.start..].chars().next().unwrap_or('`');
                let tail = text.get(code_end..block.end).unwrap_or_default();
                if !tail.contains(marker) {
                    return Err(UnterminatedBlock {
                        kind: BlockKind::Fence,
                        line: line_of(text, block.start),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Columns of leading whitespace, with tabs stopping every four columns.
fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
    }
    width
}

/// Detect an opening fence, returning the fence character and length.
fn opening_fence(line: &str) -> Option<(char, usize)> {
    if indent_width(line) >= CODE_INDENT {
        return None;
    }
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    // A backtick in the info string makes this inline code, not a fence.
    if marker == '`' && trimmed[len..].contains('`') {
        return None;
    }
    Some((marker, len))
}

fn closes_fence(line: &str, open: &OpenFence) -> bool {
    if indent_width(line) >= CODE_INDENT {
        return false;
    }
    let trimmed = line.trim();
    let len = trimmed.chars().take_while(|c| *c == open.marker).count();
    len >= open.len && trimmed.len() == len * open.marker.len_utf8()
}

/// Emit a fenced block long enough that no backtick run in `code` closes it.
fn push_fenced(output: &mut String, lang: &str, code: &[&str]) {
    let longest_run = code
        .iter()
        .flat_map(|line| line.split(|c| c != '`'))
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);

    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(&fence);
    output.push_str(lang);
    output.push('\n');
    for line in code {
        output.push_str(line);
    }
    if code.last().is_some_and(|line| !line.ends_with('\n')) {
        output.push('\n');
    }
    output.push_str(&fence);
    output.push('\n');
}
