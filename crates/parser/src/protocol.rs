//! The tool-call protocol scanner.
//!
//! Model output mixes free prose with XML-ish tool invocations:
//!
//! ```text
//! Sure, I will look.
//! <search>
//! <query>rust workspaces</query>
//! </search>
//! Done.
//! ```
//!
//! A tool invocation is `<Name>…</Name>` where `Name` matches
//! `[A-Za-z_][A-Za-z0-9_]*`; the body holds zero or more one-level
//! `<Param>value</Param>` pairs. Parameters are never themselves nested
//! tool calls. Matching is non-greedy: each opening tag pairs with the
//! nearest closing tag of the exact same name, so interleaved unrelated
//! tags do not cross-pair.
//!
//! Truncated or still-streaming output may end mid-call. The first
//! opening tag with no matching close anywhere after it marks the start
//! of a *partial* call: everything from there to the end of the content
//! is its body, and none of it is prose or a top-level call.
//!
//! This is a hand-rolled scanner rather than a regex because pairing an
//! open tag with a close tag of the same name needs backreference-style
//! matching, which the regex crates don't support.

use serde::{Deserialize, Serialize};
use taskloom_core::tool::{Parameters, ToolCall};
use tracing::trace;

/// The structured view of one assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// All free-text segments joined with a single space, in original order.
    pub free_text: String,

    /// Complete calls in encounter order, then at most one partial call.
    pub tool_calls: Vec<ToolCall>,
}

impl ParsedMessage {
    /// True when the turn produced neither prose nor any call — the
    /// "parsing ambiguity" case the stuck detector treats as an empty
    /// response.
    pub fn is_empty(&self) -> bool {
        self.free_text.is_empty() && self.tool_calls.is_empty()
    }

    /// The complete (dispatchable) calls only.
    pub fn complete_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.tool_calls.iter().filter(|c| !c.partial)
    }
}

/// A complete `<name>body</name>` span located in a haystack.
struct TagSpan<'a> {
    name: &'a str,
    body: &'a str,
    /// Byte offset of `<` in the haystack.
    start: usize,
    /// Byte offset one past the closing tag.
    end: usize,
}

/// Parse one assistant turn into free text and ordered tool calls.
///
/// Alternates between locating the next complete span (text before it
/// becomes a trimmed free-text segment, the span becomes a [`ToolCall`])
/// and watching the text gaps for an opening tag that never closes. The
/// first such unmatched tag ends the complete scan: the rest of the
/// content is the partial call's body, from which any complete parameter
/// pairs — plus the accumulated value of a trailing unclosed parameter
/// tag — are recovered.
pub fn parse(content: &str) -> ParsedMessage {
    let mut segments: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    let mut partial: Option<ToolCall> = None;

    let mut offset = 0;
    loop {
        let remaining = &content[offset..];
        let span = next_complete_tag(remaining);
        let gap_len = span.as_ref().map(|s| s.start).unwrap_or(remaining.len());

        // An unmatched opening tag in the gap starts partial territory;
        // any complete span beyond it belongs to the partial call's body.
        if let Some(open_start) = first_unmatched_opening(content, offset, offset + gap_len) {
            let before = content[offset..open_start].trim();
            if !before.is_empty() {
                segments.push(before);
            }
            partial = Some(parse_partial(content, open_start));
            break;
        }

        match span {
            Some(span) => {
                let before = remaining[..span.start].trim();
                if !before.is_empty() {
                    segments.push(before);
                }
                tool_calls.push(ToolCall::new(span.name, parse_parameters(span.body)));
                offset += span.end;
            }
            None => {
                let trailing = remaining.trim();
                if !trailing.is_empty() {
                    segments.push(trailing);
                }
                break;
            }
        }
    }

    if let Some(call) = partial {
        trace!(tool = %call.name, "Recovered partial tool call");
        tool_calls.push(call);
    }

    ParsedMessage {
        free_text: segments.join(" "),
        tool_calls,
    }
}

/// Find the earliest complete `<name>…</name>` span.
///
/// Candidates are tried left to right; an opening tag with no same-name
/// close later in the haystack is skipped, not an error.
fn next_complete_tag(haystack: &str) -> Option<TagSpan<'_>> {
    let mut search_from = 0;
    while let Some(rel) = haystack[search_from..].find('<') {
        let open_start = search_from + rel;
        if let Some((name, body_start)) = read_opening_tag(haystack, open_start) {
            let close = format!("</{name}>");
            if let Some(body_len) = haystack[body_start..].find(&close) {
                return Some(TagSpan {
                    name,
                    body: &haystack[body_start..body_start + body_len],
                    start: open_start,
                    end: body_start + body_len + close.len(),
                });
            }
        }
        search_from = open_start + 1;
    }
    None
}

/// Try to read `<name>` at `start` (which must point at `<`).
///
/// Returns the tag name and the byte offset just past `>`. Rejects
/// anything that is not `[A-Za-z_][A-Za-z0-9_]*` — including closing
/// tags, which begin with `/`.
fn read_opening_tag(haystack: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = haystack.as_bytes();
    let mut pos = start + 1;
    match bytes.get(pos) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => pos += 1,
        _ => return None,
    }
    while let Some(b) = bytes.get(pos) {
        if b.is_ascii_alphanumeric() || *b == b'_' {
            pos += 1;
        } else {
            break;
        }
    }
    if bytes.get(pos) == Some(&b'>') {
        Some((&haystack[start + 1..pos], pos + 1))
    } else {
        None
    }
}

/// Extract all complete one-level `<Param>value</Param>` pairs from a
/// call body, in order of appearance. Values are trimmed.
fn parse_parameters(body: &str) -> Parameters {
    let mut parameters = Parameters::new();
    let mut offset = 0;
    while let Some(span) = next_complete_tag(&body[offset..]) {
        parameters.insert(span.name, span.body.trim());
        offset += span.end;
    }
    parameters
}

/// Build the partial call whose opening tag sits at `open_start`.
///
/// The body runs to the end of the content. Complete parameter pairs are
/// recovered as usual; a trailing parameter tag that never closed
/// contributes the value accumulated so far, provided no further tag
/// interrupts it.
fn parse_partial(content: &str, open_start: usize) -> ToolCall {
    // The caller located the tag, so this read cannot fail.
    let (name, body_start) =
        read_opening_tag(content, open_start).expect("unmatched opening tag vanished");
    let body = &content[body_start..];

    let mut parameters = parse_parameters(body);

    if let Some(param_start) = first_unmatched_opening(body, 0, body.len())
        && let Some((param_name, value_start)) = read_opening_tag(body, param_start)
        && !body[value_start..].contains('<')
    {
        parameters.insert(param_name, body[value_start..].trim());
    }

    ToolCall::partial(name, parameters)
}

/// Locate the first opening tag within `[from, to)` that has no matching
/// closing tag anywhere after it in the full haystack.
fn first_unmatched_opening(haystack: &str, from: usize, to: usize) -> Option<usize> {
    let mut search_from = from;
    while search_from < to {
        let rel = haystack[search_from..to].find('<')?;
        let open_start = search_from + rel;
        if let Some((name, body_start)) = read_opening_tag(haystack, open_start) {
            let close = format!("</{name}>");
            if !haystack[body_start..].contains(&close) {
                return Some(open_start);
            }
        }
        search_from = open_start + 1;
    }
    None
}
