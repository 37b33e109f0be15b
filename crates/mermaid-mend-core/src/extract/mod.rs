//! Source extraction: raw placeholder text → a definition the renderer accepts.
//!
//! Pages carry diagram definitions inside `<pre class="mermaid">` blocks, usually indented to
//! match the surrounding markup and entity-escaped by the template. The renderer rejects a few
//! label spellings that authors use all the time (commas, bare tags, path separators), so those
//! are rewritten here before rendering.

mod labels;

pub use labels::repair_labels;

use crate::entities::decode_entities;
use regex::Regex;
use std::sync::OnceLock;

fn line_ending_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r\n?").expect("valid regex"))
}

/// Full extraction for text taken verbatim from a page: decode character references, then
/// [`clean_definition`].
pub fn extract_definition(raw: &str) -> String {
    let decoded = decode_entities(raw);
    clean_definition(&decoded)
}

/// Strips copy-paste indentation, repairs known-bad labels and trims the result.
///
/// This never fails and is a fixed point: `clean_definition(&clean_definition(s))` equals
/// `clean_definition(s)` for every `s`. Malformed diagram syntax is passed through untouched so
/// the renderer can report it.
pub fn clean_definition(text: &str) -> String {
    let normalized = line_ending_regex().replace_all(text, "\n");
    let dedented = strip_common_indent(&normalized);
    let repaired = repair_labels(&dedented);
    repaired.trim().to_string()
}

/// Removes the smallest leading-whitespace width found on non-blank lines from every line.
///
/// Relative indentation is preserved. Blank lines shorter than the common width become empty.
pub fn strip_common_indent(text: &str) -> String {
    let width = text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);
    if width == 0 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let skip = line
            .char_indices()
            .nth(width)
            .map(|(byte, _)| byte)
            .unwrap_or(line.len());
        out.push_str(&line[skip..]);
    }
    out
}
