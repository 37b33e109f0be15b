use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Upper bound on repair rounds. A rewrite can expose another one (quoting a path label makes
/// its commas visible to the comma rule), but every rule strictly removes the pattern it fixes.
const MAX_ROUNDS: usize = 4;

const SEGMENT_SEPARATOR: &str = " | ";

fn quoted_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\["([^"]*)"\]"#).expect("valid regex"))
}

fn bare_path_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\[([^"\[\]]*/[^"\[\]]*)\]"#).expect("valid regex"))
}

fn lone_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^</?!?[^<>]+>$").expect("valid regex"))
}

/// Rewrites bracketed node labels the renderer is known to reject.
///
/// Rules, applied in order to every `["..."]` label until nothing changes:
/// 1. exactly three comma-separated segments → `a | b | c`
/// 2. exactly two comma-separated segments → `a | b`
/// 3. a label that is a single tag (`<div>`, `</div>`, `<!doctype>`) → angle brackets escaped
/// 4. an unquoted `[...]` label containing `/` → wrapped in quotes
/// 5. a label that is only a comma (`[","]`) → `["..."]`
///
/// Shape delimiters (`[/parallelogram/]`, `[\trapezoid\]`) are not path labels and are kept.
pub fn repair_labels(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_ROUNDS {
        let next = repair_round(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn repair_round(text: &str) -> String {
    let quoted = quoted_label_regex().replace_all(text, |caps: &Captures<'_>| {
        let content = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        format!("[\"{}\"]", repair_quoted_content(content))
    });
    let bare = bare_path_label_regex().replace_all(&quoted, |caps: &Captures<'_>| {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let content = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if is_shape_delimited(content) {
            whole.to_string()
        } else {
            format!("[\"{content}\"]")
        }
    });
    bare.into_owned()
}

fn repair_quoted_content(content: &str) -> Cow<'_, str> {
    if content.trim() == "," {
        return Cow::Borrowed("...");
    }

    let mut label = Cow::Borrowed(content);
    if let Some(joined) = join_comma_segments(&label) {
        label = Cow::Owned(joined);
    }
    if lone_tag_regex().is_match(&label) {
        label = Cow::Owned(label.replace('<', "&lt;").replace('>', "&gt;"));
    }
    label
}

/// Joins two or three non-empty comma-separated segments; any other shape is left alone.
fn join_comma_segments(content: &str) -> Option<String> {
    if !content.contains(',') {
        return None;
    }
    let segments: Vec<&str> = content.split(',').map(str::trim).collect();
    if !(2..=3).contains(&segments.len()) || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(segments.join(SEGMENT_SEPARATOR))
}

fn is_shape_delimited(content: &str) -> bool {
    let starts = content.starts_with('/') || content.starts_with('\\');
    let ends = content.ends_with('/') || content.ends_with('\\');
    starts && ends && content.len() > 1
}
