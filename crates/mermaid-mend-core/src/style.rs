//! Inline `style` attribute handling and CSS font-size resolution.

use std::fmt;

const IMPORTANT: &str = "!important";

/// An ordered list of `property: value` declarations from a `style` attribute.
///
/// Property names are stored lowercase. Values keep their `!important` flag verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    items: Vec<(String, String)>,
}

impl Declarations {
    pub fn parse(style: &str) -> Self {
        let items = style
            .split(';')
            .filter_map(|decl| {
                let (prop, value) = decl.split_once(':')?;
                let prop = prop.trim().to_ascii_lowercase();
                let value = value.trim();
                if prop.is_empty() || value.is_empty() {
                    return None;
                }
                Some((prop, value.to_string()))
            })
            .collect();
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Last declared value for `prop`, without any `!important` flag.
    pub fn get(&self, prop: &str) -> Option<&str> {
        self.items
            .iter()
            .rev()
            .find(|(p, _)| p.eq_ignore_ascii_case(prop))
            .map(|(_, v)| strip_important(v))
    }

    pub fn remove(&mut self, prop: &str) {
        self.items.retain(|(p, _)| !p.eq_ignore_ascii_case(prop));
    }

    /// Sets `prop` to `value !important`, keeping the position of its first declaration so that
    /// re-applying the same value leaves the serialized style byte-identical.
    pub fn set_important(&mut self, prop: &str, value: &str) {
        let value = format!("{} {IMPORTANT}", strip_important(value));
        match self
            .items
            .iter()
            .position(|(p, _)| p.eq_ignore_ascii_case(prop))
        {
            Some(first) => {
                self.items[first].1 = value;
                let mut idx = 0usize;
                self.items.retain(|(p, _)| {
                    let keep = idx <= first || !p.eq_ignore_ascii_case(prop);
                    idx += 1;
                    keep
                });
            }
            None => self.items.push((prop.to_ascii_lowercase(), value)),
        }
    }
}

impl fmt::Display for Declarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (prop, value)) in self.items.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{prop}: {value};")?;
        }
        Ok(())
    }
}

fn strip_important(value: &str) -> &str {
    let trimmed = value.trim_end();
    match trimmed
        .len()
        .checked_sub(IMPORTANT.len())
        .and_then(|at| trimmed.get(at..).map(|tail| (at, tail)))
    {
        Some((at, tail)) if tail.eq_ignore_ascii_case(IMPORTANT) => trimmed[..at].trim_end(),
        _ => trimmed,
    }
}

/// Resolves a CSS `font-size` value to pixels.
///
/// `parent_px` anchors relative units (`em`, `%`); `rem` is anchored to `root_px`. Keywords
/// such as `medium` are not resolved and yield `None`.
pub fn font_size_px(value: &str, parent_px: f64, root_px: f64) -> Option<f64> {
    let v = strip_important(value).trim().to_ascii_lowercase();
    let (number, scale) = if let Some(n) = v.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = v.strip_suffix("pt") {
        (n, 4.0 / 3.0)
    } else if let Some(n) = v.strip_suffix("rem") {
        (n, root_px)
    } else if let Some(n) = v.strip_suffix("em") {
        (n, parent_px)
    } else if let Some(n) = v.strip_suffix('%') {
        (n, parent_px / 100.0)
    } else {
        (v.as_str(), 1.0)
    };
    let n = number.trim().parse::<f64>().ok()?;
    let px = n * scale;
    (px.is_finite() && px > 0.0).then_some(px)
}

/// Finds the `font-size` of the rule whose selector is exactly `#<id>` in a stylesheet.
///
/// Mermaid scopes its theme CSS to the root `<svg>` id (`#mermaid-0{font-size:16px;...}`), which
/// is what text inside the fragment inherits.
pub fn root_rule_font_size(css: &str, id: &str, root_px: f64) -> Option<f64> {
    if id.is_empty() {
        return None;
    }
    let needle = format!("#{id}");
    let mut found = None;
    let mut pos = 0usize;
    while let Some(rel) = css[pos..].find(&needle) {
        let after = pos + rel + needle.len();
        pos = after;
        let rest = css[after..].trim_start();
        let Some(body) = rest.strip_prefix('{') else {
            continue;
        };
        let Some(end) = body.find('}') else {
            break;
        };
        let decls = Declarations::parse(&body[..end]);
        if let Some(size) = decls
            .get("font-size")
            .and_then(|v| font_size_px(v, root_px, root_px))
        {
            found = Some(size);
        }
    }
    found
}
