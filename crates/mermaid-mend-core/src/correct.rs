//! Post-render correction of renderer SVG output.
//!
//! Renderers pick text colors, font sizes and viewBoxes that read poorly once the diagram is
//! embedded in a course page. The corrector rewrites those attributes in a single streaming pass
//! over the fragment (no structural changes):
//!
//! - text visibility: every `<text>`/`<tspan>` gets the policy fill and no stroke
//! - font size: every `<text>` (and every `<tspan>` declaring its own size) gets a
//!   floored/enlarged size, then [`FONT_MARKER`]
//! - viewBox: the root `<svg>` origin is repaired (and optionally padded), then
//!   [`VIEWBOX_MARKER`]
//! - foreign content: HTML label containers inside `<foreignObject>` get the floor and fill
//!
//! The markers make a second pass a no-op for the size and geometry rules, so a fragment can be
//! corrected as often as a host likes.

use crate::policy::CorrectionPolicy;
use crate::style::{Declarations, font_size_px, root_rule_font_size};
use crate::viewbox::{ViewBox, fmt_number};
use lol_html::html_content::{Element, EndTag};
use lol_html::{RewriteStrSettings, element, rewrite_str, text};
use std::cell::RefCell;
use std::rc::Rc;

/// Set on a text node (or foreign label) once its font size has been corrected.
pub const FONT_MARKER: &str = "data-mend-font";
/// Set on the root `<svg>` once its viewBox has been rewritten.
pub const VIEWBOX_MARKER: &str = "data-viewbox-adjusted";

/// What one correction pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    /// `<text>`/`<tspan>` nodes that received the visibility override.
    pub text_nodes: usize,
    /// Sized text nodes (`<text>`, or `<tspan>` with its own size) corrected in this pass.
    pub fonts_resized: usize,
    /// Sized text nodes skipped because an earlier pass already corrected them.
    pub fonts_already_corrected: usize,
    /// HTML label containers inside `<foreignObject>` corrected in this pass.
    pub foreign_labels: usize,
    pub viewbox_adjusted: bool,
    /// The fragment had a root `<svg>` element.
    pub found_svg: bool,
}

impl CorrectionReport {
    /// True when this pass changed a size or geometry (as opposed to re-applying colors).
    pub fn changed_layout(&self) -> bool {
        self.fonts_resized > 0 || self.foreign_labels > 0 || self.viewbox_adjusted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Corrected {
    pub svg: String,
    pub report: CorrectionReport,
}

#[derive(Debug, Default)]
struct PassState {
    report: CorrectionReport,
    root_id: String,
    root_font: Option<f64>,
    stylesheet: String,
    /// Font sizes declared by open `<svg>`/`<g>` ancestors, innermost last.
    font_stack: Vec<f64>,
    foreign_depth: usize,
}

impl PassState {
    fn inherited_font(&self, policy: &CorrectionPolicy) -> f64 {
        self.font_stack
            .last()
            .copied()
            .or(self.root_font)
            .unwrap_or(policy.default_font_size)
    }
}

type Shared = Rc<RefCell<PassState>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Applies every correction pass to `svg` under `policy`.
///
/// `svg` may be a bare `<svg>` fragment or markup that contains one (for example the placeholder
/// `<div>` a renderer filled in); the first `<svg>` encountered is treated as the root. Input
/// without any SVG, or markup the rewriter cannot parse, is returned unchanged.
pub fn correct_fragment(svg: &str, policy: &CorrectionPolicy) -> Corrected {
    let state: Shared = Rc::default();

    let element_state = Rc::clone(&state);
    let style_state = Rc::clone(&state);
    let handlers = vec![
        element!("*", |el| on_element(el, &element_state, policy)),
        text!("style", |chunk| {
            let mut st = style_state.borrow_mut();
            st.stylesheet.push_str(chunk.as_str());
            if chunk.last_in_text_node() && st.root_font.is_none() {
                let found =
                    root_rule_font_size(&st.stylesheet, &st.root_id, policy.default_font_size);
                st.root_font = found;
            }
            Ok(())
        }),
    ];

    let rewritten = rewrite_str(
        svg,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::new()
        },
    );

    let report = state.borrow().report;
    match rewritten {
        Ok(out) => {
            tracing::debug!(
                text_nodes = report.text_nodes,
                fonts_resized = report.fonts_resized,
                foreign_labels = report.foreign_labels,
                viewbox_adjusted = report.viewbox_adjusted,
                "corrected fragment"
            );
            Corrected { svg: out, report }
        }
        Err(err) => {
            tracing::warn!(error = %err, "fragment correction skipped: markup not rewritable");
            Corrected {
                svg: svg.to_string(),
                report: CorrectionReport::default(),
            }
        }
    }
}

fn on_element(
    el: &mut Element<'_, '_>,
    state: &Shared,
    policy: &CorrectionPolicy,
) -> HandlerResult {
    let tag = el.tag_name().to_ascii_lowercase();
    let in_foreign = state.borrow().foreign_depth > 0;
    match tag.as_str() {
        "svg" => {
            let is_root = !state.borrow().report.found_svg;
            if is_root {
                {
                    let mut st = state.borrow_mut();
                    st.report.found_svg = true;
                    st.root_id = el.get_attribute("id").unwrap_or_default();
                }
                correct_root(el, state, policy)?;
            }
            push_declared_font(el, state, policy);
        }
        "g" => push_declared_font(el, state, policy),
        "text" => correct_text(el, state, policy, true)?,
        "tspan" => correct_text(el, state, policy, false)?,
        "foreignobject" => {
            if let Some(handlers) = el.end_tag_handlers() {
                state.borrow_mut().foreign_depth += 1;
                let st = Rc::clone(state);
                handlers.push(Box::new(move |_end: &mut EndTag<'_>| -> HandlerResult {
                    let mut st = st.borrow_mut();
                    st.foreign_depth = st.foreign_depth.saturating_sub(1);
                    Ok(())
                }));
            }
        }
        "div" | "span" | "p" if in_foreign => {
            correct_foreign_label(el, state, policy)?;
        }
        _ => {}
    }
    Ok(())
}

fn correct_root(
    el: &mut Element<'_, '_>,
    state: &Shared,
    policy: &CorrectionPolicy,
) -> HandlerResult {
    if policy.release_max_width {
        if let Some(style) = el.get_attribute("style") {
            let mut decls = Declarations::parse(&style);
            if decls.get("max-width").is_some() {
                decls.remove("max-width");
                if decls.is_empty() {
                    el.remove_attribute("style");
                } else {
                    el.set_attribute("style", &decls.to_string())?;
                }
            }
        }
    }

    if el.has_attribute(VIEWBOX_MARKER) {
        return Ok(());
    }
    let Some(raw) = el.get_attribute("viewBox") else {
        return Ok(());
    };
    let original = match raw.parse::<ViewBox>() {
        Ok(vb) => vb,
        Err(err) => {
            tracing::debug!(error = %err, "leaving viewBox untouched");
            return Ok(());
        }
    };

    let mut adjusted = original;
    if let Some(repaired) = adjusted.repair_origin(policy.origin_repair_threshold) {
        adjusted = repaired;
    }
    if let Some(padding) = &policy.viewbox_padding {
        adjusted = adjusted.padded(padding);
    }
    if adjusted != original {
        el.set_attribute("viewBox", &adjusted.to_string())?;
        el.set_attribute(VIEWBOX_MARKER, "true")?;
        state.borrow_mut().report.viewbox_adjusted = true;
        tracing::debug!(from = %original, to = %adjusted, "adjusted viewBox");
    }
    Ok(())
}

/// Tracks font sizes declared on containers so text inside them resolves its inherited size.
fn push_declared_font(el: &mut Element<'_, '_>, state: &Shared, policy: &CorrectionPolicy) {
    let parent = state.borrow().inherited_font(policy);
    let root = policy.default_font_size;
    let declared = el
        .get_attribute("style")
        .and_then(|style| {
            Declarations::parse(&style)
                .get("font-size")
                .and_then(|v| font_size_px(v, parent, root))
        })
        .or_else(|| {
            el.get_attribute("font-size")
                .and_then(|v| font_size_px(&v, parent, root))
        });
    let Some(size) = declared else {
        return;
    };
    let Some(handlers) = el.end_tag_handlers() else {
        return;
    };
    state.borrow_mut().font_stack.push(size);
    let st = Rc::clone(state);
    handlers.push(Box::new(move |_end: &mut EndTag<'_>| -> HandlerResult {
        st.borrow_mut().font_stack.pop();
        Ok(())
    }));
}

fn correct_text(
    el: &mut Element<'_, '_>,
    state: &Shared,
    policy: &CorrectionPolicy,
    is_text: bool,
) -> HandlerResult {
    let mut decls = el
        .get_attribute("style")
        .map(|s| Declarations::parse(&s))
        .unwrap_or_default();
    decls.set_important("fill", &policy.text_fill);
    decls.set_important("stroke", "none");

    let mut st = state.borrow_mut();
    st.report.text_nodes += 1;

    let parent = st.inherited_font(policy);
    let root = policy.default_font_size;
    let declared = decls
        .get("font-size")
        .and_then(|v| font_size_px(v, parent, root))
        .or_else(|| {
            el.get_attribute("font-size")
                .and_then(|v| font_size_px(&v, parent, root))
        });

    // A `<tspan>` without its own size renders at its `<text>` size, which is corrected there.
    let resolved = if !is_text && declared.is_none() {
        None
    } else if let Some(done) = el.get_attribute(FONT_MARKER) {
        st.report.fonts_already_corrected += 1;
        done.parse::<f64>().ok()
    } else {
        let target = policy.corrected_font_size(declared.unwrap_or(parent));
        apply_font(&mut decls, target, policy);
        el.set_attribute(FONT_MARKER, &fmt_number(target))?;
        st.report.fonts_resized += 1;
        Some(target)
    };

    // Relative sizes on nested `<tspan>`s resolve against the corrected size.
    if let Some(size) = resolved.filter(|_| is_text) {
        if let Some(handlers) = el.end_tag_handlers() {
            st.font_stack.push(size);
            let shared = Rc::clone(state);
            handlers.push(Box::new(move |_end: &mut EndTag<'_>| -> HandlerResult {
                shared.borrow_mut().font_stack.pop();
                Ok(())
            }));
        }
    }

    el.set_attribute("style", &decls.to_string())?;
    Ok(())
}

fn correct_foreign_label(
    el: &mut Element<'_, '_>,
    state: &Shared,
    policy: &CorrectionPolicy,
) -> HandlerResult {
    if el.has_attribute(FONT_MARKER) {
        return Ok(());
    }
    let mut st = state.borrow_mut();
    let parent = st.inherited_font(policy);
    let mut decls = el
        .get_attribute("style")
        .map(|s| Declarations::parse(&s))
        .unwrap_or_default();
    let current = decls
        .get("font-size")
        .and_then(|v| font_size_px(v, parent, policy.default_font_size))
        .unwrap_or(parent);
    let target = current.max(policy.min_font_size);

    apply_font(&mut decls, target, policy);
    decls.set_important("color", &policy.text_fill);
    el.set_attribute("style", &decls.to_string())?;
    el.set_attribute(FONT_MARKER, &fmt_number(target))?;
    st.report.foreign_labels += 1;
    Ok(())
}

fn apply_font(decls: &mut Declarations, size: f64, policy: &CorrectionPolicy) {
    decls.set_important("font-size", &format!("{}px", fmt_number(size)));
    if let Some(weight) = &policy.font_weight {
        decls.set_important("font-weight", weight);
    }
    if let Some(family) = &policy.font_family {
        decls.set_important("font-family", family);
    }
}
