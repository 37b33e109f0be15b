//! Page model: diagram placeholders found in static HTML, and the fragments rendered into them.
//!
//! A [`Page`] is built by scanning the HTML once ([`Page::parse`]). Each unprocessed placeholder
//! becomes a [`Slot`] holding its raw text, the cleaned definition and a page-unique id. Rendered
//! or failed output is grafted back with [`Page::to_html`]; everything outside the placeholders
//! is emitted byte-for-byte.

use crate::error::{Error, Result};
use crate::render::{RenderError, render_error_html};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use lol_html::html_content::{ContentType, Element, EndTag};
use lol_html::{RewriteStrSettings, doc_text, element, rewrite_str};
use mermaid_mend_core::{Corrected, CorrectionPolicy, CorrectionReport, extract_definition};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Attribute set on a placeholder once it holds rendered (or error) content.
pub const PROCESSED_ATTR: &str = "data-processed";

type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Which elements count as diagram placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaceholderRules {
    /// Class that marks a placeholder.
    pub class: String,
    /// Lowercase tag names a placeholder may use.
    pub tags: Vec<String>,
    /// Prefix for generated slot ids, and for the ids of rendered diagram roots.
    pub id_prefix: String,
}

impl Default for PlaceholderRules {
    fn default() -> Self {
        Self {
            class: "mermaid".to_string(),
            tags: vec!["pre".to_string(), "div".to_string()],
            id_prefix: "mermaid".to_string(),
        }
    }
}

impl PlaceholderRules {
    pub fn validate(&self) -> Result<()> {
        let class_ok = !self.class.is_empty()
            && self
                .class
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !class_ok {
            return Err(Error::InvalidPlaceholderClass {
                class: self.class.clone(),
            });
        }
        if self.tags.is_empty() {
            return Err(Error::InvalidPlaceholderRules {
                message: "at least one placeholder tag is required".to_string(),
            });
        }
        if sanitize_id(&self.id_prefix, "m") != self.id_prefix {
            return Err(Error::InvalidPlaceholderRules {
                message: format!("`{}` is not a usable id prefix", self.id_prefix),
            });
        }
        Ok(())
    }

    fn is_placeholder(&self, el: &Element<'_, '_>) -> bool {
        let tag = el.tag_name().to_ascii_lowercase();
        if !self.tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            return false;
        }
        el.get_attribute("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == self.class))
    }
}

/// Where a slot's diagram is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    /// Not rendered yet; the placeholder keeps its source text.
    Pending,
    /// The renderer produced this (corrected) fragment.
    Rendered(String),
    /// The renderer rejected the definition.
    Failed(RenderError),
}

/// One diagram placeholder and what has been done to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Position among the page's unprocessed placeholders.
    pub index: usize,
    /// Page-unique id; the placeholder carries it once grafted.
    pub id: String,
    /// Placeholder text exactly as found in the page (entities undecoded).
    pub raw: String,
    /// Definition handed to the renderer.
    pub definition: String,
    pub state: SlotState,
    /// Correction passes applied to the current fragment.
    pub correction_passes: u32,
}

impl Slot {
    /// Id for the rendered root `<svg>`.
    pub fn svg_id(&self) -> String {
        format!("{}-svg", self.id)
    }

    pub fn fragment(&self) -> Option<&str> {
        match &self.state {
            SlotState::Rendered(svg) => Some(svg),
            _ => None,
        }
    }

    /// Stores a corrected fragment, replacing whatever the slot held.
    pub fn accept(&mut self, corrected: Corrected) {
        self.state = SlotState::Rendered(corrected.svg);
        self.correction_passes = 1;
    }

    /// Runs one more correction pass over the current fragment.
    pub fn correct(&mut self, policy: &CorrectionPolicy) -> Option<CorrectionReport> {
        let SlotState::Rendered(svg) = &self.state else {
            return None;
        };
        let corrected = mermaid_mend_core::correct_fragment(svg, policy);
        self.state = SlotState::Rendered(corrected.svg);
        self.correction_passes += 1;
        Some(corrected.report)
    }
}

/// The element a host inserted into a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedNode {
    /// Lowercase tag name.
    pub tag: String,
    pub id: Option<String>,
}

/// A child-list change inside a slot, as seen by an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Id of the slot whose subtree changed.
    pub target: String,
    pub node: InsertedNode,
}

#[derive(Debug)]
pub struct Page {
    html: String,
    rules: PlaceholderRules,
    slots: Vec<Slot>,
    observers: Vec<UnboundedSender<Mutation>>,
}

#[derive(Debug, Default)]
struct Found {
    id: Option<String>,
    raw: String,
}

/// Tracks placeholder boundaries while streaming: which placeholder (if any) is open.
#[derive(Debug, Default)]
struct Cursor {
    next: usize,
    open: Option<usize>,
}

type SharedCursor = Rc<RefCell<Cursor>>;

/// Returns the index of the placeholder `el` opens, or `None` for any other element.
///
/// Processed placeholders and placeholders nested inside another one are not counted, so the scan
/// and graft passes agree on indices.
fn enter_placeholder(
    el: &mut Element<'_, '_>,
    rules: &PlaceholderRules,
    cursor: &SharedCursor,
) -> Option<usize> {
    if cursor.borrow().open.is_some()
        || !rules.is_placeholder(el)
        || el.has_attribute(PROCESSED_ATTR)
    {
        return None;
    }
    let index = {
        let mut c = cursor.borrow_mut();
        let index = c.next;
        c.next += 1;
        index
    };
    if let Some(handlers) = el.end_tag_handlers() {
        cursor.borrow_mut().open = Some(index);
        let cursor = Rc::clone(cursor);
        handlers.push(Box::new(move |_end: &mut EndTag<'_>| -> HandlerResult {
            cursor.borrow_mut().open = None;
            Ok(())
        }));
    }
    Some(index)
}

impl Page {
    /// Scans `html` for unprocessed placeholders.
    pub fn parse(html: &str, rules: PlaceholderRules) -> Result<Self> {
        rules.validate()?;

        let cursor: SharedCursor = Rc::default();
        let found: Rc<RefCell<Vec<Found>>> = Rc::default();

        let el_cursor = Rc::clone(&cursor);
        let el_found = Rc::clone(&found);
        let text_cursor = Rc::clone(&cursor);
        let text_found = Rc::clone(&found);
        let rules_ref = &rules;
        rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![element!("*", |el| {
                    if enter_placeholder(el, rules_ref, &el_cursor).is_some() {
                        el_found.borrow_mut().push(Found {
                            id: el.get_attribute("id"),
                            raw: String::new(),
                        });
                    }
                    Ok(())
                })],
                document_content_handlers: vec![doc_text!(|chunk| {
                    if let Some(index) = text_cursor.borrow().open {
                        if let Some(slot) = text_found.borrow_mut().get_mut(index) {
                            slot.raw.push_str(chunk.as_str());
                        }
                    }
                    Ok(())
                })],
                ..RewriteStrSettings::new()
            },
        )?;

        let found = std::mem::take(&mut *found.borrow_mut());
        let mut used = HashSet::new();
        let slots = found
            .into_iter()
            .enumerate()
            .map(|(index, Found { id, raw })| {
                let base = match id.as_deref().map(str::trim) {
                    Some(existing) if !existing.is_empty() => sanitize_id(existing, &rules.id_prefix),
                    _ => format!("{}-{index}", rules.id_prefix),
                };
                let id = unique_id(base, &mut used);
                let definition = extract_definition(&raw);
                tracing::debug!(slot = %id, bytes = definition.len(), "found diagram placeholder");
                Slot {
                    index,
                    id,
                    raw,
                    definition,
                    state: SlotState::Pending,
                    correction_passes: 0,
                }
            })
            .collect();

        Ok(Self {
            html: html.to_string(),
            rules,
            slots,
            observers: Vec::new(),
        })
    }

    pub fn rules(&self) -> &PlaceholderRules {
        &self.rules
    }

    pub fn source(&self) -> &str {
        &self.html
    }

    pub fn has_diagrams(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    pub fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn slot_mut(&mut self, id: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.id == id)
    }

    /// Subscribes to child-list changes inside slots.
    ///
    /// Every later [`Page::inject`] is reported to every live receiver.
    pub fn observe(&mut self) -> UnboundedReceiver<Mutation> {
        let (tx, rx) = mpsc::unbounded();
        self.observers.push(tx);
        rx
    }

    /// Replaces a slot's content with host-supplied markup and notifies observers.
    ///
    /// Returns `false` when no slot has `slot_id`. The markup is stored as the slot's fragment
    /// without correction; the observer decides whether a pass is due.
    pub fn inject(&mut self, slot_id: &str, markup: &str) -> bool {
        let Some(slot) = self.slot_mut(slot_id) else {
            return false;
        };
        slot.state = SlotState::Rendered(markup.to_string());
        slot.correction_passes = 0;

        let Some(node) = first_element(markup) else {
            return true;
        };
        let mutation = Mutation {
            target: slot_id.to_string(),
            node,
        };
        self.observers
            .retain(|tx| tx.unbounded_send(mutation.clone()).is_ok());
        true
    }

    /// Serializes the page with every rendered or failed slot grafted into its placeholder.
    ///
    /// Pending slots are left exactly as found.
    pub fn to_html(&self) -> Result<String> {
        if self
            .slots
            .iter()
            .all(|s| matches!(s.state, SlotState::Pending))
        {
            return Ok(self.html.clone());
        }

        let cursor: SharedCursor = Rc::default();
        let rules = &self.rules;
        let slots = &self.slots;
        let out = rewrite_str(
            &self.html,
            RewriteStrSettings {
                element_content_handlers: vec![element!("*", |el| {
                    let Some(index) = enter_placeholder(el, rules, &cursor) else {
                        return Ok(());
                    };
                    let Some(slot) = slots.get(index) else {
                        return Ok(());
                    };
                    match &slot.state {
                        SlotState::Pending => {}
                        SlotState::Rendered(svg) => {
                            el.set_inner_content(svg, ContentType::Html);
                            mark_processed(el, &slot.id)?;
                        }
                        SlotState::Failed(err) => {
                            el.set_inner_content(&render_error_html(err), ContentType::Html);
                            mark_processed(el, &slot.id)?;
                        }
                    }
                    Ok(())
                })],
                ..RewriteStrSettings::new()
            },
        )?;
        Ok(out)
    }
}

fn mark_processed(el: &mut Element<'_, '_>, id: &str) -> HandlerResult {
    if el.tag_name().eq_ignore_ascii_case("pre") {
        el.set_tag_name("div")?;
    }
    el.set_attribute("id", id)?;
    el.set_attribute(PROCESSED_ATTR, "true")?;
    Ok(())
}

/// Tag and id of the first element in `markup`.
fn first_element(markup: &str) -> Option<InsertedNode> {
    let first: RefCell<Option<InsertedNode>> = RefCell::new(None);
    let scanned = rewrite_str(
        markup,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                let mut first = first.borrow_mut();
                if first.is_none() {
                    *first = Some(InsertedNode {
                        tag: el.tag_name().to_ascii_lowercase(),
                        id: el.get_attribute("id"),
                    });
                }
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    );
    if let Err(err) = scanned {
        tracing::debug!(error = %err, "injected markup not scannable");
    }
    first.into_inner()
}

/// Converts an arbitrary string into a conservative id token.
///
/// Unsupported characters become `-`, runs of `-` collapse, and an id that does not start with an
/// ASCII letter gets `{prefix}-` in front.
pub fn sanitize_id(raw: &str, prefix: &str) -> String {
    let raw = raw.trim();
    let mut out = String::with_capacity(raw.len() + prefix.len() + 1);
    for ch in raw.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == ':' || ch == '.';
        out.push(if ok { ch } else { '-' });
    }
    while out.contains("--") {
        out = out.replace("--", "-");
    }
    let out = out.trim_matches('-');
    if out.is_empty() {
        return format!("{prefix}-untitled");
    }
    if !out.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return format!("{prefix}-{out}");
    }
    out.to_string()
}

fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
