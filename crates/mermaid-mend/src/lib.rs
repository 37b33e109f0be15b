#![forbid(unsafe_code)]

//! `mermaid-mend` renders Mermaid placeholders in static HTML pages and normalizes the SVG that
//! comes back.
//!
//! The flow for one page:
//! 1. [`Page::parse`] finds unprocessed placeholders and cleans their text into definitions
//! 2. [`Pipeline::process`] renders every definition through a [`DiagramRenderer`] and corrects
//!    each fragment as soon as its render completes
//! 3. [`Page::to_html`] grafts fragments (or inline errors) back into their placeholders
//!
//! Hosts that insert diagrams themselves can subscribe with [`Page::observe`] and let a
//! [`FragmentWatcher`] correct what they insert.
//!
//! The pure transforms live in `mermaid-mend-core` and are re-exported here.

pub use mermaid_mend_core::*;

pub mod config;
pub mod page;
pub mod pipeline;
pub mod render;
pub mod watch;

mod error;

pub use config::{MendConfig, RendererCommand};
pub use error::{Error as MendError, Result as MendResult};
pub use page::{InsertedNode, Mutation, PROCESSED_ATTR, Page, PlaceholderRules, Slot, SlotState};
pub use pipeline::{PageSummary, Pipeline};
pub use render::{
    CommandRenderer, DiagramRenderer, PINNED_RENDERER_VERSION, RenderError, RenderRequest,
    RendererProfile, render_error_html,
};
pub use watch::{FragmentWatcher, next_batch};

#[cfg(test)]
mod tests;
