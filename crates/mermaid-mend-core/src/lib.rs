#![forbid(unsafe_code)]

//! Diagram source cleaning and post-render correction for Mermaid output (headless).
//!
//! This crate holds the executor-free half of `mermaid-mend`:
//! - turn the raw text of a page placeholder into a definition the renderer accepts
//!   ([`clean_definition`])
//! - normalize the SVG fragment a renderer produced ([`correct_fragment`]) under an explicit
//!   [`CorrectionPolicy`]
//!
//! Every operation here is best-effort and idempotent: feeding an output back in yields the same
//! output, and malformed input is passed through rather than rejected.

pub mod correct;
pub mod entities;
pub mod error;
pub mod extract;
pub mod policy;
pub mod style;
pub mod viewbox;

pub use correct::{CorrectionReport, Corrected, correct_fragment};
pub use entities::decode_entities;
pub use error::{Error, Result};
pub use extract::{clean_definition, extract_definition, repair_labels, strip_common_indent};
pub use policy::{CorrectionPolicy, ViewBoxPadding};
pub use viewbox::ViewBox;

#[cfg(test)]
mod tests;
