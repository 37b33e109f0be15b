//! Mutation fallback: correct fragments that appear in slots outside the render pipeline.
//!
//! Hosts that insert rendered diagrams themselves (or re-render them later) notify through
//! [`Page::observe`]. The watcher groups whatever notifications are queued into one batch and
//! runs exactly one correction pass per affected fragment.

use crate::page::{InsertedNode, Mutation, Page};
use futures::{FutureExt, StreamExt};
use futures::channel::mpsc::UnboundedReceiver;
use mermaid_mend_core::CorrectionPolicy;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct FragmentWatcher {
    policy: CorrectionPolicy,
    output_prefix: String,
}

impl FragmentWatcher {
    /// `output_prefix` is the id prefix of diagram roots (see `PlaceholderRules::id_prefix`).
    pub fn new(policy: CorrectionPolicy, output_prefix: impl Into<String>) -> Self {
        Self {
            policy,
            output_prefix: output_prefix.into(),
        }
    }

    /// True when `node` is diagram output: an `<svg>` or an element carrying a diagram id.
    pub fn is_diagram_output(&self, node: &InsertedNode) -> bool {
        node.tag == "svg"
            || node
                .id
                .as_deref()
                .is_some_and(|id| id.starts_with(&self.output_prefix))
    }

    /// Runs one correction pass per slot named by a relevant mutation in `batch`.
    ///
    /// Returns the ids of the corrected slots in page order of their ids.
    pub fn apply(&self, page: &mut Page, batch: &[Mutation]) -> Vec<String> {
        let targets: BTreeSet<&str> = batch
            .iter()
            .filter(|m| self.is_diagram_output(&m.node))
            .map(|m| m.target.as_str())
            .collect();

        let mut corrected = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(slot) = page.slot_mut(target) else {
                tracing::debug!(slot = target, "mutation outside any diagram slot");
                continue;
            };
            if let Some(report) = slot.correct(&self.policy) {
                tracing::debug!(slot = target, ?report, "corrected injected fragment");
                corrected.push(target.to_string());
            }
        }
        corrected
    }

    /// Applies every mutation already queued on `rx` as a single batch, without waiting.
    pub fn settle(&self, page: &mut Page, rx: &mut UnboundedReceiver<Mutation>) -> Vec<String> {
        let batch = drain_ready(rx, Vec::new());
        if batch.is_empty() {
            return Vec::new();
        }
        self.apply(page, &batch)
    }
}

/// Waits for the next notification, then collects everything else already queued.
///
/// Returns `None` once every sender is gone.
pub async fn next_batch(rx: &mut UnboundedReceiver<Mutation>) -> Option<Vec<Mutation>> {
    let first = rx.next().await?;
    Some(drain_ready(rx, vec![first]))
}

fn drain_ready(rx: &mut UnboundedReceiver<Mutation>, mut batch: Vec<Mutation>) -> Vec<Mutation> {
    while let Some(Some(mutation)) = rx.next().now_or_never() {
        batch.push(mutation);
    }
    batch
}
