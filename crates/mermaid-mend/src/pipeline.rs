//! Render scheduling: render every slot of a page, correcting each fragment as soon as its render
//! completes.

use crate::page::{Page, SlotState};
use crate::render::{DiagramRenderer, RenderError, RenderRequest, RendererProfile};
use futures::future::join_all;
use mermaid_mend_core::{CorrectionPolicy, correct_fragment};

/// Outcome of processing one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub diagrams: usize,
    pub rendered: usize,
    pub failed: usize,
    /// The renderer could not be used; every placeholder was left untouched.
    pub unavailable: bool,
}

impl PageSummary {
    pub fn is_clean(&self) -> bool {
        !self.unavailable && self.failed == 0
    }
}

pub struct Pipeline<R> {
    renderer: R,
    policy: CorrectionPolicy,
    profile: Option<RendererProfile>,
}

impl<R: DiagramRenderer> Pipeline<R> {
    pub fn new(renderer: R, policy: CorrectionPolicy) -> Self {
        Self {
            renderer,
            policy,
            profile: None,
        }
    }

    /// Prefixes each definition with the profile's init directive before rendering.
    pub fn with_profile(mut self, profile: RendererProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn policy(&self) -> &CorrectionPolicy {
        &self.policy
    }

    fn request_for(&self, id: String, definition: &str) -> RenderRequest {
        let definition = match &self.profile {
            Some(profile) => profile.apply(definition).into_owned(),
            None => definition.to_string(),
        };
        RenderRequest { id, definition }
    }

    /// Renders and corrects every pending slot of `page`.
    ///
    /// Every render is started through one `join_all`; how far they overlap is up to the
    /// renderer ([`CommandRenderer`](crate::render::CommandRenderer) blocks, so its renders run
    /// one after another). One failure is recorded on its own slot and never blocks the others.
    /// If the renderer is unavailable nothing is touched.
    pub async fn process(&self, page: &mut Page) -> PageSummary {
        let pending: Vec<(usize, RenderRequest)> = page
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot.state, SlotState::Pending))
            .map(|(pos, slot)| (pos, self.request_for(slot.svg_id(), &slot.definition)))
            .collect();

        let mut summary = PageSummary {
            diagrams: pending.len(),
            ..PageSummary::default()
        };
        if pending.is_empty() {
            return summary;
        }

        if let Err(err) = self.renderer.ready().await {
            tracing::error!(error = %err, diagrams = pending.len(), "renderer unavailable; leaving diagrams as source");
            summary.unavailable = true;
            return summary;
        }

        let outcomes = join_all(pending.iter().map(|(pos, request)| async move {
            let outcome = self
                .renderer
                .render(request)
                .await
                .map(|svg| correct_fragment(&svg, &self.policy));
            (*pos, outcome)
        }))
        .await;

        for (pos, outcome) in outcomes {
            let Some(slot) = page.slots_mut().get_mut(pos) else {
                continue;
            };
            match outcome {
                Ok(corrected) => {
                    tracing::debug!(slot = %slot.id, report = ?corrected.report, "diagram rendered");
                    slot.accept(corrected);
                    summary.rendered += 1;
                }
                Err(RenderError::Unavailable { message }) => {
                    tracing::error!(slot = %slot.id, %message, "renderer became unavailable");
                    summary.unavailable = true;
                }
                Err(err) => {
                    tracing::warn!(slot = %slot.id, error = %err, "diagram failed to render");
                    slot.state = SlotState::Failed(err);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Parses `html`, processes it, and returns the rewritten page.
    pub async fn process_html(
        &self,
        html: &str,
        rules: crate::page::PlaceholderRules,
    ) -> crate::MendResult<(String, PageSummary)> {
        let mut page = Page::parse(html, rules)?;
        let summary = self.process(&mut page).await;
        Ok((page.to_html()?, summary))
    }
}
