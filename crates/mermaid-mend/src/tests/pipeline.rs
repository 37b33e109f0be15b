use super::FakeRenderer;
use crate::page::{Page, PlaceholderRules, SlotState};
use crate::pipeline::Pipeline;
use crate::render::RendererProfile;
use futures::executor::block_on;
use mermaid_mend_core::CorrectionPolicy;

const PAGE: &str = r#"<main>
<pre class="mermaid">graph TD
 A-->B</pre>
<pre class="mermaid">graph TD
 A--></pre>
<pre class="mermaid">graph LR
 C-->D</pre>
</main>"#;

#[test]
fn failures_stay_with_their_own_slot() {
    let pipeline = Pipeline::new(FakeRenderer::default(), CorrectionPolicy::default());
    let mut page = Page::parse(PAGE, PlaceholderRules::default()).unwrap();
    let summary = block_on(pipeline.process(&mut page));

    assert_eq!(summary.diagrams, 3);
    assert_eq!(summary.rendered, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.unavailable);
    assert!(!summary.is_clean());

    let slots = page.slots();
    assert!(matches!(slots[0].state, SlotState::Rendered(_)));
    assert!(matches!(slots[1].state, SlotState::Failed(_)));
    assert!(matches!(slots[2].state, SlotState::Rendered(_)));
    assert_eq!(slots[0].correction_passes, 1);
    assert_eq!(slots[1].correction_passes, 0);

    let html = page.to_html().unwrap();
    assert_eq!(html.matches("<svg").count(), 2);
    assert_eq!(html.matches("Error rendering diagram: Parse error").count(), 1);
}

#[test]
fn fragments_are_corrected_on_completion() {
    let policy = CorrectionPolicy::default();
    let pipeline = Pipeline::new(FakeRenderer::default(), policy.clone());
    assert_eq!(pipeline.policy(), &policy);
    let mut page = Page::parse(PAGE, PlaceholderRules::default()).unwrap();
    block_on(pipeline.process(&mut page));

    let svg = page.slots()[0].fragment().unwrap();
    assert!(svg.contains(r#"id="mermaid-0-svg""#));
    assert!(svg.contains(r#"viewBox="0 0 320 100""#));
    assert!(svg.contains(r#"data-viewbox-adjusted="true""#));
    assert!(svg.contains(r#"data-mend-font="20""#));
    assert!(svg.contains("fill: #000 !important"));
}

#[test]
fn unavailable_renderer_leaves_page_untouched() {
    let renderer = FakeRenderer {
        unavailable: true,
        ..FakeRenderer::default()
    };
    let pipeline = Pipeline::new(renderer, CorrectionPolicy::default());
    let (html, summary) =
        block_on(pipeline.process_html(PAGE, PlaceholderRules::default())).unwrap();

    assert!(summary.unavailable);
    assert_eq!(summary.rendered, 0);
    assert_eq!(html, PAGE);
    assert!(pipeline.renderer().requests.borrow().is_empty());
}

#[test]
fn requests_use_cleaned_definitions_and_svg_ids() {
    let pipeline = Pipeline::new(FakeRenderer::default(), CorrectionPolicy::default());
    let html = r#"<div class="mermaid" id="deps">
    graph LR
      core[src/lib.rs] --&gt; cli
</div>"#;
    block_on(pipeline.process_html(html, PlaceholderRules::default())).unwrap();

    let requests = pipeline.renderer().requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id, "deps-svg");
    assert_eq!(requests[0].definition, "graph LR\n  core[\"src/lib.rs\"] --> cli");
}

#[test]
fn profile_directive_is_prepended() {
    let pipeline = Pipeline::new(FakeRenderer::default(), CorrectionPolicy::default())
        .with_profile(RendererProfile::default());
    let html = r#"<pre class="mermaid">graph TD; A-->B</pre>"#;
    block_on(pipeline.process_html(html, PlaceholderRules::default())).unwrap();

    let requests = pipeline.renderer().requests.borrow();
    assert!(requests[0].definition.starts_with("%%{init: {"));
    assert!(requests[0].definition.ends_with("}%%\ngraph TD; A-->B"));
}

#[test]
fn processed_placeholders_are_not_rendered_again() {
    let pipeline = Pipeline::new(FakeRenderer::default(), CorrectionPolicy::default());
    let (first, summary) =
        block_on(pipeline.process_html(PAGE, PlaceholderRules::default())).unwrap();
    assert_eq!(summary.diagrams, 3);

    let (second, summary) =
        block_on(pipeline.process_html(&first, PlaceholderRules::default())).unwrap();
    assert_eq!(summary.diagrams, 0);
    assert_eq!(second, first);
    assert_eq!(pipeline.renderer().requests.borrow().len(), 3);
}
