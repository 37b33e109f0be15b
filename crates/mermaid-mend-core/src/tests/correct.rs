use crate::correct::{FONT_MARKER, VIEWBOX_MARKER};
use crate::*;

const FLOWCHART: &str = concat!(
    r#"<svg id="m-1" width="100%" xmlns="http://www.w3.org/2000/svg" style="max-width: 400px;" viewBox="-150 -8 400 300">"#,
    r#"<style>#m-1{font-family:"trebuchet ms",verdana,arial,sans-serif;font-size:16px;fill:#333;}</style>"#,
    r#"<g class="root">"#,
    r#"<g class="node"><text class="label" style="fill: red;">Start</text></g>"#,
    r#"<g font-size="30"><text><tspan>Big</tspan></text></g>"#,
    r#"<text style="font-size: 22px">Mid</text>"#,
    r#"</g></svg>"#,
);

/// Reads the root viewBox regardless of how the rewriter cased the attribute name.
fn viewbox_of(svg: &str) -> ViewBox {
    let lower = svg.to_ascii_lowercase();
    let start = lower.find("viewbox=\"").expect("viewBox present") + "viewbox=\"".len();
    let end = start + svg[start..].find('"').expect("closing quote");
    svg[start..end].parse().expect("valid viewBox")
}

#[test]
fn text_nodes_get_visible_fill_and_no_stroke() {
    let out = correct_fragment(FLOWCHART, &CorrectionPolicy::default());
    assert_eq!(out.report.text_nodes, 4);
    assert!(!out.svg.contains("fill: red"));
    assert_eq!(out.svg.matches("fill: #000 !important").count(), 4);
    assert_eq!(out.svg.matches("stroke: none !important").count(), 4);
}

#[test]
fn font_sizes_follow_floor_and_growth_rules() {
    let out = correct_fragment(FLOWCHART, &CorrectionPolicy::default());
    assert_eq!(out.report.fonts_resized, 3);
    // Inherits 16px from the fragment stylesheet → floor.
    assert!(out.svg.contains(&format!(r#"{FONT_MARKER}="20""#)));
    // Inherits 30px from its group → unchanged.
    assert!(out.svg.contains(&format!(r#"{FONT_MARKER}="30""#)));
    // 22px is above the floor but below the growth bound → ×1.5.
    assert!(out.svg.contains(&format!(r#"{FONT_MARKER}="33""#)));
    assert!(out.svg.contains("font-size: 33px !important"));
    assert!(out.svg.contains("font-weight: 600 !important"));
}

#[test]
fn second_pass_is_a_no_op() {
    let policy = CorrectionPolicy::padded();
    let first = correct_fragment(FLOWCHART, &policy);
    let second = correct_fragment(&first.svg, &policy);
    assert_eq!(first.svg, second.svg);
    assert_eq!(second.report.fonts_resized, 0);
    assert_eq!(second.report.fonts_already_corrected, 3);
    assert!(!second.report.viewbox_adjusted);
    assert!(!second.report.changed_layout());
}

#[test]
fn far_negative_origin_is_moved_to_zero() {
    let out = correct_fragment(FLOWCHART, &CorrectionPolicy::default());
    assert!(out.report.viewbox_adjusted);
    assert_eq!(viewbox_of(&out.svg), ViewBox::new(0.0, -8.0, 550.0, 300.0));
    assert!(out.svg.contains(&format!(r#"{VIEWBOX_MARKER}="true""#)));
}

#[test]
fn origin_at_or_above_threshold_is_unchanged() {
    for x in ["-80", "-20", "0", "35.5"] {
        let svg = format!(r#"<svg id="a" viewBox="{x} 0 200 100"><g></g></svg>"#);
        let out = correct_fragment(&svg, &CorrectionPolicy::default());
        assert!(!out.report.viewbox_adjusted, "x = {x}");
        assert_eq!(out.svg, svg);
    }
}

#[test]
fn padding_is_applied_once_after_origin_repair() {
    let out = correct_fragment(FLOWCHART, &CorrectionPolicy::padded());
    assert_eq!(viewbox_of(&out.svg), ViewBox::new(-20.0, -28.0, 590.0, 400.0));
    let again = correct_fragment(&out.svg, &CorrectionPolicy::padded());
    assert_eq!(viewbox_of(&again.svg), ViewBox::new(-20.0, -28.0, 590.0, 400.0));
}

#[test]
fn missing_or_malformed_structure_is_tolerated() {
    let policy = CorrectionPolicy::default();

    let bare = r#"<svg id="x"><rect width="10" height="10"/></svg>"#;
    let out = correct_fragment(bare, &policy);
    assert_eq!(out.svg, bare);
    assert!(out.report.found_svg);
    assert_eq!(out.report.text_nodes, 0);

    let broken = r#"<svg viewBox="0 0 wide"><text>t</text></svg>"#;
    let out = correct_fragment(broken, &policy);
    assert!(!out.report.viewbox_adjusted);
    assert!(out.svg.contains(r#"0 0 wide"#));
    assert_eq!(out.report.fonts_resized, 1);

    let out = correct_fragment("<p>no diagram here</p>", &policy);
    assert_eq!(out.svg, "<p>no diagram here</p>");
    assert!(!out.report.found_svg);
}

#[test]
fn foreign_object_labels_get_floor_and_color() {
    let svg = concat!(
        r#"<svg id="f" viewBox="0 0 100 100"><g><foreignObject width="80" height="24">"#,
        r#"<div xmlns="http://www.w3.org/1999/xhtml" style="font-size: 12px; color: #999"><span>Label</span></div>"#,
        r#"</foreignObject></g><g><text>outside</text></g></svg>"#,
    );
    let out = correct_fragment(svg, &CorrectionPolicy::default());
    assert_eq!(out.report.foreign_labels, 2);
    assert_eq!(out.svg.matches("color: #000 !important").count(), 2);
    assert!(!out.svg.contains("#999"));
    assert!(!out.svg.contains("font-size: 12px"));

    let again = correct_fragment(&out.svg, &CorrectionPolicy::default());
    assert_eq!(again.report.foreign_labels, 0);
    assert_eq!(again.svg, out.svg);
}

#[test]
fn foreign_labels_above_the_floor_keep_their_size() {
    let svg = r#"<svg><foreignObject><div style="font-size: 28px">Big</div></foreignObject></svg>"#;
    let out = correct_fragment(svg, &CorrectionPolicy::default());
    assert!(out.svg.contains("font-size: 28px !important"));
}

#[test]
fn max_width_is_released_only_when_asked() {
    let kept = correct_fragment(FLOWCHART, &CorrectionPolicy::default());
    assert!(kept.svg.contains("max-width: 400px"));

    let policy = CorrectionPolicy {
        release_max_width: true,
        ..CorrectionPolicy::default()
    };
    let released = correct_fragment(FLOWCHART, &policy);
    assert!(!released.svg.contains("max-width"));
}

#[test]
fn only_the_root_svg_viewbox_is_rewritten() {
    let svg = concat!(
        r#"<svg id="outer" viewBox="0 0 300 300"><g>"#,
        r#"<svg id="icon" viewBox="-200 0 24 24"><path d="M0 0"/></svg>"#,
        r#"</g></svg>"#,
    );
    let out = correct_fragment(svg, &CorrectionPolicy::default());
    assert!(!out.report.viewbox_adjusted);
    assert!(out.svg.contains(r#"-200 0 24 24"#));
}

#[test]
fn fractional_viewbox_values_survive_exactly() {
    let svg = r#"<svg id="m" viewBox="-150 -8.4375 316.40625 182.0625"><g></g></svg>"#;
    let out = correct_fragment(svg, &CorrectionPolicy::default());
    assert!(out.report.viewbox_adjusted);
    assert!(out.svg.contains(r#"viewBox="0 -8.4375 466.40625 182.0625""#));
    assert_eq!(viewbox_of(&out.svg), ViewBox::new(0.0, -8.4375, 466.40625, 182.0625));
}

#[test]
fn tspans_with_their_own_size_are_floored() {
    let svg = concat!(
        r#"<svg id="t" viewBox="0 0 100 100"><text font-size="12">"#,
        r#"<tspan style="font-size: 10px">small</tspan><tspan font-size="1.5em">rel</tspan>"#,
        r#"<tspan>plain</tspan></text></svg>"#,
    );
    let policy = CorrectionPolicy::new();
    let out = correct_fragment(svg, &policy);
    assert_eq!(out.report.text_nodes, 4);
    assert_eq!(out.report.fonts_resized, 3);
    assert!(!out.svg.contains("font-size: 10px;"));
    assert!(out.svg.contains(r#"<tspan style="fill: #000 !important; stroke: none !important;">plain"#));
    // The text floors to 20, 10px floors to 20, and 1.5em of the corrected 20 is 30.
    assert_eq!(out.svg.matches(&format!(r#"{FONT_MARKER}="20""#)).count(), 2);
    assert_eq!(out.svg.matches(&format!(r#"{FONT_MARKER}="30""#)).count(), 1);
    assert_eq!(out.svg.matches(FONT_MARKER).count(), 3);

    let again = correct_fragment(&out.svg, &policy);
    assert_eq!(again.svg, out.svg);
    assert_eq!(again.report.fonts_resized, 0);
    assert_eq!(again.report.fonts_already_corrected, 3);
}

#[test]
fn builder_padding_matches_the_preset() {
    let policy = CorrectionPolicy::new().with_viewbox_padding(Some(ViewBoxPadding::ENLARGED_TEXT));
    assert_eq!(policy, CorrectionPolicy::padded());
    let out = correct_fragment(FLOWCHART, &policy);
    assert_eq!(viewbox_of(&out.svg), ViewBox::new(-20.0, -28.0, 590.0, 400.0));
}
