use std::borrow::Cow;

/// Decodes HTML character references (`&lt;`, `&#9829;`, `&nbsp;`, ...) into Unicode.
///
/// Placeholder text is taken verbatim from the page source, so a definition such as
/// `A --&gt; B` must be decoded before the renderer sees it. Decoding follows the HTML standard
/// entity table, the same way a browser's `textContent` would read the node.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    Cow::Owned(htmlize::unescape(input).into_owned())
}

/// Escapes text for inclusion in HTML element content or a double-quoted attribute value.
pub fn escape_html(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_entities_borrows_plain_text() {
        assert!(matches!(decode_entities("graph TD"), Cow::Borrowed(_)));
    }

    #[test]
    fn decode_entities_handles_named_and_numeric_references() {
        assert_eq!(decode_entities("A --&gt; B"), "A --> B");
        assert_eq!(decode_entities("&quot;x&quot; &#9829; &#x41;"), "\"x\" \u{2665} A");
        assert_eq!(decode_entities("a&nbsp;b"), "a\u{a0}b");
    }

    #[test]
    fn escape_html_round_trips_through_decode() {
        let raw = r#"<b class="x">a & b</b>"#;
        let escaped = escape_html(raw);
        assert_eq!(escaped, "&lt;b class=&quot;x&quot;&gt;a &amp; b&lt;/b&gt;");
        assert_eq!(decode_entities(&escaped), raw);
    }
}
