//! Rich-text markup helpers.
//!
//! The editor hands us opaque HTML-like markup. These helpers only need a
//! plain-text view of it: block boundaries become line breaks, every other tag
//! is dropped and the handful of entities an editor emits are decoded.

use std::sync::OnceLock;

use regex::Regex;

/// Title used when content has no visible text.
pub const UNTITLED_TITLE: &str = "Untitled Note";

/// Maximum number of characters kept in a derived title.
pub const TITLE_MAX_CHARS: usize = 50;

fn line_break_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|blockquote|pre|tr|ul|ol)\s*>")
            .expect("Invalid regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("Invalid regex"))
}

/// Convert markup into plain text, one line per block element.
#[must_use]
pub fn plain_text(markup: &str) -> String {
    let with_breaks = line_break_regex().replace_all(markup, "\n");
    let stripped = tag_regex().replace_all(&with_breaks, "");
    decode_entities(&stripped)
}

/// Derive a note title from its content.
///
/// Takes the first non-empty line of the plain text, truncated to
/// [`TITLE_MAX_CHARS`] characters, falling back to [`UNTITLED_TITLE`].
///
/// # Examples
///
/// ```
/// use notepad_core::markup::derive_title;
///
/// assert_eq!(derive_title("<h1>Hello World</h1><p>more</p>"), "Hello World");
/// assert_eq!(derive_title(""), "Untitled Note");
/// ```
#[must_use]
pub fn derive_title(content: &str) -> String {
    plain_text(content)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map_or_else(
            || UNTITLED_TITLE.to_string(),
            |line| line.chars().take(TITLE_MAX_CHARS).collect(),
        )
}

fn decode_entities(text: &str) -> String {
    // `&amp;` goes last so `&amp;lt;` decodes to the literal `&lt;`.
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_uses_first_block() {
        assert_eq!(derive_title("<h1>Hello World</h1><p>more</p>"), "Hello World");
    }

    #[test]
    fn title_falls_back_when_empty() {
        assert_eq!(derive_title(""), UNTITLED_TITLE);
        assert_eq!(derive_title("<p><br></p>"), UNTITLED_TITLE);
        assert_eq!(derive_title("<p>&nbsp;</p>"), UNTITLED_TITLE);
    }

    #[test]
    fn title_skips_blank_leading_lines() {
        assert_eq!(derive_title("<p>   </p><p>Second</p>"), "Second");
    }

    #[test]
    fn title_truncates_to_fifty_characters() {
        let content = format!("<p>{}</p>", "a".repeat(80));
        let title = derive_title(&content);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn title_truncation_counts_characters_not_bytes() {
        let content = "é".repeat(60);
        assert_eq!(derive_title(&content), "é".repeat(50));
    }

    #[test]
    fn plain_text_decodes_entities() {
        assert_eq!(plain_text("<p>a &lt; b &amp;&amp; c</p>"), "a < b && c\n");
        assert_eq!(plain_text("&amp;lt;"), "&lt;");
    }

    #[test]
    fn plain_text_breaks_on_line_breaks_and_list_items() {
        assert_eq!(
            plain_text("<ul><li>one</li><li>two</li></ul>line<br/>next"),
            "one\ntwo\n\nline\nnext"
        );
    }
}
