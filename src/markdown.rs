//! Markdown to HTML conversion, plus the policy for choosing a document's
//! preview excerpt.

use pulldown_cmark::{html, Options, Parser};

/// Separates the preview excerpt from the rest of a document body.
pub const MORE_MARKER: &str = "<!--more-->";

/// Converts markdown to an HTML fragment.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

/// Picks the preview for a document and returns `(preview_html, body)`.
///
/// When `explicit` is empty and `body` contains exactly one [`MORE_MARKER`],
/// the text before the marker becomes the preview and the marker is removed
/// from the returned body. Otherwise `explicit` (possibly empty) is rendered
/// and the body is returned unchanged.
pub fn extract_preview(explicit: &str, body: &str) -> (String, String) {
    if explicit.is_empty() && body.matches(MORE_MARKER).count() == 1 {
        if let Some(i) = body.find(MORE_MARKER) {
            let preview = to_html(&body[..i]);
            let rest = body.replacen(MORE_MARKER, "", 1);
            return (preview, rest);
        }
    }
    (to_html(explicit), body.to_owned())
}
