//! The JSON export of visible documents (`index.json`), consumed by
//! client-side search in themes.

use serde::Serialize;
use std::io::Write;

use crate::document::Document;

#[derive(Serialize)]
struct ExportEntry<'a> {
    title: &'a str,

    /// The raw markdown body.
    content: &'a str,

    /// The rendered preview.
    preview: &'a str,

    link: &'a str,
    cover: &'a str,
}

/// Writes `docs` as a JSON array of `{title, content, preview, link, cover}`.
pub fn write_json<W: Write>(docs: &[Document], w: W) -> serde_json::Result<()> {
    let entries: Vec<ExportEntry> = docs
        .iter()
        .map(|doc| ExportEntry {
            title: &doc.title,
            content: &doc.markdown,
            preview: &doc.preview,
            link: &doc.link,
            cover: &doc.cover,
        })
        .collect();
    serde_json::to_writer(w, &entries)
}
