//! Derives the output link of a document from its file name, its date and
//! category, and the site's link pattern.

use chrono::{DateTime, FixedOffset};

use crate::document::Kind;

const HTML_EXTENSION: &str = ".html";

/// Resolves document links against a site-wide link pattern. An empty
/// pattern means every document uses the default link.
pub struct LinkResolver<'a> {
    pattern: &'a str,
}

impl<'a> LinkResolver<'a> {
    pub fn new(pattern: &'a str) -> LinkResolver<'a> {
        LinkResolver { pattern }
    }

    /// Resolves the link for a document.
    ///
    /// * `file_stem` is the source file name without its extension.
    /// * `date` and `category` are the document's resolved values.
    ///
    /// The default link is the lowercased stem plus `.html`. Posts whose stem
    /// starts with their own `YYYY-MM-DD-` date have that prefix dropped
    /// before the pattern is applied. Pages always get the default link.
    pub fn resolve(
        &self,
        kind: Kind,
        file_stem: &str,
        date: &DateTime<FixedOffset>,
        category: &str,
    ) -> String {
        let name = file_stem.to_lowercase();
        let default = format!("{}{}", name, HTML_EXTENSION);
        if kind != Kind::Post || self.pattern.is_empty() {
            return default;
        }

        let date_prefix = date.format("%Y-%m-%d-").to_string();
        let title = name.strip_prefix(&date_prefix).unwrap_or(&name);

        // The placeholders are disjoint, so substitution order is irrelevant.
        [
            ("{year}", date.format("%Y").to_string()),
            ("{month}", date.format("%m").to_string()),
            ("{day}", date.format("%d").to_string()),
            ("{hour}", date.format("%H").to_string()),
            ("{minute}", date.format("%M").to_string()),
            ("{second}", date.format("%S").to_string()),
            ("{category}", category.to_owned()),
            ("{title}", title.to_owned()),
        ]
        .iter()
        .fold(self.pattern.to_owned(), |link, (placeholder, value)| {
            link.replace(placeholder, value)
        })
    }
}
