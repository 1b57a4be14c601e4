//! Defines [`Document`], the unit of content, and [`ArticleInfo`], the
//! lightweight projection of a document used by archive and tag summaries.

use chrono::{DateTime, FixedOffset};
use log::warn;

use crate::config::{replace_root_flag, Author, GlobalSite};
use crate::frontmatter::{self, FrontMatter};
use crate::link::LinkResolver;
use crate::{date, markdown};

const DEFAULT_CATEGORY: &str = "misc";

/// Whether a document is part of the chronological feed or a standalone page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Post,
    Page,
}

impl Kind {
    fn from_name(name: &str) -> Kind {
        match name {
            "page" => Kind::Page,
            _ => Kind::Post,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Post => "post",
            Kind::Page => "page",
        }
    }
}

/// One parsed content file.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub title: String,
    pub date: DateTime<FixedOffset>,
    pub update: Option<DateTime<FixedOffset>>,
    pub author: Option<Author>,

    /// The first category, or `misc`.
    pub category: String,

    /// Tags followed by any categories not already among them.
    pub tags: Vec<String>,

    pub draft: bool,
    pub top: bool,
    pub hide: bool,
    pub kind: Kind,

    /// The markdown body, with the preview marker removed when it was used.
    pub markdown: String,
    pub content: String,
    pub preview: String,
    pub cover: String,

    /// The output path, relative to the output directory.
    pub link: String,

    /// Theme-specific front matter, passed through to templates.
    pub config: serde_json::Value,
}

impl Document {
    /// Parses a document from the text of its source file. `file_stem` is
    /// the file name without extension and feeds the link.
    pub fn parse(
        site: &GlobalSite,
        file_stem: &str,
        input: &str,
    ) -> frontmatter::Result<Document> {
        let input = replace_root_flag(input, &site.site.root);
        let (front_matter, body) = frontmatter::parse(&input)?;
        Ok(Document::from_front_matter(site, file_stem, front_matter, body))
    }

    fn from_front_matter(
        site: &GlobalSite,
        file_stem: &str,
        fm: FrontMatter,
        body: &str,
    ) -> Document {
        let kind = Kind::from_name(&fm.kind);
        let date = match date::parse(&fm.date) {
            Some(date) => date,
            None => {
                warn!("`{}`: unusable date `{}`, using the epoch", file_stem, fm.date);
                date::epoch()
            }
        };
        let update = match fm.update.is_empty() {
            true => None,
            false => date::parse(&fm.update),
        };
        let category = fm
            .categories
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());
        let tags = merge_tags(&fm.tags, &fm.categories);
        let cover = match fm.cover.is_empty() {
            true => fm.topic,
            false => fm.cover,
        };
        let (preview, markdown) = markdown::extract_preview(&fm.preview, body);
        let link = LinkResolver::new(&site.site.link).resolve(kind, file_stem, &date, &category);

        Document {
            title: fm.title,
            date,
            update,
            author: site.author(&fm.author),
            category,
            tags,
            draft: fm.draft,
            top: fm.top,
            hide: fm.hide,
            kind,
            content: markdown::to_html(&markdown),
            markdown,
            preview,
            cover,
            link,
            config: fm.config,
        }
    }

    /// Whether the document shows up in listings, tags, archives, the feed
    /// and the JSON export.
    pub fn is_listed(&self) -> bool {
        self.kind == Kind::Post && !self.draft && !self.hide
    }

    pub fn year(&self) -> String {
        self.date.format("%Y").to_string()
    }

    pub fn info(&self) -> ArticleInfo {
        ArticleInfo {
            detail_date: self.date.timestamp(),
            date: self.date.format("%Y-%m-%d").to_string(),
            title: self.title.clone(),
            link: self.link.clone(),
            top: self.top,
        }
    }
}

/// Appends to `tags` every category not already present, keeping the
/// first occurrence of each entry.
pub fn merge_tags(tags: &[String], categories: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(tags.len() + categories.len());
    for tag in tags.iter().chain(categories) {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    merged
}

/// A document summary for archive and tag listings.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticleInfo {
    /// Unix timestamp of the document date.
    pub detail_date: i64,

    /// The display date, `YYYY-MM-DD`.
    pub date: String,

    pub title: String,
    pub link: String,
    pub top: bool,
}
