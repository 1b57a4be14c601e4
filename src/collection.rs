//! Aggregates parsed [`Document`]s into the collections a site is rendered
//! from: every post, the standalone pages, the visible feed, one listing per
//! tag, per-tag summaries and per-year archives. Every collection is sorted
//! with its [`crate::order::Ordered`] comparator when it is finalized.
//! Collections hold copies, never references into one another.
//!
//! Tags are identified by their slug, so `macOS` and `MacOS` share one
//! listing. The first spelling seen names it.

use log::warn;
use std::collections::BTreeMap;

use crate::document::{ArticleInfo, Document, Kind};
use crate::order;

/// The slug a tag is filed and linked under. Empty when the name has
/// nothing slug-worthy in it (`..`, `/`).
pub fn tag_slug(name: &str) -> String {
    slug::slugify(name)
}

/// The documents of one tag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagListing {
    /// The display name.
    pub name: String,
    pub documents: Vec<Document>,
}

/// A tag with its member count and the summaries of its members.
#[derive(Clone, Debug, PartialEq)]
pub struct TagSummary {
    pub name: String,
    pub slug: String,
    pub count: usize,
    pub articles: Vec<ArticleInfo>,
}

/// The summaries of every visible post of one year.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveYear {
    pub year: String,
    pub articles: Vec<ArticleInfo>,
}

/// The aggregated, sorted collections of one build.
#[derive(Debug, Default)]
pub struct Collections {
    /// Every non-draft post, hidden ones included. Post pages and their
    /// prev/next links come from here.
    pub posts: Vec<Document>,

    /// Standalone pages.
    pub pages: Vec<Document>,

    /// Non-hidden posts: the main feed.
    pub visible: Vec<Document>,

    /// The documents of each tag, keyed by [`tag_slug`].
    pub tags: BTreeMap<String, TagListing>,

    pub tag_summaries: Vec<TagSummary>,
    pub archives: Vec<ArchiveYear>,
}

/// Accumulates documents, then sorts everything in [`CollectionBuilder::finish`].
#[derive(Default)]
pub struct CollectionBuilder {
    collections: Collections,
    archives: BTreeMap<String, Vec<ArticleInfo>>,
}

impl CollectionBuilder {
    pub fn new() -> CollectionBuilder {
        CollectionBuilder::default()
    }

    /// Files a document into every collection it belongs to. Drafts are
    /// dropped.
    pub fn add(&mut self, doc: Document) {
        if doc.draft {
            return;
        }
        if doc.kind == Kind::Page {
            self.collections.pages.push(doc);
            return;
        }
        if doc.is_listed() {
            for tag in doc.tags.iter() {
                let slug = tag_slug(tag);
                if slug.is_empty() {
                    warn!("`{}`: ignoring tag `{}`, it has no usable slug", doc.link, tag);
                    continue;
                }
                let listing = self.collections.tags.entry(slug).or_insert_with(|| TagListing {
                    name: tag.clone(),
                    documents: Vec::new(),
                });
                // Two spellings of one slug on the same document file it once.
                if listing.documents.last().map_or(true, |last| last.link != doc.link) {
                    listing.documents.push(doc.clone());
                }
            }
            self.archives.entry(doc.year()).or_default().push(doc.info());
            self.collections.visible.push(doc.clone());
        }
        self.collections.posts.push(doc);
    }

    /// The number of visible posts added so far.
    pub fn visible_count(&self) -> usize {
        self.collections.visible.len()
    }

    /// Sorts every collection and builds the tag and archive summaries.
    pub fn finish(self) -> Collections {
        let CollectionBuilder {
            mut collections,
            archives,
        } = self;

        order::sort(&mut collections.posts);
        order::sort(&mut collections.pages);
        order::sort(&mut collections.visible);

        let mut tag_summaries = Vec::with_capacity(collections.tags.len());
        for (slug, listing) in collections.tags.iter_mut() {
            order::sort(&mut listing.documents);
            let mut articles: Vec<ArticleInfo> =
                listing.documents.iter().map(Document::info).collect();
            order::sort(&mut articles);
            tag_summaries.push(TagSummary {
                name: listing.name.clone(),
                slug: slug.clone(),
                count: listing.documents.len(),
                articles,
            });
        }
        order::sort(&mut tag_summaries);

        let mut archive_years: Vec<ArchiveYear> = archives
            .into_iter()
            .map(|(year, mut articles)| {
                order::sort(&mut articles);
                ArchiveYear { year, articles }
            })
            .collect();
        order::sort(&mut archive_years);

        collections.tag_summaries = tag_summaries;
        collections.archives = archive_years;
        collections
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::date;

    pub(crate) fn doc(link: &str, date: &str, tags: &[&str]) -> Document {
        Document {
            title: link.to_owned(),
            date: date::parse(date).expect("valid test date"),
            update: None,
            author: None,
            category: String::from("misc"),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            draft: false,
            top: false,
            hide: false,
            kind: Kind::Post,
            markdown: String::new(),
            content: String::new(),
            preview: String::new(),
            cover: String::new(),
            link: link.to_owned(),
            config: serde_json::Value::Null,
        }
    }

    fn links(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.link.as_str()).collect()
    }

    #[test]
    fn test_pinned_first() {
        let mut builder = CollectionBuilder::new();
        let mut pinned = doc("a.html", "2020-01-01", &[]);
        pinned.top = true;
        builder.add(doc("b.html", "2022-01-01", &[]));
        builder.add(pinned);
        let collections = builder.finish();
        assert_eq!(links(&collections.visible), vec!["a.html", "b.html"]);
    }

    #[test]
    fn test_routing() {
        let mut builder = CollectionBuilder::new();
        let mut draft = doc("draft.html", "2021-01-01", &["x"]);
        draft.draft = true;
        let mut hidden = doc("hidden.html", "2021-01-02", &["x"]);
        hidden.hide = true;
        let mut page = doc("about.html", "2021-01-03", &["x"]);
        page.kind = Kind::Page;
        builder.add(draft);
        builder.add(hidden);
        builder.add(page);
        builder.add(doc("post.html", "2021-01-04", &["x"]));
        assert_eq!(builder.visible_count(), 1);

        let collections = builder.finish();
        assert_eq!(links(&collections.posts), vec!["post.html", "hidden.html"]);
        assert_eq!(links(&collections.pages), vec!["about.html"]);
        assert_eq!(links(&collections.visible), vec!["post.html"]);
        assert_eq!(links(&collections.tags["x"].documents), vec!["post.html"]);
    }

    #[test]
    fn test_summaries() {
        let mut builder = CollectionBuilder::new();
        let mut pinned_old = doc("old.html", "2020-05-01", &["rust", "misc"]);
        pinned_old.top = true;
        builder.add(pinned_old);
        builder.add(doc("new.html", "2021-02-01", &["rust"]));
        builder.add(doc("newer.html", "2021-06-01", &["go"]));
        let collections = builder.finish();

        // Pinning orders the tag listing but not the tag summary.
        assert_eq!(links(&collections.tags["rust"].documents), vec!["old.html", "new.html"]);
        let rust = &collections.tag_summaries[0];
        assert_eq!((rust.name.as_str(), rust.count), ("rust", 2));
        let rust_links: Vec<&str> = rust.articles.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(rust_links, vec!["new.html", "old.html"]);
        let names: Vec<&str> = collections.tag_summaries.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rust", "misc", "go"]);

        let years: Vec<&str> = collections.archives.iter().map(|a| a.year.as_str()).collect();
        assert_eq!(years, vec!["2021", "2020"]);
        let links_2021: Vec<&str> =
            collections.archives[0].articles.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links_2021, vec!["newer.html", "new.html"]);
    }

    #[test]
    fn test_tags_by_slug() {
        let mut builder = CollectionBuilder::new();
        builder.add(doc("a.html", "2021-01-01", &["macOS", "Rust Lang"]));
        builder.add(doc("b.html", "2021-01-02", &["MacOS", "MACOS"]));
        builder.add(doc("c.html", "2021-01-03", &["..", "../../escaped", "a/b"]));
        let collections = builder.finish();

        let slugs: Vec<&str> = collections.tags.keys().map(String::as_str).collect();
        assert_eq!(slugs, vec!["a-b", "escaped", "macos", "rust-lang"]);
        let macos = &collections.tags["macos"];
        assert_eq!(macos.name, "macOS");
        assert_eq!(links(&macos.documents), vec!["b.html", "a.html"]);

        let summary = &collections.tag_summaries[0];
        assert_eq!((summary.name.as_str(), summary.slug.as_str(), summary.count), ("macOS", "macos", 2));
    }
}
