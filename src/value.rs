//! Conversions from the site model into template [`Value`]s. Keys follow the
//! PascalCase convention themes are written against (`.Title`, `.Site.Url`).

use chrono::{DateTime, FixedOffset};
use gtmpl_value::Value;
use std::collections::HashMap;

use crate::collection::{tag_slug, ArchiveYear, TagSummary};
use crate::config::{Author, GlobalSite, Site};
use crate::document::{ArticleInfo, Document};
use crate::page::Page;

/// Builds a [`Value::Object`] from key/value pairs.
pub fn object<I>(pairs: I) -> Value
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    Value::Object(
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect::<HashMap<String, Value>>(),
    )
}

fn string(s: &str) -> Value {
    Value::String(s.to_owned())
}

fn strings(items: &[String]) -> Value {
    Value::Array(items.iter().map(|s| string(s)).collect())
}

fn date_time(date: &DateTime<FixedOffset>) -> Value {
    Value::String(date.to_rfc3339())
}

/// Converts passthrough configuration into a template value.
pub fn from_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Value::from(i),
            (None, Some(u), _) => Value::from(u),
            (None, None, Some(f)) => Value::from(f),
            _ => Value::Nil,
        },
        Json::String(s) => string(s),
        Json::Array(items) => Value::Array(items.iter().map(from_json).collect()),
        Json::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

impl From<&Site> for Value {
    fn from(site: &Site) -> Value {
        object(vec![
            ("Root", string(&site.root)),
            ("Title", string(&site.title)),
            ("Subtitle", string(&site.subtitle)),
            ("Logo", string(&site.logo)),
            ("Limit", Value::from(site.limit as i64)),
            ("Theme", string(&site.theme)),
            ("Comment", string(&site.comment)),
            ("Lang", string(&site.lang)),
            ("Url", string(&site.url)),
            ("Link", string(&site.link)),
            ("Config", from_json(&site.config)),
        ])
    }
}

impl From<&Author> for Value {
    fn from(author: &Author) -> Value {
        object(vec![
            ("Id", string(&author.id)),
            ("Name", string(&author.name)),
            ("Intro", string(&author.intro)),
            ("Avatar", string(&author.avatar)),
        ])
    }
}

impl From<&Document> for Value {
    /// Converts a document without any site context. Listing pages use this
    /// for their entries.
    fn from(doc: &Document) -> Value {
        let author = match &doc.author {
            Some(author) => Value::from(author),
            None => Value::from(&Author::default()),
        };
        object(vec![
            ("Title", string(&doc.title)),
            ("Date", string(&doc.date.format("%Y-%m-%d").to_string())),
            ("DateTime", date_time(&doc.date)),
            ("Timestamp", Value::from(doc.date.timestamp())),
            (
                "Update",
                doc.update.as_ref().map_or(string(""), date_time),
            ),
            ("Author", author),
            ("Category", string(&doc.category)),
            ("Tags", strings(&doc.tags)),
            (
                "TagSlugs",
                Value::Array(doc.tags.iter().map(|t| Value::String(tag_slug(t))).collect()),
            ),
            ("Cover", string(&doc.cover)),
            ("Top", Value::Bool(doc.top)),
            ("Hide", Value::Bool(doc.hide)),
            ("Draft", Value::Bool(doc.draft)),
            ("Type", string(doc.kind.as_str())),
            ("Markdown", string(&doc.markdown)),
            ("Content", string(&doc.content)),
            ("Preview", string(&doc.preview)),
            ("Link", string(&doc.link)),
            ("Config", from_json(&doc.config)),
        ])
    }
}

impl From<&ArticleInfo> for Value {
    fn from(info: &ArticleInfo) -> Value {
        object(vec![
            ("DetailDate", Value::from(info.detail_date)),
            ("Date", string(&info.date)),
            ("Title", string(&info.title)),
            ("Link", string(&info.link)),
            ("Top", Value::Bool(info.top)),
        ])
    }
}

impl From<&TagSummary> for Value {
    fn from(tag: &TagSummary) -> Value {
        object(vec![
            ("Name", string(&tag.name)),
            ("Slug", string(&tag.slug)),
            ("Count", Value::from(tag.count as i64)),
            ("Articles", Value::Array(tag.articles.iter().map(Value::from).collect())),
        ])
    }
}

impl From<&ArchiveYear> for Value {
    fn from(archive: &ArchiveYear) -> Value {
        object(vec![
            ("Year", string(&archive.year)),
            ("Articles", Value::Array(archive.articles.iter().map(Value::from).collect())),
        ])
    }
}

/// The site-wide entries every page payload carries.
pub fn site_entries(site: &GlobalSite) -> Vec<(&'static str, Value)> {
    vec![
        ("Site", Value::from(&site.site)),
        ("Develop", Value::Bool(site.develop)),
        (
            "I18n",
            Value::Object(
                site.i18n
                    .iter()
                    .map(|(k, v)| (k.clone(), string(v)))
                    .collect(),
            ),
        ),
        (
            "Authors",
            Value::Object(
                site.authors
                    .keys()
                    .filter_map(|id| site.author(id).map(|a| (id.clone(), Value::from(&a))))
                    .collect(),
            ),
        ),
    ]
}

/// The payload of a document page: the document's own fields, the site
/// entries, and its neighbours.
pub fn document_page(
    site: &GlobalSite,
    doc: &Document,
    prev: Option<&Document>,
    next: Option<&Document>,
) -> Value {
    let mut value = Value::from(doc);
    if let Value::Object(obj) = &mut value {
        for (key, entry) in site_entries(site) {
            obj.insert(key.to_owned(), entry);
        }
        obj.insert("Prev".to_owned(), prev.map_or(Value::Nil, Value::from));
        obj.insert("Next".to_owned(), next.map_or(Value::Nil, Value::from));
    }
    value
}

/// The payload of a standalone template: the site entries only.
pub fn site_page(site: &GlobalSite) -> Value {
    object(site_entries(site))
}

/// The payload of one page of the main feed or of a tag listing.
pub fn listing_page(site: &GlobalSite, page: &Page<Document>) -> Value {
    let mut entries = site_entries(site);
    entries.extend(vec![
        ("Articles", Value::Array(page.items.iter().map(Value::from).collect())),
        ("Page", Value::from(page.index as i64)),
        ("Total", Value::from(page.total as i64)),
        ("Prev", string(&page.prev)),
        ("Next", string(&page.next)),
        ("TagName", string(&page.tag)),
        ("TagCount", Value::from(page.item_count as i64)),
    ]);
    object(entries)
}

/// The payload of `archive.html`. `Total` counts visible posts.
pub fn archive_page(site: &GlobalSite, archives: &[ArchiveYear], total: usize) -> Value {
    let mut entries = site_entries(site);
    entries.push(("Total", Value::from(total as i64)));
    entries.push(("Archive", Value::Array(archives.iter().map(Value::from).collect())));
    object(entries)
}

/// The payload of `tag.html`. `Total` counts tags.
pub fn tag_page(site: &GlobalSite, tags: &[TagSummary]) -> Value {
    let mut entries = site_entries(site);
    entries.push(("Total", Value::from(tags.len() as i64)));
    entries.push(("Tag", Value::Array(tags.iter().map(Value::from).collect())));
    object(entries)
}
