//! Support for creating Atom feeds from a list of documents.

use atom_syndication::{Entry, Error as AtomError, Feed, Link, Person};
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::io::Write;

use crate::config::GlobalSite;
use crate::document::Document;

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub subtitle: String,

    /// The site's base URL, without a trailing slash.
    pub home_page: String,

    /// The maximum number of entries.
    pub limit: usize,
}

impl FeedConfig {
    /// Returns the feed configuration for `site`, or `None` when the site has
    /// no base URL and therefore no feed.
    pub fn from_site(site: &GlobalSite) -> Option<FeedConfig> {
        match site.site.url.is_empty() {
            true => None,
            false => Some(FeedConfig {
                title: site.site.title.clone(),
                subtitle: site.site.subtitle.clone(),
                home_page: site.site.url.clone(),
                limit: site.site.limit,
            }),
        }
    }

    fn absolute(&self, link: &str) -> String {
        format!("{}/{}", self.home_page, link.trim_start_matches('/'))
    }
}

/// Creates a feed from the first `config.limit` documents and writes the
/// result to a [`std::io::Write`]. `now` stamps the feed's `updated` field.
pub fn write_feed<W: Write>(
    config: &FeedConfig,
    docs: &[Document],
    now: DateTime<Utc>,
    w: W,
) -> Result<()> {
    feed(config, docs, now).write_to(w)?;
    Ok(())
}

fn feed(config: &FeedConfig, docs: &[Document], now: DateTime<Utc>) -> Feed {
    let entries = docs.iter().take(config.limit).map(|doc| entry(config, doc)).collect();
    Feed {
        title: config.title.clone().into(),
        id: config.home_page.clone(),
        updated: now.fixed_offset(),
        authors: vec![person(&config.title)],
        subtitle: match config.subtitle.is_empty() {
            true => None,
            false => Some(config.subtitle.clone().into()),
        },
        links: vec![alternate(config.home_page.clone())],
        entries,
        ..Default::default()
    }
}

fn entry(config: &FeedConfig, doc: &Document) -> Entry {
    let href = config.absolute(&doc.link);
    let published: DateTime<FixedOffset> = doc.date;
    Entry {
        id: href.clone(),
        title: doc.title.clone().into(),
        updated: doc.update.unwrap_or(published),
        published: Some(published),
        authors: doc
            .author
            .as_ref()
            .map(|author| vec![person(&author.name)])
            .unwrap_or_default(),
        links: vec![alternate(href)],
        summary: Some(atom_syndication::Text::html(doc.preview.clone())),
        ..Default::default()
    }
}

fn alternate(href: String) -> Link {
    Link {
        href,
        rel: "alternate".to_owned(),
        ..Default::default()
    }
}

fn person(name: &str) -> Person {
    Person {
        name: name.to_owned(),
        ..Default::default()
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collection::test::doc;

    #[test]
    fn test_feed_entries() -> Result<()> {
        let config = FeedConfig {
            title: "Notes".to_owned(),
            subtitle: String::new(),
            home_page: "https://example.com".to_owned(),
            limit: 2,
        };
        let docs = vec![
            doc("/2021/c.html", "2021-03-03", &[]),
            doc("b.html", "2021-03-02", &[]),
            doc("a.html", "2021-03-01", &[]),
        ];

        let mut out = Vec::new();
        write_feed(&config, &docs, Utc::now(), &mut out)?;
        let xml = String::from_utf8(out).expect("utf-8 feed");

        assert!(xml.contains(">Notes</title>"));
        assert!(xml.contains("https://example.com/2021/c.html"));
        assert!(xml.contains("https://example.com/b.html"));
        assert!(!xml.contains("a.html"));
        Ok(())
    }

    #[test]
    fn test_no_feed_without_url() {
        let site = GlobalSite::from_str(std::path::Path::new("/s"), "site:\n  title: t\n", "", false)
            .expect("valid test config");
        assert!(FeedConfig::from_site(&site).is_none());
    }
}
