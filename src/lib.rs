//! The library code for the `inkwell` static blog generator. A build is
//! broken down into three steps:
//!
//! 1. Loading: the site configuration ([`crate::config`]), the theme
//!    templates ([`crate::template`]) and the markdown documents
//!    ([`crate::parser`]). A document whose front matter can't be parsed is
//!    skipped; the rest of the build carries on without it.
//! 2. Aggregating the documents into sorted collections
//!    ([`crate::collection`]): every post, the standalone pages, the visible
//!    feed, one listing per tag, tag summaries and yearly archives.
//! 3. Rendering: every document page, listing page ([`crate::page`]),
//!    summary page and export becomes one independent task, and the tasks
//!    run concurrently ([`crate::write`]).
//!
//! [`build::run_build`] runs all three; [`build::Builder`] runs them one
//! build at a time. [`scaffold`] creates new documents to build.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod assets;
pub mod build;
pub mod collection;
pub mod config;
pub mod date;
pub mod document;
pub mod export;
pub mod feed;
pub mod frontmatter;
pub mod link;
pub mod markdown;
pub mod order;
pub mod page;
pub mod parser;
pub mod scaffold;
pub mod template;
pub mod value;
pub mod write;
