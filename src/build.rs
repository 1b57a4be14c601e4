//! Exports [`run_build`], which stitches together the stages of one build:
//! loading configuration, templates and documents, aggregating the documents
//! into collections, and rendering every output file concurrently
//! ([`crate::write`]). [`Builder`] wraps the same pipeline behind a gate so
//! that rebuild triggers never overlap.
//!
//! A build moves through [`Stage::Loading`], [`Stage::Aggregating`] and
//! [`Stage::Rendering`] to [`Stage::Done`], or stops in [`Stage::Failed`]
//! on a fatal error. A document that fails to parse is dropped during
//! loading without failing the build.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::collection::{CollectionBuilder, Collections};
use crate::config::{self, GlobalSite};
use crate::document::Document;
use crate::feed::FeedConfig;
use crate::page::{self, paginate};
use crate::parser::{Parser, Skipped};
use crate::template::{self, is_page_template, CompiledTemplate, Theme};
use crate::value;
use crate::write::{self, OutputWriter, RenderJob, Task, EXPORT_FILE, FEED_FILE};

const TAG_DIRECTORY: &str = "tag";
const ARCHIVE_FILE: &str = "archive.html";
const TAG_FILE: &str = "tag.html";

/// The stages of a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loading,
    Aggregating,
    Rendering,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::Loading => "loading",
            Stage::Aggregating => "aggregating",
            Stage::Rendering => "rendering",
            Stage::Done => "done",
            Stage::Failed => "failed",
        })
    }
}

/// What a successful build did.
#[derive(Debug)]
pub struct BuildReport {
    /// The number of documents rendered to their own page.
    pub documents: usize,

    /// The number of listing pages, tag listings included.
    pub pages: usize,

    /// The number of render, export and copy tasks that ran.
    pub tasks: usize,

    /// Documents left out because they couldn't be loaded.
    pub skipped: Vec<Skipped>,

    pub elapsed: Duration,
}

/// Loads the project at `root` and builds it.
pub fn run_build(root: &Path) -> Result<BuildReport> {
    let site = GlobalSite::load(root, false)?;
    build_site(&site, |_| ())
}

/// Builds `site`, calling `observe` whenever the build enters a new stage.
pub fn build_site<F>(site: &GlobalSite, mut observe: F) -> Result<BuildReport>
where
    F: FnMut(Stage),
{
    let mut enter = |stage: Stage| {
        debug!("build stage: {}", stage);
        observe(stage);
    };
    let start = Instant::now();

    enter(Stage::Loading);
    let source_directory = site.source_directory();
    if !source_directory.is_dir() {
        return Err(Error::Io {
            stage: Stage::Loading,
            path: source_directory,
            err: io::Error::new(io::ErrorKind::NotFound, "source directory not found"),
        });
    }
    let theme = Theme::load(&site.theme_directory(), &site.i18n)?;
    let standalone = load_standalone(&theme, &source_directory)?;
    let copies = copy_sources(site)?;
    let (documents, skipped) = Parser::new(site).parse_documents(&source_directory);

    enter(Stage::Aggregating);
    let mut builder = CollectionBuilder::new();
    for doc in documents {
        builder.add(doc);
    }
    if builder.visible_count() < 1 {
        return Err(Error::Validation {
            skipped: skipped.len(),
        });
    }
    let collections = builder.finish();

    enter(Stage::Rendering);
    let output_directory = site.output_directory();
    let mut plan = Plan::new(site, &theme, &collections);
    plan.documents();
    plan.listings();
    plan.summaries();
    plan.standalone(&standalone);
    plan.exports();
    plan.copies(&copies);
    let Plan {
        tasks,
        documents,
        pages,
        ..
    } = plan;
    check_destinations(&tasks)?;
    clean(&output_directory)?;

    let writer = OutputWriter::new(&output_directory);
    let failures: Vec<TaskFailure> = write::run_all(&tasks, &writer)
        .into_iter()
        .filter_map(|outcome| match outcome.result {
            Ok(()) => None,
            Err(error) => Some(TaskFailure {
                link: outcome.link,
                error,
            }),
        })
        .collect();
    if !failures.is_empty() {
        return Err(Error::Render(failures));
    }

    enter(Stage::Done);
    let report = BuildReport {
        documents,
        pages,
        tasks: tasks.len(),
        skipped,
        elapsed: start.elapsed(),
    };
    info!(
        "built {} documents and {} listing pages ({} tasks, {} skipped) in {:?}",
        report.documents,
        report.pages,
        report.tasks,
        report.skipped.len(),
        report.elapsed
    );
    for skipped in report.skipped.iter() {
        info!("skipped `{}`: {}", skipped.path.display(), skipped.error);
    }
    Ok(report)
}

// The render tasks of one build, in the order they're planned.
struct Plan<'a> {
    site: &'a GlobalSite,
    theme: &'a Theme,
    collections: &'a Collections,
    tasks: Vec<Task<'a>>,
    documents: usize,
    pages: usize,
}

impl<'a> Plan<'a> {
    fn new(site: &'a GlobalSite, theme: &'a Theme, collections: &'a Collections) -> Plan<'a> {
        Plan {
            site,
            theme,
            collections,
            tasks: Vec::new(),
            documents: 0,
            pages: 0,
        }
    }

    fn render(&mut self, template: &'a CompiledTemplate, data: gtmpl::Value, link: String) {
        self.tasks.push(Task::Render(RenderJob {
            template,
            data,
            link,
        }));
    }

    // Every post gets a page with its neighbours in the post list; pages
    // have no neighbours.
    fn documents(&mut self) {
        let (collections, theme) = (self.collections, self.theme);
        let posts = &collections.posts;
        for (i, doc) in posts.iter().enumerate() {
            let prev = i.checked_sub(1).map(|i| &posts[i]);
            let next = posts.get(i + 1);
            let data = value::document_page(self.site, doc, prev, next);
            self.render(&theme.article, data, doc.link.clone());
        }
        for doc in collections.pages.iter() {
            let data = value::document_page(self.site, doc, None, None);
            self.render(&theme.article, data, doc.link.clone());
        }
        self.documents += posts.len() + collections.pages.len();
    }

    fn listings(&mut self) {
        let collections = self.collections;
        self.listing(&collections.visible, "", "");
        for (slug, tag) in collections.tags.iter() {
            self.listing(&tag.documents, &page::join(TAG_DIRECTORY, slug), &tag.name);
        }
    }

    fn listing(&mut self, docs: &'a [Document], root: &str, tag: &str) {
        let theme = self.theme;
        for page in paginate(docs, self.site.site.limit, root, tag) {
            let data = value::listing_page(self.site, &page);
            self.render(&theme.page, data, page.path);
            self.pages += 1;
        }
    }

    fn summaries(&mut self) {
        let (collections, theme) = (self.collections, self.theme);
        let archive =
            value::archive_page(self.site, &collections.archives, collections.visible.len());
        self.render(&theme.archive, archive, ARCHIVE_FILE.to_owned());
        let tags = value::tag_page(self.site, &collections.tag_summaries);
        self.render(&theme.tag, tags, TAG_FILE.to_owned());
    }

    fn standalone(&mut self, templates: &'a [CompiledTemplate]) {
        for template in templates {
            let data = value::site_page(self.site);
            self.render(template, data, template.name().to_owned());
        }
    }

    fn exports(&mut self) {
        let collections = self.collections;
        let visible = &collections.visible;
        if let Some(config) = FeedConfig::from_site(self.site) {
            self.tasks.push(Task::Feed {
                config,
                docs: visible,
                now: Utc::now(),
            });
        }
        self.tasks.push(Task::Export { docs: visible });
    }

    // Each source lands in the output directory under its own file name.
    fn copies(&mut self, sources: &[PathBuf]) {
        for src in sources {
            let link = match src.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            self.tasks.push(Task::Copy {
                src: src.clone(),
                link,
            });
        }
    }
}

// Expands every `build.copy` entry as a glob pattern under the project
// root. An entry that matches nothing is only worth a warning.
fn copy_sources(site: &GlobalSite) -> Result<Vec<PathBuf>> {
    let root = glob::Pattern::escape(&site.root_directory.to_string_lossy());
    let mut sources = Vec::new();
    for entry in site.build.copy.iter() {
        let pattern = format!(
            "{}/{}",
            root.trim_end_matches('/'),
            entry.trim_start_matches('/')
        );
        let paths = glob::glob(&pattern).map_err(|err| Error::CopyPattern {
            pattern: entry.clone(),
            err,
        })?;
        let before = sources.len();
        for path in paths {
            match path {
                Ok(path) => sources.push(path),
                Err(err) => warn!("skipping `{}`: {}", err.path().display(), err.error()),
            }
        }
        if sources.len() == before {
            warn!("`build.copy` entry `{}` matches nothing", entry);
        }
    }
    Ok(sources)
}

// Fails when two tasks would write the same destination. Runs before the
// output directory is touched.
fn check_destinations(tasks: &[Task]) -> Result<()> {
    let mut seen: HashMap<&str, &Task> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        let link = task.link().trim_start_matches('/');
        if let Some(first) = seen.insert(link, task) {
            return Err(Error::Collision {
                link: link.to_owned(),
                first: first.describe(),
                second: task.describe(),
            });
        }
    }
    Ok(())
}

// Compiles the HTML templates that sit directly in the source directory.
fn load_standalone(theme: &Theme, source_directory: &Path) -> Result<Vec<CompiledTemplate>> {
    let annotate = |err: io::Error| Error::Io {
        stage: Stage::Loading,
        path: source_directory.to_owned(),
        err,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(source_directory).map_err(annotate)? {
        let path = entry.map_err(annotate)?.path();
        if path.is_file() && is_page_template(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        debug!("standalone template `{}`", path.display());
        templates.push(theme.compile_standalone(&path)?);
    }
    Ok(templates)
}

// Removes the artefacts of a previous build: the tag listings and the
// top-level pages and exports. Anything else in the output directory stays.
fn clean(output_directory: &Path) -> Result<()> {
    let annotate = |path: &Path| {
        let path = path.to_owned();
        move |err: io::Error| Error::Io {
            stage: Stage::Rendering,
            path,
            err,
        }
    };
    rmdir(&output_directory.join(TAG_DIRECTORY)).map_err(annotate(output_directory))?;

    let entries = match fs::read_dir(output_directory) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(annotate(output_directory)(err)),
    };
    for entry in entries {
        let path = entry.map_err(annotate(output_directory))?.path();
        if path.is_file() && is_generated(&path) {
            fs::remove_file(&path).map_err(annotate(&path))?;
        }
    }
    Ok(())
}

fn is_generated(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    name == FEED_FILE
        || name == EXPORT_FILE
        || path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("html"))
}

fn rmdir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Runs builds one at a time. A file watcher or server holds one `Builder`
/// and calls it on every change.
pub struct Builder {
    develop: bool,
    gate: Mutex<()>,
    stage: Mutex<Stage>,
}

impl Builder {
    /// Creates a builder. `develop` builds for local preview (see
    /// [`GlobalSite::load`]).
    pub fn new(develop: bool) -> Builder {
        Builder {
            develop,
            gate: Mutex::new(()),
            stage: Mutex::new(Stage::Idle),
        }
    }

    /// The stage of the current or most recent build.
    pub fn stage(&self) -> Stage {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds the project at `root`, first waiting for any build in flight
    /// to finish. Configuration is reloaded every time.
    pub fn run(&self, root: &Path) -> Result<BuildReport> {
        self.run_with(root, |_| ())
    }

    /// Like [`Builder::run`], calling `observe` on every stage change,
    /// [`Stage::Failed`] included.
    pub fn run_with<F>(&self, root: &Path, observe: F) -> Result<BuildReport>
    where
        F: FnMut(Stage),
    {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.build(root, observe)
    }

    /// Like [`Builder::run`], but returns `None` without building when
    /// another build is in flight.
    pub fn try_run(&self, root: &Path) -> Option<Result<BuildReport>> {
        self.try_run_with(root, |_| ())
    }

    /// Like [`Builder::try_run`], calling `observe` on every stage change.
    pub fn try_run_with<F>(&self, root: &Path, observe: F) -> Option<Result<BuildReport>>
    where
        F: FnMut(Stage),
    {
        let _gate = match self.gate.try_lock() {
            Ok(gate) => gate,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("a build is already running; skipping");
                return None;
            }
        };
        Some(self.build(root, observe))
    }

    fn build<F>(&self, root: &Path, mut observe: F) -> Result<BuildReport>
    where
        F: FnMut(Stage),
    {
        let set = |stage: Stage| {
            *self.stage.lock().unwrap_or_else(PoisonError::into_inner) = stage;
        };
        set(Stage::Loading);
        let result = match GlobalSite::load(root, self.develop) {
            Ok(site) => build_site(&site, |stage| {
                set(stage);
                observe(stage);
            }),
            Err(err) => {
                observe(Stage::Loading);
                Err(Error::from(err))
            }
        };
        if let Err(err) = &result {
            error!("build failed while {}: {}", err.stage(), err);
            set(Stage::Failed);
            observe(Stage::Failed);
        }
        result
    }
}

/// A render, export or copy task that failed.
#[derive(Debug)]
pub struct TaskFailure {
    /// The destination the task was writing.
    pub link: String,
    pub error: write::Error,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.link, self.error)
    }
}

/// The result of a build.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Every variant is fatal; documents
/// that fail to parse are reported in [`BuildReport::skipped`] instead.
#[derive(Debug)]
pub enum Error {
    /// Returned when the site or theme configuration is missing or malformed.
    Config(config::Error),

    /// Returned when no visible, non-draft document survived loading.
    Validation { skipped: usize },

    /// Returned when a theme or standalone template can't be compiled.
    Template(template::Error),

    /// Returned for I/O problems outside of render tasks: a missing source
    /// directory, or cleaning the output directory.
    Io {
        stage: Stage,
        path: PathBuf,
        err: io::Error,
    },

    /// Returned when render tasks failed. Every other task still ran.
    Render(Vec<TaskFailure>),

    /// Returned when a `build.copy` entry isn't a valid glob pattern.
    CopyPattern {
        pattern: String,
        err: glob::PatternError,
    },

    /// Returned when two outputs share a destination, e.g. a page named
    /// `index.md` and the first page of the main listing. Nothing is
    /// written.
    Collision {
        link: String,
        first: String,
        second: String,
    },
}

impl Error {
    /// The stage the build failed in.
    pub fn stage(&self) -> Stage {
        match self {
            Error::Config(_) | Error::Template(_) | Error::CopyPattern { .. } => Stage::Loading,
            Error::Validation { .. } => Stage::Aggregating,
            Error::Io { stage, .. } => *stage,
            Error::Render(_) | Error::Collision { .. } => Stage::Rendering,
        }
    }
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Validation { skipped } => write!(
                f,
                "no visible documents to build ({} skipped); refusing to produce an empty site",
                skipped
            ),
            Error::Template(err) => err.fmt(f),
            Error::Io { path, err, .. } => write!(f, "`{}`: {}", path.display(), err),
            Error::Render(failures) => {
                write!(f, "{} render task(s) failed", failures.len())?;
                for failure in failures {
                    write!(f, "\n  {}", failure)?;
                }
                Ok(())
            }
            Error::CopyPattern { pattern, err } => {
                write!(f, "`build.copy` entry `{}`: {}", pattern, err)
            }
            Error::Collision {
                link,
                first,
                second,
            } => write!(f, "`{}` is written by both {} and {}", link, first, second),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Validation { .. } | Error::Collision { .. } => None,
            Error::CopyPattern { err, .. } => Some(err),
            Error::Template(err) => Some(err),
            Error::Io { err, .. } => Some(err),
            Error::Render(failures) => failures
                .first()
                .map(|failure| &failure.error as &(dyn std::error::Error + 'static)),
        }
    }
}

impl From<config::Error> for Error {
    /// Converts [`config::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}

impl From<template::Error> for Error {
    /// Converts [`template::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}
