//! The units of concurrent render work and the writer that puts their output
//! on disk. Each [`Task`] writes one destination path and reads only
//! immutable build state, so tasks run in parallel without locking and in
//! no particular order. A failing task is reported in its [`Outcome`]; it
//! never stops its siblings.

use chrono::{DateTime, Utc};
use gtmpl::Value;
use log::{debug, error};
use rayon::prelude::*;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::assets;
use crate::document::Document;
use crate::export;
use crate::feed::{self, FeedConfig};
use crate::template::CompiledTemplate;

/// Serializes rendered output to paths under the output directory. Creates
/// parent directories on demand and holds no other state.
pub struct OutputWriter<'a> {
    output_directory: &'a Path,
}

impl<'a> OutputWriter<'a> {
    pub fn new(output_directory: &'a Path) -> OutputWriter<'a> {
        OutputWriter { output_directory }
    }

    /// Resolves a link relative to the output directory. A link that could
    /// land outside of it (`..`, a drive prefix) or names no file is
    /// refused.
    pub fn path(&self, link: &str) -> Result<PathBuf> {
        let relative = Path::new(link.trim_start_matches('/'));
        let mut components = relative.components().peekable();
        if components.peek().is_none()
            || !components.all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidLink(link.to_owned()));
        }
        Ok(self.output_directory.join(relative))
    }

    /// Creates the file for `link` and hands a buffered writer for it to
    /// `f`.
    pub fn write_with<F>(&self, link: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let path = self.path(link)?;
        let annotate = |err: io::Error| Error::Io {
            path: path.clone(),
            err,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(annotate)?;
        }
        let mut w = BufWriter::new(File::create(&path).map_err(annotate)?);
        f(&mut w)?;
        w.flush().map_err(annotate)
    }
}

/// A template, the data to execute it with, and where the result goes.
pub struct RenderJob<'a> {
    pub template: &'a CompiledTemplate,
    pub data: Value,

    /// The destination, relative to the output directory.
    pub link: String,
}

/// One independent unit of render or export work.
pub enum Task<'a> {
    Render(RenderJob<'a>),

    /// Writes `atom.xml`.
    Feed {
        config: FeedConfig,
        docs: &'a [Document],
        now: DateTime<Utc>,
    },

    /// Writes `index.json`.
    Export { docs: &'a [Document] },

    /// Copies a static asset into the output directory.
    Copy { src: PathBuf, link: String },
}

pub const FEED_FILE: &str = "atom.xml";
pub const EXPORT_FILE: &str = "index.json";

impl Task<'_> {
    /// The destination of this task, relative to the output directory.
    pub fn link(&self) -> &str {
        match self {
            Task::Render(job) => &job.link,
            Task::Feed { .. } => FEED_FILE,
            Task::Export { .. } => EXPORT_FILE,
            Task::Copy { link, .. } => link,
        }
    }

    /// Runs the task, writing through `writer`.
    pub fn run(&self, writer: &OutputWriter) -> Result<()> {
        match self {
            Task::Render(job) => writer.write_with(&job.link, |w| {
                job.template
                    .execute(w, job.data.clone())
                    .map_err(|err| Error::Template {
                        template: job.template.name().to_owned(),
                        err,
                    })
            }),
            Task::Feed { config, docs, now } => {
                writer.write_with(FEED_FILE, |w| Ok(feed::write_feed(config, docs, *now, w)?))
            }
            Task::Export { docs } => {
                writer.write_with(EXPORT_FILE, |w| Ok(export::write_json(docs, w)?))
            }
            Task::Copy { src, link } => {
                assets::copy(src, &writer.path(link)?).map_err(|err| Error::Io {
                    path: src.clone(),
                    err,
                })
            }
        }
    }

    /// What produces this task's output, for error messages.
    pub fn describe(&self) -> String {
        match self {
            Task::Render(job) => format!("template `{}`", job.template.name()),
            Task::Feed { .. } => String::from("the atom feed"),
            Task::Export { .. } => String::from("the JSON export"),
            Task::Copy { src, .. } => format!("copy of `{}`", src.display()),
        }
    }
}

/// What became of one task.
#[derive(Debug)]
pub struct Outcome {
    pub link: String,
    pub result: Result<()>,
}

/// Runs every task in parallel and waits for all of them. The outcomes come
/// back in task order, whatever order the tasks finished in.
pub fn run_all(tasks: &[Task], writer: &OutputWriter) -> Vec<Outcome> {
    tasks
        .par_iter()
        .map(|task| {
            let result = task.run(writer);
            match &result {
                Ok(()) => debug!("wrote {}", task.link()),
                Err(err) => error!("writing {}: {}", task.link(), err),
            }
            Outcome {
                link: task.link().to_owned(),
                result,
            }
        })
        .collect()
}

/// The result of a fallible task.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed render or export task.
#[derive(Debug)]
pub enum Error {
    /// An error executing a template.
    Template { template: String, err: String },

    /// An error writing an output file or copying an asset.
    Io { path: PathBuf, err: io::Error },

    /// An error building the feed.
    Feed(feed::Error),

    /// An error serializing the JSON export.
    Json(serde_json::Error),

    /// A destination that would escape the output directory.
    InvalidLink(String),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template { template, err } => {
                write!(f, "executing template `{}`: {}", template, err)
            }
            Error::Io { path, err } => write!(f, "`{}`: {}", path.display(), err),
            Error::Feed(err) => err.fmt(f),
            Error::Json(err) => err.fmt(f),
            Error::InvalidLink(link) => {
                write!(f, "`{}` is not a path inside the output directory", link)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template { .. } | Error::InvalidLink(_) => None,
            Error::Io { err, .. } => Some(err),
            Error::Feed(err) => Some(err),
            Error::Json(err) => Some(err),
        }
    }
}

impl From<feed::Error> for Error {
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collection::test::doc;
    use crate::template::Partials;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_failures_stay_isolated() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let out = TempDir::new()?;
        // A file where a directory is needed makes one task fail.
        fs::write(out.path().join("blocked"), "")?;

        let template = CompiledTemplate::compile(
            "t",
            "{{.Title}}",
            &Partials::default(),
            Arc::new(HashMap::new()),
        )?;
        let data = |title: &str| {
            crate::value::object(vec![("Title", Value::String(title.to_owned()))])
        };
        let docs = vec![doc("a.html", "2021-01-01", &[])];
        let tasks = vec![
            Task::Render(RenderJob {
                template: &template,
                data: data("one"),
                link: "one.html".to_owned(),
            }),
            Task::Render(RenderJob {
                template: &template,
                data: data("two"),
                link: "blocked/two.html".to_owned(),
            }),
            Task::Export { docs: &docs },
        ];

        let writer = OutputWriter::new(out.path());
        let outcomes = run_all(&tasks, &writer);
        let links: Vec<&str> = outcomes.iter().map(|o| o.link.as_str()).collect();
        assert_eq!(links, vec!["one.html", "blocked/two.html", "index.json"]);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(Error::Io { .. })));
        assert!(outcomes[2].result.is_ok());
        assert_eq!(fs::read_to_string(out.path().join("one.html"))?, "one");
        Ok(())
    }

    #[test]
    fn test_links_stay_inside_output() {
        let writer = OutputWriter::new(Path::new("/out"));
        assert_eq!(writer.path("/tag/go/index.html").ok(), Some(PathBuf::from("/out/tag/go/index.html")));
        for link in ["../escaped.html", "tag/../../x.html", "./a.html", "", "/"] {
            assert!(
                matches!(writer.path(link), Err(Error::InvalidLink(l)) if l == link),
                "{:?} was accepted",
                link
            );
        }
    }
}
