//! Creates new documents: a front matter block filled in from the command
//! line followed by an empty body. Posts go to `source/post/`, pages to
//! `source/`, and the file is named after the slug of the title.

use chrono::Local;
use log::info;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::date;
use crate::document::Kind;
use crate::frontmatter::FrontMatter;

const SOURCE_DIRECTORY: &str = "source";
const POST_DIRECTORY: &str = "post";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The fields of a document to create.
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub title: String,
    pub kind: Kind,

    /// Defaults to the current local time.
    pub date: Option<String>,

    pub author: String,
    pub tags: Vec<String>,
    pub cover: String,
    pub preview: String,
    pub draft: bool,
    pub top: bool,
    pub hide: bool,
}

impl NewDocument {
    pub fn new(title: &str, kind: Kind) -> NewDocument {
        NewDocument {
            title: title.to_owned(),
            kind,
            date: None,
            author: String::new(),
            tags: Vec::new(),
            cover: String::new(),
            preview: String::new(),
            draft: false,
            top: false,
            hide: false,
        }
    }

    /// Where the document goes under the project at `root`.
    pub fn path(&self, root: &Path) -> Result<PathBuf> {
        let slug = slug::slugify(&self.title);
        if slug.is_empty() {
            return Err(Error::EmptyTitle);
        }
        let dir = root.join(SOURCE_DIRECTORY);
        let dir = match self.kind {
            Kind::Post => dir.join(POST_DIRECTORY),
            Kind::Page => dir,
        };
        Ok(dir.join(format!("{}.md", slug)))
    }

    fn front_matter(&self) -> Result<FrontMatter> {
        let date = match &self.date {
            Some(text) => match date::parse(text) {
                Some(_) => text.trim().to_owned(),
                None => return Err(Error::InvalidDate(text.clone())),
            },
            None => Local::now().format(DATE_FORMAT).to_string(),
        };
        Ok(FrontMatter {
            title: self.title.trim().to_owned(),
            date,
            author: self.author.clone(),
            tags: self.tags.clone(),
            cover: self.cover.clone(),
            preview: self.preview.clone(),
            draft: self.draft,
            top: self.top,
            hide: self.hide,
            kind: self.kind.as_str().to_owned(),
            ..FrontMatter::default()
        })
    }
}

/// Writes `doc` into the project at `root` and returns its path. An
/// existing file is never overwritten.
pub fn create(root: &Path, doc: &NewDocument) -> Result<PathBuf> {
    let path = doc.path(root)?;
    let text = doc.front_matter()?.to_yaml()?;

    let annotate = |err: io::Error| match err.kind() {
        io::ErrorKind::AlreadyExists => Error::Exists(path.clone()),
        _ => Error::Io {
            path: path.clone(),
            err,
        },
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(annotate)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(annotate)?;
    file.write_all(text.as_bytes()).map_err(annotate)?;
    info!("created {} `{}`", doc.kind.as_str(), path.display());
    Ok(path)
}

/// The result of scaffolding a document.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Returned when the title has nothing to name a file after.
    EmptyTitle,

    /// Returned when `--date` isn't a date the build understands.
    InvalidDate(String),

    /// Returned when the target file is already there.
    Exists(PathBuf),

    Io { path: PathBuf, err: io::Error },

    Yaml(serde_yaml::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EmptyTitle => write!(f, "the title can't be used as a file name"),
            Error::InvalidDate(text) => write!(f, "invalid date `{}`", text),
            Error::Exists(path) => write!(f, "`{}` already exists", path.display()),
            Error::Io { path, err } => write!(f, "`{}`: {}", path.display(), err),
            Error::Yaml(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            Error::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}
