//! Finds content files under the source directory and parses them into
//! [`Document`]s. Symlinked directories are followed. A file that can't be
//! read or whose front matter can't be parsed is skipped and reported; it
//! never stops the build.

use log::{info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::GlobalSite;
use crate::document::Document;
use crate::frontmatter;

const MARKDOWN_EXTENSION: &str = "md";

/// A candidate content file.
pub struct SourceFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Walks the source directory and yields markdown files with their raw
/// contents, in file name order.
pub struct ContentLoader<'a> {
    source_directory: &'a Path,
}

impl<'a> ContentLoader<'a> {
    pub fn new(source_directory: &'a Path) -> ContentLoader<'a> {
        ContentLoader { source_directory }
    }

    /// Yields every markdown file, or the error that kept it from being
    /// read.
    pub fn files(&self) -> impl Iterator<Item = Result<SourceFile>> + 'a {
        WalkDir::new(self.source_directory)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|result| match result {
                Err(err) => Some(Err(Error::WalkDir(err))),
                Ok(entry) => {
                    let is_markdown = entry.file_type().is_file()
                        && entry
                            .path()
                            .extension()
                            .and_then(|e| e.to_str())
                            .map_or(false, |e| e.eq_ignore_ascii_case(MARKDOWN_EXTENSION));
                    match is_markdown {
                        false => None,
                        true => Some(read(entry.path())),
                    }
                }
            })
    }
}

fn read(path: &Path) -> Result<SourceFile> {
    match fs::read(path) {
        Ok(bytes) => Ok(SourceFile {
            path: path.to_owned(),
            bytes,
        }),
        Err(err) => Err(Error::Io {
            path: path.to_owned(),
            err,
        }),
    }
}

/// A document that was left out of the build, and why.
#[derive(Debug)]
pub struct Skipped {
    pub path: PathBuf,
    pub error: Error,
}

/// Parses [`Document`]s from source files.
pub struct Parser<'a> {
    site: &'a GlobalSite,
}

impl<'a> Parser<'a> {
    pub fn new(site: &'a GlobalSite) -> Parser<'a> {
        Parser { site }
    }

    /// Parses one source file.
    pub fn parse_file(&self, file: &SourceFile) -> Result<Document> {
        let text = std::str::from_utf8(&file.bytes).map_err(|_| Error::InvalidUtf8)?;
        let stem = file
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::InvalidFileName(file.path.clone()))?;
        Ok(Document::parse(self.site, stem, text)?)
    }

    /// Parses every document under `source_directory`. Returns the parsed
    /// documents and the ones that were skipped. Drafts are returned too;
    /// it's up to the caller to leave them out.
    pub fn parse_documents(&self, source_directory: &Path) -> (Vec<Document>, Vec<Skipped>) {
        let mut documents = Vec::new();
        let mut skipped = Vec::new();
        for result in ContentLoader::new(source_directory).files() {
            let parsed = result.and_then(|file| {
                self.parse_file(&file)
                    .map_err(|err| Error::Annotated(file.path.clone(), Box::new(err)))
            });
            match parsed {
                Ok(doc) => {
                    info!("building {}", doc.link);
                    documents.push(doc);
                }
                Err(error) => {
                    warn!("skipping document: {}", error);
                    skipped.push(Skipped {
                        path: error.path().map(Path::to_owned).unwrap_or_default(),
                        error,
                    });
                }
            }
        }
        (documents, skipped)
    }
}

/// The result of loading a document.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a document that can't be loaded.
#[derive(Debug)]
pub enum Error {
    /// Returned when the front matter can't be parsed.
    FrontMatter(frontmatter::Error),

    /// Returned when a source file can't be read.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when the source directory can't be walked.
    WalkDir(walkdir::Error),

    /// Returned when a source file isn't valid UTF-8.
    InvalidUtf8,

    /// Returned when a file name isn't valid UTF-8.
    InvalidFileName(PathBuf),

    /// An error with the path of the document it belongs to.
    Annotated(PathBuf, Box<Error>),
}

impl Error {
    /// The path of the file the error belongs to, if known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::Io { path, .. } => Some(path),
            Error::WalkDir(err) => err.path(),
            Error::InvalidFileName(path) => Some(path),
            Error::Annotated(path, _) => Some(path),
            Error::FrontMatter(_) | Error::InvalidUtf8 => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontMatter(err) => err.fmt(f),
            Error::Io { path, err } => write!(f, "reading `{}`: {}", path.display(), err),
            Error::WalkDir(err) => err.fmt(f),
            Error::InvalidUtf8 => write!(f, "file isn't valid UTF-8"),
            Error::InvalidFileName(path) => write!(f, "invalid file name: {:?}", path),
            Error::Annotated(path, err) => write!(f, "parsing `{}`: {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontMatter(err) => Some(err),
            Error::Io { err, .. } => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::InvalidUtf8 => None,
            Error::InvalidFileName(_) => None,
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<frontmatter::Error> for Error {
    fn from(err: frontmatter::Error) -> Error {
        Error::FrontMatter(err)
    }
}
