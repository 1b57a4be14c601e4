//! Defines [`GlobalSite`], the read-only configuration shared by every stage
//! of a build, and the logic for loading it from a project directory. A
//! project looks like this:
//!
//! ```text
//! {root}/config.yml          site, authors and build options
//! {root}/source/             markdown documents and standalone templates
//! {root}/{theme}/config.yml  theme copy list and localization table
//! {root}/{theme}/*.html      page templates and `_`-prefixed partials
//! ```
//!
//! A [`GlobalSite`] is never mutated once loaded. Reloading means loading a
//! fresh value and running a fresh build with it.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The marker that documents, avatars and logos use to refer to the site root.
pub const ROOT_FLAG: &str = "-/";

const CONFIG_FILE: &str = "config.yml";

/// Site metadata from the `site` section of `config.yml`.
#[derive(Deserialize, Clone, Debug)]
pub struct Site {
    #[serde(default)]
    pub root: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub subtitle: String,

    #[serde(default)]
    pub logo: String,

    /// The number of documents per listing page and in the feed.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// The theme directory, relative to the project root.
    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub lang: String,

    /// The base URL of the published site. The feed is only written when
    /// this is set.
    #[serde(default)]
    pub url: String,

    /// The link pattern for posts, e.g. `/{year}/{month}/{title}.html`.
    #[serde(default)]
    pub link: String,

    /// Theme-specific settings, handed to templates untouched.
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_limit() -> usize {
    10
}

fn default_theme() -> String {
    String::from("theme")
}

/// An entry of the author directory.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Author {
    /// Filled from the directory key when the author is resolved.
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub intro: String,

    #[serde(default)]
    pub avatar: String,
}

/// Options for the build itself, from the `build` section of `config.yml`.
#[derive(Deserialize, Clone, Debug)]
pub struct BuildOptions {
    /// The output directory, relative to the project root.
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub port: String,

    /// Files and directories (globless paths relative to the project root)
    /// to copy into the output directory.
    #[serde(default)]
    pub copy: Vec<String>,

    /// The shell command run by `inkwell publish`.
    #[serde(default)]
    pub publish: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            output: default_output(),
            port: String::new(),
            copy: Vec::new(),
            publish: String::new(),
        }
    }
}

fn default_output() -> String {
    String::from("public")
}

#[derive(Deserialize)]
struct ProjectFile {
    site: Site,

    #[serde(default)]
    authors: HashMap<String, Author>,

    #[serde(default)]
    build: BuildOptions,
}

#[derive(Deserialize, Default)]
struct ThemeFile {
    #[serde(default)]
    copy: Vec<String>,

    /// key -> language -> text
    #[serde(default)]
    lang: HashMap<String, HashMap<String, String>>,
}

/// The process-wide configuration for one build.
#[derive(Clone, Debug)]
pub struct GlobalSite {
    pub site: Site,
    pub authors: HashMap<String, Author>,
    pub build: BuildOptions,

    /// The localization mapping for `site.lang`.
    pub i18n: HashMap<String, String>,

    /// Set when building for local preview.
    pub develop: bool,

    /// The project root every relative path is resolved against.
    pub root_directory: PathBuf,
}

impl GlobalSite {
    /// Loads `{root}/config.yml` and the theme configuration it points to.
    pub fn load(root: &Path, develop: bool) -> Result<GlobalSite> {
        let path = root.join(CONFIG_FILE);
        let project: ProjectFile = serde_yaml::from_reader(open(&path)?)
            .map_err(|err| Error::Yaml { path, err })?;

        let theme_path = root.join(&project.site.theme).join(CONFIG_FILE);
        let theme: ThemeFile = serde_yaml::from_reader(open(&theme_path)?)
            .map_err(|err| Error::Yaml {
                path: theme_path,
                err,
            })?;

        GlobalSite::from_parts(root, project, theme, develop)
    }

    /// Builds a site from already-parsed configuration text. Used by tests
    /// and by callers that keep configuration somewhere other than disk.
    pub fn from_str(
        root: &Path,
        project: &str,
        theme: &str,
        develop: bool,
    ) -> Result<GlobalSite> {
        let project: ProjectFile =
            serde_yaml::from_str(project).map_err(|err| Error::Yaml {
                path: root.join(CONFIG_FILE),
                err,
            })?;
        let theme: ThemeFile = match theme.trim().is_empty() {
            true => ThemeFile::default(),
            false => serde_yaml::from_str(theme).map_err(|err| Error::Yaml {
                path: root.join(&project.site.theme).join(CONFIG_FILE),
                err,
            })?,
        };
        GlobalSite::from_parts(root, project, theme, develop)
    }

    fn from_parts(
        root: &Path,
        project: ProjectFile,
        theme: ThemeFile,
        develop: bool,
    ) -> Result<GlobalSite> {
        let ProjectFile {
            mut site,
            authors,
            mut build,
        } = project;

        if site.limit == 0 {
            return Err(Error::ZeroLimit);
        }
        if develop {
            site.root = String::new();
        }
        site.logo = replace_root_flag(&site.logo, &site.root);
        if !site.url.is_empty() {
            if let Err(err) = Url::parse(&site.url) {
                return Err(Error::InvalidUrl {
                    url: site.url.clone(),
                    err,
                });
            }
            site.url = site.url.trim_end_matches('/').to_owned();
        }
        if build.output.is_empty() {
            build.output = default_output();
        }

        // Theme assets are copied along with the project's own.
        build.copy.extend(
            theme
                .copy
                .iter()
                .map(|item| format!("{}/{}", site.theme, item)),
        );

        let i18n = theme
            .lang
            .into_iter()
            .map(|(key, translations)| {
                let text = translations.get(&site.lang).cloned().unwrap_or_default();
                (key, text)
            })
            .collect();

        Ok(GlobalSite {
            site,
            authors,
            build,
            i18n,
            develop,
            root_directory: root.to_owned(),
        })
    }

    /// Looks up an author by id, filling in the id and resolving the root
    /// flag in the avatar path.
    pub fn author(&self, id: &str) -> Option<Author> {
        self.authors.get(id).map(|author| Author {
            id: id.to_owned(),
            avatar: replace_root_flag(&author.avatar, &self.site.root),
            ..author.clone()
        })
    }

    pub fn source_directory(&self) -> PathBuf {
        self.root_directory.join("source")
    }

    pub fn theme_directory(&self) -> PathBuf {
        self.root_directory.join(&self.site.theme)
    }

    pub fn output_directory(&self) -> PathBuf {
        self.root_directory.join(&self.build.output)
    }
}

/// Replaces every root flag (`-/`) in `text` with `{root}/`.
pub fn replace_root_flag(text: &str, root: &str) -> String {
    text.replace(ROOT_FLAG, &format!("{}/", root))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents malformed or missing site or theme configuration. Always fatal.
#[derive(Debug)]
pub enum Error {
    /// Returned when a configuration file can't be opened.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned when a configuration file isn't valid YAML for its schema.
    Yaml {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when `site.limit` is zero.
    ZeroLimit,

    /// Returned when `site.url` can't be parsed as a URL.
    InvalidUrl { url: String, err: url::ParseError },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "opening config file `{}`: {}", path.display(), err)
            }
            Error::Yaml { path, err } => {
                write!(f, "parsing config file `{}`: {}", path.display(), err)
            }
            Error::ZeroLimit => write!(f, "`site.limit` must be at least 1"),
            Error::InvalidUrl { url, err } => {
                write!(f, "invalid `site.url` `{}`: {}", url, err)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { err, .. } => Some(err),
            Error::Yaml { err, .. } => Some(err),
            Error::ZeroLimit => None,
            Error::InvalidUrl { err, .. } => Some(err),
        }
    }
}
