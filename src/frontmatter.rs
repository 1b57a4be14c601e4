//! Splits a source file into its front matter and its markdown body, and
//! parses the front matter. Two syntaxes are supported: YAML between `---`
//! fences, and TOML between `+++` fences. The fence picks which syntax is
//! tried first; the other is tried if the first fails, and the document is
//! rejected only when neither parses.
//!
//! ```md
//! ---
//! title: Hello, world!
//! date: 2021-04-16 10:00:00
//! tags: [greet]
//! ---
//! # Hello
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

const YAML_FENCE: &str = "---";
const TOML_FENCE: &str = "+++";

/// The metadata block of a document, as written by the author. Empty
/// fields are left out when it is serialized back.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FrontMatter {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub update: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub topic: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cover: String,
    #[serde(skip_serializing_if = "is_false")]
    pub draft: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub preview: String,
    #[serde(skip_serializing_if = "is_false")]
    pub top: bool,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "is_false")]
    pub hide: bool,

    /// Theme-specific fields, passed through to templates untouched.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl FrontMatter {
    /// Renders the block as YAML between `---` fences, ready to sit on top
    /// of a markdown body.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        let yaml = serde_yaml::to_string(self)?;
        // serde_yaml opens every document with its own `---`.
        let body = yaml.trim_start_matches(YAML_FENCE).trim_matches('\n');
        Ok(format!("{}\n{}\n{}\n", YAML_FENCE, body, YAML_FENCE))
    }
}

/// The syntax a front matter block was written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    Yaml,
    Toml,
}

impl Syntax {
    fn fence(self) -> &'static str {
        match self {
            Syntax::Yaml => YAML_FENCE,
            Syntax::Toml => TOML_FENCE,
        }
    }

    fn other(self) -> Syntax {
        match self {
            Syntax::Yaml => Syntax::Toml,
            Syntax::Toml => Syntax::Yaml,
        }
    }

    fn parse(self, text: &str) -> std::result::Result<FrontMatter, String> {
        match self {
            Syntax::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            Syntax::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        }
    }
}

/// Picks the syntax from the opening fence: `+++` selects TOML, anything
/// else YAML.
pub fn detect(input: &str) -> Syntax {
    match input.starts_with(TOML_FENCE) {
        true => Syntax::Toml,
        false => Syntax::Yaml,
    }
}

/// Splits `input` on its fence into at most three parts and returns the
/// front matter text and the body. The text before the opening fence is
/// discarded.
pub fn split(input: &str) -> Result<(Syntax, &str, &str)> {
    let syntax = detect(input);
    let mut parts = input.splitn(3, syntax.fence());
    let _leading = parts.next();
    match (parts.next(), parts.next()) {
        (Some(meta), Some(body)) => Ok((syntax, meta, body)),
        (Some(_), None) => Err(Error::MissingEndFence(syntax.fence())),
        _ => Err(Error::MissingFence),
    }
}

/// Parses the front matter of `input` and returns it with the body. Unset
/// `type` defaults to `post`.
pub fn parse(input: &str) -> Result<(FrontMatter, &str)> {
    let (syntax, meta, body) = split(input)?;
    if meta.trim().is_empty() {
        return Err(Error::Empty);
    }

    let mut front_matter = match syntax.parse(meta) {
        Ok(fm) => fm,
        Err(first) => match syntax.other().parse(meta) {
            Ok(fm) => fm,
            Err(second) => {
                return Err(Error::Syntax {
                    tried: syntax,
                    first,
                    second,
                })
            }
        },
    };

    if front_matter.kind.is_empty() {
        front_matter.kind = String::from("post");
    }
    Ok((front_matter, body))
}

/// The result of a front matter parse.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a document whose metadata can't be read. The document is
/// skipped; the build goes on.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Returned when the input contains no fence at all.
    MissingFence,

    /// Returned when the opening fence has no matching closing fence.
    MissingEndFence(&'static str),

    /// Returned when the front matter block is blank.
    Empty,

    /// Returned when the block parses under neither syntax. `first` is the
    /// error for the syntax selected by the fence, `second` for the fallback.
    Syntax {
        tried: Syntax,
        first: String,
        second: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingFence => write!(f, "missing front matter fence"),
            Error::MissingEndFence(fence) => {
                write!(f, "missing closing `{}`", fence)
            }
            Error::Empty => write!(f, "empty front matter"),
            Error::Syntax {
                tried,
                first,
                second,
            } => write!(
                f,
                "invalid front matter ({:?}: {}; {:?}: {})",
                tried,
                first,
                tried.other(),
                second
            ),
        }
    }
}

impl std::error::Error for Error {}
