//! Compiles theme templates. A theme directory holds page templates
//! (`article.html`, `page.html`, `archive.html`, `tag.html`) and partials,
//! whose file names start with `_`. Every partial is wrapped in a
//! `{{define "name"}}...{{end}}` block named after its file (`_header.html`
//! becomes `header`) and the blocks are appended to each page template, so
//! a page can pull in a partial with `{{template "header" .}}`.
//!
//! Compiled templates expose an `i18n` function that looks a key up in the
//! site's localization mapping: `{{i18n "home"}}`.

use gtmpl::{Context, Template, Value};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PARTIAL_PREFIX: &str = "_";
const TEMPLATE_EXTENSION: &str = "html";

thread_local! {
    // The localization mapping of the template executing on this thread.
    // Template functions are plain `fn` pointers and can't capture it.
    static LOCALIZATION: RefCell<Option<Arc<HashMap<String, String>>>> = RefCell::new(None);
}

fn i18n(args: &[Value]) -> std::result::Result<Value, String> {
    let key = match args {
        [Value::String(key)] => key,
        _ => return Err(String::from("i18n: expected exactly one string argument")),
    };
    Ok(LOCALIZATION.with(|cell| {
        let text = cell
            .borrow()
            .as_ref()
            .and_then(|mapping| mapping.get(key).cloned())
            .unwrap_or_default();
        Value::String(text)
    }))
}

// Installs a localization mapping for the current thread and restores the
// previous one when dropped.
struct LocalizationGuard {
    previous: Option<Arc<HashMap<String, String>>>,
}

impl LocalizationGuard {
    fn install(mapping: &Arc<HashMap<String, String>>) -> LocalizationGuard {
        let previous = LOCALIZATION.with(|cell| cell.replace(Some(Arc::clone(mapping))));
        LocalizationGuard { previous }
    }
}

impl Drop for LocalizationGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        LOCALIZATION.with(|cell| *cell.borrow_mut() = previous);
    }
}

/// The partial library of a theme, already wrapped in named blocks.
#[derive(Clone, Debug, Default)]
pub struct Partials {
    text: String,
}

impl Partials {
    /// Loads every `_*.html` file in `dir`, in file name order.
    pub fn load(dir: &Path) -> Result<Partials> {
        let entries = fs::read_dir(dir).map_err(|err| Error::Io {
            path: dir.to_owned(),
            err,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| Error::Io {
                    path: dir.to_owned(),
                    err,
                })?
                .path();
            if let Some(name) = partial_name(&path) {
                files.push((name, path));
            }
        }
        files.sort();

        let mut partials = Partials::default();
        for (name, path) in files {
            let text = read(&path)?;
            partials.add(&name, &text);
        }
        Ok(partials)
    }

    /// Adds a partial under `name`.
    pub fn add(&mut self, name: &str, text: &str) {
        debug!("partial `{}`", name);
        self.text.push_str(&format!("{{{{define \"{}\"}}}}{}{{{{end}}}}", name, text));
    }
}

/// The partial identifier of a file, if it is a partial: its lowercased
/// name without the `_` prefix and `.html` extension.
fn partial_name(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    let file_name = path.file_name()?.to_str()?.to_lowercase();
    if extension != TEMPLATE_EXTENSION || !file_name.starts_with(PARTIAL_PREFIX) {
        return None;
    }
    let stem = &file_name[PARTIAL_PREFIX.len()..file_name.len() - TEMPLATE_EXTENSION.len() - 1];
    Some(stem.to_owned())
}

/// Whether `path` is a non-partial HTML template.
pub fn is_page_template(path: &Path) -> bool {
    let is_html = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(TEMPLATE_EXTENSION));
    is_html && partial_name(path).is_none()
}

/// A page template compiled together with the partial library.
pub struct CompiledTemplate {
    name: String,
    template: Template,
    localization: Arc<HashMap<String, String>>,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .finish()
    }
}

impl CompiledTemplate {
    /// Compiles `text` with `partials` appended.
    pub fn compile(
        name: &str,
        text: &str,
        partials: &Partials,
        localization: Arc<HashMap<String, String>>,
    ) -> Result<CompiledTemplate> {
        let mut contents = String::with_capacity(text.len() + partials.text.len());
        contents.push_str(text);
        contents.push_str(&partials.text);

        let mut template = Template::default();
        template.add_func("i18n", i18n);
        template.parse(&contents).map_err(|err| Error::Parse {
            name: name.to_owned(),
            err,
        })?;
        Ok(CompiledTemplate {
            name: name.to_owned(),
            template,
            localization,
        })
    }

    /// Reads the template file at `path` and compiles it.
    pub fn load(
        path: &Path,
        partials: &Partials,
        localization: Arc<HashMap<String, String>>,
    ) -> Result<CompiledTemplate> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        CompiledTemplate::compile(&name, &read(path)?, partials, localization)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes the template against `value`, writing the result to `w`.
    pub fn execute<W: Write>(&self, w: &mut W, value: Value) -> std::result::Result<(), String> {
        let _guard = LocalizationGuard::install(&self.localization);
        let context = Context::from(value)?;
        self.template.execute(w, &context)
    }

    /// Executes the template against `value` and returns the output.
    #[cfg(test)]
    pub fn render(&self, value: Value) -> std::result::Result<String, String> {
        let mut out = Vec::new();
        self.execute(&mut out, value)?;
        String::from_utf8(out).map_err(|e| e.to_string())
    }
}

/// The page templates of a theme.
#[derive(Debug)]
pub struct Theme {
    pub article: CompiledTemplate,
    pub page: CompiledTemplate,
    pub archive: CompiledTemplate,
    pub tag: CompiledTemplate,
    pub partials: Partials,
    pub localization: Arc<HashMap<String, String>>,
}

impl Theme {
    /// Loads and compiles the theme in `dir`. Any failure is fatal to the
    /// build.
    pub fn load(dir: &Path, localization: &HashMap<String, String>) -> Result<Theme> {
        let partials = Partials::load(dir)?;
        let localization = Arc::new(localization.clone());
        let compile = |file: &str| CompiledTemplate::load(&dir.join(file), &partials, Arc::clone(&localization));
        Ok(Theme {
            article: compile("article.html")?,
            page: compile("page.html")?,
            archive: compile("archive.html")?,
            tag: compile("tag.html")?,
            partials: partials.clone(),
            localization: Arc::clone(&localization),
        })
    }

    /// Compiles a standalone template with this theme's partials.
    pub fn compile_standalone(&self, path: &Path) -> Result<CompiledTemplate> {
        CompiledTemplate::load(path, &self.partials, Arc::clone(&self.localization))
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| Error::Io {
        path: path.to_owned(),
        err,
    })
}

/// The result of a template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a template that can't be read or compiled. Fatal to the build.
#[derive(Debug)]
pub enum Error {
    /// Returned when a template file or directory can't be read.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when a template has malformed syntax.
    Parse { name: String, err: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { path, err } => {
                write!(f, "reading template `{}`: {}", path.display(), err)
            }
            Error::Parse { name, err } => {
                write!(f, "compiling template `{}`: {}", name, err)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            Error::Parse { .. } => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn localization() -> Arc<HashMap<String, String>> {
        let mut m = HashMap::new();
        m.insert("home".to_owned(), "Accueil".to_owned());
        Arc::new(m)
    }

    fn object(pairs: &[(&str, &str)]) -> Value {
        Value::Object(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), Value::String((*v).to_owned())))
                .collect(),
        )
    }

    #[test]
    fn test_partials_and_i18n() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut partials = Partials::default();
        partials.add("header", "<h1>{{.Title}}</h1>");
        let template = CompiledTemplate::compile(
            "article.html",
            r#"{{template "header" .}}<a>{{i18n "home"}}</a>"#,
            &partials,
            localization(),
        )?;
        let out = template.render(object(&[("Title", "Hi")]))?;
        assert_eq!(out, "<h1>Hi</h1><a>Accueil</a>");
        Ok(())
    }

    #[test]
    fn test_missing_key_renders_empty() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let template =
            CompiledTemplate::compile("t", r#"[{{i18n "nope"}}]"#, &Partials::default(), localization())?;
        assert_eq!(template.render(object(&[]))?, "[]");
        Ok(())
    }

    #[test]
    fn test_i18n_arguments() {
        let lookup: fn(&[Value]) -> std::result::Result<Value, String> = i18n;
        assert!(lookup(&[]).is_err());
        assert!(lookup(&[Value::from(1i64)]).is_err());
        assert!(matches!(lookup(&[Value::String("home".to_owned())]), Ok(Value::String(s)) if s.is_empty()));
    }

    #[test]
    fn test_malformed_template() {
        let result = CompiledTemplate::compile("bad", "{{if}", &Partials::default(), localization());
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_partial_names() {
        assert_eq!(partial_name(Path::new("theme/_Header.html")), Some("header".to_owned()));
        assert_eq!(partial_name(Path::new("theme/page.html")), None);
        assert_eq!(partial_name(Path::new("theme/_notes.txt")), None);
        assert!(is_page_template(Path::new("source/404.html")));
        assert!(!is_page_template(Path::new("source/_foot.html")));
    }
}
