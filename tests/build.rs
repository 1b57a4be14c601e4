use inkwell::build::{run_build, Builder, Error, Stage};
use std::fs;
use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const CONFIG: &str = r#"
site:
  title: Notes
  url: https://example.com/
  lang: fr
  limit: 2
authors:
  jo:
    name: Jo
build:
  copy: [static]
"#;

const THEME_CONFIG: &str = r#"
lang:
  home:
    en: Home
    fr: Accueil
"#;

fn write(root: &Path, path: &str, contents: &str) -> std::io::Result<()> {
    let path = root.join(path);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, contents)
}

fn read(root: &Path, path: &str) -> std::io::Result<String> {
    fs::read_to_string(root.join("public").join(path))
}

// A theme whose templates print just enough to assert on.
fn theme(root: &Path) -> std::io::Result<()> {
    write(root, "config.yml", CONFIG)?;
    write(root, "theme/config.yml", THEME_CONFIG)?;
    write(root, "theme/_head.html", "<title>{{.Site.Title}}</title>")?;
    write(
        root,
        "theme/article.html",
        r#"{{template "head" .}}<h1>{{.Title}}</h1>{{.Content}}<nav>{{i18n "home"}}</nav>"#,
    )?;
    write(
        root,
        "theme/page.html",
        "{{range .Articles}}[{{.Link}}]{{end}} {{.Page}}/{{.Total}} prev={{.Prev}} next={{.Next}} tag={{.TagName}}",
    )?;
    write(root, "theme/archive.html", "{{range .Archive}}({{.Year}}){{end}} {{.Total}}")?;
    write(root, "theme/tag.html", "{{range .Tag}}{{.Name}}={{.Count}};{{end}}")?;
    write(root, "source/404.html", "{{template \"head\" .}}missing")?;
    write(root, "static/site.css", "body{}")
}

fn posts(root: &Path) -> std::io::Result<()> {
    write(
        root,
        "source/2021-03-05-hello.md",
        "---\ntitle: Hello\ndate: 2021-03-05\nauthor: jo\ntags: [rust]\ncategories: [notes]\n---\nIntro<!--more-->\n\n# Rest\n",
    )?;
    write(
        root,
        "source/second.md",
        "+++\ntitle = \"Second\"\ndate = \"2021-03-06\"\ntags = [\"rust\"]\n+++\nSecond body\n",
    )?;
    write(
        root,
        "source/posts/first.md",
        "---\ntitle: First\ndate: 2020-01-01\ntop: true\n---\nPinned\n",
    )?;
    write(
        root,
        "source/about.md",
        "---\ntitle: About\ntype: page\n---\nAbout me\n",
    )?;
    write(
        root,
        "source/draft.md",
        "---\ntitle: Draft\ndate: 2021-04-01\ndraft: true\n---\nNot yet\n",
    )
}

#[test]
fn test_full_site() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    write(root, "public/stale.html", "old")?;
    write(root, "public/CNAME", "example.com")?;

    let report = run_build(root)?;
    assert_eq!(report.documents, 4);
    assert!(report.skipped.is_empty());

    let hello = read(root, "2021-03-05-hello.html")?;
    assert!(hello.starts_with("<title>Notes</title><h1>Hello</h1>"));
    assert!(hello.contains("<h1>Rest</h1>"));
    assert!(!hello.contains("<!--more-->"));
    assert!(hello.contains("<nav>Accueil</nav>"));
    assert!(read(root, "about.html")?.contains("<h1>About</h1>"));
    assert!(!root.join("public/draft.html").exists());

    // Pinned first, then newest first; two per page.
    assert_eq!(
        read(root, "index.html")?,
        "[first.html][second.html] 1/2 prev= next=page2.html tag="
    );
    assert_eq!(
        read(root, "page2.html")?,
        "[2021-03-05-hello.html] 2/2 prev=index.html next= tag="
    );
    assert_eq!(
        read(root, "tag/rust/index.html")?,
        "[second.html][2021-03-05-hello.html] 1/1 prev= next= tag=rust"
    );
    assert!(read(root, "tag/notes/index.html")?.contains("[2021-03-05-hello.html]"));
    assert_eq!(read(root, "archive.html")?, "(2021)(2020) 3");
    assert_eq!(read(root, "tag.html")?, "rust=2;notes=1;");
    assert_eq!(read(root, "404.html")?, "<title>Notes</title>missing");
    assert_eq!(read(root, "static/site.css")?, "body{}");

    let feed = read(root, "atom.xml")?;
    assert!(feed.contains("https://example.com/first.html"));
    assert!(feed.contains("https://example.com/second.html"));
    assert!(!feed.contains("hello"));

    let index: serde_json::Value = serde_json::from_str(&read(root, "index.json")?)?;
    let links: Vec<&str> = index
        .as_array()
        .map(|entries| entries.iter().filter_map(|e| e["link"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(links, vec!["first.html", "second.html", "2021-03-05-hello.html"]);

    assert!(!root.join("public/stale.html").exists());
    assert!(root.join("public/CNAME").exists());
    Ok(())
}

#[test]
fn test_link_pattern() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    let config = CONFIG.replace("  limit: 2\n", "  limit: 2\n  link: /{year}/{month}/{title}.html\n");
    write(root, "config.yml", &config)?;

    run_build(root)?;
    assert!(read(root, "2021/03/hello.html")?.contains("<h1>Hello</h1>"));
    assert!(read(root, "2021/03/second.html")?.contains("<h1>Second</h1>"));
    assert!(read(root, "about.html")?.contains("<h1>About</h1>"));
    Ok(())
}

#[test]
fn test_broken_document_is_skipped() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    write(root, "source/broken.md", "---\ntitle: [unclosed\n---\nbody\n")?;

    let report = run_build(root)?;
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("broken.md"));
    assert!(!root.join("public/broken.html").exists());
    assert!(root.join("public/index.html").exists());
    Ok(())
}

#[test]
fn test_no_visible_documents() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    write(
        root,
        "source/draft.md",
        "---\ntitle: Draft\ndraft: true\n---\nNot yet\n",
    )?;
    write(root, "source/broken.md", "---\ntitle: [unclosed\n---\n")?;

    match run_build(root) {
        Err(err @ Error::Validation { .. }) => assert_eq!(err.stage(), Stage::Aggregating),
        other => panic!("wanted a validation error, got {:?}", other),
    }
    assert!(!root.join("public").exists());
    Ok(())
}

#[test]
fn test_malformed_template_is_fatal() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    write(root, "theme/tag.html", "{{range .Tag}")?;

    assert!(matches!(run_build(root), Err(Error::Template(_))));
    assert!(!root.join("public").exists());
    Ok(())
}

#[test]
fn test_bad_config_is_fatal() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    write(root, "config.yml", "site:\n  title: Notes\n  limit: 0\n")?;

    let builder = Builder::new(false);
    match builder.run(root) {
        Err(err @ Error::Config(_)) => assert_eq!(err.stage(), Stage::Loading),
        other => panic!("wanted a config error, got {:?}", other),
    }
    assert_eq!(builder.stage(), Stage::Failed);
    Ok(())
}

#[test]
fn test_try_run_skips_while_building() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;

    let builder = Builder::new(true);
    assert_eq!(builder.stage(), Stage::Idle);
    thread::scope(|scope| -> TestResult {
        let builder = &builder;
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = scope.spawn(move || {
            builder.run_with(root, move |stage| {
                if stage == Stage::Rendering {
                    let _ = entered_tx.send(());
                    let _ = release_rx.recv();
                }
            })
        });

        entered_rx.recv()?;
        assert_eq!(builder.stage(), Stage::Rendering);
        assert!(builder.try_run(root).is_none());
        release_tx.send(())?;
        assert!(matches!(handle.join(), Ok(Ok(_))));
        Ok(())
    })?;
    assert_eq!(builder.stage(), Stage::Done);
    assert!(matches!(builder.try_run(root), Some(Ok(_))));
    Ok(())
}

#[test]
fn test_builds_never_overlap() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;

    let builder = Builder::new(true);
    let events = Mutex::new(Vec::new());
    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|id| {
                let (builder, events) = (&builder, &events);
                scope.spawn(move || {
                    builder.run_with(root, |stage| {
                        events.lock().unwrap().push((id, stage));
                        if stage == Stage::Aggregating {
                            thread::sleep(Duration::from_millis(20));
                        }
                    })
                })
            })
            .collect();
        for handle in handles {
            assert!(matches!(handle.join(), Ok(Ok(_))));
        }
    });

    // Every build runs from Loading to Done before the next one starts.
    let events = events.into_inner()?;
    assert_eq!(events.len(), 16);
    let mut ids = Vec::new();
    for build in events.chunks(4) {
        let id = build[0].0;
        assert!(build.iter().all(|(other, _)| *other == id), "interleaved: {:?}", events);
        let stages: Vec<Stage> = build.iter().map(|(_, stage)| *stage).collect();
        assert_eq!(
            stages,
            vec![Stage::Loading, Stage::Aggregating, Stage::Rendering, Stage::Done]
        );
        ids.push(id);
    }
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    Ok(())
}

#[test]
fn test_tags_cannot_escape_output() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    write(
        root,
        "source/odd.md",
        "---\ntitle: Odd\ndate: 2019-01-01\ntags: [\"../../escaped\", \"..\", \"RUST\"]\n---\nOdd\n",
    )?;

    run_build(root)?;
    assert!(!root.join("escaped").exists());
    assert!(!root.join("public/escaped").exists());
    assert!(read(root, "tag/escaped/index.html")?.contains("[odd.html]"));
    assert!(read(root, "tag/rust/index.html")?.contains("[odd.html]"));
    assert!(read(root, "tag.html")?.contains("=3;"));
    assert!(!read(root, "tag.html")?.contains("..="));
    assert!(read(root, "index.html")?.starts_with("[first.html][second.html]"));
    Ok(())
}

#[test]
fn test_colliding_destinations() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    write(root, "source/index.md", "---\ntitle: Home\ntype: page\n---\nWelcome\n")?;
    write(root, "public/index.html", "previous build")?;

    match run_build(root) {
        Err(err @ Error::Collision { .. }) => {
            assert_eq!(err.stage(), Stage::Rendering);
            assert!(matches!(&err, Error::Collision { link, .. } if link == "index.html"));
            assert!(err.to_string().contains("article.html"));
        }
        other => panic!("wanted a collision error, got {:?}", other),
    }
    // Nothing was cleaned or written.
    assert_eq!(read(root, "index.html")?, "previous build");
    assert!(!root.join("public/about.html").exists());
    Ok(())
}

#[test]
fn test_copy_patterns() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    write(root, "static/fonts/serif.woff", "font")?;
    write(root, "robots.txt", "ok")?;
    let config = CONFIG.replace("copy: [static]", "copy: [\"static/*\", robots.txt, \"missing/*\"]");
    write(root, "config.yml", &config)?;

    run_build(root)?;
    assert_eq!(read(root, "site.css")?, "body{}");
    assert_eq!(read(root, "fonts/serif.woff")?, "font");
    assert_eq!(read(root, "robots.txt")?, "ok");
    assert!(!root.join("public/static").exists());
    Ok(())
}

#[test]
fn test_bad_copy_pattern_is_fatal() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    write(root, "config.yml", &CONFIG.replace("copy: [static]", "copy: [\"[static\"]"))?;

    match run_build(root) {
        Err(err @ Error::CopyPattern { .. }) => assert_eq!(err.stage(), Stage::Loading),
        other => panic!("wanted a pattern error, got {:?}", other),
    }
    assert!(!root.join("public").exists());
    Ok(())
}

#[test]
fn test_render_failure_names_its_link() -> TestResult {
    let root = TempDir::new()?;
    let root = root.path();
    theme(root)?;
    posts(root)?;
    // A directory squats on the archive page.
    write(root, "public/archive.html/keep", "")?;

    match run_build(root) {
        Err(err @ Error::Render(_)) => {
            assert!(err.to_string().contains("archive.html"));
            if let Error::Render(failures) = &err {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].link, "archive.html");
            }
        }
        other => panic!("wanted a render error, got {:?}", other),
    }
    assert!(root.join("public/archive.html/keep").exists());
    assert!(read(root, "index.html")?.starts_with("[first.html]"));
    assert!(read(root, "tag.html")?.contains("rust=2;"));
    assert!(read(root, "2021-03-05-hello.html")?.contains("<h1>Hello</h1>"));
    assert!(root.join("public/atom.xml").exists());
    Ok(())
}
