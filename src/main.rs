use clap::{Parser, Subcommand};
use inkwell::build::Builder;
use inkwell::config::GlobalSite;
use inkwell::document::Kind;
use inkwell::scaffold::{self, NewDocument};
use log::{error, info, warn};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, Stdio};

/// A static blog generator.
#[derive(Parser)]
#[command(name = "inkwell", version, about, long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds the site into its output directory
    Build {
        /// The project root
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Builds the site, then runs the configured publish command
    Publish {
        /// The project root
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Creates a new post, or a page with `--page`
    New(NewArgs),
}

#[derive(clap::Args)]
struct NewArgs {
    /// The title; the file is named after it
    #[arg(required = true, num_args = 1..)]
    title: Vec<String>,

    /// The project root
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Create a standalone page instead of a post
    #[arg(long)]
    page: bool,

    /// The publish date; defaults to now
    #[arg(long)]
    date: Option<String>,

    /// The author id
    #[arg(long, default_value = "me")]
    author: String,

    /// A tag; repeat for more
    #[arg(short, long = "tag")]
    tags: Vec<String>,

    /// The cover image
    #[arg(long, default_value = "")]
    cover: String,

    /// The preview image
    #[arg(long, default_value = "")]
    preview: String,

    /// Mark as a draft
    #[arg(long)]
    draft: bool,

    /// Pin to the top of listings
    #[arg(long)]
    top: bool,

    /// Leave out of listings, tags and the feed
    #[arg(long)]
    hide: bool,
}

impl NewArgs {
    fn document(&self) -> NewDocument {
        let kind = match self.page {
            true => Kind::Page,
            false => Kind::Post,
        };
        NewDocument {
            date: self.date.clone(),
            author: self.author.clone(),
            tags: self.tags.clone(),
            cover: self.cover.clone(),
            preview: self.preview.clone(),
            draft: self.draft,
            top: self.top,
            hide: self.hide,
            ..NewDocument::new(&self.title.join(" "), kind)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        true => "debug",
        false => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match &cli.command {
        Commands::Build { root } => build(root),
        Commands::Publish { root } => build(root).and_then(|()| publish(root)),
        Commands::New(args) => scaffold::create(&args.root, &args.document())
            .map(|_| ())
            .map_err(Into::into),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn build(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    Builder::new(false).run(root)?;
    Ok(())
}

// Runs `build.publish` through the shell in the project root and streams
// its output to the log.
fn publish(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let site = GlobalSite::load(root, false)?;
    let command = site.build.publish.trim();
    if command.is_empty() {
        warn!("no `build.publish` command configured");
        return Ok(());
    }

    info!("publishing: {}", command);
    let mut child = shell(command)
        .current_dir(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            info!("{}", line?);
        }
    }
    let status = child.wait()?;
    match status.success() {
        true => Ok(()),
        false => Err(format!("publish command exited with {}", status).into()),
    }
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}
