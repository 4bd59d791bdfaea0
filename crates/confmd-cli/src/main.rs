//! confmd: CLI tool to convert Confluence storage format pages to Markdown and back

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

use confmd_core::mdast::AttachmentRecord;
use confmd_core::{blocks_to_json, pull_page, push_page, read_markdown, read_storage};

use config::{CONFIG_FILE_NAME, Config, Settings};

#[derive(Parser, Debug)]
#[command(name = "confmd")]
#[command(about = "Convert Confluence storage format pages to Markdown and back")]
#[command(version)]
#[command(after_help = "Examples:
  confmd pull page.xhtml               # Convert to page.md
  confmd pull pages/ -o docs/ -j4      # Convert a directory with 4 parallel jobs
  confmd push docs/page.md             # Convert back to docs/page.xhtml
  confmd dump page.xhtml               # Print the document model as JSON
  confmd init                          # Create _confmd.toml")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert storage markup (.xhtml, .html) to Markdown
    Pull(ConvertArgs),
    /// Convert Markdown to storage markup
    Push(ConvertArgs),
    /// Print the document model of a storage or Markdown file as JSON
    Dump {
        /// Input file
        input: PathBuf,
    },
    /// Create a configuration file
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input file or directory
    input: PathBuf,

    /// Output file or directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel jobs (defaults to number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Process directories recursively
    #[arg(short, long)]
    recursive: bool,

    /// Configuration file (defaults to _confmd.toml next to the input)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable YAML frontmatter
    #[arg(long)]
    no_frontmatter: bool,

    /// Use a leading `# Title` heading as the page title
    #[arg(long)]
    title_heading: bool,

    /// Disable `<!-- language: ... -->` hints before code blocks
    #[arg(long)]
    no_language_hints: bool,

    /// Attachments directory, relative to the Markdown files
    #[arg(long, value_name = "DIR")]
    attachments_dir: Option<String>,

    /// Omit task ids from task lists in storage markup
    #[arg(long)]
    no_task_ids: bool,
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Output path for the configuration file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    output: PathBuf,

    /// Print the JSON schema instead
    #[arg(long)]
    schema: bool,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

/// Conversion direction of a `pull` or `push` run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Pull,
    Push,
}

impl Direction {
    fn accepts(self, path: &Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        match self {
            Direction::Pull => ext.eq_ignore_ascii_case("xhtml") || ext.eq_ignore_ascii_case("html"),
            Direction::Push => ext.eq_ignore_ascii_case("md"),
        }
    }

    fn output_extension(self) -> &'static str {
        match self {
            Direction::Pull => "md",
            Direction::Push => "xhtml",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Direction::Pull => ".xhtml/.html",
            Direction::Push => ".md",
        }
    }
}

/// Page metadata stored next to a page as `<stem>.page.json`
#[derive(Debug, Default, Deserialize)]
struct Sidecar {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    attachments: Vec<AttachmentRecord>,
}

impl Sidecar {
    fn load(page: &Path) -> Result<Self> {
        let path = page.with_extension("page.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse page metadata: {}", path.display()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Pull(args) => run_conversion(Direction::Pull, args, cli.quiet),
        Command::Push(args) => run_conversion(Direction::Push, args, cli.quiet),
        Command::Dump { input } => dump(input),
        Command::Init(args) => init(args, cli.quiet),
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects info and the default is warn
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Resolve settings: config file, then command-line overrides
fn load_settings(args: &ConvertArgs) -> Result<Settings> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let dir = if args.input.is_dir() {
                args.input.as_path()
            } else {
                args.input.parent().unwrap_or(Path::new("."))
            };
            Config::load_from_dir(dir)?.unwrap_or_default()
        }
    };

    let mut settings = config.settings();
    if args.no_frontmatter {
        settings.frontmatter = false;
    }
    if args.title_heading {
        settings.title_heading = true;
    }
    if args.no_language_hints {
        settings.language_hints = false;
    }
    if let Some(dir) = &args.attachments_dir {
        settings.attachments_dir = dir.clone();
    }
    if args.no_task_ids {
        settings.task_ids = false;
    }
    Ok(settings)
}

fn run_conversion(direction: Direction, args: &ConvertArgs, quiet: bool) -> Result<()> {
    let settings = load_settings(args)?;

    if args.input.is_file() {
        let output_path = match &args.output {
            Some(p) => p.clone(),
            None => args.input.with_extension(direction.output_extension()),
        };
        tracing::info!(
            "Converting: {} -> {}",
            args.input.display(),
            output_path.display()
        );
        convert_file(direction, &args.input, &output_path, &settings)?;
        if !quiet {
            println!("{}", output_path.display());
        }
        Ok(())
    } else if args.input.is_dir() {
        convert_directory(direction, args, &settings, quiet)
    } else {
        anyhow::bail!("Input path does not exist: {}", args.input.display());
    }
}

/// Convert every matching file in a directory
fn convert_directory(
    direction: Direction,
    args: &ConvertArgs,
    settings: &Settings,
    quiet: bool,
) -> Result<()> {
    let input = args.input.as_path();
    let output_dir = args.output.as_deref().unwrap_or(input);

    let files = collect_files(input, direction, args.recursive)?;

    if files.is_empty() {
        if !quiet {
            eprintln!("No {} files found in {}", direction.label(), input.display());
        }
        return Ok(());
    }

    tracing::info!("Found {} {} files", files.len(), direction.label());

    // Configure thread pool if jobs specified
    if let Some(n) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    // Atomic counters for thread-safe progress tracking
    let success = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let errors: Vec<_> = files
        .par_iter()
        .filter_map(|file| {
            let relative = file.strip_prefix(input).unwrap_or(file);
            let output_file = output_dir
                .join(relative)
                .with_extension(direction.output_extension());

            match convert_file(direction, file, &output_file, settings) {
                Ok(()) => {
                    success.fetch_add(1, Ordering::Relaxed);
                    if !quiet {
                        println!("{}", output_file.display());
                    }
                    None
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    Some((file.clone(), e))
                }
            }
        })
        .collect();

    for (file, e) in &errors {
        eprintln!("Error converting {}: {:#}", file.display(), e);
    }

    let success_count = success.load(Ordering::Relaxed);
    let failed_count = failed.load(Ordering::Relaxed);

    if !quiet {
        eprintln!("Converted {} files, {} failed", success_count, failed_count);
    }

    if failed_count > 0 {
        anyhow::bail!("{} files failed to convert", failed_count);
    }

    Ok(())
}

/// Collect all input files for a direction in a directory
fn collect_files(dir: &Path, direction: Direction, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_file() {
            if direction.accepts(&path) {
                files.push(path);
            }
        } else if path.is_dir() && recursive {
            files.extend(collect_files(&path, direction, recursive)?);
        }
    }

    files.sort();
    Ok(files)
}

/// Convert one file; doesn't print, so it can run in parallel
fn convert_file(
    direction: Direction,
    input: &Path,
    output: &Path,
    settings: &Settings,
) -> Result<()> {
    let _span = tracing::info_span!("page", path = %input.display()).entered();
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read: {}", input.display()))?;
    let sidecar = Sidecar::load(input)?;

    match direction {
        Direction::Pull => {
            let title = sidecar.title.unwrap_or_else(|| {
                input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let options = settings.pull_options(sidecar.id);
            let pulled = pull_page(&title, &content, &sidecar.attachments, &options);
            for path in &pulled.referenced {
                tracing::info!(attachment = %path, "Referenced attachment");
            }
            write_file(output, &pulled.markdown)
        }
        Direction::Push => {
            let pushed = push_page(&content, &sidecar.attachments, &settings.push_options())
                .with_context(|| format!("Failed to convert: {}", input.display()))?;
            write_file(output, &pushed.storage)?;
            if !pushed.uploads.is_empty() {
                let uploads = serde_json::to_string_pretty(&pushed.uploads)?;
                write_file(&output.with_extension("uploads.json"), &uploads)?;
            }
            Ok(())
        }
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write: {}", path.display()))
}

/// Print the document model of a file
fn dump(input: &Path) -> Result<()> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read: {}", input.display()))?;
    let blocks = if Direction::Push.accepts(input) {
        read_markdown(&content)
    } else {
        read_storage(&content)
    };
    println!("{}", blocks_to_json(&blocks)?);
    Ok(())
}

fn init(args: &InitArgs, quiet: bool) -> Result<()> {
    if args.schema {
        println!("{}", Config::json_schema_string()?);
        return Ok(());
    }

    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.output.display()
        );
    }
    write_file(&args.output, &Config::sample().to_toml_with_schema()?)?;
    if !quiet {
        println!("{}", args.output.display());
    }
    Ok(())
}
