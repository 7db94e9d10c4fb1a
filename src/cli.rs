//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use img2local_core::config::LogLevel;
use img2local_core::download::{MAX_CONCURRENCY, MIN_CONCURRENCY};

const AFTER_HELP: &str = "\
Pages live in src/pages by default; folders named asset(s), activity(s) and demo are never scanned.
Remote //img. and //media. URLs in scripts and stylesheets are replaced by local paths and the
images are downloaded next to each page. Matching is regex-based: review the result with
`git diff` / `git status` before committing.";

/// Localize remote images referenced by page sources.
///
/// Rewrites `//img.` and `//media.` URLs in scripts and stylesheets into
/// relative `require(...)` / `url(...)` references and downloads every image
/// once into the page's asset folder.
#[derive(Parser, Debug)]
#[command(name = "i2l")]
#[command(author, version, about, after_help = AFTER_HELP)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Which pages to process.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Every page of the default package plus the listed fake packages
    All {
        /// Comma-separated fake package names under the entry path (e.g. `lite,mini`)
        #[arg(value_delimiter = ',')]
        fake_packages: Vec<String>,
    },

    /// Every page of one package directory
    Pkg {
        /// Package directory whose subdirectories are pages
        path: PathBuf,
    },

    /// A single page directory
    Page {
        /// Page directory to rewrite
        path: PathBuf,
    },
}

/// Flags shared by every subcommand.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Log level: silent, error, warn, info, verbose or silly (errors only when omitted)
    #[arg(short = 'l', long = "loglevel", global = true, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, global = true, value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// Download attempts per image, including the first (1-10)
    #[arg(short = 'r', long, global = true, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Per-attempt download timeout in milliseconds
    #[arg(short = 't', long, global = true, value_parser = clap::value_parser!(u64).range(1..=600_000))]
    pub timeout_ms: Option<u64>,

    /// Config file (defaults to ./i2l.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Skip running script sources through prettier
    #[arg(long, global = true)]
    pub no_format: bool,

    /// Disable the spinner and progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,
}

impl Command {
    /// Fake package names with empty entries dropped.
    pub fn fake_packages(&self) -> Vec<String> {
        match self {
            Self::All { fake_packages } => fake_packages
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            Self::Pkg { .. } | Self::Page { .. } => Vec::new(),
        }
    }
}

fn parse_log_level(raw: &str) -> Result<LogLevel, String> {
    raw.parse().map_err(|e: img2local_core::ConfigError| e.to_string())
}

fn parse_concurrency(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "{value} is not in {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"
        ))
    }
}
