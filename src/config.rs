//! Run options: defaults, the optional `i2l.toml` file and validation.
//!
//! Resolution order is defaults, then the config file, then CLI overrides
//! (applied by the binary). Every file field is optional.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, MAX_CONCURRENCY, MIN_CONCURRENCY,
};
use crate::matcher::{DEFAULT_DETECT_PATTERN, DEFAULT_EXTRACT_PATTERN};

/// Config file looked up in the workspace root when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "i2l.toml";

/// Package root scanned by default, relative to the workspace.
pub const DEFAULT_ENTRY_PATH: &str = "./src/pages/";

/// File whose presence marks a directory as a page.
pub const DEFAULT_ENTRY_FILE: &str = "index.js";

/// Page directory names that are never scanned.
pub const DEFAULT_IGNORE_PAGE_PATTERN: &str = r"^(assets?|activitys?|demo)$";

/// Asset directory created inside each page.
pub const DEFAULT_OUTPUT_DIR: &str = "assets/images/";

/// Per-task download timeout in milliseconds.
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 5000;

const MAX_ATTEMPTS_LIMIT: u32 = 10;
const MAX_TASK_TIMEOUT_MS: u64 = 600_000;

/// Errors raised while loading or validating options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        /// Offending option name.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A pattern option does not compile.
    #[error("invalid pattern for `{field}`: {source}")]
    Pattern {
        /// Offending option name.
        field: &'static str,
        /// Regex compile error.
        #[source]
        source: regex::Error,
    },
}

/// Log verbosity, using npm-style level names; `verbose`
/// and `silly` map onto `debug` and `trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    Info,
    Verbose,
    Silly,
}

impl LogLevel {
    /// Returns the `tracing` filter directive for this level.
    #[must_use]
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Silent => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Verbose => "debug",
            Self::Silly => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" => Ok(Self::Silent),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" | "http" => Ok(Self::Info),
            "verbose" | "debug" => Ok(Self::Verbose),
            "silly" | "trace" => Ok(Self::Silly),
            other => Err(ConfigError::Invalid {
                field: "log_level",
                message: format!(
                    "unknown level '{other}' (expected silent, error, warn, info, verbose or silly)"
                ),
            }),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Silent => "silent",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Verbose => "verbose",
            Self::Silly => "silly",
        };
        f.write_str(label)
    }
}

/// Fully resolved run options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Extra package names scanned as page roots under `entry_path`.
    pub fake_packages: Vec<String>,
    /// Default package root, relative to the workspace.
    pub entry_path: PathBuf,
    /// File that marks a directory as a page.
    pub entry_file: String,
    /// Page directory names to skip.
    pub ignore_page_pattern: String,
    /// Loose existence test run before a file is rewritten.
    pub detect_pattern: String,
    /// Capturing pattern that drives substitutions.
    pub extract_pattern: String,
    /// Asset directory inside each page.
    pub output_dir: PathBuf,
    /// Log verbosity; `None` keeps the logger silent apart from errors.
    pub log_level: Option<LogLevel>,
    /// Maximum concurrent downloads.
    pub download_concurrency: usize,
    /// Download attempts per asset, including the first.
    pub max_attempts: u32,
    /// Per-attempt download timeout.
    pub task_timeout_ms: u64,
    /// Whether script files are run through the external formatter.
    pub format: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fake_packages: Vec::new(),
            entry_path: PathBuf::from(DEFAULT_ENTRY_PATH),
            entry_file: DEFAULT_ENTRY_FILE.to_string(),
            ignore_page_pattern: DEFAULT_IGNORE_PAGE_PATTERN.to_string(),
            detect_pattern: DEFAULT_DETECT_PATTERN.to_string(),
            extract_pattern: DEFAULT_EXTRACT_PATTERN.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_level: None,
            download_concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            task_timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            format: true,
        }
    }
}

/// On-disk shape of `i2l.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub fake_packages: Option<Vec<String>>,
    pub entry_path: Option<PathBuf>,
    pub entry_file: Option<String>,
    pub ignore_page_pattern: Option<String>,
    pub detect_pattern: Option<String>,
    pub extract_pattern: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub download_concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub task_timeout_ms: Option<u64>,
    pub format: Option<bool>,
}

impl FileConfig {
    /// Parses config text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys.
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }
}

impl Options {
    /// Builds options from defaults plus `workspace/i2l.toml` (or `explicit`
    /// when given). A missing default file is not an error; a missing explicit
    /// file is.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read, parsed or validated.
    pub fn load(workspace: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut options = Self::default();
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let candidate = workspace.join(CONFIG_FILE_NAME);
                candidate.exists().then_some(candidate)
            }
        };
        if let Some(path) = path {
            debug!(path = %path.display(), "loading config file");
            options.apply_file(FileConfig::load(&path)?)?;
        }
        options.validate()?;
        Ok(options)
    }

    /// Overlays every value present in `file`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown log level.
    pub fn apply_file(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(fake_packages) = file.fake_packages {
            self.fake_packages = fake_packages;
        }
        if let Some(entry_path) = file.entry_path {
            self.entry_path = entry_path;
        }
        if let Some(entry_file) = file.entry_file {
            self.entry_file = entry_file;
        }
        if let Some(pattern) = file.ignore_page_pattern {
            self.ignore_page_pattern = pattern;
        }
        if let Some(pattern) = file.detect_pattern {
            self.detect_pattern = pattern;
        }
        if let Some(pattern) = file.extract_pattern {
            self.extract_pattern = pattern;
        }
        if let Some(output_dir) = file.output_dir {
            self.output_dir = output_dir;
        }
        if let Some(level) = file.log_level {
            self.log_level = Some(level.parse()?);
        }
        if let Some(concurrency) = file.download_concurrency {
            self.download_concurrency = concurrency;
        }
        if let Some(max_attempts) = file.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(timeout) = file.task_timeout_ms {
            self.task_timeout_ms = timeout;
        }
        if let Some(format) = file.format {
            self.format = format;
        }
        Ok(())
    }

    /// Checks ranges and compiles every pattern once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] or [`ConfigError::Pattern`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.download_concurrency) {
            return Err(ConfigError::Invalid {
                field: "download_concurrency",
                message: format!(
                    "{} (expected {MIN_CONCURRENCY}..={MAX_CONCURRENCY})",
                    self.download_concurrency
                ),
            });
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                message: format!("{} (expected 1..={MAX_ATTEMPTS_LIMIT})", self.max_attempts),
            });
        }
        if !(1..=MAX_TASK_TIMEOUT_MS).contains(&self.task_timeout_ms) {
            return Err(ConfigError::Invalid {
                field: "task_timeout_ms",
                message: format!(
                    "{} (expected 1..={MAX_TASK_TIMEOUT_MS})",
                    self.task_timeout_ms
                ),
            });
        }
        if self.entry_file.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "entry_file",
                message: "must not be empty".to_string(),
            });
        }
        compile_pattern("ignore_page_pattern", &self.ignore_page_pattern)?;
        compile_pattern("detect_pattern", &self.detect_pattern)?;
        compile_pattern("extract_pattern", &self.extract_pattern)?;
        Ok(())
    }

    /// Compiled page-exclusion pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if the pattern does not compile.
    pub fn ignore_page_regex(&self) -> Result<Regex, ConfigError> {
        compile_pattern("ignore_page_pattern", &self.ignore_page_pattern)
    }

    /// Per-attempt download timeout.
    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

pub(crate) fn compile_pattern(field: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern { field, source })
}
