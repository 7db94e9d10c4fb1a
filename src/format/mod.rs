//! Source formatting applied before matching.
//!
//! Formatting puts quotes, attributes and `url(...)` values into a canonical
//! shape so the extraction pattern sees predictable boundaries. Stylesheets
//! are never formatted.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced by a formatter. The source file is never touched when one
/// of these is returned.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The formatter process could not be started or fed.
    #[error("failed to run formatter `{program}`: {source}")]
    Spawn {
        /// Program that was run.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The formatter rejected the input (usually a syntax error).
    #[error("formatter failed on {path} (exit status {status:?}): {stderr}")]
    Failed {
        /// File being formatted.
        path: PathBuf,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The formatter produced output that is not UTF-8.
    #[error("formatter produced invalid UTF-8 for {path}")]
    Utf8 {
        /// File being formatted.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Normalizes source text before matching.
pub trait SourceFormatter: Send + Sync {
    /// Returns the formatted text. `path` is used to pick a parser only; it
    /// is never read or written.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] when the text cannot be formatted.
    fn format(&self, text: &str, path: &Path) -> Result<String, FormatError>;
}

/// Returns the text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFormatter;

impl SourceFormatter for PassthroughFormatter {
    fn format(&self, text: &str, _path: &Path) -> Result<String, FormatError> {
        Ok(text.to_string())
    }
}

/// Pipes script sources through the `prettier` CLI.
#[derive(Debug, Clone)]
pub struct PrettierFormatter {
    program: PathBuf,
    config: Option<PathBuf>,
}

/// Name of the prettier config looked up in the workspace root.
pub const PRETTIER_CONFIG_FILE: &str = ".prettierrc";

impl PrettierFormatter {
    /// Finds `prettier` on `PATH` and picks up `<workspace>/.prettierrc` if
    /// present. Returns `None` when prettier is not installed.
    #[must_use]
    pub fn locate(workspace: &Path) -> Option<Self> {
        let Ok(program) = which::which("prettier") else {
            warn!("prettier not found on PATH; sources are matched unformatted");
            return None;
        };
        let config = workspace.join(PRETTIER_CONFIG_FILE);
        let config = config.is_file().then_some(config);
        debug!(program = %program.display(), config = ?config, "using prettier");
        Some(Self::with_program(program, config))
    }

    /// Uses an explicit executable and optional config file.
    pub fn with_program(program: impl Into<PathBuf>, config: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config,
        }
    }
}

impl SourceFormatter for PrettierFormatter {
    fn format(&self, text: &str, path: &Path) -> Result<String, FormatError> {
        let Some(parser) = parser_for(path) else {
            return Ok(text.to_string());
        };
        let program = self.program.display().to_string();
        let spawn_error = |source| FormatError::Spawn {
            program: program.clone(),
            source,
        };

        let mut command = Command::new(&self.program);
        command.arg("--parser").arg(parser);
        if let Some(config) = &self.config {
            command.arg("--config").arg(config);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Feed stdin from a separate thread so a full stdout pipe can't stall us
        let stdin = child.stdin.take();
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(text.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (output, written)
        });
        let output = output.map_err(spawn_error)?;

        // A failing formatter may close stdin early; its exit status wins
        if !output.status.success() {
            return Err(FormatError::Failed {
                path: path.to_path_buf(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written.map_err(spawn_error)?;

        String::from_utf8(output.stdout).map_err(|source| FormatError::Utf8 {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Prettier parser for a script path; `None` for anything else.
fn parser_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "js" | "jsx" | "mjs" | "cjs" => Some("babel"),
        "ts" | "tsx" => Some("typescript"),
        _ => None,
    }
}
