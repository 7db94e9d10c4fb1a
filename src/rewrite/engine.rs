//! Rewrite pass for a single source file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::{FileKind, classify, resolve};
use crate::download::{DownloadScheduler, RemoteAsset, Submission};
use crate::format::{FormatError, SourceFormatter};
use crate::matcher::{AssetMatcher, unbackslash};

/// Errors from processing one file.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The file could not be read (or is not UTF-8 text).
    #[error("failed to read {path}: {source}")]
    Read {
        /// File being processed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The formatter rejected the file; nothing was written.
    #[error("failed to format {path}: {source}")]
    Format {
        /// File being processed.
        path: PathBuf,
        /// The formatter error.
        #[source]
        source: FormatError,
    },

    /// The rewritten text could not be written back.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File being processed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl RewriteError {
    /// Write errors abort the batch; the others only skip the file.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// No candidate URL; the file was not written.
    NoMatch,
    /// Candidate URLs in a file type without a rewrite template; not written.
    Unsupported {
        /// References found.
        references: usize,
    },
    /// The substituted text was written back.
    Rewritten {
        /// References replaced.
        references: usize,
        /// Assets newly queued because of this file.
        queued: usize,
    },
}

/// Normalizes, matches, classifies, resolves, enqueues and substitutes.
pub struct RewriteEngine {
    matcher: AssetMatcher,
    formatter: Arc<dyn SourceFormatter>,
}

impl std::fmt::Debug for RewriteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteEngine")
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

impl RewriteEngine {
    /// Creates an engine from a compiled matcher and a formatter.
    pub fn new(matcher: AssetMatcher, formatter: Arc<dyn SourceFormatter>) -> Self {
        Self { matcher, formatter }
    }

    /// Rewrites `file` in place, submitting every referenced asset (stored
    /// under `asset_dir`) to `scheduler`.
    ///
    /// The file is written at most once, and only when at least one
    /// reference was substituted.
    ///
    /// # Errors
    ///
    /// Returns [`RewriteError`] if the file cannot be read, formatted or
    /// written. Only [`RewriteError::Write`] happens after the file was
    /// touched.
    #[instrument(skip(self, scheduler), fields(file = %file.display()))]
    pub fn process(
        &self,
        file: &Path,
        asset_dir: &Path,
        scheduler: &mut DownloadScheduler,
    ) -> Result<RewriteOutcome, RewriteError> {
        let kind = FileKind::from_path(file);
        let raw = fs::read(file).map_err(|source| RewriteError::Read {
            path: file.to_path_buf(),
            source,
        })?;

        if !kind.is_rewritable() {
            let text = String::from_utf8_lossy(&raw);
            let text = unbackslash(&text);
            if !self.matcher.detects(&text) {
                return Ok(RewriteOutcome::NoMatch);
            }
            let references = self.matcher.references(&text).count();
            warn!(references, "remote assets in a file type that is not rewritten");
            return Ok(RewriteOutcome::Unsupported { references });
        }

        let raw = String::from_utf8(raw).map_err(|e| RewriteError::Read {
            path: file.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        if !self.matcher.detects(&unbackslash(&raw)) {
            return Ok(RewriteOutcome::NoMatch);
        }
        let formatted = match kind {
            FileKind::Script => {
                self.formatter
                    .format(&raw, file)
                    .map_err(|source| RewriteError::Format {
                        path: file.to_path_buf(),
                        source,
                    })?
            }
            _ => raw,
        };
        let text = unbackslash(&formatted);

        if !self.matcher.detects(&text) {
            return Ok(RewriteOutcome::NoMatch);
        }

        let mut rewritten = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut references = 0;
        let mut queued = 0;

        for reference in self.matcher.references(&text) {
            let Some(resolved) = resolve(reference.url, file, asset_dir) else {
                warn!(url = reference.url, "URL has no filename, left as is");
                continue;
            };
            let Some(template) = classify(kind, reference.span) else {
                debug!(span = reference.span, "unquoted reference in a script, left as is");
                continue;
            };
            debug!(span = reference.span, ?template, "matched reference");
            info!(url = reference.url, filename = %resolved.filename, "found remote asset");

            let submission = scheduler.submit(RemoteAsset::new(
                resolved.filename,
                resolved.download_url,
                asset_dir,
            ));
            if submission == Submission::Queued {
                queued += 1;
            }

            rewritten.push_str(&text[cursor..reference.range.start]);
            rewritten.push_str(&template.render(&resolved.relative_path));
            cursor = reference.range.end;
            references += 1;
        }

        if references == 0 {
            debug!("detected URLs but nothing to substitute");
            return Ok(RewriteOutcome::NoMatch);
        }
        rewritten.push_str(&text[cursor..]);

        fs::write(file, rewritten).map_err(|source| RewriteError::Write {
            path: file.to_path_buf(),
            source,
        })?;
        info!(references, queued, "file rewritten");

        Ok(RewriteOutcome::Rewritten { references, queued })
    }
}
