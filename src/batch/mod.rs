//! Batch orchestration over pages.
//!
//! A page is a directory under a package root, marked by an entry file. The
//! orchestrator rewrites every file of every page while the download queue is
//! held, then releases the queue and waits for it to drain.

mod orchestrator;
mod pages;
mod report;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::download::SchedulerError;
use crate::rewrite::RewriteError;

pub use orchestrator::{BatchOrchestrator, PreparedBatch};
pub use pages::{all_pages, package_roots, pages_in_package};
pub use report::BatchReport;

/// Errors that abort a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Invalid options.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A package directory could not be listed.
    #[error("failed to list pages in {path}: {source}")]
    Enumerate {
        /// The package directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A rewritten file could not be written back.
    #[error("aborting batch: {0}")]
    Write(#[source] RewriteError),

    /// The download scheduler failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
