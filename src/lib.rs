//! img2local Core Library
//!
//! This library provides the core functionality for the `i2l` tool, which
//! rewrites source trees that reference remote images (`//img.…` and
//! `//media.…` URLs embedded in scripts and stylesheets) into trees that
//! reference locally downloaded copies.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`matcher`] - Detection and extraction of remote asset references in text
//! - [`rewrite`] - Reference classification, local name resolution and the per-file rewrite pass
//! - [`format`] - External source formatter run before matching
//! - [`download`] - Deduplicating, bounded-concurrency download scheduler with retry
//! - [`batch`] - Page enumeration and the batch orchestrator
//! - [`config`] - Options, defaults and the `i2l.toml` file

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod download;
pub mod format;
pub mod matcher;
pub mod rewrite;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use batch::{
    BatchError, BatchOrchestrator, BatchReport, PreparedBatch, all_pages, pages_in_package,
};
pub use config::{ConfigError, Options};
pub use download::{
    AssetFetcher, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DownloadError, DownloadEvent,
    DownloadOutcome, DownloadScheduler, DownloadStats, HttpClient, RemoteAsset, RetryPolicy,
    SchedulerError, Submission,
};
pub use format::{FormatError, PassthroughFormatter, PrettierFormatter, SourceFormatter};
pub use matcher::{AssetMatcher, unbackslash};
pub use rewrite::{FileKind, RewriteEngine, RewriteError, RewriteOutcome};
