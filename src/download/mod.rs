//! Download scheduling for remote assets.
//!
//! This module materializes the assets discovered during the rewrite pass:
//! one task per unique filename, fetched with bounded concurrency, retried
//! on transient failures and streamed directly to disk.
//!
//! # Features
//!
//! - Run-wide dedup keyed by local filename
//! - Held queue released once every file has been scanned
//! - Existence check before fetching (idempotent re-runs)
//! - Per-attempt timeout with exponential backoff between attempts
//! - One [`DownloadEvent`] per settled asset for progress reporting

mod client;
mod constants;
mod error;
mod fetcher;
mod retry;
mod scheduler;

pub use client::HttpClient;
pub use constants::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use error::DownloadError;
pub use fetcher::AssetFetcher;
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use scheduler::{
    AssetState, DownloadEvent, DownloadOutcome, DownloadScheduler, DownloadStats, DrainHandle,
    RemoteAsset, SchedulerError, Submission,
};
