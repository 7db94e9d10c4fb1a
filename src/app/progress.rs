//! Spinner for the scan and a bar for the download queue.

use std::time::Duration;

use img2local_core::{DownloadEvent, DownloadOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

/// Spinner shown while pages are scanned; `None` when progress is disabled.
pub(crate) fn scan_spinner(enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Scanning pages...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}

/// Consumes download events into a bar of length `total`. The task ends when
/// the scheduler closes the channel.
pub(crate) fn spawn_download_progress(
    mut events: mpsc::UnboundedReceiver<DownloadEvent>,
    total: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        while let Some(event) = events.recv().await {
            bar.set_message(event_label(&event));
            bar.inc(1);
        }

        bar.finish_and_clear();
    })
}

fn event_label(event: &DownloadEvent) -> String {
    match &event.outcome {
        DownloadOutcome::Downloaded { .. } => format!("downloaded {}", event.filename),
        DownloadOutcome::AlreadyPresent => format!("kept {}", event.filename),
        DownloadOutcome::Failed { .. } => format!("failed {}", event.filename),
    }
}
