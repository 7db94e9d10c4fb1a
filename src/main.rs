//! CLI entry point for the `i2l` tool.

use std::process::ExitCode;

use clap::Parser;

mod app;
mod cli;

use app::{banner, runtime};
use cli::Args;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// The run completed, possibly with failed downloads.
    Success,
    /// A fatal error stopped the run.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let exit = match runtime::run_i2l(&args).await {
        Ok(report) => {
            for line in banner::summary_lines(&report) {
                println!("{line}");
            }
            ProcessExit::Success
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ProcessExit::Failure
        }
    };

    println!("{}", banner::completion_banner());
    exit.into()
}
