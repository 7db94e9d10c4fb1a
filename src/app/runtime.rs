//! One `i2l` run: options, pages, scan, downloads.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use img2local_core::{
    BatchOrchestrator, BatchReport, HttpClient, Options, PassthroughFormatter, PrettierFormatter,
    SourceFormatter, all_pages, pages_in_package,
};
use tracing::{debug, info};

use super::{progress, terminal};
use crate::cli::{Args, Command, GlobalArgs};

pub(crate) async fn run_i2l(args: &Args) -> Result<BatchReport> {
    let workspace = std::env::current_dir().context("failed to resolve the working directory")?;
    let mut options = Options::load(&workspace, args.global.config.as_deref())
        .context("failed to load options")?;

    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    terminal::init_tracing(
        terminal::log_directive(args.global.log_level, options.log_level),
        no_color,
    );
    debug!(?args, "CLI arguments parsed");

    apply_overrides(&mut options, &args.global, &args.command);
    options.validate().context("invalid options")?;

    let pages = select_pages(&args.command, &options, &workspace)?;
    info!(pages = pages.len(), "pages selected");

    let orchestrator = BatchOrchestrator::new(
        options.clone(),
        select_formatter(&options, &workspace),
        Arc::new(HttpClient::new().context("failed to build the HTTP client")?),
    )?;

    let show_progress = terminal::should_use_progress(
        std::io::stderr().is_terminal(),
        args.global.no_progress,
        terminal::is_dumb_terminal(),
    );

    let spinner = progress::scan_spinner(show_progress);
    let prepared = orchestrator.prepare(&pages);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let mut prepared = prepared?;

    let bar = if show_progress {
        let events = prepared.subscribe();
        Some(progress::spawn_download_progress(events, prepared.queued()))
    } else {
        None
    };
    let report = prepared.download().await;
    if let Some(bar) = bar {
        let _ = bar.await;
    }
    Ok(report?)
}

/// CLI values win over the config file.
pub(crate) fn apply_overrides(options: &mut Options, global: &GlobalArgs, command: &Command) {
    if let Some(level) = global.log_level {
        options.log_level = Some(level);
    }
    if let Some(concurrency) = global.concurrency {
        options.download_concurrency = concurrency;
    }
    if let Some(max_attempts) = global.max_attempts {
        options.max_attempts = max_attempts;
    }
    if let Some(timeout_ms) = global.timeout_ms {
        options.task_timeout_ms = timeout_ms;
    }
    if global.no_format {
        options.format = false;
    }
    let fake_packages = command.fake_packages();
    if !fake_packages.is_empty() {
        options.fake_packages = fake_packages;
    }
}

fn select_pages(
    command: &Command,
    options: &Options,
    workspace: &Path,
) -> Result<Vec<std::path::PathBuf>> {
    let pages = match command {
        Command::All { .. } => all_pages(options, workspace)?,
        Command::Pkg { path } => pages_in_package(&workspace.join(path), options)?,
        Command::Page { path } => {
            let page = workspace.join(path);
            if !page.is_dir() {
                bail!("page directory {} does not exist", page.display());
            }
            vec![page]
        }
    };
    Ok(pages)
}

fn select_formatter(options: &Options, workspace: &Path) -> Arc<dyn SourceFormatter> {
    if !options.format {
        debug!("formatting disabled");
        return Arc::new(PassthroughFormatter);
    }
    match PrettierFormatter::locate(workspace) {
        Some(prettier) => Arc::new(prettier),
        None => Arc::new(PassthroughFormatter),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use clap::Parser;
    use img2local_core::config::LogLevel;
    use tempfile::TempDir;

    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_overrides_config_values() {
        let args = parse(&[
            "i2l", "all", "lite", "-c", "3", "-r", "5", "-t", "100", "-l", "info", "--no-format",
        ]);
        let mut options = Options {
            fake_packages: vec!["mini".to_string()],
            ..Options::default()
        };

        apply_overrides(&mut options, &args.global, &args.command);

        assert_eq!(options.fake_packages, vec!["lite".to_string()]);
        assert_eq!(options.download_concurrency, 3);
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.task_timeout_ms, 100);
        assert_eq!(options.log_level, Some(LogLevel::Info));
        assert!(!options.format);
    }

    #[test]
    fn test_config_fake_packages_kept_without_cli_list() {
        let args = parse(&["i2l", "all"]);
        let mut options = Options {
            fake_packages: vec!["mini".to_string()],
            ..Options::default()
        };

        apply_overrides(&mut options, &args.global, &args.command);

        assert_eq!(options.fake_packages, vec!["mini".to_string()]);
        assert!(options.format);
    }

    #[test]
    fn test_select_pages_for_each_command() {
        let temp = TempDir::new().unwrap();
        let pages_root = temp.path().join("src/pages");
        for page in ["home", "demo", "lite/detail"] {
            fs::create_dir_all(pages_root.join(page)).unwrap();
        }
        let options = Options {
            fake_packages: vec!["lite".to_string()],
            ..Options::default()
        };

        let all = select_pages(&parse(&["i2l", "all"]).command, &options, temp.path()).unwrap();
        assert_eq!(
            all,
            vec![pages_root.join("lite/detail"), pages_root.join("home")]
        );

        let pkg = select_pages(
            &parse(&["i2l", "pkg", "src/pages/lite"]).command,
            &options,
            temp.path(),
        )
        .unwrap();
        assert_eq!(pkg, vec![pages_root.join("lite/detail")]);

        let page = select_pages(
            &parse(&["i2l", "page", "src/pages/home"]).command,
            &options,
            temp.path(),
        )
        .unwrap();
        assert_eq!(page, vec![temp.path().join(PathBuf::from("src/pages/home"))]);
    }

    #[test]
    fn test_select_pages_rejects_missing_page() {
        let temp = TempDir::new().unwrap();
        let result = select_pages(
            &parse(&["i2l", "page", "nope"]).command,
            &Options::default(),
            temp.path(),
        );
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_select_formatter_respects_format_flag() {
        let temp = TempDir::new().unwrap();
        let options = Options {
            format: false,
            ..Options::default()
        };
        let formatter = select_formatter(&options, temp.path());
        let text = "a  =  1";
        assert_eq!(formatter.format(text, Path::new("a.js")).unwrap(), text);
    }
}
