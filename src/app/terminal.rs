use img2local_core::config::LogLevel;

/// Filter used when no level is configured: the tool stays quiet apart from errors.
pub(crate) const DEFAULT_DIRECTIVE: &str = "error";

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_use_progress(
    stderr_is_terminal: bool,
    no_progress: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !no_progress && !dumb_terminal
}

/// CLI level wins over the config file level; `None` for both falls back to
/// [`DEFAULT_DIRECTIVE`].
pub(crate) fn log_directive(cli: Option<LogLevel>, config: Option<LogLevel>) -> &'static str {
    cli.or(config)
        .map_or(DEFAULT_DIRECTIVE, LogLevel::filter_directive)
}

/// `RUST_LOG` takes precedence over `default_directive`.
pub(crate) fn init_tracing(default_directive: &str, no_color: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}
