use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_DIR: &str = ".structscope/logs";
/// Overrides the log directory.
pub const LOG_DIR_ENV: &str = "STRUCTSCOPE_LOG_DIR";
/// Filter directives for structscope only; wins over `RUST_LOG`.
pub const LOG_FILTER_ENV: &str = "STRUCTSCOPE_LOG";
pub const DEFAULT_FILTER: &str = "info";

pub fn log_dir() -> PathBuf {
    resolve_log_dir(
        std::env::var_os(LOG_DIR_ENV).map(PathBuf::from),
        dirs::home_dir(),
    )
}

fn resolve_log_dir(overridden: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    overridden
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| home.unwrap_or_else(|| PathBuf::from(".")).join(LOG_DIR))
}

fn filter_directives(own: Option<String>, rust_log: Option<String>) -> String {
    own.into_iter()
        .chain(rust_log)
        .map(|d| d.trim().to_string())
        .find(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn env_filter() -> EnvFilter {
    let directives = filter_directives(
        std::env::var(LOG_FILTER_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    EnvFilter::try_new(&directives).unwrap_or_else(|err| {
        eprintln!("Ignoring log filter `{}`: {}", directives, err);
        EnvFilter::new(DEFAULT_FILTER)
    })
}

/// Installs the global subscriber. `component` names the rolling file
/// (`server.log.<date>`, `cli.log.<date>`); `to_stderr` mirrors events to the
/// terminal for the long-running server.
pub fn init_logging(component: &str, to_stderr: bool) -> WorkerGuard {
    let log_dir = log_dir();
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Cannot create log directory {}: {}", log_dir.display(), err);
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, component);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    let stderr_layer = to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stderr_layer)
        .init();

    guard
}
