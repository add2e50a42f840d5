use std::path::Path;

use anyhow::{Context, Result};
use chack_core::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`; `--verbose` forces debug. With
/// `logging.dir` set, output goes to a daily rolling file instead of stderr.
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init_logging(
    logging: &LoggingConfig,
    config_dir: &Path,
    verbose: bool,
) -> Result<Option<WorkerGuard>> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(dir) = logging.dir.as_deref().filter(|d| !d.trim().is_empty()) else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    };

    let log_dir = config_dir.join(dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log dir {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "chack.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();
    Ok(Some(guard))
}
