use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "forexbot.log";

/// Default filter directive for a configured level ("info" -> "forexbot=info")
pub fn default_directive(level: &str) -> String {
    let level = match level.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    };
    format!("forexbot={}", level)
}

/// Install console logging plus a daily-rotated log file under `log_dir`.
///
/// `RUST_LOG` takes precedence over `level`. Keep the returned guard alive
/// for the lifetime of the process or buffered file output is lost.
pub fn setup_logging(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }

    guard
}
