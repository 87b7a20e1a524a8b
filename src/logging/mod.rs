// Logging module - tracing subscriber setup
//
// Console output always goes to stdout. File logging is opt-in and writes
// JSON lines through a non-blocking rolling appender.

use crate::config::{Config, LogRotation};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the default filter directive
///
/// Debug mode wins over the configured level so `--debug` always shows the
/// request/response bodies.
pub fn default_directive(config: &Config) -> String {
    let level = if config.server.debug {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    format!("trae_proxy={},hyper=warn,rustls=warn", level)
}

/// Initialize tracing/logging
///
/// Precedence: RUST_LOG env var > debug flag > config file level.
/// The returned guard must be kept alive for the duration of the program so
/// buffered file logs are flushed on exit.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    if !config.logging.file_enabled {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(&config.logging.file_dir) {
        eprintln!(
            "Warning: Could not create log directory {:?}: {}",
            config.logging.file_dir, e
        );
        // Fall back to console-only logging
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return None;
    }

    let file_appender = match config.logging.file_rotation {
        LogRotation::Hourly => {
            tracing_appender::rolling::hourly(&config.logging.file_dir, &config.logging.file_prefix)
        }
        LogRotation::Daily => {
            tracing_appender::rolling::daily(&config.logging.file_dir, &config.logging.file_prefix)
        }
        LogRotation::Never => {
            tracing_appender::rolling::never(&config.logging.file_dir, &config.logging.file_prefix)
        }
    };

    // Writes happen on a background thread
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_uses_configured_level() {
        let mut config = Config::default();
        config.server.debug = false;
        config.logging.level = "warn".to_string();
        assert!(default_directive(&config).starts_with("trae_proxy=warn"));
    }

    #[test]
    fn test_debug_flag_overrides_level() {
        let mut config = Config::default();
        config.server.debug = true;
        config.logging.level = "error".to_string();
        assert!(default_directive(&config).starts_with("trae_proxy=debug"));
    }

    #[test]
    fn test_directive_is_valid_filter() {
        let config = Config::default();
        assert!(EnvFilter::try_new(default_directive(&config)).is_ok());
    }
}
