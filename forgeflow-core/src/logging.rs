use crate::conf::{LogFormat, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. Call once, from the binary.
///
/// - `RUST_LOG` wins over the configured level.
/// - JSON output flattens event fields; pretty output is for terminals.
/// - With a configured directory, logs go to a daily rolling file through a
///   non-blocking writer. Keep the returned guard alive to flush on exit.
pub fn init_logging(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    // If tokio-console is enabled, DO NOT install the normal subscriber
    if std::env::var("TOKIO_CONSOLE").is_ok() {
        init_console_logging();
        return None;
    }
    init_normal_logging(cfg)
}

fn init_normal_logging(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match (&cfg.directory, cfg.format) {
        (Some(dir), format) => {
            let appender = tracing_appender::rolling::daily(dir, "forgeflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let builder = fmt().with_env_filter(filter).with_writer(writer).with_ansi(false);
            match format {
                LogFormat::Json => builder.json().flatten_event(true).init(),
                LogFormat::Pretty => builder.pretty().init(),
            }
            Some(guard)
        }
        (None, LogFormat::Json) => {
            fmt().with_env_filter(filter).json().flatten_event(true).init();
            None
        }
        (None, LogFormat::Pretty) => {
            fmt().with_env_filter(filter).pretty().init();
            None
        }
    }
}

fn init_console_logging() {
    console_subscriber::init();
}
