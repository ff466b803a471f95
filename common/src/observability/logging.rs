use serde::{Deserialize, Serialize};

/// Structured logging configuration, matching the `--log-level`/`--quiet`/
/// `--verbose` CLI surface and `RUST_LOG` override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub service_name: String,
    pub log_level: String,
    pub json_format: bool,
}

impl LoggingConfig {
    pub fn new(service_name: impl Into<String>, log_level: impl Into<String>, json_format: bool) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: log_level.into(),
            json_format,
        }
    }
}

/// Install a global `tracing` subscriber. Idempotent-safe to call once at
/// process start, before any plug-in loads — every lifecycle log line after
/// this point is structured and filterable.
pub fn init_logging(config: &LoggingConfig) -> Result<(), anyhow::Error> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Flush and drop logging resources. `tracing-subscriber` has no async
/// flush of its own; this is the explicit final step the shutdown sequence
/// calls so log lines from the last few ticks aren't lost mid-process-exit.
pub fn shutdown_logging() {}
