//! Tracing subscriber bootstrap.

use anyhow::anyhow;
use bookshelf_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, EnvFilter};

/// Build the event filter: `RUST_LOG` wins over the configured directive.
pub fn env_filter(settings: &TelemetrySettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter))
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let builder = fmt().with_env_filter(env_filter(settings)).with_target(true);

    let result = match settings.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    result.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

    tracing::info!(
        target: "bookshelf-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn configured_filter_is_used_without_rust_log() {
        let settings = TelemetrySettings {
            log_format: LogFormat::Json,
            filter: "warn".to_string(),
        };
        if std::env::var("RUST_LOG").is_err() {
            assert_eq!(env_filter(&settings).max_level_hint(), Some(LevelFilter::WARN));
        }
    }
}
