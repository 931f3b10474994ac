//! # Telemetry RX
//!
//! Listens for broadcast telemetry packets from a peer transmitter and
//! prints one report per packet on the console.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telemetry_rx::config::{Config, LoggingConfig};
use telemetry_rx::radio::serial::SerialRadioLink;
use telemetry_rx::radio::{self, RadioLink};
use telemetry_rx::receiver::report::ConsoleSink;
use telemetry_rx::receiver::{ReceiveCoordinator, ReceiverStats};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the rolling log file
const LOG_FILE_PREFIX: &str = "telemetry-rx";

/// Main entry point for the telemetry receiver
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Bring up the radio link and register the receive handler
///
/// 2. **Main Loop**
///    - Drain the mailbox every `poll_interval_ms`
///    - Log receiver statistics every `status_interval_s`
///    - Handle Ctrl+C for graceful shutdown
///
/// If the radio cannot be brought up the loop still runs, in a degraded
/// listening state with no frames arriving.
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_source) = load_config(std::env::args().nth(1))?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Telemetry receiver v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("{}", config_source);

    let mut coordinator =
        ReceiveCoordinator::new(config.receiver.encoding, ConsoleSink::stdout());

    let mut radio_link = SerialRadioLink::new(&config.radio.port, config.radio.baud_rate);
    if radio::bring_up(&mut radio_link, coordinator.receive_handler()) {
        info!("Listening on {}", radio_link.description());
    }

    match radio_link.local_address() {
        Some(address) => coordinator.report_local_address(address),
        None => info!("Receiver address not reported by {}", radio_link.description()),
    }

    let mut poll = interval(Duration::from_millis(config.receiver.poll_interval_ms));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let status_period = Duration::from_secs(config.receiver.status_interval_s);
    let mut status =
        tokio::time::interval_at(tokio::time::Instant::now() + status_period, status_period);

    info!(
        "Setup complete! Waiting for {} messages (polling every {}ms)...",
        coordinator.encoding(),
        config.receiver.poll_interval_ms
    );
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = poll.tick() => {
                coordinator.drain();
            }

            _ = status.tick() => {
                info!("{}", status_line(&coordinator.stats()));
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("{}", status_line(&coordinator.stats()));
                break;
            }
        }
    }

    Ok(())
}

/// Load the configuration and describe where it came from
///
/// An explicit path must exist. Without one, the default file is used if
/// present and built-in defaults otherwise.
fn load_config(path: Option<String>) -> Result<(Config, String)> {
    match path {
        Some(path) => {
            let config = Config::load(&path)
                .with_context(|| format!("failed to load configuration from {}", path))?;
            Ok((config, format!("Loaded configuration from {}", path)))
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let config = Config::load(DEFAULT_CONFIG_PATH).with_context(|| {
                format!("failed to load configuration from {}", DEFAULT_CONFIG_PATH)
            })?;
            Ok((config, format!("Loaded configuration from {}", DEFAULT_CONFIG_PATH)))
        }
        None => Ok((Config::default(), "No configuration file found, using defaults".to_string())),
    }
}

/// Initialize logging to stderr, plus a daily-rolling file when configured
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must be kept alive to flush the file writer.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (file_layer, guard) = if logging.file_dir.is_empty() {
        (None, None)
    } else {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(&logging.file_dir)
            .with_context(|| format!("failed to open log directory {}", logging.file_dir))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// One-line summary of the receiver counters
fn status_line(stats: &ReceiverStats) -> String {
    format!(
        "Received {} frames: {} reported, {} undecodable, {} overwritten, \
         {} oversized dropped, {} sink failures",
        stats.received,
        stats.decoded,
        stats.decode_failures,
        stats.overwritten,
        stats.dropped_oversized,
        stats.sink_failures
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use telemetry_rx::payload::protocol::PayloadEncoding;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_status_line_lists_all_counters() {
        let stats = ReceiverStats {
            received: 10,
            dropped_oversized: 1,
            overwritten: 2,
            decoded: 7,
            decode_failures: 1,
            sink_failures: 0,
        };
        assert_eq!(
            status_line(&stats),
            "Received 10 frames: 7 reported, 1 undecodable, 2 overwritten, \
             1 oversized dropped, 0 sink failures"
        );
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        temp_file.write_all(b"[receiver]\nencoding = \"binary_sensor\"\n").unwrap();
        temp_file.flush().unwrap();

        let path = temp_file.path().to_string_lossy().into_owned();
        let (config, source) = load_config(Some(path.clone())).unwrap();
        assert_eq!(config.receiver.encoding, PayloadEncoding::BinarySensor);
        assert!(source.contains(&path));
    }

    #[test]
    fn test_load_config_explicit_missing_path_fails() {
        let result = load_config(Some("/nonexistent/telemetry-rx.toml".to_string()));
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/telemetry-rx.toml"));
    }
}
