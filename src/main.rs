//! # MSP Bridge
//!
//! Monitor a Betaflight-style flight controller over MSP.
//!
//! This application opens the flight controller's serial port, waits for it to
//! finish booting and then polls status, battery and motor telemetry, logging
//! every sample and recording it to JSONL files.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use msp_bridge::config::Config;
use msp_bridge::msp::protocol::DecodedTelemetry;
use msp_bridge::serial::{FcSerial, MspPort};
use msp_bridge::telemetry::{TelemetryLogger, TelemetryRecord};
use msp_bridge::{MspBridgeError, MspSession};

/// Prefix of the daily-rolling application log file
const APP_LOG_FILE_PREFIX: &str = "msp-bridge.log";

/// Number of poll cycles between summary log messages
const LOG_INTERVAL_POLLS: u64 = 60;

type FcSession = MspSession<tokio_serial::SerialStream>;

/// Main entry point for the MSP Bridge application
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first CLI argument, defaults otherwise)
///    - Set up logging with tracing subscriber
///    - Open the flight controller port
///
/// 2. **Main Loop**
///    - Poll status, analog and motor telemetry every `poll_interval_ms`
///    - Record each sample when telemetry recording is enabled
///    - Reopen the port after it disappears
///    - Handle Ctrl+C for graceful shutdown
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = init_logging(&config)?;

    info!("MSP Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut recorder = if config.telemetry.enabled {
        Some(TelemetryLogger::new(&config.telemetry).context("failed to start telemetry recorder")?)
    } else {
        None
    };

    let mut session = tokio::select! {
        session = connect(&config) => session,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C before the flight controller was found");
            return Ok(());
        }
    };

    if config.monitor.wait_for_boot {
        let booted = tokio::select! {
            result = session.wait_for_boot_complete(config.monitor.boot_timeout()) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                return Ok(());
            }
        };
        match booted {
            Ok(true) => info!("Flight controller ready"),
            Ok(false) => warn!(
                "Flight controller still booting after {}s, monitoring anyway",
                config.monitor.boot_timeout_s
            ),
            Err(e) => warn!("Boot wait failed: {}", e),
        }
    }

    let mut poll_interval = interval(config.monitor.poll_interval());
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Polling telemetry every {}ms", config.monitor.poll_interval_ms);
    info!("Press Ctrl+C to exit");

    let mut poll_count: u64 = 0;
    let mut failed_requests: u64 = 0;

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                match poll_once(&mut session, recorder.as_mut()).await {
                    Ok(failures) => failed_requests += failures,
                    Err(e) => {
                        error!("Lost flight controller: {}", e);
                        session = tokio::select! {
                            session = reconnect(&config) => session,
                            _ = tokio::signal::ctrl_c() => {
                                info!("Received Ctrl+C, shutting down...");
                                break;
                            }
                        };
                        continue;
                    }
                }

                poll_count += 1;
                if poll_count % LOG_INTERVAL_POLLS == 0 {
                    info!("Completed {} polls ({} requests without response)", poll_count, failed_requests);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!("Total polls: {}", poll_count);
    Ok(())
}

/// Load the config file named by the first argument, or the defaults
fn load_config() -> Result<Config> {
    match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Install the tracing subscriber
///
/// Logs go to stdout, and additionally to a daily-rolling file in the
/// telemetry directory when recording is enabled. The returned guard must be
/// held for the lifetime of the program so buffered lines are flushed.
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = if config.telemetry.enabled {
        std::fs::create_dir_all(&config.telemetry.log_dir)
            .with_context(|| format!("failed to create log directory {}", config.telemetry.log_dir))?;
        let appender = tracing_appender::rolling::daily(&config.telemetry.log_dir, APP_LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Open the flight controller, retrying until a port appears
async fn connect(config: &Config) -> FcSession {
    loop {
        match FcSerial::open(&config.serial.port, config.serial.baud_rate) {
            Ok(serial) => {
                info!("Flight controller serial port opened at: {}", serial.device_path());
                return MspSession::new(serial.into_port());
            }
            Err(e) => {
                warn!(
                    "{}; retrying in {}ms",
                    e, config.serial.reconnect_interval_ms
                );
                sleep(config.serial.reconnect_interval()).await;
            }
        }
    }
}

async fn reconnect(config: &Config) -> FcSession {
    sleep(config.serial.reconnect_interval()).await;
    connect(config).await
}

/// Poll every telemetry command once
///
/// Returns the number of requests that failed without ending the session.
/// A fatal error (port gone) is returned at once so the caller can reconnect.
async fn poll_once<P: MspPort>(
    session: &mut MspSession<P>,
    mut recorder: Option<&mut TelemetryLogger>,
) -> std::result::Result<u64, MspBridgeError> {
    let mut failures = 0;

    let status = session.get_status().await.map(DecodedTelemetry::Status);
    failures += handle_sample(status, recorder.as_deref_mut())?;

    let analog = session.get_analog().await.map(DecodedTelemetry::Analog);
    failures += handle_sample(analog, recorder.as_deref_mut())?;

    let motors = session.get_motors().await.map(DecodedTelemetry::Motors);
    failures += handle_sample(motors, recorder)?;

    Ok(failures)
}

/// Log and record one sample; returns 1 for a non-fatal failure
fn handle_sample(
    sample: std::result::Result<DecodedTelemetry, MspBridgeError>,
    recorder: Option<&mut TelemetryLogger>,
) -> std::result::Result<u64, MspBridgeError> {
    match sample {
        Ok(decoded) => {
            log_sample(&decoded);
            if let (Some(recorder), Some(record)) = (recorder, TelemetryRecord::from_decoded(&decoded)) {
                if let Err(e) = recorder.log(&record) {
                    warn!("Failed to record telemetry: {}", e);
                }
            }
            Ok(0)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!("Telemetry request failed: {}", e);
            Ok(1)
        }
    }
}

fn log_sample(decoded: &DecodedTelemetry) {
    match decoded {
        DecodedTelemetry::Status(status) => {
            let reasons: Vec<&str> = status.disable_reasons().iter().map(|r| r.name()).collect();
            info!(
                armed = status.is_armed(),
                cpu_load = status.cpu_load_percent,
                cycle_time_us = status.cycle_time_us,
                "Status: arming disabled by [{}]",
                reasons.join(", ")
            );
        }
        DecodedTelemetry::Analog(analog) => {
            info!(
                rssi = analog.rssi,
                amperage = analog.amperage,
                "Battery: {:.1}V", analog.voltage
            );
        }
        DecodedTelemetry::Motors(motors) => {
            info!("Motors: {:?}", motors.outputs);
        }
        DecodedTelemetry::Acknowledged { command } => {
            debug!("{} acknowledged", command);
        }
    }
}
