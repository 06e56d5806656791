//! # Telemetry Module
//!
//! Records decoded flight controller telemetry to JSONL files with rotation.
//!
//! This module handles:
//! - Timestamping decoded status, analog and motor samples
//! - Formatting as JSONL (JSON Lines)
//! - Rotating files after N records and retaining only the last M files

pub mod logger;
pub mod types;

pub use logger::TelemetryLogger;
pub use types::{StatusSnapshot, TelemetryData, TelemetryRecord};
