//! Telemetry record types written by the recorder

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::msp::protocol::{
    AnalogReading, ArmingDisableReason, ArmingStatus, DecodedTelemetry, MotorReading,
};

/// One timestamped telemetry sample
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    /// When the sample was decoded
    pub timestamp: DateTime<Utc>,

    /// Decoded values, flattened into `kind` and `data`
    #[serde(flatten)]
    pub telemetry: TelemetryData,
}

/// Decoded values of one sample, tagged by kind
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum TelemetryData {
    Status(StatusSnapshot),
    Analog(AnalogReading),
    Motors(MotorReading),
}

/// Status fields plus the derived arming view
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub is_armed: bool,
    pub cycle_time_us: u16,
    pub cpu_load_percent: u16,
    pub i2c_error_count: u32,
    pub active_profile: u8,
    pub disable_flags: u32,
    pub disable_reasons: Vec<ArmingDisableReason>,
}

impl From<&ArmingStatus> for StatusSnapshot {
    fn from(status: &ArmingStatus) -> Self {
        Self {
            is_armed: status.is_armed(),
            cycle_time_us: status.cycle_time_us,
            cpu_load_percent: status.cpu_load_percent,
            i2c_error_count: status.i2c_error_count,
            active_profile: status.active_profile,
            disable_flags: status.disable_flags,
            disable_reasons: status.disable_reasons(),
        }
    }
}

impl TelemetryRecord {
    /// Build a record stamped with the current time
    ///
    /// Acknowledgements carry no telemetry and yield `None`.
    pub fn from_decoded(decoded: &DecodedTelemetry) -> Option<Self> {
        let telemetry = match decoded {
            DecodedTelemetry::Status(status) => TelemetryData::Status(status.into()),
            DecodedTelemetry::Analog(analog) => TelemetryData::Analog(*analog),
            DecodedTelemetry::Motors(motors) => TelemetryData::Motors(motors.clone()),
            DecodedTelemetry::Acknowledged { .. } => return None,
        };

        Some(Self {
            timestamp: Utc::now(),
            telemetry,
        })
    }

    /// Serialize as a single JSON line (without the trailing newline)
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
