//! # Error Types
//!
//! Custom error types for MSP Bridge using `thiserror`.

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Why a round trip produced no usable response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoResponseCause {
    /// Deadline elapsed before a full frame arrived
    Timeout,
    /// Header bytes did not match the response marker
    FramingError,
    /// Computed checksum differs from the received one
    ChecksumMismatch,
}

impl fmt::Display for NoResponseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NoResponseCause::Timeout => "timeout",
            NoResponseCause::FramingError => "framing error",
            NoResponseCause::ChecksumMismatch => "checksum mismatch",
        };
        f.write_str(name)
    }
}

/// Main error type for MSP Bridge
#[derive(Debug, Error)]
pub enum MspBridgeError {
    /// Response deadline elapsed before a complete frame arrived
    #[error("Timed out after {elapsed_ms} ms waiting for an MSP response")]
    Timeout { elapsed_ms: u64 },

    /// Response header did not match `$M>`
    #[error("Invalid MSP header: {header:02X?}")]
    FramingError { header: [u8; 3] },

    /// Checksum over size, command and payload did not match
    #[error("MSP checksum mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    ChecksumMismatch { expected: u8, received: u8 },

    /// Payload shorter than the decoder's fixed layout
    #[error("Truncated payload for MSP command {command}: need {expected} bytes, got {actual}")]
    TruncatedPayload {
        command: u8,
        expected: usize,
        actual: usize,
    },

    /// Request payload does not fit the one-byte size field
    #[error("MSP payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Response belongs to a different command than the request just sent
    #[error("MSP command mismatch: sent {expected}, received {received}")]
    CommandMismatch {
        expected: u8,
        received: u8,
        payload: Bytes,
    },

    /// A round trip ended without a valid response frame
    #[error("No response from flight controller ({0})")]
    NoResponse(NoResponseCause),

    /// The underlying byte stream is gone; reopen the transport
    #[error("Serial stream unavailable: {0}")]
    StreamUnavailable(#[source] std::io::Error),

    /// None of the candidate serial devices could be opened
    #[error("No flight controller serial port found (tried: {0})")]
    SerialPortNotFound(String),

    /// Serial port configuration or open failure
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Telemetry record serialization errors
    #[error("Telemetry encoding error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MspBridgeError {
    /// Whether the transport has to be reopened before it can be used again
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MspBridgeError::StreamUnavailable(_) | MspBridgeError::SerialPortNotFound(_)
        )
    }

    /// Whether this is the unified "no response" outcome of a round trip
    pub fn is_no_response(&self) -> bool {
        matches!(self, MspBridgeError::NoResponse(_))
    }

    /// Collapse reader failures into [`MspBridgeError::NoResponse`]
    ///
    /// Other kinds pass through unchanged.
    pub(crate) fn into_round_trip_outcome(self) -> Self {
        match self {
            MspBridgeError::Timeout { .. } => MspBridgeError::NoResponse(NoResponseCause::Timeout),
            MspBridgeError::FramingError { .. } => {
                MspBridgeError::NoResponse(NoResponseCause::FramingError)
            }
            MspBridgeError::ChecksumMismatch { .. } => {
                MspBridgeError::NoResponse(NoResponseCause::ChecksumMismatch)
            }
            other => other,
        }
    }
}

/// Result type alias for MSP Bridge
pub type Result<T> = std::result::Result<T, MspBridgeError>;
