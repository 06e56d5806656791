//! # Serial Communication Module
//!
//! Handles the serial link to the flight controller.
//!
//! This module handles:
//! - Opening the flight controller's USB/UART port (8N1, no flow control)
//! - Auto-detecting the device from a list of candidate paths
//! - The [`MspPort`] seam the transport session is generic over

pub mod port_trait;

pub use port_trait::MspPort;

use crate::error::{MspBridgeError, Result};
use tracing::{debug, info, warn};

/// Default MSP baud rate (Betaflight/INAV USB VCP and UART default)
pub const MSP_BAUD_RATE: u32 = 115_200;

/// Default flight controller device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC (flight controller VCP)
    "/dev/ttyUSB0", // USB-to-serial adapters on a UART
];

/// Flight controller serial port handle
///
/// Owns the opened stream until it is handed to a session.
pub struct FcSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
}

impl std::fmt::Debug for FcSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl FcSerial {
    /// Open the flight controller port, trying `preferred` first
    ///
    /// # Arguments
    ///
    /// * `preferred` - Configured device path
    /// * `baud_rate` - Baud rate (115200 for most firmware)
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` if no candidate could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use msp_bridge::serial::{FcSerial, MSP_BAUD_RATE};
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = FcSerial::open("/dev/ttyACM0", MSP_BAUD_RATE)?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(preferred: &str, baud_rate: u32) -> Result<Self> {
        let paths = candidate_paths(preferred);
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        Self::open_with_paths(&paths, baud_rate)
    }

    /// Open the first device in `paths` that accepts the MSP settings
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyACM0"])
    /// * `baud_rate` - Baud rate
    ///
    /// # Returns
    ///
    /// * `Result<FcSerial>` - Connected serial port or error
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened flight controller at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(MspBridgeError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        use tokio_serial::SerialPortBuilderExt;

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| MspBridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Hand the stream over to a session
    pub fn into_port(self) -> tokio_serial::SerialStream {
        self.port
    }
}

/// Candidate device paths: `preferred` first, then the defaults
///
/// Duplicates and empty entries are skipped.
pub fn candidate_paths(preferred: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::with_capacity(DEFAULT_DEVICE_PATHS.len() + 1);
    for path in std::iter::once(preferred).chain(DEFAULT_DEVICE_PATHS.iter().copied()) {
        if !path.is_empty() && !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(MSP_BAUD_RATE, 115_200);
        assert_eq!(DEFAULT_DEVICE_PATHS.len(), 2);
        assert_eq!(DEFAULT_DEVICE_PATHS[0], "/dev/ttyACM0");
        assert_eq!(DEFAULT_DEVICE_PATHS[1], "/dev/ttyUSB0");
    }

    #[test]
    fn test_candidate_paths_preferred_first() {
        let paths = candidate_paths("/dev/ttyAMA0");
        assert_eq!(paths, vec!["/dev/ttyAMA0", "/dev/ttyACM0", "/dev/ttyUSB0"]);
    }

    #[test]
    fn test_candidate_paths_no_duplicates() {
        let paths = candidate_paths("/dev/ttyUSB0");
        assert_eq!(paths, vec!["/dev/ttyUSB0", "/dev/ttyACM0"]);

        let paths = candidate_paths("");
        assert_eq!(paths, vec!["/dev/ttyACM0", "/dev/ttyUSB0"]);
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = FcSerial::open_with_paths(invalid_paths, MSP_BAUD_RATE);

        match result.unwrap_err() {
            MspBridgeError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        let result = FcSerial::open_with_paths(empty_paths, MSP_BAUD_RATE);

        match result.unwrap_err() {
            MspBridgeError::SerialPortNotFound(_) => {}
            other => panic!("Expected SerialPortNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = FcSerial::open_port("/dev/nonexistent_serial_device_12345", MSP_BAUD_RATE);

        match result.unwrap_err() {
            MspBridgeError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[test]
    fn test_serial_errors_are_fatal() {
        let err = FcSerial::open_with_paths(&["/dev/nonexistent0"], MSP_BAUD_RATE).unwrap_err();
        assert!(err.is_fatal());
    }

    // Integration test - only runs if a flight controller is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_open_with_real_hardware() {
        match FcSerial::open("/dev/ttyACM0", MSP_BAUD_RATE) {
            Ok(serial) => println!("Opened flight controller at: {}", serial.device_path()),
            Err(_) => println!("No flight controller detected (this is OK for CI/CD)"),
        }
    }
}
