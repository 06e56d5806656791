//! # MSP Response Decoder
//!
//! Validates response frames and decodes telemetry payloads
//! (MSP_STATUS_EX, MSP_ANALOG, MSP_MOTOR). All numeric fields are little-endian.

use bytes::Bytes;

use super::checksum::msp_checksum;
use super::protocol::*;
use crate::error::{MspBridgeError, Result};

/// Validate the five fields of a received response frame
///
/// # Arguments
///
/// * `header` - The three header bytes, must be `$M>`
/// * `size` - Size field as received
/// * `command` - Command field as received
/// * `payload` - Payload bytes (`size` of them)
/// * `checksum` - Checksum byte as received
///
/// # Returns
///
/// * `Result<MspFrame>` - Validated response frame
///
/// # Errors
///
/// Returns error if:
/// - Header is not the response marker (`FramingError`)
/// - Checksum does not match (`ChecksumMismatch`)
pub fn validate_response(
    header: [u8; 3],
    size: u8,
    command: u8,
    payload: Bytes,
    checksum: u8,
) -> Result<MspFrame> {
    if header != MSP_RESPONSE_HEADER {
        return Err(MspBridgeError::FramingError { header });
    }

    let expected = msp_checksum(size, command, &payload);
    if expected != checksum {
        return Err(MspBridgeError::ChecksumMismatch {
            expected,
            received: checksum,
        });
    }

    Ok(MspFrame {
        direction: Direction::Response,
        command,
        payload,
        checksum,
    })
}

/// Decode a complete response frame held in one buffer
///
/// Convenience for callers that already have all bytes; the stream reader
/// assembles frames incrementally instead.
pub fn decode_frame(frame: &[u8]) -> Result<MspFrame> {
    if frame.len() < MSP_FRAME_OVERHEAD {
        return Err(MspBridgeError::TruncatedPayload {
            command: frame.get(4).copied().unwrap_or(0),
            expected: MSP_FRAME_OVERHEAD,
            actual: frame.len(),
        });
    }

    let header = [frame[0], frame[1], frame[2]];
    let size = frame[3];
    let command = frame[4];
    let total = MSP_FRAME_OVERHEAD + size as usize;

    if frame.len() < total {
        return Err(MspBridgeError::TruncatedPayload {
            command,
            expected: total,
            actual: frame.len(),
        });
    }

    let payload = Bytes::copy_from_slice(&frame[5..5 + size as usize]);
    validate_response(header, size, command, payload, frame[total - 1])
}

fn require_len(command: MspCommand, payload: &[u8], expected: usize) -> Result<()> {
    if payload.len() < expected {
        return Err(MspBridgeError::TruncatedPayload {
            command: command.code(),
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn le_u16(payload: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

fn le_u32(payload: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}

/// Decode MSP_STATUS_EX
///
/// Layout: cycle_time u16, i2c_errors u16, sensors u32, flags u32,
/// profile u8, cpuload u16, then optionally arming disable flags u32.
/// Firmware that omits the trailing flags decodes as "no reasons".
pub fn decode_status(payload: &[u8]) -> Result<ArmingStatus> {
    require_len(MspCommand::StatusEx, payload, MSP_STATUS_EX_MIN_PAYLOAD_SIZE)?;

    let disable_flags = if payload.len() >= MSP_STATUS_EX_FULL_PAYLOAD_SIZE {
        le_u32(payload, MSP_STATUS_EX_MIN_PAYLOAD_SIZE)
    } else {
        0
    };

    Ok(ArmingStatus {
        cycle_time_us: le_u16(payload, 0),
        i2c_error_count: le_u16(payload, 2) as u32,
        sensor_flags: le_u32(payload, 4),
        state_flags: le_u32(payload, 8),
        active_profile: payload[12],
        cpu_load_percent: le_u16(payload, 13),
        disable_flags,
    })
}

/// Decode MSP_ANALOG
///
/// Layout: vbat u8 (0.1 V), power meter sum u16, rssi u16, amperage u16.
pub fn decode_analog(payload: &[u8]) -> Result<AnalogReading> {
    require_len(MspCommand::Analog, payload, MSP_ANALOG_PAYLOAD_SIZE)?;

    Ok(AnalogReading {
        voltage: payload[0] as f32 / 10.0,
        power_meter_sum: le_u16(payload, 1),
        rssi: le_u16(payload, 3),
        amperage: le_u16(payload, 5),
    })
}

/// Decode MSP_MOTOR
///
/// Any even-length payload is accepted; each pair of bytes is one output.
pub fn decode_motors(payload: &[u8]) -> Result<MotorReading> {
    if payload.len() % 2 != 0 {
        return Err(MspBridgeError::TruncatedPayload {
            command: MspCommand::Motor.code(),
            expected: payload.len() + 1,
            actual: payload.len(),
        });
    }

    let outputs = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(MotorReading { outputs })
}

/// Decode the payload of a response to `command`
///
/// Commands without telemetry yield [`DecodedTelemetry::Acknowledged`]
/// and their payload is ignored.
pub fn decode_telemetry(command: MspCommand, payload: &[u8]) -> Result<DecodedTelemetry> {
    if !command.has_telemetry() {
        return Ok(DecodedTelemetry::Acknowledged { command });
    }

    let decoded = match command {
        MspCommand::StatusEx => DecodedTelemetry::Status(decode_status(payload)?),
        MspCommand::Analog => DecodedTelemetry::Analog(decode_analog(payload)?),
        MspCommand::Motor => DecodedTelemetry::Motors(decode_motors(payload)?),
        _ => DecodedTelemetry::Acknowledged { command },
    };
    Ok(decoded)
}
