//! # MSP Request Encoder
//!
//! Encodes commands and payloads into MSP v1 request frames.

use bytes::{BufMut, Bytes, BytesMut};

use super::checksum::msp_checksum;
use super::protocol::*;
use crate::error::{MspBridgeError, Result};

/// Encode a complete MSP request frame
///
/// # Arguments
///
/// * `command` - Command to send
/// * `payload` - Payload bytes (at most 255)
///
/// # Returns
///
/// * `Result<Bytes>` - `$M<`, size, command, payload, checksum
///
/// # Errors
///
/// Returns `PayloadTooLarge` if the payload does not fit the size byte
///
/// # Examples
///
/// ```
/// use msp_bridge::msp::encoder::encode_request;
/// use msp_bridge::msp::protocol::MspCommand;
///
/// let frame = encode_request(MspCommand::StatusEx, &[]).unwrap();
/// assert_eq!(&frame[..], &[0x24, 0x4D, 0x3C, 0x00, 0x96, 0x96]);
/// ```
pub fn encode_request(command: MspCommand, payload: &[u8]) -> Result<Bytes> {
    encode_frame(Direction::Request, command.code(), payload)
}

/// Encode a frame in either direction with a raw command code
///
/// Response frames are never sent by the bridge; this exists so scripted
/// peers and tests build byte-exact replies with the same codec.
pub fn encode_frame(direction: Direction, command: u8, payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MSP_MAX_PAYLOAD_SIZE {
        return Err(MspBridgeError::PayloadTooLarge {
            size: payload.len(),
            max: MSP_MAX_PAYLOAD_SIZE,
        });
    }

    let size = payload.len() as u8;
    let mut frame = BytesMut::with_capacity(MSP_FRAME_OVERHEAD + payload.len());
    frame.put_slice(&direction.header());
    frame.put_u8(size);
    frame.put_u8(command);
    frame.put_slice(payload);
    frame.put_u8(msp_checksum(size, command, payload));

    Ok(frame.freeze())
}

/// Pack u16 values little-endian, as used by MSP_SET_RAW_RC and MSP_SET_MOTOR
///
/// # Examples
///
/// ```
/// use msp_bridge::msp::encoder::encode_u16_payload;
///
/// assert_eq!(encode_u16_payload(&[1500, 1000]), vec![0xDC, 0x05, 0xE8, 0x03]);
/// ```
pub fn encode_u16_payload(values: &[u16]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(values.len() * 2);
    for value in values {
        payload.extend_from_slice(&value.to_le_bytes());
    }
    payload
}
