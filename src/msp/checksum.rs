//! # MSP v1 Checksum
//!
//! XOR checksum over the size byte, the command byte and every payload byte.
//! An empty payload folds to zero.

/// Calculate the MSP v1 checksum of a frame body
///
/// # Arguments
///
/// * `size` - Value of the size field
/// * `command` - Command code
/// * `payload` - Payload bytes
///
/// # Returns
///
/// * `u8` - `size ^ command ^ fold(payload, ^)`
///
/// # Examples
///
/// ```
/// use msp_bridge::msp::checksum::msp_checksum;
///
/// // MSP_STATUS_EX request with an empty payload
/// assert_eq!(msp_checksum(0, 150, &[]), 150);
/// ```
pub fn msp_checksum(size: u8, command: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(size ^ command, |acc, &byte| acc ^ byte)
}
