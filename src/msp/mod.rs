//! # MSP Protocol Module
//!
//! Implementation of the MultiWii Serial Protocol (v1) for flight controller
//! communication.
//!
//! This module handles:
//! - Request frame encoding (`$M<`, size, command, payload, checksum)
//! - Deadline-bounded response frame assembly and validation
//! - XOR checksum calculation
//! - Telemetry decoding (status, analog, motor outputs)

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod checksum;
pub mod reader;
