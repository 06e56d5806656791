//! # MSP Bridge Library
//!
//! Talk to a Betaflight-style flight controller over the MultiWii Serial
//! Protocol (MSP v1).
//!
//! This library provides request framing, deadline-bounded response reading,
//! a request/response session with the high-level command set, and a JSONL
//! telemetry recorder.

pub mod config;
pub mod error;
pub mod msp;
pub mod serial;
pub mod session;
pub mod telemetry;

pub use error::{MspBridgeError, NoResponseCause, Result};
pub use session::MspSession;
