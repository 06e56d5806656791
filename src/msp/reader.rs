//! # MSP Response Reader
//!
//! Deadline-bounded incremental assembly of response frames.
//!
//! The size of a response is only known once the two bytes after the header
//! have arrived, so the reader works in stages:
//!
//! ```text
//! AwaitingHeader (3) -> AwaitingLengthCommand (2) -> AwaitingPayload (size + 1)
//! ```
//!
//! A single deadline, taken when the read starts, bounds every stage. A peer
//! trickling bytes cannot extend the wait past [`MSP_RESPONSE_TIMEOUT`].

use bytes::{Buf, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, trace, warn};

use super::decoder::validate_response;
use super::protocol::*;
use crate::error::{MspBridgeError, Result};

/// Initial receive buffer capacity (largest frame is 261 bytes)
const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Scratch size used while discarding bytes
const DRAIN_CHUNK_SIZE: usize = 64;

/// Round-trip state of a transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTripState {
    /// No round trip in progress
    Idle,
    /// Request written, response read not started yet
    RequestSent,
    /// Waiting for the 3-byte `$M>` header
    AwaitingHeader,
    /// Waiting for the size and command bytes
    AwaitingLengthCommand,
    /// Waiting for `size` payload bytes plus the checksum
    AwaitingPayload { size: u8, command: u8 },
}

/// Assembles response frames from a byte stream
#[derive(Debug)]
pub struct ResponseReader {
    buf: BytesMut,
    timeout: Duration,
    state: RoundTripState,
}

impl Default for ResponseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseReader {
    /// Create a reader using the protocol response deadline
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            timeout: MSP_RESPONSE_TIMEOUT,
            state: RoundTripState::Idle,
        }
    }

    /// Current round-trip state
    pub fn state(&self) -> RoundTripState {
        self.state
    }

    /// Number of received bytes not yet consumed by a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn mark_request_sent(&mut self) {
        self.state = RoundTripState::RequestSent;
    }

    /// Forget any partial frame and return to `Idle`
    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.state = RoundTripState::Idle;
    }

    /// Read and validate one response frame
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The deadline elapses first (`Timeout`)
    /// - The header is not `$M>` (`FramingError`, buffered bytes are drained)
    /// - The checksum does not match (`ChecksumMismatch`)
    /// - The stream ends or fails (`StreamUnavailable`)
    ///
    /// Whatever the outcome, the reader is back in [`RoundTripState::Idle`]
    /// and holds no partial frame.
    pub async fn read_frame<R>(&mut self, port: &mut R) -> Result<MspFrame>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        self.state = RoundTripState::AwaitingHeader;

        let result = self.assemble(port, started, deadline).await;

        if result.is_err() {
            self.buf.clear();
        }
        self.state = RoundTripState::Idle;
        result
    }

    async fn assemble<R>(&mut self, port: &mut R, started: Instant, deadline: Instant) -> Result<MspFrame>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; MSP_HEADER_SIZE];

        loop {
            match self.state {
                RoundTripState::Idle | RoundTripState::RequestSent => {
                    self.state = RoundTripState::AwaitingHeader;
                }
                RoundTripState::AwaitingHeader => {
                    self.fill(port, MSP_HEADER_SIZE, started, deadline).await?;
                    self.buf.copy_to_slice(&mut header);

                    if header != MSP_RESPONSE_HEADER {
                        let dropped = self.drain(port, Duration::ZERO).await;
                        warn!(
                            "Unexpected MSP header {:02X?}, discarded {} buffered bytes",
                            header, dropped
                        );
                        return Err(MspBridgeError::FramingError { header });
                    }

                    self.state = RoundTripState::AwaitingLengthCommand;
                }
                RoundTripState::AwaitingLengthCommand => {
                    self.fill(port, MSP_SIZE_COMMAND_SIZE, started, deadline).await?;
                    let size = self.buf.get_u8();
                    let command = self.buf.get_u8();
                    self.state = RoundTripState::AwaitingPayload { size, command };
                }
                RoundTripState::AwaitingPayload { size, command } => {
                    self.fill(port, size as usize + 1, started, deadline).await?;
                    let payload = self.buf.split_to(size as usize).freeze();
                    let checksum = self.buf.get_u8();

                    let frame = validate_response(header, size, command, payload, checksum)?;
                    debug!(
                        "Received MSP response: command {} ({} bytes) after {:?}",
                        frame.command,
                        frame.payload.len(),
                        started.elapsed()
                    );
                    return Ok(frame);
                }
            }
        }
    }

    /// Wait until at least `needed` bytes are buffered or the deadline passes
    async fn fill<R>(&mut self, port: &mut R, needed: usize, started: Instant, deadline: Instant) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        while self.buf.len() < needed {
            if Instant::now() >= deadline {
                return Err(timeout_error(started));
            }

            match timeout_at(deadline, port.read_buf(&mut self.buf)).await {
                Err(_) => return Err(timeout_error(started)),
                Ok(Ok(0)) => {
                    return Err(MspBridgeError::StreamUnavailable(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "serial stream closed",
                    )));
                }
                Ok(Ok(n)) => trace!("Read {} bytes ({} buffered)", n, self.buf.len()),
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(MspBridgeError::StreamUnavailable(e)),
            }
        }
        Ok(())
    }

    /// Discard buffered bytes and whatever the stream delivers until it has
    /// been silent for `quiet`
    ///
    /// With a zero `quiet` period only bytes that are immediately readable
    /// are discarded. End of stream and read errors stop the drain; they are
    /// reported by the next real read.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of bytes discarded
    pub async fn drain<R>(&mut self, port: &mut R, quiet: Duration) -> usize
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut dropped = self.buf.len();
        self.buf.clear();

        let mut scratch = [0u8; DRAIN_CHUNK_SIZE];
        loop {
            match timeout(quiet, port.read(&mut scratch)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => dropped += n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => {
                    debug!("Stopped draining after read error: {}", e);
                    break;
                }
            }
        }

        if dropped > 0 {
            debug!("Drained {} stale bytes", dropped);
        }
        dropped
    }
}

fn timeout_error(started: Instant) -> MspBridgeError {
    MspBridgeError::Timeout {
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}
