//! Trait abstraction for the byte stream a session talks over, to enable testing

use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream carrying MSP frames
///
/// Implemented for every async read/write stream: the real
/// `tokio_serial::SerialStream`, `tokio::io::DuplexStream` and scripted mocks.
pub trait MspPort: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> MspPort for T where T: AsyncRead + AsyncWrite + Unpin + Send {}
