//! # MSP Transport Session
//!
//! Owns the byte stream to the flight controller and runs request/response
//! round trips over it.
//!
//! MSP has no request IDs: responses are matched to requests purely by arrival
//! order. Every round trip therefore takes `&mut self` and owns the stream from
//! the request write until the response is validated, times out or is rejected.
//! There is no automatic retry; callers decide whether to re-issue a request.

use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{MspBridgeError, Result};
use crate::msp::decoder::{decode_analog, decode_motors, decode_status, decode_telemetry};
use crate::msp::encoder::{encode_request, encode_u16_payload};
use crate::msp::protocol::*;
use crate::msp::reader::{ResponseReader, RoundTripState};
use crate::serial::MspPort;

/// Silence required before a resynchronising drain is considered complete
pub const RESYNC_QUIET_PERIOD: Duration = Duration::from_millis(50);

/// Time the flight controller needs to finish an accelerometer calibration
pub const ACC_CALIBRATION_SETTLE: Duration = Duration::from_secs(3);

/// Time the flight controller needs to act on an arm or disarm request
pub const ARMING_SETTLE: Duration = Duration::from_millis(500);

/// Interval between status polls while waiting for boot to complete
pub const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Request/response session with one flight controller
pub struct MspSession<P: MspPort> {
    port: P,
    reader: ResponseReader,
    /// Set when the stream may still carry bytes from an earlier round trip
    needs_resync: bool,
}

impl<P: MspPort> std::fmt::Debug for MspSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MspSession")
            .field("state", &self.reader.state())
            .field("needs_resync", &self.needs_resync)
            .finish_non_exhaustive()
    }
}

impl<P: MspPort> MspSession<P> {
    /// Create a session over an opened byte stream
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use msp_bridge::serial::{FcSerial, MSP_BAUD_RATE};
    /// use msp_bridge::session::MspSession;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let serial = FcSerial::open("/dev/ttyACM0", MSP_BAUD_RATE)?;
    ///     let mut session = MspSession::new(serial.into_port());
    ///
    ///     let status = session.get_status().await?;
    ///     println!("armed: {}", status.is_armed());
    ///     Ok(())
    /// }
    /// ```
    pub fn new(port: P) -> Self {
        Self {
            port,
            reader: ResponseReader::new(),
            needs_resync: false,
        }
    }

    /// Current round-trip state
    ///
    /// Always [`RoundTripState::Idle`] between calls, unless a round-trip
    /// future was dropped before it finished.
    pub fn state(&self) -> RoundTripState {
        self.reader.state()
    }

    /// Consume the session and return the stream
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Send one request and return its validated response frame
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The payload exceeds 255 bytes (`PayloadTooLarge`, nothing is sent)
    /// - No valid response arrives (`NoResponse`)
    /// - The response belongs to another command (`CommandMismatch`)
    /// - The stream is gone (`StreamUnavailable`)
    pub async fn round_trip(&mut self, command: MspCommand, payload: &[u8]) -> Result<MspFrame> {
        let request = encode_request(command, payload)?;

        self.prepare().await;
        self.send(command, &request).await?;

        let response = match self.reader.read_frame(&mut self.port).await {
            Ok(frame) => frame,
            Err(e) => {
                if !e.is_fatal() {
                    self.needs_resync = true;
                }
                debug!("{} round trip failed: {}", command, e);
                return Err(e.into_round_trip_outcome());
            }
        };

        if response.command != command.code() {
            warn!(
                "Sent {} but flight controller answered command {}",
                command, response.command
            );
            self.needs_resync = true;
            return Err(MspBridgeError::CommandMismatch {
                expected: command.code(),
                received: response.command,
                payload: response.payload,
            });
        }

        Ok(response)
    }

    /// Send one request and decode the response for its command
    pub async fn request(&mut self, command: MspCommand, payload: &[u8]) -> Result<DecodedTelemetry> {
        let response = self.round_trip(command, payload).await?;
        decode_telemetry(command, &response.payload)
    }

    /// Request MSP_STATUS_EX
    pub async fn get_status(&mut self) -> Result<ArmingStatus> {
        let response = self.round_trip(MspCommand::StatusEx, &[]).await?;
        decode_status(&response.payload)
    }

    /// Request MSP_ANALOG
    pub async fn get_analog(&mut self) -> Result<AnalogReading> {
        let response = self.round_trip(MspCommand::Analog, &[]).await?;
        decode_analog(&response.payload)
    }

    /// Request MSP_MOTOR
    pub async fn get_motors(&mut self) -> Result<MotorReading> {
        let response = self.round_trip(MspCommand::Motor, &[]).await?;
        decode_motors(&response.payload)
    }

    /// Send raw RC channel values (MSP_SET_RAW_RC)
    ///
    /// At most 18 channels are sent; extra values are dropped. The
    /// acknowledgement is read and validated so the stream stays in step.
    pub async fn set_rc_channels(&mut self, channels: &[u16]) -> Result<()> {
        let channels = if channels.len() > MSP_MAX_RC_CHANNELS {
            warn!(
                "{} RC channels given, MSP carries at most {}; extra channels dropped",
                channels.len(),
                MSP_MAX_RC_CHANNELS
            );
            &channels[..MSP_MAX_RC_CHANNELS]
        } else {
            channels
        };

        self.round_trip(MspCommand::SetRawRc, &encode_u16_payload(channels))
            .await?;
        Ok(())
    }

    /// Send raw motor output values (MSP_SET_MOTOR)
    ///
    /// Firmware-specific pass-through: the flight controller only
    /// acknowledges the frame, not any actual motor movement.
    pub async fn set_raw_motors(&mut self, values: &MotorValues) -> Result<()> {
        self.round_trip(MspCommand::SetMotor, &encode_u16_payload(values))
            .await?;
        Ok(())
    }

    /// Request arming (MSP_ARM) and give the controller time to settle
    pub async fn arm(&mut self) -> Result<()> {
        info!("Requesting arm");
        self.round_trip(MspCommand::Arm, &[]).await?;
        sleep(ARMING_SETTLE).await;
        Ok(())
    }

    /// Request disarming (MSP_DISARM) and give the controller time to settle
    pub async fn disarm(&mut self) -> Result<()> {
        info!("Requesting disarm");
        self.round_trip(MspCommand::Disarm, &[]).await?;
        sleep(ARMING_SETTLE).await;
        Ok(())
    }

    /// Start accelerometer calibration and wait for it to finish
    ///
    /// Anything the controller sends while calibrating is discarded so the
    /// next round trip starts on a clean stream.
    pub async fn calibrate_accelerometer(&mut self) -> Result<()> {
        info!("Starting accelerometer calibration");
        self.round_trip(MspCommand::AccCalibration, &[]).await?;

        sleep(ACC_CALIBRATION_SETTLE).await;
        let dropped = self.reader.drain(&mut self.port, RESYNC_QUIET_PERIOD).await;
        info!("Accelerometer calibration complete ({} bytes discarded)", dropped);
        Ok(())
    }

    /// Poll status until the boot grace period is over
    ///
    /// Failed polls are tolerated; only a lost stream aborts the wait.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A status arrived without `BOOT_GRACE_TIME`
    /// * `Ok(false)` - `max_wait` elapsed first
    pub async fn wait_for_boot_complete(&mut self, max_wait: Duration) -> Result<bool> {
        info!("Waiting for flight controller boot to complete");
        let started = Instant::now();
        let deadline = started + max_wait;
        let mut polls: u32 = 0;

        loop {
            match self.get_status().await {
                Ok(status) if !status.is_disabled_by(ArmingDisableReason::BootGraceTime) => {
                    info!("Flight controller boot complete");
                    return Ok(true);
                }
                Ok(_) => debug!("Flight controller still in boot grace time"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("Status poll failed while waiting for boot: {}", e),
            }

            polls += 1;
            if polls % 5 == 0 {
                info!("Still waiting for boot... ({}s)", started.elapsed().as_secs());
            }

            if Instant::now() + BOOT_POLL_INTERVAL > deadline {
                warn!("Flight controller boot wait timed out after {:?}", max_wait);
                return Ok(false);
            }
            sleep(BOOT_POLL_INTERVAL).await;
        }
    }

    /// Bring the stream back to a frame boundary before a new request
    async fn prepare(&mut self) {
        if self.reader.state() != RoundTripState::Idle {
            warn!(
                "Previous round trip abandoned in state {:?}, resynchronising",
                self.reader.state()
            );
            self.needs_resync = true;
        }

        let quiet = if self.needs_resync {
            RESYNC_QUIET_PERIOD
        } else {
            Duration::ZERO
        };
        self.reader.drain(&mut self.port, quiet).await;
        self.reader.reset();
        self.needs_resync = false;
    }

    async fn send(&mut self, command: MspCommand, request: &[u8]) -> Result<()> {
        // A write dropped halfway still leaves bytes on the wire
        self.reader.mark_request_sent();

        self.port
            .write_all(request)
            .await
            .map_err(MspBridgeError::StreamUnavailable)?;
        self.port
            .flush()
            .await
            .map_err(MspBridgeError::StreamUnavailable)?;

        debug!("Sent {} request ({} bytes)", command, request.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoResponseCause;
    use crate::msp::encoder::encode_frame;
    use crate::serial::port_trait::mocks::EchoPort;
    use std::io;
    use tokio_test::io::Builder;

    fn request(command: MspCommand, payload: &[u8]) -> Vec<u8> {
        encode_request(command, payload).unwrap().to_vec()
    }

    fn response(command: u8, payload: &[u8]) -> Vec<u8> {
        encode_frame(Direction::Response, command, payload).unwrap().to_vec()
    }

    fn status_payload(state_flags: u32, disable_flags: u32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&250u16.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&0x23u32.to_le_bytes());
        payload.extend_from_slice(&state_flags.to_le_bytes());
        payload.push(0);
        payload.extend_from_slice(&12u16.to_le_bytes());
        payload.extend_from_slice(&disable_flags.to_le_bytes());
        payload
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_status_round_trip() {
        let port = Builder::new()
            .write(&request(MspCommand::StatusEx, &[]))
            .read(&response(150, &status_payload(1, 0b11)))
            .build();
        let mut session = MspSession::new(port);

        let status = session.get_status().await.unwrap();
        assert!(status.is_armed());
        assert_eq!(status.cycle_time_us, 250);
        assert_eq!(
            status.disable_reasons(),
            vec![ArmingDisableReason::NoGyro, ArmingDisableReason::Failsafe]
        );
        assert_eq!(session.state(), RoundTripState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_analog_and_motors() {
        let port = Builder::new()
            .write(&request(MspCommand::Analog, &[]))
            .read(&response(110, &[25, 0, 0, 100, 0, 50, 0]))
            .write(&request(MspCommand::Motor, &[]))
            .read(&response(104, &[0xE8, 0x03, 0xE8, 0x03, 0xF4, 0x01, 0x00, 0x00]))
            .build();
        let mut session = MspSession::new(port);

        let analog = session.get_analog().await.unwrap();
        assert!((analog.voltage - 2.5).abs() < f32::EPSILON);
        assert_eq!(analog.rssi, 100);
        assert_eq!(analog.amperage, 50);

        let motors = session.get_motors().await.unwrap();
        assert_eq!(motors.outputs, vec![1000, 1000, 500, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_dispatches_decoder() {
        let port = Builder::new()
            .write(&request(MspCommand::Analog, &[]))
            .read(&response(110, &[120, 0, 0, 0, 0, 0, 0]))
            .write(&request(MspCommand::Arm, &[]))
            .read(&response(151, &[]))
            .build();
        let mut session = MspSession::new(port);

        match session.request(MspCommand::Analog, &[]).await.unwrap() {
            DecodedTelemetry::Analog(reading) => assert!((reading.voltage - 12.0).abs() < 0.001),
            other => panic!("Expected Analog telemetry, got: {:?}", other),
        }

        let ack = session.request(MspCommand::Arm, &[]).await.unwrap();
        assert_eq!(ack, DecodedTelemetry::Acknowledged { command: MspCommand::Arm });
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_no_response_and_session_recovers() {
        let port = Builder::new()
            .write(&request(MspCommand::Analog, &[]))
            .write(&request(MspCommand::Analog, &[]))
            .read(&response(110, &[168, 0, 0, 0, 0, 0, 0]))
            .build();
        let mut session = MspSession::new(port);

        let started = Instant::now();
        let err = session.get_analog().await.unwrap_err();
        assert!(matches!(err, MspBridgeError::NoResponse(NoResponseCause::Timeout)));
        assert_eq!(started.elapsed(), MSP_RESPONSE_TIMEOUT);
        assert_eq!(session.state(), RoundTripState::Idle);

        // No reset needed before the next round trip
        let analog = session.get_analog().await.unwrap();
        assert!((analog.voltage - 16.8).abs() < 0.001);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checksum_failure_is_no_response() {
        let mut bad = response(110, &[25, 0, 0, 100, 0, 50, 0]);
        let last = bad.len() - 1;
        bad[last] ^= 0x80;

        let port = Builder::new()
            .write(&request(MspCommand::Analog, &[]))
            .read(&bad)
            .build();
        let mut session = MspSession::new(port);

        let err = session.get_analog().await.unwrap_err();
        assert!(matches!(err, MspBridgeError::NoResponse(NoResponseCause::ChecksumMismatch)));
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_framing_error_is_no_response() {
        let port = Builder::new()
            .write(&request(MspCommand::Motor, &[]))
            .read(b"$M!\x02\x68\x01\x02\x69")
            .build();
        let mut session = MspSession::new(port);

        let err = session.get_motors().await.unwrap_err();
        assert!(matches!(err, MspBridgeError::NoResponse(NoResponseCause::FramingError)));
        assert_eq!(session.state(), RoundTripState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_mismatch_is_delivered() {
        let port = Builder::new()
            .write(&request(MspCommand::StatusEx, &[]))
            .read(&response(110, &[25, 0, 0, 100, 0, 50, 0]))
            .write(&request(MspCommand::StatusEx, &[]))
            .read(&response(150, &status_payload(0, 0)))
            .build();
        let mut session = MspSession::new(port);

        match session.get_status().await {
            Err(MspBridgeError::CommandMismatch { expected, received, payload }) => {
                assert_eq!(expected, 150);
                assert_eq!(received, 110);
                assert_eq!(payload.as_ref(), &[25, 0, 0, 100, 0, 50, 0]);
            }
            other => panic!("Expected CommandMismatch, got: {:?}", other),
        }

        // Not retried internally; the caller re-issues
        let status = session.get_status().await.unwrap();
        assert!(!status.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncated_status_payload() {
        let port = Builder::new()
            .write(&request(MspCommand::StatusEx, &[]))
            .read(&response(150, &[0u8; 10]))
            .build();
        let mut session = MspSession::new(port);

        let err = session.get_status().await.unwrap_err();
        assert!(matches!(
            err,
            MspBridgeError::TruncatedPayload { command: 150, expected: 15, actual: 10 }
        ));
        assert_eq!(session.state(), RoundTripState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_too_large_sends_nothing() {
        let port = Builder::new().build();
        let mut session = MspSession::new(port);

        let err = session
            .request(MspCommand::SetMotor, &[0u8; 256])
            .await
            .unwrap_err();
        assert!(matches!(err, MspBridgeError::PayloadTooLarge { size: 256, max: 255 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_is_fatal() {
        let port = Builder::new()
            .write(&request(MspCommand::StatusEx, &[]))
            .build();
        let mut session = MspSession::new(port);

        let err = session.get_status().await.unwrap_err();
        assert!(matches!(err, MspBridgeError::StreamUnavailable(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_fatal() {
        let port = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
            .build();
        let mut session = MspSession::new(port);

        let err = session.arm().await.unwrap_err();
        assert!(matches!(err, MspBridgeError::StreamUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_rc_channels_truncates_to_18() {
        let channels: Vec<u16> = (0..20).map(|i| 1000 + i * 10).collect();
        let expected = encode_u16_payload(&channels[..18]);

        let port = Builder::new()
            .write(&request(MspCommand::SetRawRc, &expected))
            .read(&response(200, &[]))
            .build();
        let mut session = MspSession::new(port);

        session.set_rc_channels(&channels).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_raw_motors_discards_ack_payload() {
        let values: MotorValues = [1000, 1030, 1000, 1000, 0, 0, 0, 0];
        let port = Builder::new()
            .write(&request(MspCommand::SetMotor, &encode_u16_payload(&values)))
            .read(&response(214, &[0xAA, 0xBB]))
            .build();
        let mut session = MspSession::new(port);

        session.set_raw_motors(&values).await.unwrap();
        assert_eq!(session.state(), RoundTripState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_and_disarm() {
        let port = Builder::new()
            .write(&request(MspCommand::Arm, &[]))
            .read(&response(151, &[]))
            .write(&request(MspCommand::Disarm, &[]))
            .read(&response(152, &[]))
            .build();
        let mut session = MspSession::new(port);

        let started = Instant::now();
        session.arm().await.unwrap();
        assert!(started.elapsed() >= ARMING_SETTLE);

        let started = Instant::now();
        session.disarm().await.unwrap();
        assert!(started.elapsed() >= ARMING_SETTLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calibrate_accelerometer_drains_afterwards() {
        let port = Builder::new()
            .write(&request(MspCommand::AccCalibration, &[]))
            .read(&response(205, &[]))
            .read(b"\x00\x01\x02 chatter")
            .build();
        let mut session = MspSession::new(port);

        let started = Instant::now();
        session.calibrate_accelerometer().await.unwrap();
        assert!(started.elapsed() >= ACC_CALIBRATION_SETTLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_round_trip_is_drained() {
        let port = Builder::new()
            .write(&request(MspCommand::Motor, &[]))
            .wait(Duration::from_millis(120))
            .read(&response(104, &[0x01, 0x00]))
            .write(&request(MspCommand::Motor, &[]))
            .read(&response(104, &[0x02, 0x00]))
            .build();
        let mut session = MspSession::new(port);

        // Caller gives up before the response arrives
        let abandoned = tokio::time::timeout(Duration::from_millis(100), session.get_motors()).await;
        assert!(abandoned.is_err());
        assert_ne!(session.state(), RoundTripState::Idle);

        // The late response is discarded, not mistaken for the next one
        let motors = session.get_motors().await.unwrap();
        assert_eq!(motors.outputs, vec![2]);
        assert_eq!(session.state(), RoundTripState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_boot_complete() {
        let port = EchoPort::new(response(150, &status_payload(0, 0)));
        let mut session = MspSession::new(port.clone());

        assert!(session.wait_for_boot_complete(Duration::from_secs(5)).await.unwrap());
        assert_eq!(port.get_written_data().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_boot_times_out() {
        let grace = 1 << ArmingDisableReason::BootGraceTime.bit();
        let port = EchoPort::new(response(150, &status_payload(0, grace)));
        let mut session = MspSession::new(port.clone());

        let started = Instant::now();
        assert!(!session.wait_for_boot_complete(Duration::from_secs(3)).await.unwrap());
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(port.get_written_data().len() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_boot_tolerates_bad_replies() {
        let port = EchoPort::new(response(150, &[0u8; 4]));
        let mut session = MspSession::new(port.clone());

        let waiter = async {
            sleep(Duration::from_millis(1500)).await;
            port.set_reply(response(150, &status_payload(0, 0)));
        };
        let (booted, _) = tokio::join!(session.wait_for_boot_complete(Duration::from_secs(10)), waiter);
        assert!(booted.unwrap());
        assert_eq!(port.get_written_data().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_boot_aborts_on_lost_stream() {
        let port = EchoPort::new(Vec::new());
        port.set_write_error(io::ErrorKind::NotConnected);
        let mut session = MspSession::new(port);

        let err = session
            .wait_for_boot_complete(Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trips_against_simulated_controller() {
        use tokio::io::AsyncReadExt;

        let (client, mut fc) = tokio::io::duplex(256);

        let controller = tokio::spawn(async move {
            for _ in 0..2 {
                let mut header = [0u8; 5];
                fc.read_exact(&mut header).await.unwrap();
                assert_eq!(&header[..3], MSP_REQUEST_HEADER);
                let mut rest = vec![0u8; header[3] as usize + 1];
                fc.read_exact(&mut rest).await.unwrap();

                let reply = match header[4] {
                    110 => response(110, &[168, 0, 0, 255, 3, 0, 0]),
                    152 => response(152, &[]),
                    other => panic!("unexpected command {}", other),
                };
                fc.write_all(&reply).await.unwrap();
            }
        });

        let mut session = MspSession::new(client);
        let analog = session.get_analog().await.unwrap();
        assert!((analog.voltage - 16.8).abs() < 0.001);
        assert_eq!(analog.rssi, 1023);

        session.disarm().await.unwrap();
        controller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_drained_before_next_round_trip() {
        let port = Builder::new()
            .write(&request(MspCommand::Motor, &[]))
            .wait(Duration::from_millis(520))
            .read(&response(104, &[1, 0]))
            .write(&request(MspCommand::Motor, &[]))
            .read(&response(104, &[2, 0]))
            .build();
        let mut session = MspSession::new(port);

        let err = session.get_motors().await.unwrap_err();
        assert!(matches!(err, MspBridgeError::NoResponse(NoResponseCause::Timeout)));

        // The stale reply arrives after the deadline and must not answer this request
        let motors = session.get_motors().await.unwrap();
        assert_eq!(motors.outputs, vec![2]);
        assert_eq!(session.state(), RoundTripState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_dropped_halfway_marks_request_sent() {
        // The peer never reads, so the 6-byte request stalls after 4 bytes
        let (client, _fc) = tokio::io::duplex(4);
        let mut session = MspSession::new(client);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), session.get_analog()).await;
        assert!(abandoned.is_err());
        assert_eq!(session.state(), RoundTripState::RequestSent);
    }
}
