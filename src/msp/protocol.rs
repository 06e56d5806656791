//! # MSP Protocol Constants and Types
//!
//! Core protocol definitions for MSP (MultiWii Serial Protocol v1) communication.

use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// MSP preamble (`$M`)
pub const MSP_PREAMBLE: [u8; 2] = [0x24, 0x4D];

/// Direction byte of frames sent to the flight controller (`<`)
pub const MSP_DIRECTION_REQUEST: u8 = 0x3C;

/// Direction byte of frames sent by the flight controller (`>`)
pub const MSP_DIRECTION_RESPONSE: u8 = 0x3E;

/// Full request header (`$M<`)
pub const MSP_REQUEST_HEADER: [u8; 3] = [0x24, 0x4D, MSP_DIRECTION_REQUEST];

/// Full response header (`$M>`)
pub const MSP_RESPONSE_HEADER: [u8; 3] = [0x24, 0x4D, MSP_DIRECTION_RESPONSE];

/// Header length in bytes
pub const MSP_HEADER_SIZE: usize = 3;

/// Size + command bytes following the header
pub const MSP_SIZE_COMMAND_SIZE: usize = 2;

/// Maximum payload size (limited by the one-byte size field)
pub const MSP_MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Frame overhead: header(3) + size(1) + command(1) + checksum(1)
pub const MSP_FRAME_OVERHEAD: usize = 6;

/// Deadline for one complete response, measured from the start of the read
pub const MSP_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Maximum number of RC channels accepted by MSP_SET_RAW_RC
pub const MSP_MAX_RC_CHANNELS: usize = 18;

/// Number of outputs carried by MSP_SET_MOTOR (4 motors + 4 servos)
pub const MSP_MOTOR_VALUE_COUNT: usize = 8;

/// Fixed MSP_STATUS_EX prefix size
pub const MSP_STATUS_EX_MIN_PAYLOAD_SIZE: usize = 15;

/// MSP_STATUS_EX size including the trailing arming disable flags
pub const MSP_STATUS_EX_FULL_PAYLOAD_SIZE: usize = 19;

/// MSP_ANALOG payload size
pub const MSP_ANALOG_PAYLOAD_SIZE: usize = 7;

/// Raw motor output values (4 motors + 4 servos)
pub type MotorValues = [u16; MSP_MOTOR_VALUE_COUNT];

/// MSP commands understood by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum MspCommand {
    /// Motor output values
    Motor = 104,
    /// Battery voltage, power meter, RSSI and amperage
    Analog = 110,
    /// Extended status with arming disable flags
    StatusEx = 150,
    /// Arm the flight controller
    Arm = 151,
    /// Disarm the flight controller
    Disarm = 152,
    /// Raw RC channel values
    SetRawRc = 200,
    /// Start accelerometer calibration
    AccCalibration = 205,
    /// Raw motor output values
    SetMotor = 214,
}

impl MspCommand {
    /// Every command, in code order
    pub const ALL: [MspCommand; 8] = [
        MspCommand::Motor,
        MspCommand::Analog,
        MspCommand::StatusEx,
        MspCommand::Arm,
        MspCommand::Disarm,
        MspCommand::SetRawRc,
        MspCommand::AccCalibration,
        MspCommand::SetMotor,
    ];

    /// Wire code of this command
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether the response to this command carries telemetry worth decoding
    pub const fn has_telemetry(self) -> bool {
        matches!(self, MspCommand::Motor | MspCommand::Analog | MspCommand::StatusEx)
    }
}

impl TryFrom<u8> for MspCommand {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        MspCommand::ALL
            .into_iter()
            .find(|command| command.code() == code)
            .ok_or(code)
    }
}

impl fmt::Display for MspCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MspCommand::Motor => "MSP_MOTOR",
            MspCommand::Analog => "MSP_ANALOG",
            MspCommand::StatusEx => "MSP_STATUS_EX",
            MspCommand::Arm => "MSP_ARM",
            MspCommand::Disarm => "MSP_DISARM",
            MspCommand::SetRawRc => "MSP_SET_RAW_RC",
            MspCommand::AccCalibration => "MSP_ACC_CALIBRATION",
            MspCommand::SetMotor => "MSP_SET_MOTOR",
        };
        write!(f, "{}({})", name, self.code())
    }
}

/// Frame direction, carried by the third header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `$M<`, host to flight controller
    Request,
    /// `$M>`, flight controller to host
    Response,
}

impl Direction {
    /// Header bytes for this direction
    pub const fn header(self) -> [u8; 3] {
        match self {
            Direction::Request => MSP_REQUEST_HEADER,
            Direction::Response => MSP_RESPONSE_HEADER,
        }
    }
}

/// One complete MSP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspFrame {
    /// Request or response
    pub direction: Direction,

    /// Raw command code (may be a command the bridge does not know)
    pub command: u8,

    /// Payload data (at most 255 bytes)
    pub payload: Bytes,

    /// XOR checksum as transmitted
    pub checksum: u8,
}

impl MspFrame {
    /// Value of the one-byte size field
    ///
    /// Frames are only built by the codec, which caps payloads at 255 bytes.
    pub fn size(&self) -> u8 {
        self.payload.len() as u8
    }

    /// Total bytes on the wire
    pub fn wire_size(&self) -> usize {
        MSP_FRAME_OVERHEAD + self.payload.len()
    }
}

/// Named arming disable flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArmingDisableReason {
    NoGyro,
    Failsafe,
    RxFailsafe,
    BadRxRecovery,
    Boxfailsafe,
    RunawayTakeoff,
    CrashDetected,
    Throttle,
    Angle,
    BootGraceTime,
    Noprearm,
    Load,
    Calibrating,
    Cli,
    CmsMenu,
    OsdMenu,
    Bst,
    Msp,
    Paralyze,
    Gps,
    Resc,
    Rpmfilter,
    RebootReqd,
    DshotBbang,
    NoAccCal,
    MotorProto,
    ArmSwitch,
}

impl ArmingDisableReason {
    /// All named reasons, indexed by bit position
    pub const ALL: [ArmingDisableReason; 27] = [
        ArmingDisableReason::NoGyro,
        ArmingDisableReason::Failsafe,
        ArmingDisableReason::RxFailsafe,
        ArmingDisableReason::BadRxRecovery,
        ArmingDisableReason::Boxfailsafe,
        ArmingDisableReason::RunawayTakeoff,
        ArmingDisableReason::CrashDetected,
        ArmingDisableReason::Throttle,
        ArmingDisableReason::Angle,
        ArmingDisableReason::BootGraceTime,
        ArmingDisableReason::Noprearm,
        ArmingDisableReason::Load,
        ArmingDisableReason::Calibrating,
        ArmingDisableReason::Cli,
        ArmingDisableReason::CmsMenu,
        ArmingDisableReason::OsdMenu,
        ArmingDisableReason::Bst,
        ArmingDisableReason::Msp,
        ArmingDisableReason::Paralyze,
        ArmingDisableReason::Gps,
        ArmingDisableReason::Resc,
        ArmingDisableReason::Rpmfilter,
        ArmingDisableReason::RebootReqd,
        ArmingDisableReason::DshotBbang,
        ArmingDisableReason::NoAccCal,
        ArmingDisableReason::MotorProto,
        ArmingDisableReason::ArmSwitch,
    ];

    /// Bit position in `disable_flags`
    pub fn bit(self) -> u32 {
        self as u32
    }

    /// Firmware name of the flag
    pub fn name(self) -> &'static str {
        match self {
            ArmingDisableReason::NoGyro => "NO_GYRO",
            ArmingDisableReason::Failsafe => "FAILSAFE",
            ArmingDisableReason::RxFailsafe => "RX_FAILSAFE",
            ArmingDisableReason::BadRxRecovery => "BAD_RX_RECOVERY",
            ArmingDisableReason::Boxfailsafe => "BOXFAILSAFE",
            ArmingDisableReason::RunawayTakeoff => "RUNAWAY_TAKEOFF",
            ArmingDisableReason::CrashDetected => "CRASH_DETECTED",
            ArmingDisableReason::Throttle => "THROTTLE",
            ArmingDisableReason::Angle => "ANGLE",
            ArmingDisableReason::BootGraceTime => "BOOT_GRACE_TIME",
            ArmingDisableReason::Noprearm => "NOPREARM",
            ArmingDisableReason::Load => "LOAD",
            ArmingDisableReason::Calibrating => "CALIBRATING",
            ArmingDisableReason::Cli => "CLI",
            ArmingDisableReason::CmsMenu => "CMS_MENU",
            ArmingDisableReason::OsdMenu => "OSD_MENU",
            ArmingDisableReason::Bst => "BST",
            ArmingDisableReason::Msp => "MSP",
            ArmingDisableReason::Paralyze => "PARALYZE",
            ArmingDisableReason::Gps => "GPS",
            ArmingDisableReason::Resc => "RESC",
            ArmingDisableReason::Rpmfilter => "RPMFILTER",
            ArmingDisableReason::RebootReqd => "REBOOT_REQD",
            ArmingDisableReason::DshotBbang => "DSHOT_BBANG",
            ArmingDisableReason::NoAccCal => "NO_ACC_CAL",
            ArmingDisableReason::MotorProto => "MOTOR_PROTO",
            ArmingDisableReason::ArmSwitch => "ARM_SWITCH",
        }
    }

    /// Decode every named bit set in `flags`; reserved bits are ignored
    pub fn from_flags(flags: u32) -> Vec<ArmingDisableReason> {
        ArmingDisableReason::ALL
            .into_iter()
            .filter(|reason| flags & (1 << reason.bit()) != 0)
            .collect()
    }
}

impl fmt::Display for ArmingDisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded MSP_STATUS_EX telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArmingStatus {
    /// Main loop cycle time in microseconds
    pub cycle_time_us: u16,

    /// I2C error counter
    pub i2c_error_count: u32,

    /// Detected sensor bitmask
    pub sensor_flags: u32,

    /// Flight mode flags (bit 0 = armed)
    pub state_flags: u32,

    /// Active PID profile
    pub active_profile: u8,

    /// CPU load in percent
    pub cpu_load_percent: u16,

    /// Arming disable bitmask (0 when the firmware omits it)
    pub disable_flags: u32,
}

impl ArmingStatus {
    /// Whether the flight controller reports itself armed
    pub fn is_armed(&self) -> bool {
        self.state_flags & 1 != 0
    }

    /// Named reasons preventing arming, in bit order
    pub fn disable_reasons(&self) -> Vec<ArmingDisableReason> {
        ArmingDisableReason::from_flags(self.disable_flags)
    }

    /// Whether `reason` is currently preventing arming
    pub fn is_disabled_by(&self, reason: ArmingDisableReason) -> bool {
        self.disable_flags & (1 << reason.bit()) != 0
    }
}

/// Decoded MSP_ANALOG telemetry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalogReading {
    /// Battery voltage in volts
    pub voltage: f32,

    /// Power meter sum (mAh)
    pub power_meter_sum: u16,

    /// Received signal strength (0-1023)
    pub rssi: u16,

    /// Current draw (raw, 0.01 A units)
    pub amperage: u16,
}

/// Decoded MSP_MOTOR telemetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotorReading {
    /// Output values in channel order
    pub outputs: Vec<u16>,
}

impl MotorReading {
    /// Number of reported outputs
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Whether the controller reported no outputs
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Result of one decoded round trip
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedTelemetry {
    Status(ArmingStatus),
    Analog(AnalogReading),
    Motors(MotorReading),
    /// Command acknowledged; its response payload was validated and discarded
    Acknowledged { command: MspCommand },
}
