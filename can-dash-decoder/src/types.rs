//! Core types for the CAN dash decoder library
//!
//! This module defines the frames the bus delivers, the categories they are
//! classified into, the structured values the payload decoders produce and the
//! errors that can occur along the way. Frames are ephemeral: they are decoded
//! and dropped, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for payload decoding
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Raw CAN frame as delivered by the bus adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Arbitration identifier (11-bit or 29-bit)
    pub can_id: u32,
    /// Payload bytes (0-8 for classic CAN)
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Create a new raw frame
    pub fn new(can_id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            can_id,
            data: data.into(),
        }
    }
}

/// Semantic meaning of a frame, independent of its identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Vehicle speed and engine RPM
    Motion,
    /// Coolant temperature, running and cruise-control flags
    Engine,
    /// Outside air temperature
    AirTemp,
    /// Fuel tank level
    FuelLevel,
    /// Steering-wheel button bitmask
    SteeringWheelControl,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Motion => write!(f, "Motion"),
            Category::Engine => write!(f, "Engine"),
            Category::AirTemp => write!(f, "AirTemp"),
            Category::FuelLevel => write!(f, "FuelLevel"),
            Category::SteeringWheelControl => write!(f, "SteeringWheelControl"),
        }
    }
}

/// Decoded motion frame
///
/// `rpm_raw` keeps the undivided field (0.01 rpm per bit); the emitted RPM is
/// derived with [`DecodedMotion::rpm`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedMotion {
    /// Vehicle speed in km/h
    pub speed: f64,
    /// Raw RPM field as read from the payload
    pub rpm_raw: u32,
}

impl DecodedMotion {
    /// Engine speed in revolutions per minute (integer division of the raw field)
    pub fn rpm(&self) -> u32 {
        self.rpm_raw / 100
    }
}

/// Decoded engine status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedEngine {
    /// Coolant temperature in °C
    pub engine_temp: i32,
    pub is_engine_running: bool,
    pub is_cruise_control_active: bool,
}

/// Steering-wheel controls, indexed by their bit position in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringControl {
    VolumeUp,
    VolumeDown,
    NextTrack,
    PreviousTrack,
    Source,
    Mute,
    Voice,
    Phone,
}

impl SteeringControl {
    /// All controls in ascending bit order
    pub const ALL: [SteeringControl; 8] = [
        SteeringControl::VolumeUp,
        SteeringControl::VolumeDown,
        SteeringControl::NextTrack,
        SteeringControl::PreviousTrack,
        SteeringControl::Source,
        SteeringControl::Mute,
        SteeringControl::Voice,
        SteeringControl::Phone,
    ];

    /// Map a bit position to its control
    pub fn from_bit(bit: u8) -> Option<Self> {
        Self::ALL.get(bit as usize).copied()
    }

    /// Bit position of this control in the button bitmask
    pub fn bit(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SteeringControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SteeringControl::VolumeUp => "volume_up",
            SteeringControl::VolumeDown => "volume_down",
            SteeringControl::NextTrack => "next_track",
            SteeringControl::PreviousTrack => "previous_track",
            SteeringControl::Source => "source",
            SteeringControl::Mute => "mute",
            SteeringControl::Voice => "voice",
            SteeringControl::Phone => "phone",
        };
        write!(f, "{}", name)
    }
}

/// One asserted steering-wheel button, stamped at decode time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub control: SteeringControl,
    pub time: Timestamp,
}

/// Connection lifecycle as owned by the connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Online,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Online => write!(f, "Online"),
        }
    }
}

/// Errors produced while decoding a single payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{category} payload too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort {
        category: Category,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised by the bus transport
///
/// None of these are fatal to the process; the ingestion loop answers every
/// one of them by reconnecting.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("No CAN device found on interface {0}")]
    NoDevice(String),

    #[error("Permission denied opening interface {0}")]
    PermissionDenied(String),

    #[error("CAN channel {0} is busy")]
    ChannelBusy(String),

    #[error("CAN link on {0} went down")]
    LinkDown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Classify an OS error raised while opening or reading `interface`
    pub fn from_io(interface: &str, err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ENODEV) | Some(libc::ENXIO) => Self::NoDevice(interface.to_string()),
            Some(libc::EACCES) | Some(libc::EPERM) => {
                Self::PermissionDenied(interface.to_string())
            }
            Some(libc::EBUSY) => Self::ChannelBusy(interface.to_string()),
            Some(libc::ENETDOWN) | Some(libc::ENETRESET) => Self::LinkDown(interface.to_string()),
            _ if err.kind() == std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(interface.to_string())
            }
            _ => Self::Io(err),
        }
    }

    /// True when the adapter itself is missing, as opposed to any other failure
    pub fn is_no_device(&self) -> bool {
        matches!(self, ConnectionError::NoDevice(_))
    }
}
