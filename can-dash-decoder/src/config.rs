//! Static configuration for the dash core
//!
//! Everything here is fixed for the lifetime of the process: it is built (or
//! deserialized) once at startup, validated, and then only read. Invalid
//! values are rejected by [`DashConfig::validate`] before the ingestion loop
//! is ever started.

use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors detected while validating the static configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CAN interface name: {0:?}")]
    InvalidInterface(String),

    #[error("Invalid bit rate: {0}")]
    InvalidBitrate(u32),

    #[error("Invalid fuel tank capacity: {0}")]
    InvalidFuelCapacity(f64),

    #[error("Identifier 0x{0:X} is mapped to more than one category")]
    DuplicateIdentifier(u32),
}

/// Complete configuration of the dash core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashConfig {
    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    #[serde(default)]
    pub vehicle: VehicleConfig,

    #[serde(default)]
    pub identifiers: IdentifierMap,
}

impl DashConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the CAN interface name
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.bus.interface = interface.into();
        self
    }

    /// Builder method: set the expected bus bit rate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bus.bitrate = bitrate;
        self
    }

    /// Builder method: set the fuel tank capacity in litres
    pub fn with_fuel_capacity(mut self, litres: f64) -> Self {
        self.vehicle.fuel_capacity_litres = litres;
        self
    }

    /// Builder method: set the reconnect policy
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Check the configuration before the loop starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bus.validate()?;
        self.vehicle.validate()?;
        self.identifiers.validate()?;
        Ok(())
    }
}

/// Transport settings for the bus adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// SocketCAN interface name (e.g. "can0")
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Expected bit rate; GMLAN single-wire runs at 33.3 kbit/s
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// Upper bound on a single blocking read before cancellation is re-checked
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

fn default_interface() -> String {
    "can0".to_string()
}

fn default_bitrate() -> u32 {
    33_300
}

fn default_read_timeout() -> u64 {
    250
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            bitrate: default_bitrate(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl BusConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // IFNAMSIZ is 16 including the terminator
        if self.interface.is_empty()
            || self.interface.len() > 15
            || self.interface.contains(char::is_whitespace)
        {
            return Err(ConfigError::InvalidInterface(self.interface.clone()));
        }
        if self.bitrate == 0 || self.bitrate > 1_000_000 {
            return Err(ConfigError::InvalidBitrate(self.bitrate));
        }
        Ok(())
    }
}

/// Bounded exponential backoff between connection attempts
///
/// An `initial_delay_ms` of zero keeps the tight busy-retry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default)]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_delay() -> u64 {
    1000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: default_max_delay(),
        }
    }
}

impl ReconnectPolicy {
    /// Retry immediately, without any delay
    pub fn busy_retry() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Exponential backoff starting at `initial_ms`, capped at `max_ms`
    pub fn exponential(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_delay_ms: initial_ms,
            max_delay_ms: max_ms,
        }
    }

    /// Delay before the given retry (1-based count of consecutive failures)
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 || self.initial_delay_ms == 0 {
            return Duration::ZERO;
        }
        let shift = failures.saturating_sub(1).min(30);
        let delay = self
            .initial_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms.max(self.initial_delay_ms));
        Duration::from_millis(delay)
    }
}

/// Fixed properties of the vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Fuel tank capacity in litres
    #[serde(default = "default_fuel_capacity")]
    pub fuel_capacity_litres: f64,
}

fn default_fuel_capacity() -> f64 {
    52.0
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            fuel_capacity_litres: default_fuel_capacity(),
        }
    }
}

impl VehicleConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.fuel_capacity_litres.is_finite() || self.fuel_capacity_litres <= 0.0 {
            return Err(ConfigError::InvalidFuelCapacity(self.fuel_capacity_litres));
        }
        Ok(())
    }
}

/// Arbitration identifier assigned to each category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierMap {
    #[serde(default = "default_motion_id")]
    pub motion: u32,
    #[serde(default = "default_engine_id")]
    pub engine: u32,
    #[serde(default = "default_air_temp_id")]
    pub air_temp: u32,
    #[serde(default = "default_fuel_level_id")]
    pub fuel_level: u32,
    #[serde(default = "default_steering_wheel_id")]
    pub steering_wheel: u32,
}

fn default_motion_id() -> u32 {
    0x108
}

fn default_engine_id() -> u32 {
    0x145
}

fn default_air_temp_id() -> u32 {
    0x445
}

fn default_fuel_level_id() -> u32 {
    0x375
}

fn default_steering_wheel_id() -> u32 {
    0x206
}

impl Default for IdentifierMap {
    fn default() -> Self {
        Self {
            motion: default_motion_id(),
            engine: default_engine_id(),
            air_temp: default_air_temp_id(),
            fuel_level: default_fuel_level_id(),
            steering_wheel: default_steering_wheel_id(),
        }
    }
}

impl IdentifierMap {
    /// All (identifier, category) pairs
    pub fn entries(&self) -> [(u32, Category); 5] {
        [
            (self.motion, Category::Motion),
            (self.engine, Category::Engine),
            (self.air_temp, Category::AirTemp),
            (self.fuel_level, Category::FuelLevel),
            (self.steering_wheel, Category::SteeringWheelControl),
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let entries = self.entries();
        for (i, (id, _)) in entries.iter().enumerate() {
            if entries[i + 1..].iter().any(|(other, _)| other == id) {
                return Err(ConfigError::DuplicateIdentifier(*id));
            }
        }
        Ok(())
    }
}
