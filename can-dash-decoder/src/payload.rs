//! Payload decoders
//!
//! One pure function per [`Category`]. Each checks the payload length before
//! touching any field and otherwise performs fixed-offset field extraction
//! followed by a fixed scale/offset transform.
//!
//! Layouts (multi-byte fields big-endian, bits numbered LSB-first in a byte):
//!
//! | Category             | Min len | Fields                                              |
//! |----------------------|---------|-----------------------------------------------------|
//! | Motion               | 6       | rpm_raw = bytes 1..4 (0.01 rpm), speed = bytes 4..6 / 128 km/h |
//! | Engine               | 4       | byte 0 bit 0 running, bit 1 cruise, coolant = byte 3 - 40 °C |
//! | AirTemp              | 2       | byte 1 / 2 - 40 °C                                  |
//! | FuelLevel            | 2       | byte 1 = litres remaining                           |
//! | SteeringWheelControl | 1       | byte 0 button bitmask                               |

use crate::types::{
    Category, ControlEvent, DecodeError, DecodedEngine, DecodedMotion, Result, SteeringControl,
    Timestamp,
};
use byteorder::{BigEndian, ByteOrder};

pub const MOTION_LEN: usize = 6;
pub const ENGINE_LEN: usize = 4;
pub const AIR_TEMP_LEN: usize = 2;
pub const FUEL_LEVEL_LEN: usize = 2;
pub const STEERING_WHEEL_LEN: usize = 1;

/// Speed field resolution: 1/128 km/h per bit
const SPEED_SCALE: f64 = 1.0 / 128.0;
const COOLANT_OFFSET: i32 = -40;
const AIR_TEMP_SCALE: f64 = 0.5;
const AIR_TEMP_OFFSET: f64 = -40.0;

const ENGINE_RUNNING_BIT: usize = 0;
const CRUISE_ACTIVE_BIT: usize = 1;

/// Minimum payload length a category's layout needs
pub fn required_len(category: Category) -> usize {
    match category {
        Category::Motion => MOTION_LEN,
        Category::Engine => ENGINE_LEN,
        Category::AirTemp => AIR_TEMP_LEN,
        Category::FuelLevel => FUEL_LEVEL_LEN,
        Category::SteeringWheelControl => STEERING_WHEEL_LEN,
    }
}

fn check_len(category: Category, data: &[u8]) -> Result<()> {
    let expected = required_len(category);
    if data.len() < expected {
        return Err(DecodeError::PayloadTooShort {
            category,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Extract `length` bits starting at `start_bit`, LSB-first within each byte
fn extract_bits(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;

    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = bit_pos % 8;

        if let Some(byte) = data.get(byte_idx) {
            let bit_value = (byte >> bit_in_byte) & 0x01;
            result |= (bit_value as u64) << i;
        }
    }

    result
}

fn bit_set(data: &[u8], bit: usize) -> bool {
    extract_bits(data, bit, 1) != 0
}

/// Decode vehicle speed and the raw RPM field
pub fn decode_motion(data: &[u8]) -> Result<DecodedMotion> {
    check_len(Category::Motion, data)?;

    let rpm_raw = BigEndian::read_u24(&data[1..4]);
    let speed_raw = BigEndian::read_u16(&data[4..6]);

    Ok(DecodedMotion {
        speed: f64::from(speed_raw) * SPEED_SCALE,
        rpm_raw,
    })
}

/// Decode coolant temperature and the engine status flags
pub fn decode_engine(data: &[u8]) -> Result<DecodedEngine> {
    check_len(Category::Engine, data)?;

    Ok(DecodedEngine {
        engine_temp: i32::from(data[3]) + COOLANT_OFFSET,
        is_engine_running: bit_set(data, ENGINE_RUNNING_BIT),
        is_cruise_control_active: bit_set(data, CRUISE_ACTIVE_BIT),
    })
}

/// Decode outside air temperature in °C
pub fn decode_air_temp(data: &[u8]) -> Result<f64> {
    check_len(Category::AirTemp, data)?;
    Ok(f64::from(data[1]) * AIR_TEMP_SCALE + AIR_TEMP_OFFSET)
}

/// Decode the raw fuel level (litres remaining)
pub fn decode_fuel_level(data: &[u8]) -> Result<f64> {
    check_len(Category::FuelLevel, data)?;
    Ok(f64::from(data[1]))
}

/// Fuel level as a percentage of the tank capacity
pub fn fuel_percentage(raw_level: f64, fuel_capacity: f64) -> f64 {
    raw_level * 100.0 / fuel_capacity
}

/// Decode the steering-wheel button bitmask
///
/// Yields one event per asserted bit in ascending bit order, all stamped with
/// `at`.
pub fn decode_steering_wheel(data: &[u8], at: Timestamp) -> Result<Vec<ControlEvent>> {
    check_len(Category::SteeringWheelControl, data)?;

    let events = SteeringControl::ALL
        .iter()
        .filter(|control| bit_set(data, control.bit() as usize))
        .map(|&control| ControlEvent { control, time: at })
        .collect();

    Ok(events)
}
