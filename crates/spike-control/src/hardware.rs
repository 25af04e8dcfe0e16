//! Hub collaborator interface and the fallible-read helpers the loops use.

use std::fmt;

use tracing::warn;

use crate::error::HardwareError;

/// Drive wheel of the differential base.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wheel {
    /// Left wheel. Mounted mirrored, so its encoder counts down when the robot drives forward.
    Left,
    /// Right wheel. Its encoder counts up when the robot drives forward.
    Right,
}

/// Hub sensor/motor port.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorPort {
    /// Port A.
    A,
    /// Port B.
    B,
    /// Port C.
    C,
    /// Port D.
    D,
    /// Port E.
    E,
    /// Port F.
    F,
}

impl SensorPort {
    /// Parse a port letter such as `"C"` or `"port.C"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let letter = name.rsplit('.').next()?.trim();
        match letter {
            "A" | "a" => Some(SensorPort::A),
            "B" | "b" => Some(SensorPort::B),
            "C" | "c" => Some(SensorPort::C),
            "D" | "d" => Some(SensorPort::D),
            "E" | "e" => Some(SensorPort::E),
            "F" | "f" => Some(SensorPort::F),
            _ => None,
        }
    }
}

impl fmt::Display for SensorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            SensorPort::A => "A",
            SensorPort::B => "B",
            SensorPort::C => "C",
            SensorPort::D => "D",
            SensorPort::E => "E",
            SensorPort::F => "F",
        };
        f.write_str(letter)
    }
}

/// The hub the controllers talk to: gyro, wheel encoders, a reflectance
/// sensor and the paired drive motors.
///
/// Every call is fallible. Implementations report a missing or unusable value
/// as an error instead of inventing one; the controllers decide the fallback.
pub trait Hub {
    /// Current yaw in degrees, positive to the right.
    fn yaw(&mut self) -> Result<f64, HardwareError>;

    /// Zero the yaw reference at the current orientation.
    fn reset_yaw(&mut self) -> Result<(), HardwareError>;

    /// Encoder position of a drive wheel in degrees since its last reset.
    fn wheel_degrees(&mut self, wheel: Wheel) -> Result<f64, HardwareError>;

    /// Zero a drive wheel encoder.
    fn reset_wheel_degrees(&mut self, wheel: Wheel) -> Result<(), HardwareError>;

    /// Reflected light in percent (0..=100) from the colour sensor on `port`.
    fn reflection(&mut self, port: SensorPort) -> Result<f64, HardwareError>;

    /// Drive the motor pair with a steering bias in `[-100, 100]` and a
    /// velocity in wheel degrees per second.
    fn move_steering(&mut self, steering: i32, velocity: i32) -> Result<(), HardwareError>;

    /// Run a single drive motor at `velocity` degrees per second.
    fn run_wheel(&mut self, wheel: Wheel, velocity: i32) -> Result<(), HardwareError>;

    /// Stop both drive motors.
    fn stop(&mut self) -> Result<(), HardwareError>;
}

/// Neutral yaw used when the gyro cannot be read.
pub const DEFAULT_YAW: f64 = 0.0;
/// Neutral reflectance used when the colour sensor cannot be read.
pub const DEFAULT_REFLECTION: f64 = 50.0;
/// Encoder value used when a wheel encoder cannot be read.
pub const DEFAULT_WHEEL_DEGREES: f64 = 0.0;

/// Unwrap a sensor reading, substituting `default` when it is unavailable or
/// not a finite number.
pub(crate) fn read_or(reading: Result<f64, HardwareError>, default: f64, sensor: &'static str) -> f64 {
    match reading {
        Ok(value) if value.is_finite() => value,
        Ok(value) => {
            warn!(sensor, value, default, "non-finite reading, using default");
            default
        }
        Err(error) => {
            warn!(sensor, %error, default, "sensor read failed, using default");
            default
        }
    }
}

/// Log a failed actuation. The loop carries on and retries next iteration.
pub(crate) fn actuate(result: Result<(), HardwareError>, action: &'static str) {
    if let Err(error) = result {
        warn!(action, %error, "hub command failed");
    }
}
