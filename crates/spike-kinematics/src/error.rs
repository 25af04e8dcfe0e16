//! Errors raised when drive geometry or an integration step is rejected.

use core::fmt;

/// Rejected kinematic input. Each variant carries the offending value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KinematicsError {
    /// Wheel radius in millimetres that is zero, negative, NaN or infinite.
    WheelRadius(f64),
    /// Wheel base (track width) in millimetres that is zero, negative, NaN or
    /// infinite.
    WheelBase(f64),
    /// Integration interval below zero.
    NegativeTimeDelta(f64),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::WheelRadius(r) => {
                write!(f, "wheel radius must be a positive finite length, got {r} mm")
            }
            KinematicsError::WheelBase(b) => {
                write!(f, "wheel base must be a positive finite length, got {b} mm")
            }
            KinematicsError::NegativeTimeDelta(dt) => {
                write!(f, "cannot integrate over a negative interval ({dt} s)")
            }
        }
    }
}

impl core::error::Error for KinematicsError {}
