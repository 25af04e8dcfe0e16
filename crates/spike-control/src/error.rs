//! This module defines the error types used by the `spike-control` crate.

#![warn(missing_docs)]

use thiserror::Error;

use crate::hardware::SensorPort;

/// Error returned by a hub collaborator call.
///
/// Controllers never propagate these: reads fall back to a documented neutral
/// value and failed actuation is logged, so a loop keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    /// The device answered without a usable value.
    #[error("{0} reading unavailable")]
    Unavailable(&'static str),
    /// Nothing is plugged into the addressed port.
    #[error("nothing connected on port {0}")]
    Disconnected(SensorPort),
    /// Any other driver failure.
    #[error("device fault: {0}")]
    Fault(String),
}

/// Error type for controller invocations.
///
/// Only raised while validating parameters, before the robot moves.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// A numeric parameter is out of its valid domain.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the call.
        name: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A follow loop was given neither a distance limit nor a stop condition.
    #[error("loop has neither a distance limit nor a stop condition and would never finish")]
    Unbounded,
}

pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<f64, ControlError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ControlError::InvalidParameter {
            name,
            reason: "must be finite",
        })
    }
}
