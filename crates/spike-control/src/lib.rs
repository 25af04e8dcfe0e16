//! Closed-loop drive behaviours for a two-wheel hub robot.
//!
//! The controllers poll the hub at a fixed interval and never fail once the
//! robot is moving: unreadable sensors fall back to neutral values, failed
//! motor commands are logged and retried on the next iteration, and a stop
//! condition that errors counts as not yet satisfied. Parameter validation is
//! the only source of [`ControlError`].

pub mod command;
pub mod config;
pub mod error;
pub mod hardware;
pub mod heading;
pub mod line;
pub mod pacing;
pub mod termination;

#[cfg(test)]
mod mock;

pub use command::{ControllerCommand, WheelCommand};
pub use config::ControlConfig;
pub use error::{ControlError, HardwareError};
pub use hardware::{Hub, SensorPort, Wheel};
pub use heading::{FollowParams, Outcome, TurnParams, follow_heading, steering_command, turn_to_heading};
pub use line::{LineParams, LineSide, line_follow, line_follow_step};
pub use pacing::{Immediate, SpinTicker, Ticker};
pub use termination::{Condition, StopReason, Termination};
