//! Gyro heading controller: pivot to a heading, or hold one while driving.
//!
//! Steering convention: a positive steering value turns the robot right,
//! which increases the yaw reading, and the steering command has the same
//! sign as the heading error (`steering = error * gain`). With a positive gain
//! this corrects while driving forward. Driving backward inverts the effect of
//! steering on heading, so reversing callers pass a negative gain. The gain is
//! used exactly as given.

use spike_kinematics::{normalize_angle, shortest_error};
use tracing::{debug, info};

use crate::command::{ControllerCommand, clamp_percent};
use crate::config::ControlConfig;
use crate::error::{ControlError, require_finite};
use crate::hardware::{DEFAULT_YAW, Hub, actuate, read_or};
use crate::pacing::Ticker;
use crate::termination::{StopReason, Termination};

/// Parameters of a pivot-to-heading turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnParams {
    /// Target heading in degrees.
    pub heading: f64,
    /// Steering magnitude. The sign is chosen from the error each iteration.
    pub steering: f64,
    /// Speed in percent, or the configured default.
    pub speed: Option<f64>,
}

/// Parameters of a heading-hold drive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowParams {
    /// Heading to hold in degrees.
    pub heading: f64,
    /// Proportional gain from heading error to steering. May be negative.
    pub gain: f64,
    /// Speed in percent, or the configured default. Negative drives backward.
    pub speed: Option<f64>,
}

/// Result of a finished controller loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    /// What ended the loop.
    pub reason: StopReason,
    /// Number of motor commands issued.
    pub iterations: u64,
    /// Last heading read, in degrees.
    pub heading: f64,
}

/// Proportional steering for a heading error, clamped to `[-100, 100]`.
pub fn steering_command(error: f64, gain: f64) -> i32 {
    clamp_percent(error * gain)
}

/// Pivot until the heading is within the configured tolerance of `params.heading`.
///
/// Each iteration issues a steering command of constant magnitude whose sign
/// points along the shortest rotation (flipped when the speed is negative, so
/// a reversing turn still converges). Stops the motors before returning.
pub fn turn_to_heading<H, T>(
    hub: &mut H,
    ticker: &mut T,
    config: &ControlConfig,
    params: &TurnParams,
) -> Result<Outcome, ControlError>
where
    H: Hub + ?Sized,
    T: Ticker + ?Sized,
{
    let target = normalize_angle(require_finite("heading", params.heading)?);
    let speed = require_finite("speed", params.speed.unwrap_or(config.default_speed))?;
    let magnitude = clamp_percent(require_finite("steering", params.steering)?.abs());
    if magnitude == 0 {
        return Err(ControlError::InvalidParameter {
            name: "steering",
            reason: "must be non-zero for a turn",
        });
    }
    let tolerance = require_finite("turn_tolerance", config.turn_tolerance)?;
    if tolerance < 0.0 {
        return Err(ControlError::InvalidParameter {
            name: "turn_tolerance",
            reason: "must not be negative",
        });
    }

    if config.reset_yaw_on_start {
        actuate(hub.reset_yaw(), "reset yaw");
    }

    info!(heading = target, speed, steering = magnitude, "turn to heading");
    let direction = if speed < 0.0 { -1.0 } else { 1.0 };
    let mut iterations = 0u64;
    let (reason, heading) = loop {
        let yaw = normalize_angle(read_or(hub.yaw(), DEFAULT_YAW, "yaw"));
        let error = shortest_error(target, yaw);
        if error.abs() <= tolerance {
            break (StopReason::OnHeading, yaw);
        }
        if config.timed_out(iterations) {
            break (StopReason::Timeout, yaw);
        }

        let steering = magnitude as f64 * error.signum() * direction;
        let cmd = ControllerCommand::new(steering, speed);
        debug!(yaw, error, steering = cmd.steering, "turn iteration");
        actuate(
            hub.move_steering(cmd.steering, cmd.velocity(config.max_wheel_speed)),
            "move steering",
        );
        iterations += 1;
        ticker.wait(config.poll_interval);
    };

    actuate(hub.stop(), "stop");
    info!(%reason, iterations, heading, "turn finished");
    Ok(Outcome {
        reason,
        iterations,
        heading,
    })
}

/// Hold `params.heading` while driving until `termination` fires.
///
/// Resets the encoder the distance limit is measured on, then each iteration
/// reads the yaw, issues `steering_command(error, gain)` at the given speed
/// and checks the termination. Stops the motors before returning.
///
/// # Errors
///
/// Returns `ControlError::Unbounded` when `termination` has neither a distance
/// nor a condition and no reachable timeout is configured, and
/// `ControlError::InvalidParameter` for non-finite input.
pub fn follow_heading<H, T>(
    hub: &mut H,
    ticker: &mut T,
    config: &ControlConfig,
    params: &FollowParams,
    mut termination: Termination<'_>,
) -> Result<Outcome, ControlError>
where
    H: Hub + ?Sized,
    T: Ticker + ?Sized,
{
    let target = normalize_angle(require_finite("heading", params.heading)?);
    let gain = require_finite("gain", params.gain)?;
    let speed = require_finite("speed", params.speed.unwrap_or(config.default_speed))?;
    if let Some(distance) = termination.distance_limit() {
        require_finite("distance", distance)?;
    }
    if !termination.is_bounded() && !config.timeout_ends_loop() {
        return Err(ControlError::Unbounded);
    }

    if config.reset_yaw_on_start {
        actuate(hub.reset_yaw(), "reset yaw");
    }
    actuate(
        hub.reset_wheel_degrees(termination.reference_wheel()),
        "reset wheel encoder",
    );

    info!(heading = target, gain, speed, distance = ?termination.distance_limit(), "follow heading");
    let mut iterations = 0u64;
    let (reason, heading) = loop {
        let yaw = normalize_angle(read_or(hub.yaw(), DEFAULT_YAW, "yaw"));
        if config.timed_out(iterations) {
            break (StopReason::Timeout, yaw);
        }

        let error = shortest_error(target, yaw);
        let cmd = ControllerCommand {
            steering: steering_command(error, gain),
            ..ControllerCommand::new(0.0, speed)
        };
        debug!(yaw, error, steering = cmd.steering, "follow iteration");
        actuate(
            hub.move_steering(cmd.steering, cmd.velocity(config.max_wheel_speed)),
            "move steering",
        );
        iterations += 1;

        if let Some(reason) = termination.check(hub, speed) {
            break (reason, yaw);
        }
        ticker.wait(config.poll_interval);
    };

    actuate(hub.stop(), "stop");
    info!(%reason, iterations, heading, "follow finished");
    Ok(Outcome {
        reason,
        iterations,
        heading,
    })
}
