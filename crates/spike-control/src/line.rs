//! Reflectance line follower.
//!
//! Same iterate, clamp and terminate skeleton as the heading follower, but
//! the error comes from the colour sensor and each wheel is driven on its own:
//! `left = -(speed + error)`, `right = speed - error`. The left motor is
//! mirrored, hence the negation.

use tracing::{debug, info};

use crate::command::{WheelCommand, clamp_percent, percent_to_velocity};
use crate::config::ControlConfig;
use crate::error::{ControlError, require_finite};
use crate::hardware::{DEFAULT_REFLECTION, DEFAULT_YAW, Hub, SensorPort, Wheel, actuate, read_or};
use crate::heading::Outcome;
use crate::pacing::Ticker;
use crate::termination::{StopReason, Termination};

/// Which side of the line edge the bright surface is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSide {
    /// Light to the right of the line; error is `target - reflection`.
    #[default]
    LightOnRight,
    /// Light to the left; error is `reflection - target`.
    LightOnLeft,
}

impl LineSide {
    /// Map the block flag: `1` is light on the right, anything else the left.
    pub fn from_flag(flag: i64) -> Self {
        if flag == 1 {
            LineSide::LightOnRight
        } else {
            LineSide::LightOnLeft
        }
    }
}

/// Parameters of a line-follow run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParams {
    /// Base speed in percent.
    pub speed: f64,
    /// Proportional gain from reflectance error to wheel bias.
    pub gain: f64,
    /// Reflectance on the line edge, in percent.
    pub target: f64,
    /// Side the light surface is on.
    pub side: LineSide,
    /// Colour sensor port.
    pub port: SensorPort,
}

impl Default for LineParams {
    fn default() -> Self {
        Self {
            speed: 50.0,
            gain: 1.0,
            target: 50.0,
            side: LineSide::LightOnRight,
            port: SensorPort::C,
        }
    }
}

impl LineParams {
    fn validate(&self) -> Result<(), ControlError> {
        require_finite("speed", self.speed)?;
        require_finite("gain", self.gain)?;
        require_finite("target", self.target)?;
        Ok(())
    }
}

/// Scaled reflectance error for the chosen line side.
pub fn line_error(reflection: f64, target: f64, gain: f64, side: LineSide) -> f64 {
    match side {
        LineSide::LightOnRight => (target - reflection) * gain,
        LineSide::LightOnLeft => (reflection - target) * gain,
    }
}

/// Per-wheel power for a base speed and a scaled error.
pub fn wheel_command(speed: f64, error: f64) -> WheelCommand {
    WheelCommand {
        left: clamp_percent(-(speed + error)),
        right: clamp_percent(speed - error),
    }
}

/// Read the sensor once and drive both wheels accordingly.
///
/// An unreadable sensor counts as the neutral reflectance of 50.
pub fn line_follow_step<H: Hub + ?Sized>(
    hub: &mut H,
    config: &ControlConfig,
    params: &LineParams,
) -> Result<WheelCommand, ControlError> {
    params.validate()?;
    Ok(drive_step(hub, config, params))
}

fn drive_step<H: Hub + ?Sized>(hub: &mut H, config: &ControlConfig, params: &LineParams) -> WheelCommand {
    let reflection = read_or(hub.reflection(params.port), DEFAULT_REFLECTION, "reflection");
    let error = line_error(reflection, params.target, params.gain, params.side);
    let cmd = wheel_command(params.speed, error);
    debug!(reflection, error, left = cmd.left, right = cmd.right, "line step");

    actuate(
        hub.run_wheel(Wheel::Left, percent_to_velocity(cmd.left as f64, config.max_wheel_speed)),
        "run left wheel",
    );
    actuate(
        hub.run_wheel(Wheel::Right, percent_to_velocity(cmd.right as f64, config.max_wheel_speed)),
        "run right wheel",
    );
    cmd
}

/// Follow the line edge until `termination` fires, then stop.
///
/// # Errors
///
/// Returns `ControlError::Unbounded` when `termination` has neither a distance
/// nor a condition and no reachable timeout is configured.
pub fn line_follow<H, T>(
    hub: &mut H,
    ticker: &mut T,
    config: &ControlConfig,
    params: &LineParams,
    mut termination: Termination<'_>,
) -> Result<Outcome, ControlError>
where
    H: Hub + ?Sized,
    T: Ticker + ?Sized,
{
    params.validate()?;
    if let Some(distance) = termination.distance_limit() {
        require_finite("distance", distance)?;
    }
    if !termination.is_bounded() && !config.timeout_ends_loop() {
        return Err(ControlError::Unbounded);
    }

    actuate(
        hub.reset_wheel_degrees(termination.reference_wheel()),
        "reset wheel encoder",
    );

    info!(speed = params.speed, gain = params.gain, target = params.target, port = %params.port, "line follow");
    let mut iterations = 0u64;
    let reason = loop {
        if config.timed_out(iterations) {
            break StopReason::Timeout;
        }
        drive_step(hub, config, params);
        iterations += 1;

        if let Some(reason) = termination.check(hub, params.speed) {
            break reason;
        }
        ticker.wait(config.poll_interval);
    };

    actuate(hub.stop(), "stop");
    let heading = read_or(hub.yaw(), DEFAULT_YAW, "yaw");
    info!(%reason, iterations, "line follow finished");
    Ok(Outcome {
        reason,
        iterations,
        heading,
    })
}
