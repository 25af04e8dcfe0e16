//! Clamped actuation commands.

use std::fmt;

/// Steering and speed pair sent to the motor pair.
///
/// Both fields are clamped to `[-100, 100]` and truncated toward zero on
/// construction. A negative speed drives backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerCommand {
    /// Differential bias, positive turns right.
    pub steering: i32,
    /// Percent of maximum wheel speed.
    pub speed: i32,
}

impl ControllerCommand {
    /// Build a command from raw controller outputs.
    pub fn new(steering: f64, speed: f64) -> Self {
        Self {
            steering: clamp_percent(steering),
            speed: clamp_percent(speed),
        }
    }

    /// Wheel velocity in degrees per second for this command's speed.
    pub fn velocity(&self, max_wheel_speed: f64) -> i32 {
        percent_to_velocity(self.speed as f64, max_wheel_speed)
    }
}

impl fmt::Display for ControllerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(steering: {}, speed: {}%)", self.steering, self.speed)
    }
}

/// Per-wheel power in percent for independently driven wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WheelCommand {
    /// Left motor power. The left motor is mirrored, so forward is negative.
    pub left: i32,
    /// Right motor power.
    pub right: i32,
}

/// Clamp to `[-100, 100]` and truncate toward zero. NaN maps to 0.
pub fn clamp_percent(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(-100.0, 100.0) as i32
}

/// Map a percent speed to wheel degrees per second.
pub fn percent_to_velocity(percent: f64, max_wheel_speed: f64) -> i32 {
    let pct = if percent.is_nan() { 0.0 } else { percent.clamp(-100.0, 100.0) };
    (pct * max_wheel_speed / 100.0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_clamps_both_fields() {
        let cmd = ControllerCommand::new(120.0, -150.0);
        assert_eq!(cmd.steering, 100);
        assert_eq!(cmd.speed, -100);

        let cmd = ControllerCommand::new(-7.9, 49.9);
        assert_eq!(cmd.steering, -7);
        assert_eq!(cmd.speed, 49);
    }

    #[test]
    fn test_velocity_mapping() {
        assert_eq!(percent_to_velocity(75.0, 1000.0), 750);
        assert_eq!(percent_to_velocity(-50.0, 1000.0), -500);
        assert_eq!(percent_to_velocity(250.0, 1000.0), 1000);
        assert_eq!(ControllerCommand::new(0.0, 20.0).velocity(1000.0), 200);
    }

    #[test]
    fn test_nan_is_neutral() {
        assert_eq!(clamp_percent(f64::NAN), 0);
        assert_eq!(percent_to_velocity(f64::NAN, 1000.0), 0);
    }
}
