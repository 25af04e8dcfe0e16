use std::time::Duration;

/// Tuning shared by the heading and line controllers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    /// Sleep between loop iterations.
    pub poll_interval: Duration,
    /// A turn is complete once the heading error is within this many degrees.
    pub turn_tolerance: f64,
    /// Wheel speed in degrees per second that 100 % maps to.
    pub max_wheel_speed: f64,
    /// Speed in percent used when a call leaves it out.
    pub default_speed: f64,
    /// Give up after this much loop time, counted in poll intervals.
    pub timeout: Option<Duration>,
    /// Zero the gyro before each loop, making targets relative to the start orientation.
    pub reset_yaw_on_start: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            turn_tolerance: 2.0,
            max_wheel_speed: 1000.0,
            default_speed: 50.0,
            timeout: None,
            reset_yaw_on_start: false,
        }
    }
}

impl ControlConfig {
    /// Whether the timeout alone is enough to end a loop.
    pub(crate) fn timeout_ends_loop(&self) -> bool {
        self.timeout
            .is_some_and(|limit| limit.is_zero() || !self.poll_interval.is_zero())
    }

    /// Whether `iterations` polls have used up the configured timeout.
    pub(crate) fn timed_out(&self, iterations: u64) -> bool {
        match self.timeout {
            Some(limit) => {
                let elapsed = self.poll_interval.saturating_mul(iterations.min(u32::MAX as u64) as u32);
                elapsed >= limit
            }
            None => false,
        }
    }
}
