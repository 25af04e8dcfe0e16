//! Scripted hub for controller tests.

use spike_kinematics::normalize_angle;

use crate::error::HardwareError;
use crate::hardware::{Hub, SensorPort, Wheel};

/// Seconds of motion each motor command stands for.
const STEP_SECONDS: f64 = 0.01;

pub(crate) struct MockHub {
    pub heading: f64,
    /// Heading change per command at full steering while driving forward.
    pub turn_per_step: f64,
    pub left: f64,
    pub right: f64,
    pub yaw_fails: bool,
    pub encoder_fails: bool,
    pub reflection: Option<f64>,
    pub steering_log: Vec<(i32, i32)>,
    pub wheel_log: Vec<(Wheel, i32)>,
    pub stops: usize,
    pub yaw_resets: usize,
}

impl MockHub {
    pub fn new(heading: f64) -> Self {
        Self {
            heading,
            turn_per_step: 5.0,
            left: 0.0,
            right: 0.0,
            yaw_fails: false,
            encoder_fails: false,
            reflection: Some(50.0),
            steering_log: Vec::new(),
            wheel_log: Vec::new(),
            stops: 0,
            yaw_resets: 0,
        }
    }
}

impl Hub for MockHub {
    fn yaw(&mut self) -> Result<f64, HardwareError> {
        if self.yaw_fails {
            Err(HardwareError::Unavailable("yaw"))
        } else {
            Ok(self.heading)
        }
    }

    fn reset_yaw(&mut self) -> Result<(), HardwareError> {
        self.heading = 0.0;
        self.yaw_resets += 1;
        Ok(())
    }

    fn wheel_degrees(&mut self, wheel: Wheel) -> Result<f64, HardwareError> {
        if self.encoder_fails {
            return Err(HardwareError::Fault("encoder".into()));
        }
        Ok(match wheel {
            Wheel::Left => self.left,
            Wheel::Right => self.right,
        })
    }

    fn reset_wheel_degrees(&mut self, wheel: Wheel) -> Result<(), HardwareError> {
        match wheel {
            Wheel::Left => self.left = 0.0,
            Wheel::Right => self.right = 0.0,
        }
        Ok(())
    }

    fn reflection(&mut self, port: SensorPort) -> Result<f64, HardwareError> {
        self.reflection.ok_or(HardwareError::Disconnected(port))
    }

    fn move_steering(&mut self, steering: i32, velocity: i32) -> Result<(), HardwareError> {
        self.steering_log.push((steering, velocity));
        let direction = if velocity == 0 { 0.0 } else { (velocity as f64).signum() };
        self.heading =
            normalize_angle(self.heading + self.turn_per_step * steering as f64 / 100.0 * direction);
        self.right += velocity as f64 * STEP_SECONDS;
        self.left -= velocity as f64 * STEP_SECONDS;
        Ok(())
    }

    fn run_wheel(&mut self, wheel: Wheel, velocity: i32) -> Result<(), HardwareError> {
        self.wheel_log.push((wheel, velocity));
        match wheel {
            Wheel::Left => self.left += velocity as f64 * STEP_SECONDS,
            Wheel::Right => self.right += velocity as f64 * STEP_SECONDS,
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        self.stops += 1;
        Ok(())
    }
}
