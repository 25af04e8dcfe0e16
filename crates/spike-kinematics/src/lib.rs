#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for heading arithmetic and 2D differential-drive kinematics."]
#![doc = ""]
#![doc = "Angles are in degrees, lengths in millimetres and wheel rotation in wheel degrees,"]
#![doc = "the units a hub gyro and motor encoders report. The workspace frame is screen-style:"]
#![doc = "x grows to the right, y grows downward, and a positive heading change turns the robot"]
#![doc = "to the right (clockwise seen from above), matching the hub yaw convention."]

use core::f64::consts::PI;
use core::fmt;
use libm::{cos, fmod, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::KinematicsError;

/// Normalize an angle in degrees into `(-180, 180]`.
///
/// `180` maps to itself and `-180` maps to `180`. The result is idempotent:
/// normalizing an already normalized angle returns it unchanged. Non-finite
/// input is returned as NaN.
pub fn normalize_angle(degrees: f64) -> f64 {
    let a = fmod(degrees, 360.0);
    if a <= -180.0 {
        a + 360.0
    } else if a > 180.0 {
        a - 360.0
    } else {
        a
    }
}

/// Signed shortest rotation from `current` to `target`, in degrees.
///
/// The magnitude never exceeds 180. A positive result means the heading has
/// to increase (turn right) to reach the target.
pub fn shortest_error(target: f64, current: f64) -> f64 {
    normalize_angle(target - current)
}

/// A 2‑D pose `(x, y, heading)` in millimetres (or workspace units) and degrees.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Workspace x position.
    pub x: f64,
    /// Workspace y position (grows downward).
    pub y: f64,
    /// Heading in degrees, normalized to `(-180, 180]`.
    pub heading: f64,
}

impl Pose {
    /// Construct a new pose. The heading is normalized.
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Pose {
            x,
            y,
            heading: normalize_angle(heading),
        }
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }

    /// Returns the pose moved `distance` units along its current heading.
    ///
    /// A negative distance moves backward. The heading is left unchanged.
    pub fn advance(&self, distance: f64) -> Pose {
        let rad = self.heading.to_radians();
        Pose {
            x: self.x + distance * cos(rad),
            y: self.y + distance * sin(rad),
            heading: self.heading,
        }
    }

    /// Returns the pose rotated by `delta` degrees, re-normalized.
    pub fn rotate(&self, delta: f64) -> Pose {
        Pose {
            heading: normalize_angle(self.heading + delta),
            ..*self
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.1}, y: {:.1}, heading: {:.1}°)", self.x, self.y, self.heading)
    }
}

/// Left and right wheel speeds in wheel degrees per second.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpeeds {
    /// Left wheel speed (°/s), positive drives the robot forward.
    pub left: f64,
    /// Right wheel speed (°/s), positive drives the robot forward.
    pub right: f64,
}

impl WheelSpeeds {
    /// Construct wheel speeds.
    pub const fn new(left: f64, right: f64) -> Self {
        WheelSpeeds { left, right }
    }
}

/// Linear and angular chassis velocities.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Linear speed of the chassis centre (mm/s).
    pub v: f64,
    /// Heading rate (°/s), positive turns right.
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    pub const fn new(v: f64, omega: f64) -> Self {
        ChassisSpeeds { v, omega }
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.1} mm/s, ω: {:.1} °/s)", self.v, self.omega)
    }
}

/// Differential‑drive kinematics helper.
///
/// Holds the wheel radius and the distance between the two drive wheels, and
/// converts between encoder degrees and travelled millimetres.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDrive {
    /// Wheel radius (mm).
    wheel_radius: f64,
    /// Distance between the wheel contact points (mm).
    wheel_base: f64,
}

impl DifferentialDrive {
    /// Construct a new differential‑drive helper.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::WheelRadius)` if `wheel_radius` is not
    /// positive and finite, and `Err(KinematicsError::WheelBase)` likewise for
    /// `wheel_base`.
    pub fn new(wheel_radius: f64, wheel_base: f64) -> Result<Self, KinematicsError> {
        if !(wheel_radius > 0.0 && wheel_radius.is_finite()) {
            return Err(KinematicsError::WheelRadius(wheel_radius));
        }
        if !(wheel_base > 0.0 && wheel_base.is_finite()) {
            return Err(KinematicsError::WheelBase(wheel_base));
        }
        Ok(DifferentialDrive {
            wheel_radius,
            wheel_base,
        })
    }

    /// Returns the wheel radius.
    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Returns the wheel base.
    pub fn wheel_base(&self) -> f64 {
        self.wheel_base
    }

    /// Linear travel of a wheel turned by `degrees`, in millimetres.
    pub fn wheel_degrees_to_mm(&self, degrees: f64) -> f64 {
        degrees * (2.0 * PI * self.wheel_radius / 360.0)
    }

    /// Wheel degrees needed to travel `mm` millimetres.
    pub fn mm_to_wheel_degrees(&self, mm: f64) -> f64 {
        mm * 360.0 / (2.0 * PI * self.wheel_radius)
    }

    /// Calculates chassis speeds from wheel speeds (forward kinematics).
    pub fn forward_kinematics(&self, wheel_speeds: WheelSpeeds) -> ChassisSpeeds {
        let v_l = self.wheel_degrees_to_mm(wheel_speeds.left);
        let v_r = self.wheel_degrees_to_mm(wheel_speeds.right);

        let v = (v_l + v_r) / 2.0;
        // Left wheel faster turns right, which is a positive heading change.
        let omega = ((v_l - v_r) / self.wheel_base).to_degrees();

        ChassisSpeeds::new(v, omega)
    }

    /// Calculates the wheel speeds required for the given chassis speeds
    /// (inverse kinematics).
    pub fn inverse_kinematics(&self, chassis_speeds: ChassisSpeeds) -> WheelSpeeds {
        let half_track = chassis_speeds.omega.to_radians() * (self.wheel_base / 2.0);
        let v_l = chassis_speeds.v + half_track;
        let v_r = chassis_speeds.v - half_track;

        WheelSpeeds::new(self.mm_to_wheel_degrees(v_l), self.mm_to_wheel_degrees(v_r))
    }

    /// Integrates chassis speeds over `dt` seconds starting from `current_pose`.
    ///
    /// The pose turns first and then translates along the new heading; the
    /// final heading is normalized to `(-180, 180]`.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn update_pose(
        &self,
        current_pose: Pose,
        chassis_speeds: ChassisSpeeds,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta(dt));
        }

        Ok(current_pose
            .rotate(chassis_speeds.omega * dt)
            .advance(chassis_speeds.v * dt))
    }
}

impl fmt::Display for DifferentialDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DifferentialDrive (r: {:.1} mm, base: {:.1} mm)",
            self.wheel_radius, self.wheel_base
        )
    }
}
