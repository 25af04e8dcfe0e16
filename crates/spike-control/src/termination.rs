//! Stop conditions for the follow loops.
//!
//! A loop ends when the distance limit is reached OR the condition returns
//! `true`, whichever comes first. A condition that returns an error counts as
//! "not yet".

use std::fmt;

use tracing::debug;

use crate::hardware::{DEFAULT_WHEEL_DEGREES, Hub, Wheel, read_or};

/// Zero-argument stop predicate supplied by mission code.
pub type Condition<'a> = Box<dyn FnMut() -> anyhow::Result<bool> + 'a>;

/// Why a controller loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Heading error fell within tolerance.
    OnHeading,
    /// The distance limit was reached.
    Distance,
    /// The stop condition returned `true`.
    Condition,
    /// The configured timeout elapsed first.
    Timeout,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::OnHeading => "on heading",
            StopReason::Distance => "distance reached",
            StopReason::Condition => "condition met",
            StopReason::Timeout => "timed out",
        };
        f.write_str(s)
    }
}

/// Distance limit plus optional stop condition for a follow loop.
///
/// The distance is in wheel degrees and signed. A non-negative limit is
/// measured on the right wheel and reached once the travelled distance is at
/// least the limit. A negative limit is measured on the mirrored left wheel,
/// whose count falls while driving forward, and is reached once the travelled
/// distance is at most the limit. "Travelled" follows the commanded direction:
/// with a negative speed the encoder reading is negated before comparing.
#[derive(Default)]
pub struct Termination<'a> {
    distance: Option<f64>,
    condition: Option<Condition<'a>>,
}

impl<'a> Termination<'a> {
    /// No limits at all. Follow loops reject this.
    pub fn none() -> Self {
        Self::default()
    }

    /// Stop after `degrees` of wheel travel.
    pub fn distance(degrees: f64) -> Self {
        Self {
            distance: Some(degrees),
            condition: None,
        }
    }

    /// Stop once `condition` returns `true`.
    pub fn condition(condition: impl FnMut() -> anyhow::Result<bool> + 'a) -> Self {
        Self {
            distance: None,
            condition: Some(Box::new(condition)),
        }
    }

    /// Add a distance limit.
    pub fn with_distance(mut self, degrees: f64) -> Self {
        self.distance = Some(degrees);
        self
    }

    /// Add a stop condition.
    pub fn with_condition(mut self, condition: impl FnMut() -> anyhow::Result<bool> + 'a) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    /// Distance limit in wheel degrees, if any.
    pub fn distance_limit(&self) -> Option<f64> {
        self.distance
    }

    /// Whether at least one sub-condition can end the loop.
    pub fn is_bounded(&self) -> bool {
        self.distance.is_some() || self.condition.is_some()
    }

    /// Encoder the distance limit is measured on.
    pub fn reference_wheel(&self) -> Wheel {
        match self.distance {
            Some(d) if d < 0.0 => Wheel::Left,
            _ => Wheel::Right,
        }
    }

    /// Evaluate the limits once. `speed` is the commanded speed, whose sign
    /// gives the direction distance accumulates in.
    pub(crate) fn check<H: Hub + ?Sized>(&mut self, hub: &mut H, speed: f64) -> Option<StopReason> {
        if let Some(limit) = self.distance {
            let reading = read_or(
                hub.wheel_degrees(self.reference_wheel()),
                DEFAULT_WHEEL_DEGREES,
                "wheel encoder",
            );
            if distance_reached(limit, reading, speed) {
                return Some(StopReason::Distance);
            }
        }

        if let Some(condition) = self.condition.as_mut() {
            match condition() {
                Ok(true) => return Some(StopReason::Condition),
                Ok(false) => {}
                Err(error) => {
                    debug!(%error, "stop condition failed, treating as not satisfied");
                }
            }
        }

        None
    }
}

impl fmt::Debug for Termination<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Termination")
            .field("distance", &self.distance)
            .field("condition", &self.condition.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

fn distance_reached(limit: f64, reading: f64, speed: f64) -> bool {
    let travelled = if speed < 0.0 { -reading } else { reading };
    if limit >= 0.0 {
        travelled >= limit
    } else {
        travelled <= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_reached_forward_and_backward() {
        assert!(!distance_reached(500.0, 499.0, 50.0));
        assert!(distance_reached(500.0, 500.0, 50.0));
        // Driving backward the right encoder counts down.
        assert!(distance_reached(500.0, -510.0, -50.0));
        assert!(!distance_reached(500.0, 510.0, -50.0));
        // Negative limits read the mirrored left wheel.
        assert!(distance_reached(-300.0, -300.0, 40.0));
        assert!(!distance_reached(-300.0, -200.0, 40.0));
    }

    #[test]
    fn test_reference_wheel_follows_sign() {
        assert_eq!(Termination::distance(100.0).reference_wheel(), Wheel::Right);
        assert_eq!(Termination::distance(-100.0).reference_wheel(), Wheel::Left);
        assert_eq!(Termination::condition(|| Ok(false)).reference_wheel(), Wheel::Right);
    }

    #[test]
    fn test_bounded() {
        assert!(!Termination::none().is_bounded());
        assert!(Termination::distance(1.0).is_bounded());
        assert!(Termination::none().with_condition(|| Ok(true)).is_bounded());
    }

    #[test]
    fn test_with_distance_keeps_condition() {
        let termination = Termination::condition(|| Ok(false)).with_distance(-120.0);
        assert_eq!(termination.distance_limit(), Some(-120.0));
        assert_eq!(termination.reference_wheel(), Wheel::Left);
        assert!(termination.is_bounded());
    }
}
