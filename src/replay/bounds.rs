use serde::{Deserialize, Serialize};
use spike_kinematics::Pose;

use crate::error::ReplayError;

/// Axis-aligned workspace rectangle in workspace units. Edges are inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Bounds {
    /// A competition table, 2362 x 1143 mm.
    fn default() -> Self {
        Self::new(0.0, 0.0, 2362.0, 1143.0)
    }
}

impl Bounds {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Rejects non-finite edges and zero or negative area.
    pub fn validate(&self) -> Result<(), ReplayError> {
        let edges = [self.min_x, self.min_y, self.max_x, self.max_y];
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(ReplayError::InvalidBounds("edges must be finite"));
        }
        if self.width() <= 0.0 {
            return Err(ReplayError::InvalidBounds("width must be positive"));
        }
        if self.height() <= 0.0 {
            return Err(ReplayError::InvalidBounds("height must be positive"));
        }
        Ok(())
    }

    pub fn contains(&self, pose: &Pose) -> bool {
        (self.min_x..=self.max_x).contains(&pose.x) && (self.min_y..=self.max_y).contains(&pose.y)
    }

    /// `pose` with its position clamped onto the rectangle. Heading is kept.
    pub fn clamp(&self, pose: Pose) -> Pose {
        Pose {
            x: pose.x.clamp(self.min_x, self.max_x),
            y: pose.y.clamp(self.min_y, self.max_y),
            ..pose
        }
    }
}
