use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use spike_kinematics::Pose;

/// What the simulated robot is doing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum SimStatus {
    #[default]
    Idle,
    /// Playing back the named routine.
    Running(String),
    Manual,
    Stopped,
    /// A playback step left the workspace; the pose was clamped to its edge.
    OutOfBounds,
}

impl fmt::Display for SimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimStatus::Idle => f.write_str("Idle"),
            SimStatus::Running(name) => write!(f, "Running({name})"),
            SimStatus::Manual => f.write_str("Manual"),
            SimStatus::Stopped => f.write_str("Stopped"),
            SimStatus::OutOfBounds => f.write_str("OutOfBounds"),
        }
    }
}

/// Pose plus status: the one piece of state playback and manual control share.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RobotPose {
    pub pose: Pose,
    pub status: SimStatus,
}

impl RobotPose {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            status: SimStatus::Idle,
        }
    }
}

impl fmt::Display for RobotPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.pose, self.status)
    }
}

/// Single coarse lock over the simulated robot.
pub type Blackboard = Arc<RwLock<RobotPose>>;

pub fn snapshot(bb: &Blackboard) -> RobotPose {
    (*bb.read()).clone()
}

pub fn set_status(bb: &Blackboard, status: SimStatus) {
    bb.write().status = status;
}
