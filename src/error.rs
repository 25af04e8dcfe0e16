use spike_kinematics::KinematicsError;
use thiserror::Error;

/// Replay setup and control errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid workspace bounds: {0}")]
    InvalidBounds(&'static str),
    #[error("initial pose {x}, {y}, {heading} is not finite")]
    NonFiniteInitialPose { x: f64, y: f64, heading: f64 },
    #[error("`{name}` must be positive and finite, got {value}")]
    InvalidSetting { name: &'static str, value: f64 },
    #[error("invalid drive geometry: {0}")]
    Geometry(#[from] KinematicsError),
    #[error("no routine named `{0}`")]
    UnknownRoutine(String),
    #[error("failed to spawn playback worker")]
    Spawn(#[source] std::io::Error),
}
