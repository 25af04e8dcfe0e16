//! Headless kinematic replay of hub mission routines.
//!
//! Routines are extracted from mission source by `spike-extract`, then
//! animated frame by frame on a simulated differential-drive robot inside a
//! rectangular workspace. The pose is shared through a [`blackboard`] and
//! broadcast on a [`bus::Topic`] for whatever presents it.

pub mod blackboard;
pub mod bus;
pub mod config;
pub mod error;
pub mod replay;
