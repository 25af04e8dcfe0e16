//! Frame-by-frame animation of one routine's instructions.
//!
//! Replay approximates what each controller call achieves, it does not re-run
//! the control loop: a turn rotates toward its target at a fixed rate, a
//! follow drives straight along the heading it starts with.

use spike_extract::{Instruction, InstructionKind};
use spike_kinematics::{DifferentialDrive, normalize_angle, shortest_error};
use tracing::{debug, warn};

use crate::blackboard::{RobotPose, SimStatus};
use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::replay::Bounds;

/// A turn this close to its target snaps onto it.
const TURN_SNAP_DEG: f64 = 1.0;

/// Speed model and workspace shared by every playback of an engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionModel {
    pub drive: DifferentialDrive,
    pub pixel_scale: f64,
    /// Global speed scale times the playback multiplier.
    pub speed_factor: f64,
    pub frame_rate: f64,
    /// mm/s
    pub default_linear_speed: f64,
    /// °/s
    pub default_turn_rate: f64,
    pub bounds: Bounds,
    pub halt_on_out_of_bounds: bool,
}

impl MotionModel {
    pub fn from_config(cfg: &ReplayConfig) -> Result<Self, ReplayError> {
        Ok(Self {
            drive: DifferentialDrive::new(cfg.wheel_radius, cfg.wheel_base)?,
            pixel_scale: cfg.pixel_scale,
            speed_factor: cfg.speed_scale * cfg.run_speed_mult,
            frame_rate: cfg.frame_rate,
            default_linear_speed: cfg.default_linear_speed,
            default_turn_rate: cfg.default_turn_rate,
            bounds: cfg.bounds,
            halt_on_out_of_bounds: cfg.halt_on_out_of_bounds,
        })
    }

    /// Per-frame motion for `instr`, or `None` if replay has nothing to show for it.
    fn plan(&self, instr: &Instruction) -> Option<Motion> {
        match instr.kind {
            InstructionKind::HeadingTurn => {
                let target = normalize_angle(instr.number("heading")?);
                let rate = match instr.number("speed") {
                    Some(speed) if speed != 0.0 => speed.abs(),
                    _ => self.default_turn_rate,
                };
                Some(Motion::Turn {
                    target,
                    step: rate * self.speed_factor / self.frame_rate,
                })
            }
            InstructionKind::HeadingFollow | InstructionKind::LineFollow => {
                // The distance is a magnitude; the speed's sign picks the direction.
                let degrees = instr.number("distance")?.abs();
                let speed = instr.number("speed");
                let degrees = if speed.is_some_and(|s| s < 0.0) { -degrees } else { degrees };
                self.drive_motion(degrees, speed)
            }
            InstructionKind::MotorRunForDegrees => {
                let degrees = instr.number("degrees")?;
                let reversed = instr.number("velocity").is_some_and(|v| v < 0.0);
                self.drive_motion(if reversed { -degrees } else { degrees }, None)
            }
            InstructionKind::PairMoveForDegrees => self.drive_motion(instr.number("degrees")?, None),
            InstructionKind::MotorRunToPosition | InstructionKind::RawCall => None,
        }
    }

    /// Straight move of `degrees` signed wheel travel at `speed` wheel °/s.
    fn drive_motion(&self, degrees: f64, speed: Option<f64>) -> Option<Motion> {
        let mm = self.drive.wheel_degrees_to_mm(degrees);
        if mm == 0.0 || !mm.is_finite() {
            return None;
        }
        let velocity = speed
            .map(|s| self.drive.wheel_degrees_to_mm(s.abs()) * self.speed_factor)
            .filter(|v| *v > 0.0)
            .unwrap_or(self.default_linear_speed * self.speed_factor);
        let duration = mm.abs() / velocity;
        let frames = ((duration * self.frame_rate).floor() as u64).max(1);
        Some(Motion::Drive {
            frames,
            step: mm * self.pixel_scale / frames as f64,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    /// Rotate toward `target` by at most `step` degrees per frame.
    Turn { target: f64, step: f64 },
    /// Advance `step` workspace units along the heading for `frames` more frames.
    Drive { frames: u64, step: f64 },
}

/// Result of one [`Playback::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running,
    Finished,
}

/// Playback state machine for one routine. Owns no shared state: the caller
/// passes the locked pose into every tick.
#[derive(Debug)]
pub struct Playback {
    routine: String,
    instructions: Vec<Instruction>,
    next: usize,
    motion: Option<Motion>,
    model: MotionModel,
    frames: u64,
}

impl Playback {
    pub fn new(routine: impl Into<String>, instructions: Vec<Instruction>, model: MotionModel) -> Self {
        Self {
            routine: routine.into(),
            instructions,
            next: 0,
            motion: None,
            model,
            frames: 0,
        }
    }

    pub fn routine(&self) -> &str {
        &self.routine
    }

    /// Frames simulated so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Advance one frame.
    ///
    /// Returns [`Tick::Finished`] once every instruction is done, after
    /// setting a `Running` status back to `Idle`. An `OutOfBounds` status is
    /// left as is.
    pub fn tick(&mut self, state: &mut RobotPose) -> Tick {
        let motion = match self.motion.take().or_else(|| self.plan_next()) {
            Some(motion) => motion,
            None => {
                if matches!(state.status, SimStatus::Running(_)) {
                    state.status = SimStatus::Idle;
                }
                return Tick::Finished;
            }
        };
        self.frames += 1;
        self.motion = self.apply(motion, state);
        Tick::Running
    }

    fn plan_next(&mut self) -> Option<Motion> {
        while let Some(instr) = self.instructions.get(self.next) {
            self.next += 1;
            match self.model.plan(instr) {
                Some(motion) => {
                    debug!(routine = %self.routine, line = instr.line, call = %instr.call, ?motion, "replaying");
                    return Some(motion);
                }
                None => debug!(routine = %self.routine, line = instr.line, call = %instr.call, "nothing to replay"),
            }
        }
        None
    }

    /// Apply one frame of `motion`; returns what is left of it.
    fn apply(&mut self, motion: Motion, state: &mut RobotPose) -> Option<Motion> {
        match motion {
            Motion::Turn { target, step } => {
                let error = shortest_error(target, state.pose.heading);
                if error.abs() <= TURN_SNAP_DEG {
                    state.pose.heading = target;
                    return None;
                }
                state.pose = state.pose.rotate(step.min(error.abs()).copysign(error));
                Some(motion)
            }
            Motion::Drive { frames, step } => {
                let moved = state.pose.advance(step);
                if self.model.bounds.contains(&moved) {
                    state.pose = moved;
                    return (frames > 1).then_some(Motion::Drive { frames: frames - 1, step });
                }

                state.pose = self.model.bounds.clamp(moved);
                state.status = SimStatus::OutOfBounds;
                warn!(routine = %self.routine, pose = %state.pose, "left the workspace, clamped to the edge");
                if self.model.halt_on_out_of_bounds {
                    self.next = self.instructions.len();
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use spike_extract::Literal;
    use spike_kinematics::Pose;

    use super::*;

    const EPSILON: f64 = 1e-6;

    fn instr(kind: InstructionKind, args: &[(&str, f64)]) -> Instruction {
        let fields: BTreeMap<String, Literal> = args
            .iter()
            .map(|(name, value)| (name.to_string(), Literal::Number(*value)))
            .collect();
        Instruction {
            source_routine: "run1_main".to_string(),
            line: 1,
            kind,
            call: kind.to_string(),
            fields,
            unresolved: BTreeMap::new(),
        }
    }

    fn model() -> MotionModel {
        let cfg = ReplayConfig {
            bounds: Bounds::new(0.0, 0.0, 2000.0, 1000.0),
            ..ReplayConfig::default()
        };
        MotionModel::from_config(&cfg).unwrap()
    }

    fn running(pose: Pose) -> RobotPose {
        RobotPose {
            pose,
            status: SimStatus::Running("run1_main".to_string()),
        }
    }

    /// Tick until finished, collecting the pose after every frame.
    fn run(playback: &mut Playback, state: &mut RobotPose) -> Vec<Pose> {
        let mut trail = Vec::new();
        while playback.tick(state) == Tick::Running {
            trail.push(state.pose);
            assert!(trail.len() < 100_000, "playback never finished");
        }
        trail
    }

    #[test]
    fn test_follow_distance_in_workspace_units() {
        let mut pb = Playback::new(
            "run1_main",
            vec![instr(InstructionKind::HeadingFollow, &[("heading", 0.0), ("speed", 50.0), ("distance", 1000.0)])],
            model(),
        );
        let mut state = running(Pose::new(0.0, 0.0, 0.0));
        run(&mut pb, &mut state);

        // 1000 wheel degrees on a 24 mm wheel.
        let expected = 1000.0 * 2.0 * std::f64::consts::PI * 24.0 / 360.0;
        assert!((state.pose.x - expected).abs() < EPSILON);
        assert!(state.pose.x > 0.0 && state.pose.x < 1000.0);
        assert!(state.pose.y.abs() < EPSILON);
        assert_eq!(state.pose.heading, 0.0);
        assert_eq!(state.status, SimStatus::Idle);
        // 62.8 mm/s for 6.67 s at 60 fps.
        assert!((399..=400).contains(&pb.frames()));
    }

    #[test]
    fn test_pixel_scale_applies_to_position() {
        let mut m = model();
        m.pixel_scale = 0.5;
        let mut pb = Playback::new(
            "run1_main",
            vec![instr(InstructionKind::HeadingFollow, &[("distance", 360.0)])],
            m,
        );
        let mut state = running(Pose::new(10.0, 10.0, 0.0));
        run(&mut pb, &mut state);
        let expected = 10.0 + 0.5 * 2.0 * std::f64::consts::PI * 24.0;
        assert!((state.pose.x - expected).abs() < EPSILON);
    }

    #[test]
    fn test_negative_speed_drives_backward() {
        let mut pb = Playback::new(
            "run1_main",
            vec![instr(InstructionKind::HeadingFollow, &[("speed", -50.0), ("distance", 360.0)])],
            model(),
        );
        let mut state = running(Pose::new(500.0, 500.0, 90.0));
        run(&mut pb, &mut state);
        // Heading 90 points down the screen; backing up reduces y.
        let expected = 500.0 - 2.0 * std::f64::consts::PI * 24.0;
        assert!((state.pose.y - expected).abs() < EPSILON);
        assert!((state.pose.x - 500.0).abs() < EPSILON);
    }

    #[test]
    fn test_turn_takes_shortest_path() {
        let mut pb = Playback::new(
            "run1_main",
            vec![instr(InstructionKind::HeadingTurn, &[("heading", -170.0)])],
            model(),
        );
        let mut state = running(Pose::new(500.0, 500.0, 170.0));
        let trail = run(&mut pb, &mut state);

        assert_eq!(state.pose.heading, -170.0);
        // Never swings through 0: every intermediate heading stays within 10° of 180.
        assert!(trail.iter().all(|p| p.heading.abs() >= 170.0 - EPSILON));
        // 4.5° per frame over 20°, then the remainder, then the snap.
        assert_eq!(trail.len(), 6);
        assert_eq!((state.pose.x, state.pose.y), (500.0, 500.0));
    }

    #[test]
    fn test_turn_rate_follows_speed() {
        let mut pb = Playback::new(
            "run1_main",
            vec![instr(InstructionKind::HeadingTurn, &[("heading", 90.0), ("speed", -20.0)])],
            model(),
        );
        let mut state = running(Pose::default());
        pb.tick(&mut state);
        // |−20| °/s * 3 / 60 fps.
        assert!((state.pose.heading - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_out_of_bounds_clamps_and_moves_on() {
        let mut pb = Playback::new(
            "run1_main",
            vec![
                instr(InstructionKind::HeadingFollow, &[("distance", 10_000.0)]),
                instr(InstructionKind::HeadingTurn, &[("heading", 90.0)]),
            ],
            model(),
        );
        let mut state = running(Pose::new(0.0, 0.0, 0.0));
        run(&mut pb, &mut state);
        assert_eq!(state.status, SimStatus::OutOfBounds);
        assert_eq!(state.pose.x, 2000.0);
        assert_eq!(state.pose.heading, 90.0);
    }

    #[test]
    fn test_out_of_bounds_can_halt_routine() {
        let mut m = model();
        m.halt_on_out_of_bounds = true;
        let mut pb = Playback::new(
            "run1_main",
            vec![
                instr(InstructionKind::HeadingFollow, &[("distance", 10_000.0)]),
                instr(InstructionKind::HeadingTurn, &[("heading", 90.0)]),
            ],
            m,
        );
        let mut state = running(Pose::new(0.0, 0.0, 0.0));
        run(&mut pb, &mut state);
        assert_eq!(state.status, SimStatus::OutOfBounds);
        assert_eq!(state.pose, Pose::new(2000.0, 0.0, 0.0));
    }

    #[test]
    fn test_motor_moves_use_default_speed() {
        let mut pb = Playback::new(
            "run1_main",
            vec![
                instr(InstructionKind::PairMoveForDegrees, &[("degrees", -360.0), ("steering", 0.0)]),
                instr(InstructionKind::MotorRunForDegrees, &[("degrees", 360.0), ("velocity", -500.0)]),
            ],
            model(),
        );
        let mut state = running(Pose::new(1000.0, 500.0, 0.0));
        run(&mut pb, &mut state);
        let circumference = 2.0 * std::f64::consts::PI * 24.0;
        assert!((state.pose.x - (1000.0 - 2.0 * circumference)).abs() < EPSILON);
        // 150.8 mm at 150 mm/s: one second of frames per move.
        assert_eq!(pb.frames(), 120);
    }

    #[test]
    fn test_unreplayable_instructions_are_skipped() {
        let mut pb = Playback::new(
            "run1_main",
            vec![
                instr(InstructionKind::RawCall, &[("arg0", 1.0)]),
                instr(InstructionKind::MotorRunToPosition, &[("position", 90.0)]),
                instr(InstructionKind::HeadingFollow, &[("heading", 0.0)]),
                instr(InstructionKind::HeadingTurn, &[]),
            ],
            model(),
        );
        let mut state = running(Pose::new(5.0, 5.0, 0.0));
        assert_eq!(pb.tick(&mut state), Tick::Finished);
        assert_eq!(state.pose, Pose::new(5.0, 5.0, 0.0));
        assert_eq!(state.status, SimStatus::Idle);
        assert_eq!(pb.frames(), 0);
    }
}
