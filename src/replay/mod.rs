//! Kinematic replay of extracted routines.
//!
//! The engine owns the shared [`Blackboard`] and at most one playback worker.
//! The worker ticks a [`Playback`] under the blackboard lock and checks its
//! cancel flag under that same lock before every tick, so once cancellation
//! is requested it never writes again. Starting another routine, stopping or
//! taking manual control cancels the worker and waits a bounded time for it.

mod bounds;
mod playback;

pub use bounds::Bounds;
pub use playback::{MotionModel, Playback, Tick};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use spike_extract::Instruction;
use spike_kinematics::{ChassisSpeeds, Pose};
use spin_sleep::SpinSleeper;
use tracing::{debug, info, warn};

use crate::blackboard::{Blackboard, RobotPose, SimStatus, set_status, snapshot};
use crate::bus::Topic;
use crate::config::ReplayConfig;
use crate::error::ReplayError;

const POSE_TOPIC_CAPACITY: usize = 64;

/// Directional inputs held during one manual-control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManualIntent {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
}

impl ManualIntent {
    pub fn is_active(&self) -> bool {
        self.forward || self.back || self.left || self.right
    }
}

struct Worker {
    routine: String,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct ReplayEngine {
    model: MotionModel,
    /// Workspace units per second.
    manual_speed: f64,
    /// Degrees per second.
    manual_rotate: f64,
    frame_period: Option<Duration>,
    join_timeout: Duration,
    initial: Pose,
    programs: BTreeMap<String, Vec<Instruction>>,
    blackboard: Blackboard,
    pose_topic: Topic<RobotPose>,
    worker: Option<Worker>,
}

fn require_positive(name: &'static str, value: f64) -> Result<f64, ReplayError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ReplayError::InvalidSetting { name, value })
    }
}

impl ReplayEngine {
    /// Validate `cfg` and place the robot at its initial pose, clamped into
    /// the workspace. `programs` maps routine names to their instructions.
    pub fn new(cfg: &ReplayConfig, programs: BTreeMap<String, Vec<Instruction>>) -> Result<Self, ReplayError> {
        cfg.bounds.validate()?;
        require_positive("pixel_scale", cfg.pixel_scale)?;
        require_positive("speed_scale", cfg.speed_scale)?;
        require_positive("run_speed_mult", cfg.run_speed_mult)?;
        require_positive("frame_rate", cfg.frame_rate)?;
        require_positive("default_linear_speed", cfg.default_linear_speed)?;
        require_positive("default_turn_rate", cfg.default_turn_rate)?;
        require_positive("manual_move_speed", cfg.manual_move_speed)?;
        require_positive("manual_rotate_speed", cfg.manual_rotate_speed)?;
        let model = MotionModel::from_config(cfg)?;

        let start = cfg.initial_pose;
        let requested = Pose::new(start.x, start.y, start.heading);
        if !requested.is_finite() {
            return Err(ReplayError::NonFiniteInitialPose {
                x: start.x,
                y: start.y,
                heading: start.heading,
            });
        }
        let initial = cfg.bounds.clamp(requested);
        if initial != requested {
            warn!(%requested, %initial, "initial pose outside the workspace, clamped");
        }

        info!(drive = %model.drive, routines = programs.len(), %initial, "replay engine ready");
        Ok(Self {
            model,
            manual_speed: cfg.manual_move_speed * cfg.speed_scale * cfg.pixel_scale,
            manual_rotate: cfg.manual_rotate_speed * cfg.speed_scale,
            frame_period: cfg.realtime.then(|| Duration::from_secs_f64(1.0 / cfg.frame_rate)),
            join_timeout: cfg.join_timeout(),
            initial,
            programs,
            blackboard: Arc::new(RwLock::new(RobotPose::new(initial))),
            pose_topic: Topic::new(POSE_TOPIC_CAPACITY),
            worker: None,
        })
    }

    /// Routine names in sorted order.
    pub fn routines(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    pub fn snapshot(&self) -> RobotPose {
        snapshot(&self.blackboard)
    }

    pub fn pose_topic(&self) -> &Topic<RobotPose> {
        &self.pose_topic
    }

    /// Whether a playback worker is still ticking.
    pub fn is_playing(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.handle.is_finished())
    }

    /// Cancel any running playback and start `routine` from the current pose.
    pub fn start(&mut self, routine: &str) -> Result<(), ReplayError> {
        let instructions = self
            .programs
            .get(routine)
            .cloned()
            .ok_or_else(|| ReplayError::UnknownRoutine(routine.to_string()))?;
        self.cancel_playback();

        let count = instructions.len();
        let playback = Playback::new(routine, instructions, self.model);
        let cancel = Arc::new(AtomicBool::new(false));
        set_status(&self.blackboard, SimStatus::Running(routine.to_string()));

        let spawned = std::thread::Builder::new().name("playback".into()).spawn({
            let bb = Arc::clone(&self.blackboard);
            let cancel = Arc::clone(&cancel);
            let topic = self.pose_topic.clone();
            let frame_period = self.frame_period;
            move || run_playback(playback, &bb, &cancel, &topic, frame_period)
        });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                set_status(&self.blackboard, SimStatus::Idle);
                return Err(ReplayError::Spawn(e));
            }
        };

        info!(routine, instructions = count, "playback started");
        self.worker = Some(Worker {
            routine: routine.to_string(),
            cancel,
            handle,
        });
        Ok(())
    }

    /// Cancel playback and mark the robot stopped where it is.
    pub fn stop(&mut self) {
        self.cancel_playback();
        let state = {
            let mut state = self.blackboard.write();
            state.status = SimStatus::Stopped;
            state.clone()
        };
        info!(pose = %state.pose, "stopped");
        self.pose_topic.publish(state);
    }

    /// Integrate one frame of manual control over `dt` seconds.
    ///
    /// Does nothing while no input is held. Otherwise any playback is
    /// cancelled first, then the robot turns, drives along its new heading
    /// and is clamped into the workspace.
    pub fn manual_step(&mut self, intent: ManualIntent, dt: f64) -> Result<(), ReplayError> {
        if !intent.is_active() {
            return Ok(());
        }
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(ReplayError::InvalidSetting { name: "dt", value: dt });
        }
        self.cancel_playback();

        let v = match (intent.forward, intent.back) {
            (true, _) => self.manual_speed,
            (false, true) => -self.manual_speed,
            (false, false) => 0.0,
        };
        let turn = f64::from(u8::from(intent.right)) - f64::from(u8::from(intent.left));
        let chassis = ChassisSpeeds::new(v, turn * self.manual_rotate);

        let state = {
            let mut state = self.blackboard.write();
            let moved = self.model.drive.update_pose(state.pose, chassis, dt)?;
            state.pose = self.model.bounds.clamp(moved);
            state.status = SimStatus::Manual;
            state.clone()
        };
        debug!(?intent, pose = %state.pose, "manual step");
        self.pose_topic.publish(state);
        Ok(())
    }

    /// Cancel playback and put the robot back at its initial pose, idle.
    pub fn restart(&mut self) {
        self.cancel_playback();
        let state = RobotPose::new(self.initial);
        *self.blackboard.write() = state.clone();
        info!(pose = %state.pose, "restarted");
        self.pose_topic.publish(state);
    }

    /// Block until the current playback finishes on its own.
    pub fn wait(&mut self) -> RobotPose {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                warn!(routine = %worker.routine, "playback worker panicked");
            }
        }
        self.snapshot()
    }

    /// Signal the worker and wait up to the join timeout for it to exit.
    ///
    /// A worker that misses the deadline is detached; it has already seen
    /// the flag or will before its next write.
    fn cancel_playback(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return true;
        };
        worker.cancel.store(true, Ordering::Release);

        let deadline = Instant::now() + self.join_timeout;
        while !worker.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(routine = %worker.routine, timeout = ?self.join_timeout, "playback did not exit in time, detaching");
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if worker.handle.join().is_err() {
            warn!(routine = %worker.routine, "playback worker panicked");
        }
        debug!(routine = %worker.routine, "playback cancelled");
        true
    }
}

impl Drop for ReplayEngine {
    fn drop(&mut self) {
        self.cancel_playback();
    }
}

fn run_playback(
    mut playback: Playback,
    bb: &Blackboard,
    cancel: &AtomicBool,
    topic: &Topic<RobotPose>,
    frame_period: Option<Duration>,
) {
    let sleeper = SpinSleeper::new(100_000);
    loop {
        let (tick, state) = {
            let mut state = bb.write();
            if cancel.load(Ordering::Acquire) {
                debug!(routine = playback.routine(), frames = playback.frames(), "cancel observed");
                return;
            }
            let tick = playback.tick(&mut state);
            (tick, state.clone())
        };
        if tick == Tick::Finished {
            info!(routine = playback.routine(), frames = playback.frames(), status = %state.status, "playback finished");
            topic.publish(state);
            return;
        }
        topic.publish(state);
        if let Some(period) = frame_period {
            sleeper.sleep(period);
        }
    }
}

#[cfg(test)]
mod tests {
    use spike_extract::{InstructionKind, Literal};
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::config::InitialPose;

    const EPSILON: f64 = 1e-6;

    fn follow(distance: f64) -> Instruction {
        let mut fields = BTreeMap::new();
        fields.insert("heading".to_string(), Literal::Number(0.0));
        fields.insert("distance".to_string(), Literal::Number(distance));
        Instruction {
            source_routine: "run1_main".to_string(),
            line: 3,
            kind: InstructionKind::HeadingFollow,
            call: "gyro_follow".to_string(),
            fields,
            unresolved: BTreeMap::new(),
        }
    }

    fn config(realtime: bool) -> ReplayConfig {
        ReplayConfig {
            realtime,
            bounds: Bounds::new(0.0, 0.0, 2000.0, 1000.0),
            initial_pose: InitialPose {
                x: 0.0,
                y: 0.0,
                heading: 0.0,
            },
            ..ReplayConfig::default()
        }
    }

    fn engine(realtime: bool, distance: f64) -> ReplayEngine {
        let mut programs = BTreeMap::new();
        programs.insert("run1_main".to_string(), vec![follow(distance)]);
        ReplayEngine::new(&config(realtime), programs).unwrap()
    }

    #[test]
    fn test_rejects_bad_setup() {
        let mut cfg = config(false);
        cfg.bounds = Bounds::new(0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            ReplayEngine::new(&cfg, BTreeMap::new()),
            Err(ReplayError::InvalidBounds(_))
        ));

        let mut cfg = config(false);
        cfg.initial_pose.x = f64::NAN;
        assert!(matches!(
            ReplayEngine::new(&cfg, BTreeMap::new()),
            Err(ReplayError::NonFiniteInitialPose { .. })
        ));

        let mut cfg = config(false);
        cfg.frame_rate = 0.0;
        assert!(matches!(
            ReplayEngine::new(&cfg, BTreeMap::new()),
            Err(ReplayError::InvalidSetting { name: "frame_rate", .. })
        ));

        let mut cfg = config(false);
        cfg.wheel_radius = -1.0;
        assert!(matches!(
            ReplayEngine::new(&cfg, BTreeMap::new()),
            Err(ReplayError::Geometry(_))
        ));
    }

    #[test]
    fn test_initial_pose_is_clamped() {
        let mut cfg = config(false);
        cfg.initial_pose = InitialPose {
            x: -50.0,
            y: 4000.0,
            heading: 270.0,
        };
        let engine = ReplayEngine::new(&cfg, BTreeMap::new()).unwrap();
        let state = engine.snapshot();
        assert_eq!(state.pose, Pose::new(0.0, 1000.0, -90.0));
        assert_eq!(state.status, SimStatus::Idle);
    }

    #[test]
    fn test_unknown_routine() {
        let mut engine = engine(false, 1000.0);
        assert!(matches!(engine.start("nope_main"), Err(ReplayError::UnknownRoutine(_))));
        assert_eq!(engine.routines().collect::<Vec<_>>(), vec!["run1_main"]);
    }

    #[test]
    fn test_follow_inside_bounds() {
        let mut engine = engine(false, 1000.0);
        let mut rx = engine.pose_topic().subscribe();
        engine.start("run1_main").unwrap();
        let state = engine.wait();

        let expected = 1000.0 * 2.0 * std::f64::consts::PI * 24.0 / 360.0;
        assert!((state.pose.x - expected).abs() < EPSILON);
        assert!(state.pose.x > 0.0 && state.pose.x < 1000.0);
        assert_eq!(state.pose.heading, 0.0);
        assert_eq!(state.status, SimStatus::Idle);
        assert!(!matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_follow_out_of_bounds() {
        let mut engine = engine(false, 10_000.0);
        engine.start("run1_main").unwrap();
        let state = engine.wait();
        assert_eq!(state.status, SimStatus::OutOfBounds);
        assert_eq!(state.pose.x, 2000.0);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_stop_freezes_pose() {
        let mut engine = engine(true, 100_000.0);
        engine.start("run1_main").unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(engine.is_playing());

        engine.stop();
        let stopped = engine.snapshot();
        assert_eq!(stopped.status, SimStatus::Stopped);
        assert!(stopped.pose.x > 0.0);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.snapshot(), stopped);
    }

    #[test]
    fn test_start_replaces_running_playback() {
        let mut turn_fields = BTreeMap::new();
        turn_fields.insert("heading".to_string(), Literal::Number(90.0));
        turn_fields.insert("speed".to_string(), Literal::Number(1.0));
        let slow_turn = Instruction {
            source_routine: "run2_main".to_string(),
            line: 7,
            kind: InstructionKind::HeadingTurn,
            call: "gyro_turn".to_string(),
            fields: turn_fields,
            unresolved: BTreeMap::new(),
        };
        let mut programs = BTreeMap::new();
        programs.insert("run1_main".to_string(), vec![follow(100_000.0)]);
        programs.insert("run2_main".to_string(), vec![slow_turn]);
        let mut engine = ReplayEngine::new(&config(true), programs).unwrap();

        engine.start("run1_main").unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(engine.snapshot().pose.x > 0.0);

        engine.start("run2_main").unwrap();
        let handover = engine.snapshot();
        assert_eq!(handover.status, SimStatus::Running("run2_main".to_string()));
        assert!(engine.is_playing());

        std::thread::sleep(Duration::from_millis(100));
        let later = engine.snapshot();
        // Only the turn is moving the robot now.
        assert_eq!((later.pose.x, later.pose.y), (handover.pose.x, handover.pose.y));
        assert!(later.pose.heading > handover.pose.heading);
        assert!(later.pose.heading < 90.0);
        assert_eq!(later.status, SimStatus::Running("run2_main".to_string()));
        assert!(engine.is_playing());

        engine.stop();
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_manual_preempts_playback() {
        let mut engine = engine(true, 100_000.0);
        engine.start("run1_main").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        // No input held: playback keeps going.
        engine.manual_step(ManualIntent::default(), 0.1).unwrap();
        assert!(engine.is_playing());

        // Zero-length frame: cancels without moving.
        let hold = ManualIntent {
            forward: true,
            ..ManualIntent::default()
        };
        engine.manual_step(hold, 0.0).unwrap();
        let cancelled = engine.snapshot();
        assert_eq!(cancelled.status, SimStatus::Manual);
        assert!(!engine.is_playing());

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.snapshot().pose, cancelled.pose);

        // Turning in place leaves the position alone.
        let turn = ManualIntent {
            left: true,
            ..ManualIntent::default()
        };
        engine.manual_step(turn, 0.5).unwrap();
        let turned = engine.snapshot().pose;
        assert!((turned.heading - -60.0).abs() < EPSILON);
        assert_eq!((turned.x, turned.y), (cancelled.pose.x, cancelled.pose.y));
    }

    #[test]
    fn test_manual_is_clamped() {
        let mut engine = engine(false, 0.0);
        let back = ManualIntent {
            back: true,
            ..ManualIntent::default()
        };
        engine.manual_step(back, 1.0).unwrap();
        assert_eq!(engine.snapshot().pose, Pose::new(0.0, 0.0, 0.0));

        let forward = ManualIntent {
            forward: true,
            ..ManualIntent::default()
        };
        engine.manual_step(forward, 0.5).unwrap();
        assert!((engine.snapshot().pose.x - 100.0).abs() < EPSILON);
        assert!(matches!(
            engine.manual_step(forward, -1.0),
            Err(ReplayError::InvalidSetting { name: "dt", .. })
        ));
        assert!(matches!(
            engine.manual_step(forward, f64::NAN),
            Err(ReplayError::InvalidSetting { name: "dt", .. })
        ));
    }

    #[test]
    fn test_manual_turns_then_drives() {
        let mut cfg = config(false);
        cfg.initial_pose = InitialPose {
            x: 500.0,
            y: 500.0,
            heading: 0.0,
        };
        let mut engine = ReplayEngine::new(&cfg, BTreeMap::new()).unwrap();
        let arc = ManualIntent {
            forward: true,
            right: true,
            ..ManualIntent::default()
        };
        engine.manual_step(arc, 0.5).unwrap();

        // 60° right first, then 100 units along the new heading.
        let pose = engine.snapshot().pose;
        assert!((pose.heading - 60.0).abs() < EPSILON);
        assert!((pose.x - 550.0).abs() < EPSILON);
        assert!((pose.y - (500.0 + 100.0 * 60f64.to_radians().sin())).abs() < EPSILON);
    }

    #[test]
    fn test_restart_resets_pose() {
        let mut engine = engine(false, 1000.0);
        engine.start("run1_main").unwrap();
        engine.wait();
        engine.restart();
        let state = engine.snapshot();
        assert_eq!(state.pose, Pose::new(0.0, 0.0, 0.0));
        assert_eq!(state.status, SimStatus::Idle);
    }
}
