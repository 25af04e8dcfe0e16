use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::replay::Bounds;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
/// Overrides the configuration file path. The file must then exist.
const CONFIG_PATH_ENV: &str = "SPIKE_PILOT_CONFIG";
/// `SPIKE__REPLAY__FRAME_RATE=30` overrides `replay.frame_rate`.
const ENV_PREFIX: &str = "SPIKE";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub mission: MissionConfig,
    pub replay: ReplayConfig,
}

/// Where the mission comes from and which routines to replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub source: PathBuf,
    /// Top-level functions ending with this are runnable routines.
    pub routine_suffix: String,
    /// Replay only this routine. All of them, in sorted order, when unset.
    pub routine: Option<String>,
    /// Write the extracted instructions here as JSON.
    pub export: Option<PathBuf>,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("mission.py"),
            routine_suffix: "_main".to_string(),
            routine: None,
            export: None,
        }
    }
}

/// Starting pose of a replay, in workspace units and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialPose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Default for InitialPose {
    fn default() -> Self {
        Self {
            x: 200.0,
            y: 200.0,
            heading: 0.0,
        }
    }
}

/// Drive geometry and speed model of the kinematic replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// mm
    pub wheel_radius: f64,
    /// mm
    pub wheel_base: f64,
    /// Workspace units per millimetre.
    pub pixel_scale: f64,
    /// Global speed multiplier, applied to playback and manual control.
    pub speed_scale: f64,
    /// Extra multiplier applied to playback only.
    pub run_speed_mult: f64,
    /// Simulated frames per second.
    pub frame_rate: f64,
    /// mm/s used when a move has no usable speed.
    pub default_linear_speed: f64,
    /// °/s used when a turn has no speed.
    pub default_turn_rate: f64,
    /// mm/s
    pub manual_move_speed: f64,
    /// °/s
    pub manual_rotate_speed: f64,
    /// How long to wait for a cancelled playback to exit, in milliseconds.
    pub join_timeout_ms: u64,
    /// Sleep one frame period between frames. Off, playback runs as fast as it can.
    pub realtime: bool,
    /// Abandon the rest of the routine, not just the current instruction, on leaving the workspace.
    pub halt_on_out_of_bounds: bool,
    pub bounds: Bounds,
    pub initial_pose: InitialPose,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 24.0,
            wheel_base: 120.0,
            pixel_scale: 1.0,
            speed_scale: 1.0,
            run_speed_mult: 3.0,
            frame_rate: 60.0,
            default_linear_speed: 50.0,
            default_turn_rate: 90.0,
            manual_move_speed: 200.0,
            manual_rotate_speed: 120.0,
            join_timeout_ms: 200,
            realtime: true,
            halt_on_out_of_bounds: false,
            bounds: Bounds::default(),
            initial_pose: InitialPose::default(),
        }
    }
}

impl ReplayConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Load the configuration file (if present) layered with `SPIKE__*` environment overrides.
pub fn load_config() -> anyhow::Result<PilotConfig> {
    let (path, required) = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => (path, true),
        Err(_) => (DEFAULT_CONFIG_PATH.to_string(), false),
    };
    info!(path, required, "loading configuration");

    let settings = Config::builder()
        .add_source(File::new(&path, FileFormat::Toml).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read configuration from {path}"))?;

    let cfg: PilotConfig = settings
        .try_deserialize()
        .context("configuration does not match the expected schema")?;
    debug!(?cfg, "configuration loaded");
    Ok(cfg)
}

/// Parse a TOML document on top of the built-in defaults.
pub fn from_toml(src: &str) -> anyhow::Result<PilotConfig> {
    let cfg = Config::builder()
        .add_source(File::from_str(src, FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let cfg = from_toml("").unwrap();
        assert_eq!(cfg, PilotConfig::default());
        assert_eq!(cfg.mission.routine_suffix, "_main");
        assert_eq!(cfg.replay.join_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_partial_override() {
        let cfg = from_toml(
            r#"
            [mission]
            source = "runs/working_spike.py"
            routine = "run2_main"

            [replay]
            pixel_scale = 0.5
            realtime = false

            [replay.bounds]
            min_x = 0.0
            min_y = 0.0
            max_x = 1000.0
            max_y = 500.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.mission.source, PathBuf::from("runs/working_spike.py"));
        assert_eq!(cfg.mission.routine.as_deref(), Some("run2_main"));
        assert_eq!(cfg.replay.pixel_scale, 0.5);
        assert!(!cfg.replay.realtime);
        assert_eq!(cfg.replay.bounds, Bounds::new(0.0, 0.0, 1000.0, 500.0));
        // Untouched fields keep their defaults.
        assert_eq!(cfg.replay.wheel_radius, 24.0);
        assert_eq!(cfg.replay.initial_pose, InitialPose::default());
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        assert!(from_toml("[replay]\nframe_rate = \"fast\"").is_err());
    }
}
