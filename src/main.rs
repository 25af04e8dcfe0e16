use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use spike_extract::{Instruction, RoutineFilter, extract, group_by_routine};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::{self, EnvFilter};

use spike_pilot::blackboard::{RobotPose, SimStatus};
use spike_pilot::config::{MissionConfig, load_config};
use spike_pilot::replay::ReplayEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Spike Pilot started. Loading mission for headless replay...");
    let cfg = load_config()?;

    let programs = load_mission(&cfg.mission)?;
    let selected: Vec<String> = match &cfg.mission.routine {
        Some(name) if programs.contains_key(name) => vec![name.clone()],
        Some(name) => bail!("routine `{name}` not found in {}", cfg.mission.source.display()),
        None => programs.keys().cloned().collect(),
    };
    if selected.is_empty() {
        warn!(source = %cfg.mission.source.display(), "no runnable routines found");
        return Ok(());
    }

    let mut engine = ReplayEngine::new(&cfg.replay, programs).context("invalid replay configuration")?;
    let monitor = tokio::spawn(monitor(engine.pose_topic().subscribe()));

    for routine in selected {
        engine.restart();
        engine.start(&routine)?;
        // Playback blocks on its worker thread; keep the runtime free meanwhile.
        let (returned, state) = tokio::task::spawn_blocking(move || {
            let state = engine.wait();
            (engine, state)
        })
        .await
        .context("playback wait task failed")?;
        engine = returned;

        match state.status {
            SimStatus::OutOfBounds => warn!(routine, pose = %state.pose, "routine left the workspace"),
            _ => info!(routine, pose = %state.pose, "routine replayed"),
        }
    }

    drop(engine);
    monitor.abort();
    info!("Spike Pilot finished.");
    Ok(())
}

/// Read the mission source, extract its routines and optionally export them.
fn load_mission(mission: &MissionConfig) -> anyhow::Result<BTreeMap<String, Vec<Instruction>>> {
    let src = std::fs::read_to_string(&mission.source)
        .with_context(|| format!("failed to read mission {}", mission.source.display()))?;
    let filter = RoutineFilter::with_suffix(mission.routine_suffix.as_str());
    let instructions = extract(&src, &filter);

    if let Some(path) = &mission.export {
        let json = serde_json::to_string_pretty(&instructions)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!(count = instructions.len(), path = %path.display(), "exported instructions");
    }

    let programs = group_by_routine(&instructions);
    for (name, list) in &programs {
        let unresolved = list.iter().filter(|i| !i.is_resolved()).count();
        info!(routine = %name, instructions = list.len(), unresolved, "routine");
    }
    Ok(programs)
}

/// Log status changes from the pose topic until it closes.
async fn monitor(mut rx: broadcast::Receiver<Arc<RobotPose>>) {
    let mut last: Option<SimStatus> = None;
    loop {
        match rx.recv().await {
            Ok(state) => {
                if last.as_ref() != Some(&state.status) {
                    info!(status = %state.status, pose = %state.pose, "status changed");
                    last = Some(state.status.clone());
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "pose monitor lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
