//! # Run Loop
//!
//! Drives a [`Viewer`] for a fixed number of frames on a simulated clock:
//! each frame feeds the scripted input, applies location jumps (from the
//! script or the watched file), ticks the viewer and then gives the workers
//! up to one frame period to deliver tiles. Composited frames are exported
//! as PNG into a run directory stamped with the start time.

use crate::config::{BackendKind, RunConfig};
use crate::watcher::LocationWatcher;
use anyhow::{Context, Result};
use compute::{default_specs, ComputeBackend, CpuBackend, MockCpu};
use render::Viewer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u32,
    pub run_dir: PathBuf,
    pub exported: Vec<PathBuf>,
    pub location: String,
    pub shells: usize,
    pub tiles_rendered: u64,
    pub settled: bool,
}

fn backend(config: &RunConfig) -> Arc<dyn ComputeBackend> {
    match config.backend {
        BackendKind::Cpu => Arc::new(CpuBackend::new(config.render.quality.bulb())),
        BackendKind::Mock => Arc::new(MockCpu::default()),
    }
}

/// Creates `<out_dir>/run-<timestamp>`.
fn create_run_dir(out_dir: &Path) -> Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    let dir = out_dir.join(format!("run-{stamp}"));
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

fn export(viewer: &Viewer, dir: &Path, frame: u32) -> Result<PathBuf> {
    let path = dir.join(format!("frame-{frame:05}.png"));
    viewer
        .frame()
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Runs the configured session.
///
/// # Errors
///
/// Fails when the viewer cannot start or a frame cannot be written. A
/// location watcher that fails to start is logged and skipped.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let specs = default_specs(config.worker_count());
    let mut viewer = Viewer::new(config.render.clone(), backend(config), &specs, config.width, config.height)?;
    if let Some(fragment) = &config.location {
        if !viewer.set_location(fragment) {
            warn!(%fragment, "start location not understood, using the default camera");
        }
    }

    let watcher = config.watch.as_deref().and_then(|path| match LocationWatcher::start(path) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("location watcher disabled: {e:#}");
            None
        }
    });

    let run_dir = create_run_dir(&config.out_dir)?;
    info!(dir = %run_dir.display(), frames = config.frames, "run started");

    let frame_time = Duration::from_secs_f64(config.frame_seconds());
    let clock = Instant::now();
    let mut exported = Vec::new();
    let mut frames = 0;
    let mut settled = false;
    let mut drawn_at_last_export = None;

    for frame in 0..config.frames {
        let (input, jump) = config.input_at(frame);
        if let Some(fragment) = jump {
            viewer.set_location(fragment);
        }
        if let Some(fragment) = watcher.as_ref().and_then(LocationWatcher::poll) {
            viewer.set_location(&fragment);
        }

        let report = viewer.tick(&input, clock + frame_time * frame);
        frames = frame + 1;

        let due = config.export_every.is_some_and(|n| frame % n == 0);
        if due && report.redrawn {
            exported.push(export(&viewer, &run_dir, frame)?);
            drawn_at_last_export = Some(viewer.frames_drawn());
        }

        settled = frame >= config.script_frames() && viewer.is_settled();
        if config.settle && settled {
            info!(frame, "all visible tiles final");
            break;
        }
        viewer.wait_for_tiles(frame_time);
    }

    if drawn_at_last_export != Some(viewer.frames_drawn()) || exported.is_empty() {
        exported.push(export(&viewer, &run_dir, frames)?);
    }

    let location = viewer.location();
    std::fs::write(run_dir.join("location.txt"), format!("{location}\n"))
        .context("failed to write location.txt")?;

    let summary = RunSummary {
        frames,
        run_dir,
        exported,
        location,
        shells: viewer.hierarchy().active_count(),
        tiles_rendered: viewer.scheduler().dispatched(),
        settled,
    };
    info!(
        frames = summary.frames,
        shells = summary.shells,
        tiles = summary.tiles_rendered,
        settled = summary.settled,
        "run finished at {}",
        summary.location
    );
    Ok(summary)
}
