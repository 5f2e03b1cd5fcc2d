//! # Viewer
//!
//! The cooperative main loop. One [`Viewer::tick`] does, in order:
//!
//! 1.  camera update from the input sample (recentering shells the camera
//!     left behind),
//! 2.  applying finished tile jobs,
//! 3.  growing and pruning the hierarchy,
//! 4.  handing idle workers new tiles,
//! 5.  recompositing the frame, immediately after a camera change and at
//!     most once per redraw interval while tiles are refining.

use crate::camera::{Camera, CameraController, InputSample, View};
use crate::compositor::Compositor;
use crate::location;
use crate::scheduler::{Applied, Scheduler};
use crate::settings::RenderSettings;
use crate::shell::Hierarchy;
use crate::tile::TileId;
use anyhow::{Context, Result};
use compute::{ComputeBackend, WorkerPool, WorkerSpec};
use image::RgbaImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub camera_changed: bool,
    /// A shell was recentered.
    pub reset: bool,
    pub grown: bool,
    pub pruned: usize,
    pub completed: usize,
    pub dispatched: usize,
    pub redrawn: bool,
    pub motion: f64,
}

pub struct Viewer {
    settings: RenderSettings,
    camera: Camera,
    controller: CameraController,
    hierarchy: Hierarchy,
    scheduler: Scheduler,
    pool: WorkerPool<TileId>,
    compositor: Compositor,
    last_redraw: Option<Instant>,
    /// New tile data since the last redraw.
    dirty: bool,
}

impl Viewer {
    /// # Errors
    ///
    /// Fails on invalid settings or when the worker threads cannot start.
    pub fn new(
        settings: RenderSettings,
        backend: Arc<dyn ComputeBackend>,
        workers: &[WorkerSpec],
        width: u32,
        height: u32,
    ) -> Result<Self> {
        settings.validate().context("invalid render settings")?;
        let camera = Camera::new(settings.start());
        let pool = WorkerPool::new(backend, workers).context("failed to start tile workers")?;
        info!(workers = pool.len(), backend = pool.backend_name(), width, height, "viewer started");
        Ok(Self {
            controller: CameraController::new(&settings),
            hierarchy: Hierarchy::new(&settings, camera.position),
            scheduler: Scheduler::new(&settings),
            compositor: Compositor::new(width, height),
            camera,
            pool,
            settings,
            last_redraw: None,
            dirty: false,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[must_use]
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn frame(&self) -> &RgbaImage {
        self.compositor.frame()
    }

    #[must_use]
    pub fn frames_drawn(&self) -> u64 {
        self.compositor.frames_drawn()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.camera.view(self.compositor.width(), self.compositor.height())
    }

    /// Current position as a location fragment.
    #[must_use]
    pub fn location(&self) -> String {
        location::encode(self.camera.position)
    }

    /// Jumps to the position in `fragment`. Unknown fragments are ignored and
    /// return `false`.
    pub fn set_location(&mut self, fragment: &str) -> bool {
        let Some(position) = location::parse(fragment) else {
            debug!(fragment, "ignoring location");
            return false;
        };
        self.camera.position = position;
        self.hierarchy.reset(position);
        self.controller.force_redraw();
        info!(location = %location::encode(position), "moved to location");
        true
    }

    /// Changes the frame size; the next tick redraws.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.compositor.resize(width, height);
        self.controller.force_redraw();
    }

    /// Runs one iteration of the main loop.
    pub fn tick(&mut self, input: &InputSample, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        let move_scale = self.hierarchy.innermost().radius();
        if self.controller.update(&mut self.camera, input, move_scale).is_some() {
            report.camera_changed = true;
            report.reset = self.hierarchy.on_camera_moved(self.camera.position).is_reset();
        }
        report.motion = self.controller.motion();

        report.completed = self.apply_completions();
        report.grown = self.hierarchy.grow(self.camera.position);
        report.pruned = self.hierarchy.prune(self.camera.position);

        let view = self.view();
        report.dispatched = self.scheduler.schedule(&mut self.hierarchy, &mut self.pool, &view, report.motion);

        let throttled = self
            .last_redraw
            .is_some_and(|t| now.saturating_duration_since(t) < self.settings.redraw_interval());
        if report.camera_changed || (self.dirty && !throttled) {
            self.compositor.compose(&self.hierarchy, &view);
            self.last_redraw = Some(now);
            self.dirty = false;
            report.redrawn = true;
        }
        report
    }

    /// Blocks until a job finishes or `timeout` passes, then applies
    /// everything that finished. Returns the number of completions applied.
    pub fn wait_for_tiles(&mut self, timeout: Duration) -> usize {
        let Some(first) = self.pool.wait(timeout) else {
            return 0;
        };
        self.apply(first);
        1 + self.apply_completions()
    }

    /// Nothing in flight and nothing left to schedule for the current view.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        let view = self.view();
        let motion = self.controller.motion();
        self.pool.in_flight() == 0
            && self.hierarchy.busy_tiles() == 0
            && self.pool.idle_workers().all(|(_, spec)| {
                self.scheduler.pick(&self.hierarchy, &view, motion, spec.max_tex_size).is_none()
            })
    }

    fn apply_completions(&mut self) -> usize {
        let done = self.pool.drain();
        let n = done.len();
        for completion in done {
            self.apply(completion);
        }
        n
    }

    fn apply(&mut self, completion: compute::Completion<TileId>) {
        if self.scheduler.apply(&mut self.hierarchy, completion) == Applied::Visible {
            self.dirty = true;
        }
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("camera", &self.camera)
            .field("shells", &self.hierarchy.len())
            .field("active", &self.hierarchy.active_count())
            .field("in_flight", &self.pool.in_flight())
            .finish_non_exhaustive()
    }
}
