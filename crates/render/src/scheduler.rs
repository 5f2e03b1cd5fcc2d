//! # Tile Scheduler
//!
//! Hands idle workers the most useful tile they can take. Every non-busy
//! visible tile of an active shell gets a desired texture size and a score;
//! each idle worker receives the best-scoring tile whose desired size fits
//! under its cap.
//!
//! ```text
//! score = 10 - log2(desired)
//!       + stale_bonus   (never computed for the current center)
//!       + depth_weight * depth
//!       - motion_weight * motion * log2(desired)
//! ```
//!
//! Coarse textures always score higher than fine ones, more so while the
//! camera moves, so a moving camera sees fast low-resolution tiles and a
//! resting one sees every tile sharpen step by step.

use crate::camera::View;
use crate::settings::RenderSettings;
use crate::shell::{Hierarchy, Shell};
use crate::tile::{Tile, TileId};
use compute::{Completion, WorkerPool};
use fractal::Vec3;
use tracing::{debug, trace, warn};

/// A tile picked for a worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub tile: TileId,
    pub tex_size: u32,
    pub score: f64,
}

/// What applying a completion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New data for a tile of an active shell.
    Visible,
    /// Stored, but on an inactive shell or for an old center.
    Hidden,
    /// The job failed; the tile may be picked again.
    Failed,
    /// The shell no longer exists.
    Dropped,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    min_tex: u32,
    first_pass_tex: u32,
    max_tex: u32,
    empty_stop_tex: u32,
    stale_bonus: f64,
    depth_weight: f64,
    motion_weight: f64,
    moving_threshold: f64,
    dispatched: u64,
    failed: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            min_tex: settings.min_tex,
            first_pass_tex: settings.first_pass_tex,
            max_tex: settings.max_tex,
            empty_stop_tex: settings.empty_stop_tex,
            stale_bonus: settings.stale_bonus,
            depth_weight: settings.depth_weight,
            motion_weight: settings.motion_weight,
            moving_threshold: settings.moving_threshold,
            dispatched: 0,
            failed: 0,
        }
    }

    /// Jobs handed out so far.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Jobs that came back with an error.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Texture size the tile should be rendered at next, `None` when it is
    /// done.
    #[must_use]
    pub fn desired_tex(&self, tile: &Tile, center: Vec3, motion: f64) -> Option<u32> {
        if !tile.is_current(center) {
            let moving = motion > self.moving_threshold;
            return Some(if moving { self.min_tex } else { self.first_pass_tex });
        }
        let size = tile.tex_size();
        if size >= self.max_tex || (tile.empty && size >= self.empty_stop_tex) {
            return None;
        }
        Some((size.max(1) * 2).next_power_of_two().min(self.max_tex))
    }

    #[must_use]
    pub fn score(&self, desired: u32, stale: bool, depth: usize, motion: f64) -> f64 {
        let log = f64::from(desired).log2();
        let mut score = 10.0 - log;
        if stale {
            score += self.stale_bonus;
        }
        #[allow(clippy::cast_precision_loss)]
        let depth = depth as f64;
        score + self.depth_weight * depth - self.motion_weight * motion * log
    }

    /// Best tile for a worker capped at `cap`. Ties keep the first found.
    #[must_use]
    pub fn pick(&self, hierarchy: &Hierarchy, view: &View, motion: f64, cap: u32) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for (depth, shell) in hierarchy.active_shells().iter().enumerate() {
            for (face, tile) in shell.tiles().iter().enumerate() {
                if tile.busy {
                    continue;
                }
                let Some(desired) = self.desired_tex(tile, shell.center(), motion) else {
                    continue;
                };
                if desired > cap || !is_visible(view, shell, tile) {
                    continue;
                }
                let stale = !tile.is_current(shell.center());
                let score = self.score(desired, stale, depth, motion);
                if best.map_or(true, |b| score > b.score) {
                    best = Some(Candidate { tile: TileId { shell: shell.id(), face }, tex_size: desired, score });
                }
            }
        }
        best
    }

    /// Gives every idle worker its best tile. Returns the number of jobs
    /// dispatched.
    pub fn schedule(
        &mut self,
        hierarchy: &mut Hierarchy,
        pool: &mut WorkerPool<TileId>,
        view: &View,
        motion: f64,
    ) -> usize {
        let idle: Vec<_> = pool.idle_workers().collect();
        let mut sent = 0;
        for (worker, spec) in idle {
            let Some(pick) = self.pick(hierarchy, view, motion, spec.max_tex_size) else {
                continue;
            };
            let Some(job) = hierarchy.job(pick.tile, pick.tex_size) else {
                continue;
            };
            let Some(tile) = hierarchy.tile_mut(pick.tile) else {
                continue;
            };
            tile.busy = true;
            match pool.dispatch(worker, pick.tile, job) {
                Ok(()) => {
                    trace!(tile = %pick.tile, worker, tex_size = pick.tex_size, score = pick.score, "dispatched");
                    self.dispatched += 1;
                    sent += 1;
                }
                Err(e) => {
                    warn!(tile = %pick.tile, worker, "dispatch failed: {e}");
                    tile.release();
                }
            }
        }
        sent
    }

    /// Applies a finished job to its tile.
    pub fn apply(&mut self, hierarchy: &mut Hierarchy, completion: Completion<TileId>) -> Applied {
        let Completion { tag: id, job, outcome, worker } = completion;
        let active = hierarchy.is_active(id.shell);
        let current_center = hierarchy.shell(id.shell).map(Shell::center);
        let Some(tile) = hierarchy.tile_mut(id) else {
            debug!(tile = %id, "completion for a pruned shell dropped");
            return Applied::Dropped;
        };
        let result = outcome.map_err(|e| e.to_string()).and_then(|r| {
            r.validate(&job).map(|()| r).map_err(|e| e.to_string())
        });
        match result {
            Ok(result) => {
                tile.apply(&job, result);
                let fresh = current_center == Some(job.center);
                trace!(tile = %id, worker, tex_size = job.tex_size, fresh, "tile updated");
                if active && fresh {
                    Applied::Visible
                } else {
                    Applied::Hidden
                }
            }
            Err(e) => {
                warn!(tile = %id, worker, "tile job failed: {e}");
                tile.release();
                self.failed += 1;
                Applied::Failed
            }
        }
    }
}

/// A face is visible when one of its corners projects into the viewport, or
/// when the view axis or a viewport corner ray passes through it.
#[must_use]
pub fn is_visible(view: &View, shell: &Shell, tile: &Tile) -> bool {
    let center = shell.center();
    let radius = shell.radius();
    if tile.corners().to_array().iter().any(|&c| view.in_frustum(center + c * radius)) {
        return true;
    }
    // The camera sits near the shell center, so a ray from it crosses the
    // face roughly where the same direction from the center would.
    let offset = view.position - center;
    view.probe_rays()
        .iter()
        .filter_map(|dir| exit_direction(offset, *dir, radius))
        .any(|dir| tile.barycentric(dir).is_some())
}

/// Direction from the sphere center to where a ray from `origin` (relative
/// to the center) leaves a sphere of radius `radius`.
fn exit_direction(origin: Vec3, dir: Vec3, radius: f64) -> Option<Vec3> {
    let dir = dir.normalize()?;
    let b = origin.dot(dir);
    let c = origin.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b + disc.sqrt();
    (t > 0.0).then(|| origin + dir * t)
}
