//! Tunables for the hierarchy, scheduler, camera and redraw pacing.
//!
//! The scheduling weights are a heuristic. What matters is the behaviour:
//! a moving camera gets coarse tiles first, a resting camera gets steadily
//! sharper ones.

use anyhow::{ensure, Result};
use fractal::{Mandelbulb, Vec3, MAX_TEX_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard cap on the number of shells.
pub const MAX_SHELLS: usize = 20;

/// Membership quality used by the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Worker,
    Interactive,
}

impl Quality {
    #[must_use]
    pub fn bulb(self) -> Mandelbulb {
        match self {
            Self::Worker => Mandelbulb::worker(),
            Self::Interactive => Mandelbulb::interactive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Radius of the outermost shell.
    pub root_radius: f64,
    /// Each deeper shell is this fraction of its parent.
    pub shell_scale: f64,
    pub max_shells: usize,
    /// A shell is recentered once the camera strays this many radii away.
    pub recenter_fraction: f64,
    /// Inactive shells further than this many radii away are dropped.
    pub prune_distance: f64,
    /// March limit of the root shell, in radii.
    pub root_distance_limit: f64,
    /// March limit of deeper shells, in radii. Must reach the parent's
    /// starting distance so bands overlap.
    pub shell_distance_limit: f64,

    pub min_tex: u32,
    pub first_pass_tex: u32,
    pub max_tex: u32,
    /// Empty tiles are not refined past this size.
    pub empty_stop_tex: u32,
    pub stale_bonus: f64,
    pub depth_weight: f64,
    pub motion_weight: f64,
    /// Motion is multiplied by this every tick.
    pub motion_decay: f64,
    /// Above this motion the camera counts as moving.
    pub moving_threshold: f64,

    pub start_position: [f64; 3],
    /// Camera-space units per second, before scaling by the innermost shell.
    pub speed: f64,
    pub max_distance: f64,

    pub redraw_interval_ms: u64,
    pub quality: Quality,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            root_radius: 1.0,
            shell_scale: 0.5,
            max_shells: MAX_SHELLS,
            recenter_fraction: 0.1,
            prune_distance: 2.0,
            root_distance_limit: 16.0,
            shell_distance_limit: 2.0,
            min_tex: 8,
            first_pass_tex: 32,
            max_tex: MAX_TEX_SIZE,
            empty_stop_tex: 32,
            stale_bonus: 4.0,
            depth_weight: 0.5,
            motion_weight: 1.0,
            motion_decay: 0.5,
            moving_threshold: 0.05,
            start_position: [0.0, 0.0, -1.1],
            speed: 2.0,
            max_distance: 4.0,
            redraw_interval_ms: 200,
            quality: Quality::Worker,
        }
    }
}

impl RenderSettings {
    /// # Errors
    ///
    /// Describes the first setting that is out of range.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.root_radius > 0.0, "root_radius must be positive");
        ensure!(
            self.shell_scale > 0.0 && self.shell_scale < 1.0,
            "shell_scale must be in (0, 1), got {}",
            self.shell_scale
        );
        ensure!(
            (1..=MAX_SHELLS).contains(&self.max_shells),
            "max_shells must be in 1..={MAX_SHELLS}, got {}",
            self.max_shells
        );
        ensure!(self.recenter_fraction > 0.0, "recenter_fraction must be positive");
        ensure!(self.prune_distance > 0.0, "prune_distance must be positive");
        ensure!(
            self.root_distance_limit > 0.0 && self.shell_distance_limit > 0.0,
            "distance limits must be positive"
        );
        for (name, size) in [
            ("min_tex", self.min_tex),
            ("first_pass_tex", self.first_pass_tex),
            ("max_tex", self.max_tex),
            ("empty_stop_tex", self.empty_stop_tex),
        ] {
            ensure!(size.is_power_of_two(), "{name} must be a power of two, got {size}");
            ensure!(size <= MAX_TEX_SIZE, "{name} must be at most {MAX_TEX_SIZE}, got {size}");
        }
        ensure!(
            self.min_tex <= self.first_pass_tex && self.first_pass_tex <= self.max_tex,
            "expected min_tex <= first_pass_tex <= max_tex"
        );
        ensure!(
            (0.0..1.0).contains(&self.motion_decay),
            "motion_decay must be in [0, 1)"
        );
        ensure!(self.speed >= 0.0, "speed must not be negative");
        ensure!(self.max_distance > 0.0, "max_distance must be positive");
        ensure!(
            Vec3::from_array(self.start_position).is_finite(),
            "start_position must be finite"
        );
        Ok(())
    }

    #[must_use]
    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms)
    }

    #[must_use]
    pub fn start(&self) -> Vec3 {
        Vec3::from_array(self.start_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RenderSettings::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: RenderSettings = serde_json::from_str(r#"{ "max_tex": 64, "quality": "interactive" }"#).unwrap();
        assert_eq!(s.max_tex, 64);
        assert_eq!(s.quality, Quality::Interactive);
        assert_eq!(s.shell_scale, 0.5);
        s.validate().unwrap();
    }

    #[test]
    fn bad_sizes_are_rejected() {
        let s = RenderSettings { first_pass_tex: 48, ..RenderSettings::default() };
        assert!(s.validate().is_err());
        let s = RenderSettings { min_tex: 64, first_pass_tex: 32, ..RenderSettings::default() };
        assert!(s.validate().is_err());
        let s = RenderSettings { max_shells: 21, ..RenderSettings::default() };
        assert!(s.validate().is_err());
    }
}
