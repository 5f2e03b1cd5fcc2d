//! Analytic stand-in for the ray marcher: the scene is a solid ball at the
//! origin. Cheap enough for scheduler and hierarchy tests that need hundreds
//! of completed tiles, yet it still produces empty tiles, surface tiles and
//! the intersection side channel.

use crate::{ComputeBackend, ComputeError};
use fractal::march::START_PARAM;
use fractal::raster::texel_in_triangle;
use fractal::{RenderJob, RenderResult, Rgb8, Vec3};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct MockCpu {
    ball_radius: f64,
    delay: Duration,
    failures_left: AtomicUsize,
    rendered: AtomicUsize,
}

impl Default for MockCpu {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl MockCpu {
    #[must_use]
    pub fn new(ball_radius: f64) -> Self {
        Self {
            ball_radius,
            delay: Duration::ZERO,
            failures_left: AtomicUsize::new(0),
            rendered: AtomicUsize::new(0),
        }
    }

    /// Sleeps this long per job, to keep jobs in flight across ticks.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The first `count` jobs fail with `BackendUnavailable`.
    #[must_use]
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Jobs rendered successfully so far.
    #[must_use]
    pub fn rendered(&self) -> usize {
        self.rendered.load(Ordering::SeqCst)
    }

    /// Entry parameter of the ray into the ball, `None` if it misses or
    /// enters beyond `max`.
    fn entry(&self, origin: Vec3, dir: Vec3, max: f64) -> Option<f64> {
        let a = dir.length_squared();
        let b = origin.dot(dir);
        let c = origin.length_squared() - self.ball_radius * self.ball_radius;
        let disc = b * b - a * c;
        if a == 0.0 || disc < 0.0 {
            return None;
        }
        let far = (-b + disc.sqrt()) / a;
        if far < START_PARAM {
            return None;
        }
        let near = ((-b - disc.sqrt()) / a).max(START_PARAM);
        (near < max).then_some(near)
    }
}

impl ComputeBackend for MockCpu {
    fn render(&self, job: &RenderJob) -> Result<RenderResult, ComputeError> {
        job.validate()?;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ComputeError::BackendUnavailable);
        }

        let n = job.tex_size;
        let size = f64::from(n);
        let mut texels = vec![Rgb8::UNUSED; (n * n) as usize];
        let mut empty = true;
        let mut intersection = false;
        for y in 0..n {
            for x in 0..n {
                if !texel_in_triangle(x, y, n) {
                    continue;
                }
                let dir = job.direction_at((f64::from(x) + 0.5) / size, (f64::from(y) + 0.5) / size);
                texels[(y * n + x) as usize] = match self.entry(job.center, dir, job.distance_limit) {
                    Some(t) => {
                        empty = false;
                        intersection |= t <= 1.0;
                        Rgb8::new(40, 90, 200)
                    }
                    None => Rgb8::NO_SURFACE,
                };
            }
        }
        self.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(RenderResult { empty, intersection, tex_rgb: bytemuck::cast_slice(&texels).to_vec() })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
