//! # Mandelbulb Membership
//!
//! Escape-time test for the power-8 Mandelbulb. Input points are in scene
//! units where the whole set fits inside the unit sphere; internally they are
//! scaled by [`SCENE_SCALE`] and escape once their radius exceeds [`BAILOUT`].

use crate::math::Vec3;

/// Scene units to formula units.
pub const SCENE_SCALE: f64 = 1.3;
/// Escape radius in formula units.
pub const BAILOUT: f64 = 1.3;
/// Exponent of the spherical power formula.
pub const POWER: f64 = 8.0;

/// Iteration cap used on the interactive thread.
pub const INTERACTIVE_ITERATIONS: u32 = 1000;
/// Iteration cap used by background tile workers.
pub const WORKER_ITERATIONS: u32 = 100;

/// Escape-time membership test with a fixed iteration cap.
///
/// The two presets trade accuracy for speed on purpose: workers render many
/// thousands of rays per tile and use the lower cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mandelbulb {
    pub iterations: u32,
}

impl Default for Mandelbulb {
    fn default() -> Self {
        Self::worker()
    }
}

impl Mandelbulb {
    #[must_use]
    pub const fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    #[must_use]
    pub const fn interactive() -> Self {
        Self::new(INTERACTIVE_ITERATIONS)
    }

    #[must_use]
    pub const fn worker() -> Self {
        Self::new(WORKER_ITERATIONS)
    }

    /// Returns `true` when `p` stays bounded for the whole iteration cap.
    #[must_use]
    pub fn contains(&self, p: Vec3) -> bool {
        let c = p * SCENE_SCALE;
        let mut z = c;
        for _ in 0..self.iterations {
            let r = z.length();
            if r > BAILOUT {
                return false;
            }
            z = power_step(z, r) + c;
        }
        z.length() <= BAILOUT
    }
}

/// `z^8` in spherical coordinates (angles measured from the y axis).
fn power_step(z: Vec3, r: f64) -> Vec3 {
    // At the origin the power term vanishes; the angles would be NaN.
    if r == 0.0 {
        return Vec3::ZERO;
    }
    let phi = POWER * z.z.atan2(z.x);
    let theta = POWER * (z.y / r).acos();
    let sin_theta = theta.sin();
    let r2 = r * r;
    let r4 = r2 * r2;
    let r8 = r4 * r4;
    Vec3::new(
        r8 * sin_theta * phi.cos(),
        r8 * theta.cos(),
        r8 * sin_theta * phi.sin(),
    )
}
