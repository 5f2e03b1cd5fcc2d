//! # Ray Marching
//!
//! Marches a ray through the scene in exponentially growing steps, refines the
//! first hit by bisection and shades the refined surface point.
//!
//! Ray parameters are in units of the shell radius: the direction vector is
//! already scaled by it, so `i = 1` is the shell's own radius. A hit at
//! `i <= 1` raises the `intersection` flag, which the hierarchy uses to grow a
//! finer shell.

use crate::bulb::Mandelbulb;
use crate::math::Vec3;

/// Default exponential step growth per sample.
pub const DEFAULT_STEP: f64 = 0.02;
/// First ray parameter sampled.
pub const START_PARAM: f64 = 0.9;
/// Bisection stops once the bracket is narrower than this (scene units).
pub const REFINE_EPSILON: f64 = 1e-6;

/// Linear RGB in `[0, 1]` (not clamped by the shader).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const GRAY: Self = Self::new(0.5, 0.5, 0.5);

    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn clamped(self) -> Self {
        Self::new(self.r.clamp(0.0, 1.0), self.g.clamp(0.0, 1.0), self.b.clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit {
    /// The ray left the bounding sphere or ran out of distance.
    Miss,
    /// The very first sample was already inside the set.
    Inside,
    /// A refined surface point and its shaded color.
    Surface { point: Vec3, color: Rgb },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayOutcome {
    pub hit: Hit,
    /// The set was found within the shell radius (`i <= 1`).
    pub intersection: bool,
}

impl RayOutcome {
    const MISS: Self = Self { hit: Hit::Miss, intersection: false };
}

/// Bracket between a point known to be outside and one known to be inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub outside: Vec3,
    pub inside: Vec3,
}

impl Bracket {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.outside.distance(self.inside)
    }
}

/// Bisection steps towards the set boundary. Each yielded bracket is half as
/// wide as the previous one; iteration ends once the width drops below
/// `epsilon`.
pub struct Bisection<'a> {
    bulb: &'a Mandelbulb,
    bracket: Bracket,
    epsilon: f64,
}

impl<'a> Bisection<'a> {
    #[must_use]
    pub fn new(bulb: &'a Mandelbulb, outside: Vec3, inside: Vec3, epsilon: f64) -> Self {
        Self { bulb, bracket: Bracket { outside, inside }, epsilon }
    }

    /// Runs the bisection to completion and returns the final bracket.
    #[must_use]
    pub fn converge(self) -> Bracket {
        let initial = self.bracket;
        self.last().unwrap_or(initial)
    }
}

impl Iterator for Bisection<'_> {
    type Item = Bracket;

    fn next(&mut self) -> Option<Bracket> {
        let width = self.bracket.width();
        // NaN widths end the search as well
        if !(width >= self.epsilon) {
            return None;
        }
        let mid = self.bracket.outside.midpoint(self.bracket.inside);
        if self.bulb.contains(mid) {
            self.bracket.inside = mid;
        } else {
            self.bracket.outside = mid;
        }
        Some(self.bracket)
    }
}

/// Light probe: direction and step scale.
const LIGHT_PROBES: [(f64, Vec3); 6] = [
    (1e-3, Vec3::new(-0.41, 1.0, -0.32)),
    (1e-3, Vec3::new(-0.32, 1.0, -0.21)),
    (1e-4, Vec3::new(-0.13, 1.0, 0.34)),
    (1e-4, Vec3::new(-0.12, 1.0, 0.28)),
    (1e-5, Vec3::new(-0.45, 1.0, 0.11)),
    (1e-5, Vec3::new(-0.36, 1.0, -0.37)),
];
const PROBE_STEPS: u32 = 5;
const PROBE_GROWTH: f64 = 1.5;
const LIGHT_NORMALIZER: f64 = 40.0;
const FOG_MAX: f64 = 0.7;

/// Soft self-shadowing plus exponential depth fog.
///
/// `dist` is the distance from the ray origin to `p` in scene units.
#[must_use]
pub fn shade(bulb: &Mandelbulb, p: Vec3, dist: f64) -> Rgb {
    let fog = (1.0 + dist.ln() / 6.0).clamp(0.0, FOG_MAX);
    let mut light = 0.0;
    for (scale, dir) in LIGHT_PROBES {
        let step = dir * scale;
        let mut a = 1.0;
        for _ in 0..PROBE_STEPS {
            if bulb.contains(p + step * a) {
                break;
            }
            light += 1.0;
            a *= PROBE_GROWTH;
        }
    }
    light /= LIGHT_NORMALIZER;
    Rgb::new(
        fog * 0.4 + (1.0 - fog) * light * 0.4,
        fog * 0.5 + (1.0 - fog) * light,
        fog + (1.0 - fog) * light * 0.5,
    )
}

/// Marches from `origin` along `direction`, which is already scaled by the
/// shell radius. `step` is the relative step growth, `max` the largest ray
/// parameter sampled.
#[must_use]
pub fn march(bulb: &Mandelbulb, origin: Vec3, direction: Vec3, step: f64, max: f64) -> RayOutcome {
    if !origin.is_finite() || !direction.is_finite() || direction.length_squared() == 0.0 {
        tracing::trace!(?origin, ?direction, "degenerate ray");
        return RayOutcome::MISS;
    }
    if step.is_nan() || step <= 0.0 {
        tracing::trace!(step, "non-positive step");
        return RayOutcome::MISS;
    }

    let mut i = START_PARAM;
    let mut prev_i: Option<f64> = None;
    let mut prev_d: Option<f64> = None;
    while i < max {
        let p = origin + direction * i;
        let d = p.length_squared();
        if d > 1.0 && prev_d.is_some_and(|prev| d > prev) {
            // Moving away from the unit bounding sphere.
            return RayOutcome::MISS;
        }
        if d <= 1.0 && bulb.contains(p) {
            let intersection = i <= 1.0;
            let Some(last_outside) = prev_i else {
                return RayOutcome { hit: Hit::Inside, intersection };
            };
            let bracket = Bisection::new(bulb, origin + direction * last_outside, p, REFINE_EPSILON)
                .converge();
            let surface = bracket.outside;
            let color = shade(bulb, surface, surface.distance(origin));
            return RayOutcome { hit: Hit::Surface { point: surface, color }, intersection };
        }
        prev_d = Some(d);
        prev_i = Some(i);
        i *= 1.0 + step;
    }
    RayOutcome::MISS
}
