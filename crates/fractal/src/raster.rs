//! # Tile Rasterization
//!
//! A tile is one triangular face of an icosahedral shell, textured by
//! marching one ray per texel from the shell center. This module holds the
//! job/result messages exchanged with workers and the per-job render loop.
//!
//! Texture space: the corner rays `t_0_0`, `t_1_0` and `t_05_1` sit at texture
//! coordinates `(0, 0)`, `(1, 0)` and `(0.5, 1)`. Only texels inside that
//! triangle (plus a one texel margin) are written; the rest stay black.

use crate::bulb::Mandelbulb;
use crate::error::JobError;
use crate::march::{march, Hit, Rgb, DEFAULT_STEP};
use crate::math::Vec3;

/// Largest texture edge a job may request.
pub const MAX_TEX_SIZE: u32 = 512;

/// Packed texel, the unit of `RenderResult::tex_rgb`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    /// Marks a texel whose ray found no surface. Treated as transparent.
    pub const NO_SURFACE: Self = Self::new(255, 0, 0);
    /// Texels outside the tile triangle.
    pub const UNUSED: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Quantizes a color, clamping each channel to `[0, 1]` first.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_rgb(c: Rgb) -> Self {
        let c = c.clamped();
        Self::new((255.0 * c.r) as u8, (255.0 * c.g) as u8, (255.0 * c.b) as u8)
    }

    /// Anything but the no-surface sentinel. Shading can produce pure black
    /// close to the set, so `UNUSED` cannot double as a marker here.
    #[must_use]
    pub fn is_surface(self) -> bool {
        self != Self::NO_SURFACE
    }
}

/// Work order for one tile (scheduler to worker).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderJob {
    /// Ray origin: the shell center at dispatch time.
    pub center: Vec3,
    /// Corner rays, already scaled by the shell radius.
    pub t_0_0: Vec3,
    pub t_1_0: Vec3,
    pub t_05_1: Vec3,
    /// Largest ray parameter, in shell radii.
    pub distance_limit: f64,
    /// Edge length of the square texture.
    pub tex_size: u32,
}

impl RenderJob {
    /// Rejects messages that would make the render loop misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] for an out-of-range texture size, non-finite
    /// vectors or a non-positive distance limit.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.tex_size == 0 || self.tex_size > MAX_TEX_SIZE {
            return Err(JobError::TextureSize(self.tex_size));
        }
        let vectors = [
            ("center", self.center),
            ("t_0_0", self.t_0_0),
            ("t_1_0", self.t_1_0),
            ("t_05_1", self.t_05_1),
        ];
        for (name, v) in vectors {
            if !v.is_finite() {
                return Err(JobError::NonFinite(name));
            }
        }
        if !(self.distance_limit.is_finite() && self.distance_limit > 0.0) {
            return Err(JobError::DistanceLimit(self.distance_limit));
        }
        Ok(())
    }

    /// Number of bytes in the matching result buffer.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        texel_count(self.tex_size) * 3
    }

    /// Ray direction for texture coordinate `(tex_x, tex_y)`.
    #[must_use]
    pub fn direction_at(&self, tex_x: f64, tex_y: f64) -> Vec3 {
        let across = (tex_x - tex_y * 0.5) / (1.0 - tex_y);
        self.t_0_0.lerp(self.t_1_0, across).lerp(self.t_05_1, tex_y)
    }
}

/// Reply from a worker (worker to scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    /// No ray hit anything.
    pub empty: bool,
    /// Some ray hit the set within one shell radius.
    pub intersection: bool,
    /// `tex_size * tex_size` packed RGB texels, row-major.
    pub tex_rgb: Vec<u8>,
}

impl RenderResult {
    /// Checks the buffer against the job it answers.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::BufferLength`] when the texel buffer has the wrong size.
    pub fn validate(&self, job: &RenderJob) -> Result<(), JobError> {
        let expected = job.buffer_len();
        if self.tex_rgb.len() == expected {
            Ok(())
        } else {
            Err(JobError::BufferLength { expected, actual: self.tex_rgb.len() })
        }
    }

    #[must_use]
    pub fn texels(&self) -> &[Rgb8] {
        bytemuck::cast_slice(&self.tex_rgb)
    }
}

fn texel_count(tex_size: u32) -> usize {
    let n = tex_size as usize;
    n * n
}

/// Whether texel `(x, y)` is written for a texture of edge `n`.
#[must_use]
pub fn texel_in_triangle(x: u32, y: u32, n: u32) -> bool {
    let (x, y, n) = (f64::from(x), f64::from(y), f64::from(n));
    x > 0.5 * y - 1.0 && x < n - 0.5 * y + 1.0
}

/// Texture coordinates for a point with barycentric weights `beta` (on
/// `t_1_0`) and `gamma` (on `t_05_1`). Inverse of [`RenderJob::direction_at`].
#[must_use]
pub fn tex_coords(beta: f64, gamma: f64) -> (f64, f64) {
    (beta + 0.5 * gamma, gamma)
}

/// Renders one tile.
///
/// # Errors
///
/// Returns [`JobError`] when the job fails validation.
pub fn render_tile(bulb: &Mandelbulb, job: &RenderJob) -> Result<RenderResult, JobError> {
    job.validate()?;
    let n = job.tex_size;
    let mut texels = vec![Rgb8::UNUSED; texel_count(n)];
    let mut empty = true;
    let mut intersection = false;
    let size = f64::from(n);

    for y in 0..n {
        for x in 0..n {
            if !texel_in_triangle(x, y, n) {
                continue;
            }
            let tex_x = (f64::from(x) + 0.5) / size;
            let tex_y = (f64::from(y) + 0.5) / size;
            let dir = job.direction_at(tex_x, tex_y);
            let outcome = march(bulb, job.center, dir, DEFAULT_STEP, job.distance_limit);
            intersection |= outcome.intersection;
            let texel = match outcome.hit {
                Hit::Miss => Rgb8::NO_SURFACE,
                Hit::Inside => Rgb8::from_rgb(Rgb::GRAY),
                Hit::Surface { color, .. } => Rgb8::from_rgb(color),
            };
            if texel != Rgb8::NO_SURFACE {
                empty = false;
            }
            texels[(y * n + x) as usize] = texel;
        }
    }

    tracing::trace!(tex_size = n, empty, intersection, "tile rasterized");
    Ok(RenderResult {
        empty,
        intersection,
        tex_rgb: bytemuck::cast_slice(&texels).to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::march::shade;

    fn job(center: Vec3, scale: f64, tex_size: u32) -> RenderJob {
        // A face looking down +z.
        RenderJob {
            center,
            t_0_0: Vec3::new(-0.5, -0.3, 1.0) * scale,
            t_1_0: Vec3::new(0.5, -0.3, 1.0) * scale,
            t_05_1: Vec3::new(0.0, 0.6, 1.0) * scale,
            distance_limit: 8.0,
            tex_size,
        }
    }

    #[test]
    fn validate_rejects_bad_jobs() {
        let good = job(Vec3::ZERO, 1.0, 8);
        assert!(good.validate().is_ok());
        assert!(matches!(RenderJob { tex_size: 0, ..good }.validate(), Err(JobError::TextureSize(0))));
        assert!(matches!(RenderJob { tex_size: 513, ..good }.validate(), Err(JobError::TextureSize(513))));
        assert!(matches!(
            RenderJob { distance_limit: -1.0, ..good }.validate(),
            Err(JobError::DistanceLimit(_))
        ));
        let nan = Vec3::new(f64::NAN, 0.0, 0.0);
        assert!(matches!(RenderJob { t_1_0: nan, ..good }.validate(), Err(JobError::NonFinite("t_1_0"))));
    }

    #[test]
    fn result_length_is_checked() {
        let j = job(Vec3::ZERO, 1.0, 4);
        let ok = RenderResult { empty: true, intersection: false, tex_rgb: vec![0; 48] };
        assert!(ok.validate(&j).is_ok());
        let short = RenderResult { tex_rgb: vec![0; 47], ..ok };
        assert!(matches!(short.validate(&j), Err(JobError::BufferLength { expected: 48, actual: 47 })));
    }

    #[test]
    fn corners_map_to_their_texture_coordinates() {
        let j = job(Vec3::ZERO, 1.0, 8);
        assert!(j.direction_at(0.0, 0.0).distance(j.t_0_0) < 1e-12);
        assert!(j.direction_at(1.0, 0.0).distance(j.t_1_0) < 1e-12);
        // Halfway up the left edge.
        let mid = j.t_0_0.midpoint(j.t_05_1);
        assert!(j.direction_at(0.25, 0.5).distance(mid) < 1e-12);
    }

    #[test]
    fn tex_coords_invert_direction_at() {
        let j = job(Vec3::ZERO, 1.0, 8);
        let (alpha, beta, gamma) = (0.2, 0.5, 0.3);
        let p = j.t_0_0 * alpha + j.t_1_0 * beta + j.t_05_1 * gamma;
        let (tx, ty) = tex_coords(beta, gamma);
        assert!(j.direction_at(tx, ty).distance(p) < 1e-12);
    }

    #[test]
    fn tile_facing_away_from_the_set_is_empty() {
        let j = job(Vec3::new(0.0, 0.0, 1.5), 0.5, 8);
        let result = render_tile(&Mandelbulb::worker(), &j).unwrap();
        assert!(result.empty);
        assert!(!result.intersection);
        assert_eq!(result.tex_rgb.len(), 8 * 8 * 3);
        let texels = result.texels();
        assert_eq!(texels[0], Rgb8::NO_SURFACE);
        // Far right of the top row is outside the triangle.
        assert_eq!(texels[7 * 8 + 7], Rgb8::UNUSED);
    }

    #[test]
    fn tile_facing_the_set_has_surface_texels() {
        let j = job(Vec3::new(0.0, 0.0, -1.5), 0.2, 8);
        let result = render_tile(&Mandelbulb::worker(), &j).unwrap();
        assert!(!result.empty);
        assert!(result.texels().iter().any(|t| t.is_surface()));
    }

    #[test]
    fn triangle_mask_keeps_bottom_row_and_apex() {
        let n = 8;
        assert!((0..n).all(|x| texel_in_triangle(x, 0, n)));
        assert!(texel_in_triangle(3, 7, n) || texel_in_triangle(4, 7, n));
        assert!(!texel_in_triangle(0, 7, n));
        assert!(!texel_in_triangle(7, 7, n));
    }

    #[test]
    fn black_shading_still_counts_as_surface() {
        // Deep inside the set: full fog clamp and no free light probe.
        let texel = Rgb8::from_rgb(shade(&Mandelbulb::worker(), Vec3::ZERO, 1e-3));
        assert_eq!(texel, Rgb8::UNUSED);
        assert!(texel.is_surface());
        assert!(!Rgb8::NO_SURFACE.is_surface());
    }
}
