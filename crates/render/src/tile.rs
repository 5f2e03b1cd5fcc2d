//! One textured face of a shell.

use crate::icosahedron::FaceCorners;
use fractal::raster::tex_coords;
use fractal::{RenderJob, RenderResult, Rgb8, Vec3};
use std::fmt;

/// Stable shell identity. Ids are handed out once and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShellId(pub u64);

/// Addresses a tile across the whole hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub shell: ShellId,
    pub face: usize,
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.shell.0, self.face)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub size: u32,
    pub rgb: Vec<u8>,
}

impl Texture {
    /// Nearest texel at texture coordinate `(tex_x, tex_y)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&self, tex_x: f64, tex_y: f64) -> Rgb8 {
        let n = f64::from(self.size);
        let max = self.size.saturating_sub(1);
        let x = ((tex_x * n).floor().max(0.0) as u32).min(max);
        let y = ((tex_y * n).floor().max(0.0) as u32).min(max);
        let texels: &[Rgb8] = bytemuck::cast_slice(&self.rgb);
        texels.get((y * self.size + x) as usize).copied().unwrap_or(Rgb8::UNUSED)
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    corners: FaceCorners,
    texture: Option<Texture>,
    /// Shell center the texture was rendered from.
    computed_for: Option<Vec3>,
    pub calculated: bool,
    pub empty: bool,
    pub intersection: bool,
    pub busy: bool,
}

impl Tile {
    #[must_use]
    pub fn new(corners: FaceCorners) -> Self {
        Self {
            corners,
            texture: None,
            computed_for: None,
            calculated: false,
            empty: false,
            intersection: false,
            busy: false,
        }
    }

    #[must_use]
    pub fn corners(&self) -> &FaceCorners {
        &self.corners
    }

    #[must_use]
    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    /// Edge of the current texture, 0 if there is none.
    #[must_use]
    pub fn tex_size(&self) -> u32 {
        self.texture.as_ref().map_or(0, |t| t.size)
    }

    /// Computed for the shell's present center.
    #[must_use]
    pub fn is_current(&self, center: Vec3) -> bool {
        self.calculated && self.computed_for == Some(center)
    }

    /// Current and worth drawing.
    #[must_use]
    pub fn is_valid(&self, center: Vec3) -> bool {
        self.is_current(center) && !self.empty && self.texture.is_some()
    }

    /// Job for this face of a shell at `center` with radius `radius`.
    #[must_use]
    pub fn job(&self, center: Vec3, radius: f64, distance_limit: f64, tex_size: u32) -> RenderJob {
        RenderJob {
            center,
            t_0_0: self.corners.left * radius,
            t_1_0: self.corners.right * radius,
            t_05_1: self.corners.apex * radius,
            distance_limit,
            tex_size,
        }
    }

    /// Stores a finished job. Results for an old center are kept but never
    /// count as current.
    pub fn apply(&mut self, job: &RenderJob, result: RenderResult) {
        self.busy = false;
        self.calculated = true;
        self.computed_for = Some(job.center);
        self.empty = result.empty;
        self.intersection = result.intersection;
        self.texture = Some(Texture { size: job.tex_size, rgb: result.tex_rgb });
    }

    /// A job failed; the tile stays as it was and may be picked again.
    pub fn release(&mut self) {
        self.busy = false;
    }

    /// Forgets everything computed for a previous center.
    pub fn invalidate(&mut self) {
        self.calculated = false;
        self.empty = false;
        self.intersection = false;
        self.computed_for = None;
        self.texture = None;
    }

    /// Texel seen along `dir` from the shell center, if `dir` falls in this
    /// face and the texel holds a surface.
    #[must_use]
    pub fn sample_direction(&self, dir: Vec3) -> Option<Rgb8> {
        let texture = self.texture.as_ref()?;
        let (beta, gamma) = self.barycentric(dir)?;
        let (tx, ty) = tex_coords(beta, gamma);
        let texel = texture.sample(tx, ty);
        texel.is_surface().then_some(texel)
    }

    /// Weights of `dir` on the right and apex corners, normalized to the
    /// flat face. `None` when `dir` points outside the face.
    #[must_use]
    pub fn barycentric(&self, dir: Vec3) -> Option<(f64, f64)> {
        let m = fractal::Mat3::from_cols(self.corners.left, self.corners.right, self.corners.apex);
        let w = m.inverse()? * dir;
        let sum = w.x + w.y + w.z;
        if w.x < -1e-9 || w.y < -1e-9 || w.z < -1e-9 || sum <= 0.0 {
            return None;
        }
        Some((w.y / sum, w.z / sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icosahedron;

    fn result(size: u32, texel: Rgb8) -> RenderResult {
        let texels = vec![texel; (size * size) as usize];
        RenderResult { empty: false, intersection: true, tex_rgb: bytemuck::cast_slice(&texels).to_vec() }
    }

    #[test]
    fn applied_result_is_current_only_for_its_center() {
        let mut tile = Tile::new(icosahedron::face(3));
        let job = tile.job(Vec3::ZERO, 1.0, 2.0, 4);
        tile.busy = true;
        tile.apply(&job, result(4, Rgb8::new(1, 2, 3)));
        assert!(!tile.busy);
        assert!(tile.is_valid(Vec3::ZERO));
        assert!(!tile.is_current(Vec3::new(0.0, 0.0, 1e-3)));
        assert_eq!(tile.tex_size(), 4);
    }

    #[test]
    fn invalidate_clears_flags() {
        let mut tile = Tile::new(icosahedron::face(0));
        let job = tile.job(Vec3::ZERO, 1.0, 2.0, 2);
        tile.apply(&job, result(2, Rgb8::new(9, 9, 9)));
        tile.invalidate();
        assert!(!tile.calculated && !tile.intersection);
        assert_eq!(tile.tex_size(), 0);
    }

    #[test]
    fn corner_rays_match_job_vectors() {
        let tile = Tile::new(icosahedron::face(7));
        let job = tile.job(Vec3::new(1.0, 2.0, 3.0), 0.5, 2.0, 8);
        assert_eq!(job.t_0_0, tile.corners().left * 0.5);
        assert_eq!(job.t_05_1, tile.corners().apex * 0.5);
    }

    #[test]
    fn sampling_agrees_with_the_rasterizer_layout() {
        // Paint one texel, then look along the ray the rasterizer used for it.
        let size = 8;
        let mut tile = Tile::new(icosahedron::face(5));
        let job = tile.job(Vec3::ZERO, 1.0, 2.0, size);
        let mut texels = vec![Rgb8::NO_SURFACE; (size * size) as usize];
        let (x, y) = (3, 2);
        texels[(y * size + x) as usize] = Rgb8::new(10, 20, 30);
        let res = RenderResult { empty: false, intersection: false, tex_rgb: bytemuck::cast_slice(&texels).to_vec() };
        tile.apply(&job, res);

        let n = f64::from(size);
        let dir = job.direction_at((f64::from(x) + 0.5) / n, (f64::from(y) + 0.5) / n);
        assert_eq!(tile.sample_direction(dir), Some(Rgb8::new(10, 20, 30)));
        let other = job.direction_at(0.5 / n, 0.5 / n);
        assert_eq!(tile.sample_direction(other), None);
    }

    #[test]
    fn direction_outside_face_has_no_weights() {
        let tile = Tile::new(icosahedron::face(0));
        assert!(tile.barycentric(-tile.corners().centroid()).is_none());
        assert!(tile.barycentric(tile.corners().centroid()).is_some());
    }
}
