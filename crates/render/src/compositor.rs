//! # Frame Compositor
//!
//! Draws the active shells into an RGBA frame. Every pixel's view ray is
//! intersected with the shell spheres from the innermost outwards; the first
//! shell whose face holds a surface texel in that direction colors the pixel.
//! "No surface" texels and tiles without current data are transparent.
//!
//! Per-pixel work runs in `f32` with `glam`, in coordinates relative to the
//! camera so deep shells keep their precision.

use crate::camera::View;
use crate::icosahedron::FACE_COUNT;
use crate::shell::{Hierarchy, Shell};
use crate::tile::Texture;
use fractal::raster::tex_coords;
use fractal::Vec3;
use glam::{Mat3 as Mat3f, Vec3 as Vec3f};
use image::{Rgba, RgbaImage};

pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[allow(clippy::cast_possible_truncation)]
fn to_f32(v: Vec3) -> Vec3f {
    Vec3f::new(v.x as f32, v.y as f32, v.z as f32)
}

fn mat_to_f32(m: &fractal::Mat3) -> Mat3f {
    Mat3f::from_cols(to_f32(m.col(0)), to_f32(m.col(1)), to_f32(m.col(2)))
}

struct FaceLayer<'a> {
    centroid: Vec3f,
    /// Maps a direction to its weights on (left, right, apex).
    inverse: Mat3f,
    texture: Option<&'a Texture>,
}

struct ShellLayer<'a> {
    /// Shell center minus camera position.
    center: Vec3f,
    radius_sq: f32,
    faces: Vec<FaceLayer<'a>>,
}

impl<'a> ShellLayer<'a> {
    #[allow(clippy::cast_possible_truncation)]
    fn new(shell: &'a Shell, eye: Vec3) -> Self {
        let faces = shell
            .tiles()
            .iter()
            .map(|tile| {
                let c = tile.corners();
                let corners = Mat3f::from_cols(to_f32(c.left), to_f32(c.right), to_f32(c.apex));
                FaceLayer {
                    centroid: to_f32(c.centroid()),
                    inverse: corners.inverse(),
                    texture: if tile.is_valid(shell.center()) { tile.texture() } else { None },
                }
            })
            .collect();
        Self {
            center: to_f32(shell.center() - eye),
            radius_sq: (shell.radius() * shell.radius()) as f32,
            faces,
        }
    }

    fn sample(&self, dir: Vec3f) -> Option<Rgba<u8>> {
        // Far intersection of the ray with the sphere; the camera is inside.
        let b = dir.dot(self.center);
        let c = self.center.length_squared() - self.radius_sq;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let t = b + disc.sqrt();
        if t <= 0.0 {
            return None;
        }
        let local = dir * t - self.center;
        let face = self
            .faces
            .iter()
            .max_by(|x, y| x.centroid.dot(local).total_cmp(&y.centroid.dot(local)))?;
        let texture = face.texture?;
        let w = face.inverse * local;
        let sum = w.x + w.y + w.z;
        if sum <= 0.0 {
            return None;
        }
        let (tx, ty) = tex_coords(f64::from(w.y / sum), f64::from(w.z / sum));
        let texel = texture.sample(tx, ty);
        texel.is_surface().then_some(Rgba([texel.r, texel.g, texel.b, 255]))
    }
}

/// Owns the frame buffer and redraws it on demand.
pub struct Compositor {
    frame: RgbaImage,
    frames_drawn: u64,
}

impl Compositor {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { frame: RgbaImage::from_pixel(width.max(1), height.max(1), BACKGROUND), frames_drawn: 0 }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    #[must_use]
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    #[must_use]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if (width.max(1), height.max(1)) != self.frame.dimensions() {
            self.frame = RgbaImage::from_pixel(width.max(1), height.max(1), BACKGROUND);
        }
    }

    /// Redraws the frame from the current state of the active shells.
    pub fn compose(&mut self, hierarchy: &Hierarchy, view: &View) -> &RgbaImage {
        let layers: Vec<ShellLayer<'_>> = hierarchy
            .active_shells()
            .iter()
            .rev()
            .map(|shell| ShellLayer::new(shell, view.position))
            .collect();
        debug_assert!(layers.iter().all(|l| l.faces.len() == FACE_COUNT));

        let inverse = mat_to_f32(&view.inverse);
        #[allow(clippy::cast_possible_truncation)]
        let aspect = view.aspect as f32;
        let (w, h) = self.frame.dimensions();
        #[allow(clippy::cast_precision_loss)]
        let (wf, hf) = (w as f32, h as f32);
        for (x, y, pixel) in self.frame.enumerate_pixels_mut() {
            #[allow(clippy::cast_precision_loss)]
            let ndc_x = 2.0 * (x as f32 + 0.5) / wf - 1.0;
            #[allow(clippy::cast_precision_loss)]
            let ndc_y = 1.0 - 2.0 * (y as f32 + 0.5) / hf;
            let dir = (inverse * Vec3f::new(ndc_x * aspect, ndc_y, 1.0)).normalize();
            *pixel = layers.iter().find_map(|layer| layer.sample(dir)).unwrap_or(BACKGROUND);
        }
        self.frames_drawn += 1;
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::settings::RenderSettings;
    use crate::tile::TileId;
    use fractal::{RenderResult, Rgb8};

    fn paint_all(h: &mut Hierarchy, color: Rgb8, size: u32) {
        let ids: Vec<TileId> = h.active_tile_ids().collect();
        paint(h, &ids, color, size);
    }

    fn paint(h: &mut Hierarchy, ids: &[TileId], color: Rgb8, size: u32) {
        for &id in ids {
            let job = h.job(id, size).unwrap();
            let texels = vec![color; (size * size) as usize];
            let result = RenderResult { empty: false, intersection: false, tex_rgb: bytemuck::cast_slice(&texels).to_vec() };
            h.tile_mut(id).unwrap().apply(&job, result);
        }
    }

    #[test]
    fn nothing_computed_gives_background() {
        let h = Hierarchy::new(&RenderSettings::default(), Vec3::ZERO);
        let view = Camera::new(Vec3::ZERO).view(8, 6);
        let mut c = Compositor::new(8, 6);
        let frame = c.compose(&h, &view);
        assert!(frame.pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn painted_root_fills_the_frame() {
        let mut h = Hierarchy::new(&RenderSettings::default(), Vec3::ZERO);
        paint_all(&mut h, Rgb8::new(10, 200, 30), 4);
        let view = Camera::new(Vec3::new(0.01, 0.0, 0.0)).view(8, 8);
        let mut c = Compositor::new(8, 8);
        let frame = c.compose(&h, &view);
        let center = frame.get_pixel(4, 4);
        assert_eq!(*center, Rgba([10, 200, 30, 255]));
        assert_eq!(c.frames_drawn(), 1);
    }

    #[test]
    fn inner_shell_draws_over_outer() {
        let settings = RenderSettings::default();
        let mut h = Hierarchy::new(&settings, Vec3::ZERO);
        paint_all(&mut h, Rgb8::new(1, 1, 1), 2);
        let root = TileId { shell: h.innermost().id(), face: 0 };
        let job = h.job(root, 2).unwrap();
        h.tile_mut(root)
            .unwrap()
            .apply(&job, RenderResult { empty: false, intersection: true, tex_rgb: vec![1; 12] });
        assert!(h.grow(Vec3::ZERO));
        let inner = h.innermost().id();
        let ids: Vec<TileId> = (0..FACE_COUNT).map(|face| TileId { shell: inner, face }).collect();
        paint(&mut h, &ids, Rgb8::new(50, 60, 70), 2);
        let view = Camera::new(Vec3::ZERO).view(4, 4);
        let mut c = Compositor::new(4, 4);
        let frame = c.compose(&h, &view);
        assert!(frame.pixels().any(|p| *p == Rgba([50, 60, 70, 255])));
        assert!(frame.pixels().all(|p| *p != Rgba([1, 1, 1, 255])));
    }

    #[test]
    fn black_surface_texels_are_opaque() {
        let settings = RenderSettings::default();
        let mut h = Hierarchy::new(&settings, Vec3::ZERO);
        paint_all(&mut h, Rgb8::new(90, 10, 10), 2);
        let root = TileId { shell: h.innermost().id(), face: 0 };
        let job = h.job(root, 2).unwrap();
        h.tile_mut(root)
            .unwrap()
            .apply(&job, RenderResult { empty: false, intersection: true, tex_rgb: vec![90, 10, 10].repeat(4) });
        assert!(h.grow(Vec3::ZERO));
        let inner = h.innermost().id();
        let ids: Vec<TileId> = (0..FACE_COUNT).map(|face| TileId { shell: inner, face }).collect();
        // Fully fogged and unlit surface shades to pure black.
        paint(&mut h, &ids, Rgb8::new(0, 0, 0), 2);
        let view = Camera::new(Vec3::ZERO).view(6, 6);
        let mut c = Compositor::new(6, 6);
        let frame = c.compose(&h, &view);
        assert!(frame.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn no_surface_texels_are_transparent() {
        let mut h = Hierarchy::new(&RenderSettings::default(), Vec3::ZERO);
        paint_all(&mut h, Rgb8::NO_SURFACE, 4);
        let view = Camera::new(Vec3::ZERO).view(6, 6);
        let mut c = Compositor::new(6, 6);
        assert!(c.compose(&h, &view).pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn resize_reallocates() {
        let mut c = Compositor::new(4, 4);
        c.resize(10, 3);
        assert_eq!((c.width(), c.height()), (10, 3));
        c.resize(0, 0);
        assert_eq!((c.width(), c.height()), (1, 1));
    }
}
