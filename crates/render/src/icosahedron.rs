//! The fixed mesh every shell is built from.
//!
//! Each face is stored as `[apex, left, right]`: in texture space the apex
//! sits at `(0.5, 1)`, the left corner at `(0, 0)` and the right corner at
//! `(1, 0)`.

use fractal::Vec3;

pub const FACE_COUNT: usize = 20;

const T: f64 = 1.618_033_988_749_895;

const VERTICES: [Vec3; 12] = [
    Vec3::new(-1.0, T, 0.0),
    Vec3::new(1.0, T, 0.0),
    Vec3::new(-1.0, -T, 0.0),
    Vec3::new(1.0, -T, 0.0),
    Vec3::new(0.0, -1.0, T),
    Vec3::new(0.0, 1.0, T),
    Vec3::new(0.0, -1.0, -T),
    Vec3::new(0.0, 1.0, -T),
    Vec3::new(T, 0.0, -1.0),
    Vec3::new(T, 0.0, 1.0),
    Vec3::new(-T, 0.0, -1.0),
    Vec3::new(-T, 0.0, 1.0),
];

const FACES: [[usize; 3]; FACE_COUNT] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// Unit corner directions of one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCorners {
    /// Texture `(0.5, 1)`.
    pub apex: Vec3,
    /// Texture `(0, 0)`.
    pub left: Vec3,
    /// Texture `(1, 0)`.
    pub right: Vec3,
}

impl FaceCorners {
    #[must_use]
    pub fn centroid(&self) -> Vec3 {
        (self.apex + self.left + self.right) * (1.0 / 3.0)
    }

    #[must_use]
    pub fn to_array(&self) -> [Vec3; 3] {
        [self.left, self.right, self.apex]
    }
}

fn unit_vertex(i: usize) -> Vec3 {
    let v = VERTICES[i];
    // (1, T, 0) has length sqrt(1 + T^2) for every vertex.
    v * (1.0 / v.length())
}

/// Corner directions of `face`, on the unit sphere.
///
/// # Panics
///
/// Panics if `face >= FACE_COUNT`.
#[must_use]
pub fn face(face: usize) -> FaceCorners {
    let [a, b, c] = FACES[face];
    FaceCorners { apex: unit_vertex(a), left: unit_vertex(b), right: unit_vertex(c) }
}

/// All faces, in mesh order.
pub fn faces() -> impl Iterator<Item = FaceCorners> {
    (0..FACE_COUNT).map(face)
}
