//! Camera and controller for pointer-look navigation
//!
//! The pointer position (normalized to the viewport) sets pitch and yaw
//! directly, the movement keys translate the camera in its own frame. The
//! camera looks down `+z` in camera space.

use crate::settings::RenderSettings;
use fractal::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// Pointer position that counts as "not moved".
const POINTER_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Forward,
    Back,
    Left,
    Right,
}

impl Key {
    /// Maps the usual WASD letters.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'w' => Some(Self::Forward),
            's' => Some(Self::Back),
            'a' => Some(Self::Left),
            'd' => Some(Self::Right),
            _ => None,
        }
    }
}

/// Input gathered for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSample {
    /// Pointer in `[0, 1]^2`, `y` growing downwards. `None` means the
    /// pointer is outside the viewport; it is then treated as centered.
    pub pointer: Option<(f64, f64)>,
    pub keys: Vec<Key>,
    /// Seconds since the previous tick.
    pub dt: f64,
}

impl InputSample {
    #[must_use]
    pub fn idle(dt: f64) -> Self {
        Self { dt, ..Self::default() }
    }

    fn pressed(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }
}

/// Position and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Rotation about the camera `x` axis, up is positive.
    pub pitch: f64,
    /// Rotation about the world `y` axis.
    pub yaw: f64,
}

impl Camera {
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self { position, pitch: 0.0, yaw: 0.0 }
    }

    /// World to camera rotation.
    #[must_use]
    pub fn rotation(&self) -> Mat3 {
        Mat3::rotation(0, -self.pitch) * Mat3::rotation(1, self.yaw)
    }

    /// Camera to world rotation.
    #[must_use]
    pub fn inverse_rotation(&self) -> Mat3 {
        Mat3::rotation(1, -self.yaw) * Mat3::rotation(0, self.pitch)
    }

    /// Viewing direction in world space.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.inverse_rotation() * Vec3::Z
    }

    #[must_use]
    pub fn view(&self, width: u32, height: u32) -> View {
        View {
            position: self.position,
            rotation: self.rotation(),
            inverse: self.inverse_rotation(),
            aspect: f64::from(width.max(1)) / f64::from(height.max(1)),
        }
    }
}

/// Projection of the camera onto a viewport. Vertical field of view is 90
/// degrees; horizontal follows the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub position: Vec3,
    pub rotation: Mat3,
    pub inverse: Mat3,
    /// Width over height.
    pub aspect: f64,
}

impl View {
    #[must_use]
    pub fn to_camera(&self, world: Vec3) -> Vec3 {
        self.rotation * (world - self.position)
    }

    /// Normalized device coordinates of a world point, `None` behind the
    /// camera.
    #[must_use]
    pub fn project(&self, world: Vec3) -> Option<(f64, f64)> {
        let p = self.to_camera(world);
        (p.z > 0.0).then(|| (p.x / (p.z * self.aspect), p.y / p.z))
    }

    #[must_use]
    pub fn in_frustum(&self, world: Vec3) -> bool {
        self.project(world)
            .is_some_and(|(x, y)| x.abs() <= 1.0 && y.abs() <= 1.0)
    }

    /// World direction of the ray through device coordinates `(x, y)`.
    #[must_use]
    pub fn ray(&self, x: f64, y: f64) -> Vec3 {
        self.inverse * Vec3::new(x * self.aspect, y, 1.0)
    }

    /// Rays through the center and the four corners of the viewport.
    #[must_use]
    pub fn probe_rays(&self) -> [Vec3; 5] {
        [
            self.ray(0.0, 0.0),
            self.ray(-1.0, -1.0),
            self.ray(1.0, -1.0),
            self.ray(-1.0, 1.0),
            self.ray(1.0, 1.0),
        ]
    }
}

/// Reported when the view changed during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraChange {
    /// Distance travelled this tick.
    pub moved: f64,
    /// Decaying motion estimate after this tick.
    pub motion: f64,
}

/// Pointer-look controller with key movement.
#[derive(Debug, Clone)]
pub struct CameraController {
    speed: f64,
    max_distance: f64,
    motion_decay: f64,
    last_pointer: Option<(f64, f64)>,
    force_redraw: bool,
    motion: f64,
}

impl CameraController {
    #[must_use]
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            speed: settings.speed,
            max_distance: settings.max_distance,
            motion_decay: settings.motion_decay,
            last_pointer: None,
            // The first tick always reports a change.
            force_redraw: true,
            motion: 0.0,
        }
    }

    /// Next update reports a change even if nothing moved.
    pub fn force_redraw(&mut self) {
        self.force_redraw = true;
    }

    /// Current motion estimate.
    #[must_use]
    pub fn motion(&self) -> f64 {
        self.motion
    }

    /// Applies one tick of input. `move_scale` scales the movement speed,
    /// normally the radius of the innermost active shell.
    pub fn update(&mut self, camera: &mut Camera, input: &InputSample, move_scale: f64) -> Option<CameraChange> {
        self.motion *= self.motion_decay;

        let step = self.speed * input.dt.max(0.0) * move_scale;
        let mut movement = Vec3::ZERO;
        if input.pressed(Key::Forward) {
            movement.z += step;
        }
        if input.pressed(Key::Back) {
            movement.z -= step;
        }
        if input.pressed(Key::Left) {
            movement.x -= step;
        }
        if input.pressed(Key::Right) {
            movement.x += step;
        }

        let pointer = input.pointer.unwrap_or((0.5, 0.5));
        let pointer_delta = self.last_pointer.map_or(f64::INFINITY, |(px, py)| {
            (pointer.0 - px).abs().max((pointer.1 - py).abs())
        });
        let pointer_moved = pointer_delta > POINTER_EPSILON;
        let keys_moved = movement != Vec3::ZERO;
        if !pointer_moved && !keys_moved && !self.force_redraw {
            return None;
        }
        self.force_redraw = false;
        self.last_pointer = Some(pointer);

        camera.pitch = 3.0 * (0.5 - pointer.1);
        camera.yaw = 11.0 * (pointer.0 - 0.5);
        let before = camera.position;
        let mut position = before + camera.inverse_rotation() * movement;
        let dist = position.length();
        if dist > self.max_distance {
            position = position * (self.max_distance / dist);
        }
        camera.position = position;
        let moved = before.distance(position);

        if pointer_delta.is_finite() {
            self.motion += pointer_delta;
        }
        if move_scale > 0.0 {
            self.motion += moved / move_scale;
        }
        Some(CameraChange { moved, motion: self.motion })
    }
}
