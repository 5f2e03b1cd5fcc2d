#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Progressive Shell Renderer
//!
//! Surrounds the camera with concentric icosahedral shells whose faces are
//! textured by background workers, refines them coarse to fine in priority
//! order, and composites the result into frames.
//!
//! ## Key Components
//!
//! -   **[`Hierarchy`]:** the shells and their tiles, grown when the
//!     innermost shell sees the set up close and recentered as the camera
//!     moves.
//! -   **[`Scheduler`]:** scores visible tiles and feeds idle workers.
//! -   **[`CameraController`]:** pointer look and key movement.
//! -   **[`Compositor`]:** ray casts the shells into an RGBA frame.
//! -   **[`Viewer`]:** ties them together in one `tick` per frame.

pub mod camera;
pub mod compositor;
pub mod icosahedron;
pub mod location;
pub mod scheduler;
pub mod settings;
pub mod shell;
pub mod tile;
pub mod viewer;

pub use camera::{Camera, CameraController, InputSample, Key, View};
pub use compositor::Compositor;
pub use scheduler::Scheduler;
pub use settings::{Quality, RenderSettings};
pub use shell::{Hierarchy, Shell};
pub use tile::{ShellId, Tile, TileId};
pub use viewer::{TickReport, Viewer};
