#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Mandelbulb Ray Marching Core
//!
//! Everything a tile worker needs and nothing it does not: small value-type
//! linear algebra, the escape-time membership test, the ray marcher with
//! bisection refinement and shading, and the per-tile render loop together
//! with its job/result messages.
//!
//! ## Key Components
//!
//! -   **Algebra:** [`Vec3`] and [`Mat3`] in the [`math`] module.
//! -   **Membership:** [`Mandelbulb`] with interactive and worker presets.
//! -   **Marching:** [`march`](march::march) returns a [`RayOutcome`] that
//!     carries the intersection side channel used to grow the shell
//!     hierarchy.
//! -   **Tiles:** [`render_tile`] turns a [`RenderJob`] into a [`RenderResult`].
//!
//! ```rust
//! use fractal::{render_tile, Mandelbulb, RenderJob, Vec3};
//!
//! let job = RenderJob {
//!     center: Vec3::new(0.0, 0.0, -1.5),
//!     t_0_0: Vec3::new(-0.1, -0.06, 0.2),
//!     t_1_0: Vec3::new(0.1, -0.06, 0.2),
//!     t_05_1: Vec3::new(0.0, 0.12, 0.2),
//!     distance_limit: 8.0,
//!     tex_size: 4,
//! };
//! let result = render_tile(&Mandelbulb::worker(), &job)?;
//! assert_eq!(result.tex_rgb.len(), 4 * 4 * 3);
//! # Ok::<(), fractal::JobError>(())
//! ```

pub mod bulb;
pub mod error;
pub mod march;
pub mod math;
pub mod raster;

pub use bulb::Mandelbulb;
pub use error::JobError;
pub use march::{march, Bisection, Bracket, Hit, RayOutcome, Rgb};
pub use math::{Mat3, Vec3};
pub use raster::{render_tile, RenderJob, RenderResult, Rgb8, MAX_TEX_SIZE};
