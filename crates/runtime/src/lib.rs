#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Headless Runtime
//!
//! Runs the progressive renderer without a window: a scripted or idle camera,
//! a worker pool on the CPU ray marcher, PNG frame export and an optional
//! location file that moves the camera while the run is going.

pub mod app;
pub mod config;
pub mod watcher;

pub use app::{run, RunSummary};
pub use config::{BackendKind, Cli, RunConfig};
