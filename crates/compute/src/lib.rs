#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Tile Compute
//!
//! Backends that turn a [`RenderJob`] into a [`RenderResult`], and the
//! [`WorkerPool`] that runs them off the main thread. The scheduler talks to
//! workers only through messages: a job is moved into a worker and the result
//! moved back, so nothing is shared while a job is in flight.

use fractal::JobError;
use thiserror::Error;

pub mod backend;
pub mod cpu_backend;
pub mod pool;

pub use backend::ComputeBackend;
#[cfg(feature = "mock")]
pub use backend::mock_cpu::MockCpu;
pub use cpu_backend::CpuBackend;
pub use fractal::{RenderJob, RenderResult};
pub use pool::{default_specs, Completion, WorkerPool, WorkerSpec};

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("invalid job: {0}")]
    InvalidJob(#[from] JobError),
    #[error("worker {0} does not exist")]
    UnknownWorker(usize),
    #[error("worker {0} already has a job in flight")]
    WorkerBusy(usize),
    #[error("worker {worker} is capped at {cap}px, job asks for {tex_size}px")]
    TextureTooLarge { worker: usize, tex_size: u32, cap: u32 },
    #[error("worker {0} has shut down")]
    WorkerGone(usize),
    #[error("worker {0} panicked while rendering")]
    WorkerPanicked(usize),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("backend not available")]
    BackendUnavailable,
}

