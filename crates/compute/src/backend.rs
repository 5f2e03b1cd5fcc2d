use crate::ComputeError;
use fractal::{RenderJob, RenderResult};

#[cfg(feature = "mock")]
pub mod mock_cpu;

pub trait ComputeBackend: Send + Sync + 'static {
    /// Renders the tile described by `job`.
    ///
    /// Called from worker threads; implementations must not rely on being
    /// invoked from any particular thread.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::InvalidJob` if the job fails validation. May
    /// return other `ComputeError` variants depending on the backend.
    fn render(&self, job: &RenderJob) -> Result<RenderResult, ComputeError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}
