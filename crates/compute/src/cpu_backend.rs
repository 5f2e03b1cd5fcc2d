use crate::{ComputeBackend, ComputeError};
use fractal::{render_tile, Mandelbulb, RenderJob, RenderResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend {
    bulb: Mandelbulb,
}

impl CpuBackend {
    #[must_use]
    pub fn new(bulb: Mandelbulb) -> Self {
        Self { bulb }
    }

    #[must_use]
    pub fn bulb(&self) -> Mandelbulb {
        self.bulb
    }
}

impl ComputeBackend for CpuBackend {
    fn render(&self, job: &RenderJob) -> Result<RenderResult, ComputeError> {
        Ok(render_tile(&self.bulb, job)?)
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractal::Vec3;

    fn job(tex_size: u32) -> RenderJob {
        RenderJob {
            center: Vec3::new(0.0, 0.0, -1.5),
            t_0_0: Vec3::new(-0.1, -0.06, 0.2),
            t_1_0: Vec3::new(0.1, -0.06, 0.2),
            t_05_1: Vec3::new(0.0, 0.12, 0.2),
            distance_limit: 8.0,
            tex_size,
        }
    }

    #[test]
    fn oversized_job_fails() {
        let cpu = CpuBackend::default();
        let result = cpu.render(&job(1024));
        assert!(
            matches!(result, Err(ComputeError::InvalidJob(_))),
            "Expected InvalidJob error, got {result:?}"
        );
    }

    #[test]
    fn well_formed_job_succeeds() {
        let cpu = CpuBackend::new(Mandelbulb::worker());
        let result = cpu.render(&job(4));
        assert!(result.is_ok(), "Expected Ok, got {result:?}");
        assert_eq!(result.unwrap().tex_rgb.len(), 48);
    }
}
