//! # Worker Pool
//!
//! A fixed set of worker threads, each with its own job channel and a shared
//! completion channel back to the owner. Each worker holds at most one job;
//! the pool tracks which workers are idle so the scheduler can hand out work
//! without blocking.
//!
//! Workers differ only in their resolution cap: a worker never receives a job
//! whose texture is larger than its [`WorkerSpec::max_tex_size`]. Keeping one
//! low-capped worker means coarse tiles always have somewhere to go while the
//! other workers are busy with large textures.

use crate::{ComputeBackend, ComputeError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use fractal::{RenderJob, RenderResult, MAX_TEX_SIZE};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, debug_span, warn};

/// Cap of the quick-feedback worker in [`default_specs`].
pub const PREVIEW_TEX_CAP: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSpec {
    pub max_tex_size: u32,
}

/// One preview worker capped at [`PREVIEW_TEX_CAP`], the rest uncapped.
#[must_use]
pub fn default_specs(count: usize) -> Vec<WorkerSpec> {
    (0..count.max(1))
        .map(|i| WorkerSpec {
            max_tex_size: if i == 0 && count > 1 { PREVIEW_TEX_CAP } else { MAX_TEX_SIZE },
        })
        .collect()
}

/// A finished job, tagged with whatever the dispatcher attached to it.
#[derive(Debug)]
pub struct Completion<T> {
    pub worker: usize,
    pub tag: T,
    pub job: RenderJob,
    pub outcome: Result<RenderResult, ComputeError>,
}

struct Envelope<T> {
    tag: T,
    job: RenderJob,
}

struct Worker<T> {
    spec: WorkerSpec,
    jobs: Option<Sender<Envelope<T>>>,
    thread: Option<JoinHandle<()>>,
    busy: bool,
}

pub struct WorkerPool<T> {
    workers: Vec<Worker<T>>,
    completions: Receiver<Completion<T>>,
    backend_name: &'static str,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawns one thread per spec, all sharing `backend`.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::Spawn` if a thread cannot be created.
    pub fn new(backend: Arc<dyn ComputeBackend>, specs: &[WorkerSpec]) -> Result<Self, ComputeError> {
        let (done_tx, done_rx) = unbounded::<Completion<T>>();
        let mut workers = Vec::with_capacity(specs.len());
        for (id, spec) in specs.iter().copied().enumerate() {
            let (job_tx, job_rx) = unbounded::<Envelope<T>>();
            let backend = Arc::clone(&backend);
            let done_tx = done_tx.clone();
            let thread = thread::Builder::new()
                .name(format!("tile-worker-{id}"))
                .spawn(move || worker_loop(id, backend.as_ref(), &job_rx, &done_tx))?;
            workers.push(Worker { spec, jobs: Some(job_tx), thread: Some(thread), busy: false });
        }
        debug!(workers = workers.len(), backend = backend.name(), "worker pool started");
        Ok(Self { workers, completions: done_rx, backend_name: backend.name() })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    #[must_use]
    pub fn spec(&self, worker: usize) -> Option<WorkerSpec> {
        self.workers.get(worker).map(|w| w.spec)
    }

    /// Idle workers and their specs, in worker order.
    pub fn idle_workers(&self) -> impl Iterator<Item = (usize, WorkerSpec)> + '_ {
        self.workers
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.busy && w.jobs.is_some())
            .map(|(id, w)| (id, w.spec))
    }

    /// Number of jobs currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.workers.iter().filter(|w| w.busy).count()
    }

    /// Hands `job` to an idle worker.
    ///
    /// # Errors
    ///
    /// Fails without side effects if the job is malformed, the worker is
    /// unknown, busy, gone, or capped below the job's texture size.
    pub fn dispatch(&mut self, worker: usize, tag: T, job: RenderJob) -> Result<(), ComputeError> {
        job.validate()?;
        let slot = self.workers.get_mut(worker).ok_or(ComputeError::UnknownWorker(worker))?;
        if slot.busy {
            return Err(ComputeError::WorkerBusy(worker));
        }
        if job.tex_size > slot.spec.max_tex_size {
            return Err(ComputeError::TextureTooLarge {
                worker,
                tex_size: job.tex_size,
                cap: slot.spec.max_tex_size,
            });
        }
        let sender = slot.jobs.as_ref().ok_or(ComputeError::WorkerGone(worker))?;
        if sender.send(Envelope { tag, job }).is_err() {
            slot.jobs = None;
            return Err(ComputeError::WorkerGone(worker));
        }
        slot.busy = true;
        Ok(())
    }

    /// Next finished job, if any, without blocking.
    pub fn try_complete(&mut self) -> Option<Completion<T>> {
        match self.completions.try_recv() {
            Ok(done) => Some(self.finish(done)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next finished job. Returns immediately
    /// with `None` when nothing is in flight.
    pub fn wait(&mut self, timeout: Duration) -> Option<Completion<T>> {
        if self.in_flight() == 0 {
            return None;
        }
        match self.completions.recv_timeout(timeout) {
            Ok(done) => Some(self.finish(done)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything that finished so far.
    pub fn drain(&mut self) -> Vec<Completion<T>> {
        std::iter::from_fn(|| self.try_complete()).collect()
    }

    fn finish(&mut self, done: Completion<T>) -> Completion<T> {
        if let Some(slot) = self.workers.get_mut(done.worker) {
            slot.busy = false;
        }
        done
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        // Closing the job channels ends each worker loop.
        for w in &mut self.workers {
            w.jobs = None;
        }
        for (id, w) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = w.thread.take() {
                if handle.join().is_err() {
                    warn!(worker = id, "worker thread panicked");
                }
            }
        }
    }
}

fn worker_loop<T>(
    id: usize,
    backend: &dyn ComputeBackend,
    jobs: &Receiver<Envelope<T>>,
    done: &Sender<Completion<T>>,
) {
    for Envelope { tag, job } in jobs {
        let span = debug_span!("render_tile", worker = id, tex_size = job.tex_size);
        let _guard = span.enter();
        let outcome = catch_unwind(AssertUnwindSafe(|| backend.render(&job)))
            .unwrap_or(Err(ComputeError::WorkerPanicked(id)));
        if let Err(e) = &outcome {
            warn!(worker = id, "tile job failed: {e}");
        }
        if done.send(Completion { worker: id, tag, job, outcome }).is_err() {
            break;
        }
    }
    debug!(worker = id, "worker exiting");
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::MockCpu;
    use fractal::Vec3;

    fn job(tex_size: u32) -> RenderJob {
        RenderJob {
            center: Vec3::new(0.0, 0.0, -2.0),
            t_0_0: Vec3::new(-0.2, -0.2, 1.0),
            t_1_0: Vec3::new(0.2, -0.2, 1.0),
            t_05_1: Vec3::new(0.0, 0.2, 1.0),
            distance_limit: 4.0,
            tex_size,
        }
    }

    fn pool(specs: &[WorkerSpec]) -> WorkerPool<u32> {
        WorkerPool::new(Arc::new(MockCpu::default()), specs).unwrap()
    }

    #[test]
    fn default_specs_keep_one_preview_worker() {
        let specs = default_specs(4);
        assert_eq!(specs.len(), 4);
        assert_eq!(specs[0].max_tex_size, PREVIEW_TEX_CAP);
        assert!(specs[1..].iter().all(|s| s.max_tex_size == MAX_TEX_SIZE));
        assert_eq!(default_specs(1)[0].max_tex_size, MAX_TEX_SIZE);
        assert_eq!(default_specs(0).len(), 1);
    }

    #[test]
    fn busy_worker_rejects_second_job() {
        let mut pool = pool(&[WorkerSpec { max_tex_size: 64 }]);
        pool.dispatch(0, 1, job(8)).unwrap();
        assert!(matches!(pool.dispatch(0, 2, job(8)), Err(ComputeError::WorkerBusy(0))));
        assert_eq!(pool.idle_workers().count(), 0);
        let done = pool.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(done.tag, 1);
        assert_eq!(pool.idle_workers().count(), 1);
    }

    #[test]
    fn cap_is_enforced() {
        let mut pool = pool(&[WorkerSpec { max_tex_size: 16 }]);
        let err = pool.dispatch(0, 0, job(32)).unwrap_err();
        assert!(matches!(err, ComputeError::TextureTooLarge { worker: 0, tex_size: 32, cap: 16 }));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn malformed_job_never_reaches_a_worker() {
        let mut pool = pool(&default_specs(2));
        let mut bad = job(8);
        bad.distance_limit = 0.0;
        assert!(matches!(pool.dispatch(1, 0, bad), Err(ComputeError::InvalidJob(_))));
        assert!(matches!(pool.dispatch(7, 0, job(8)), Err(ComputeError::UnknownWorker(7))));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn all_workers_complete_in_parallel() {
        let mut pool = pool(&default_specs(3));
        let ids: Vec<usize> = pool.idle_workers().map(|(id, _)| id).collect();
        for (n, id) in ids.iter().enumerate() {
            pool.dispatch(*id, u32::try_from(n).unwrap(), job(8)).unwrap();
        }
        let mut tags = Vec::new();
        while let Some(done) = pool.wait(Duration::from_secs(5)) {
            assert_eq!(done.outcome.unwrap().tex_rgb.len(), 8 * 8 * 3);
            tags.push(done.tag);
        }
        tags.sort_unstable();
        assert_eq!(tags, vec![0, 1, 2]);
        assert_eq!(pool.in_flight(), 0);
    }
}
