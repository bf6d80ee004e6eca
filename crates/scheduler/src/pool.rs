//! Bounded preview worker pool
//!
//! A fixed number of worker threads pull preview jobs from the queue and
//! run them through an executor callback. The pool size is the concurrency
//! ceiling: no matter how many pages are requested at once, at most
//! `num_workers` loads execute concurrently. In-flight jobs are never
//! preempted; cancellation is cooperative through the session token.

use crate::cancel::CancellationToken;
use crate::queue::{PreviewJob, PreviewQueue};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default number of concurrent preview renders
pub const DEFAULT_PREVIEW_WORKERS: usize = 4;

/// Callback workers invoke for each job they pull
///
/// The executor receives the job and the session cancellation token; it
/// should check `token.is_cancelled()` and avoid committing results once
/// cancellation is observed.
pub type PreviewExecutor = Arc<dyn Fn(&PreviewJob, &CancellationToken) + Send + Sync>;

/// Configuration for the preview worker pool
#[derive(Debug, Clone)]
pub struct PreviewPoolConfig {
    /// Number of worker threads; this is the concurrency ceiling
    pub num_workers: usize,

    /// How long an idle worker sleeps before re-checking the queue
    pub poll_interval: Duration,
}

impl Default for PreviewPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_PREVIEW_WORKERS,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl PreviewPoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Bounded-concurrency preview load scheduler
///
/// Spawns `num_workers` named threads at construction. Workers run until
/// shut down; `drain_and_join` is the document-close path, which cancels
/// the session token, drops queued work, and blocks until every in-flight
/// job has finished.
pub struct PreviewPool {
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
    queue: Arc<PreviewQueue>,
    token: CancellationToken,
    in_flight: Arc<AtomicUsize>,
}

impl PreviewPool {
    /// Create and start a pool pulling from `queue`
    pub fn new(queue: Arc<PreviewQueue>, executor: PreviewExecutor, config: PreviewPoolConfig) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let workers = (0..config.num_workers.max(1))
            .map(|id| {
                Worker::new(
                    id,
                    queue.clone(),
                    executor.clone(),
                    shutdown.clone(),
                    token.clone(),
                    in_flight.clone(),
                    config.poll_interval,
                )
            })
            .collect();

        Self {
            workers,
            shutdown,
            queue,
            token,
            in_flight,
        }
    }

    /// Number of worker threads (the concurrency ceiling)
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Jobs currently executing
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The session cancellation token shared with every executor call
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Block until the queue is empty and no job is in flight
    ///
    /// Intended for tests and shutdown paths, not steady-state use.
    pub fn wait_idle(&self) {
        while !self.queue.is_empty() || self.in_flight() > 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Stop workers after the queue empties and wait for them to exit
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in self.workers {
            worker.join();
        }
    }

    /// Cancel outstanding work and wait for in-flight jobs to finish
    ///
    /// Queued jobs are dropped, the session token is cancelled so running
    /// executors stop committing results, and the call blocks until all
    /// workers have exited. Returns the number of queued jobs dropped.
    pub fn drain_and_join(self) -> usize {
        self.token.cancel();
        let dropped = self.queue.drain();

        self.shutdown.store(true, Ordering::Release);
        for worker in self.workers {
            worker.join();
        }

        log::debug!("preview pool drained, {dropped} queued jobs dropped");
        dropped
    }
}

struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: usize,
        queue: Arc<PreviewQueue>,
        executor: PreviewExecutor,
        shutdown: Arc<AtomicBool>,
        token: CancellationToken,
        in_flight: Arc<AtomicUsize>,
        poll_interval: Duration,
    ) -> Self {
        let thread = thread::Builder::new()
            .name(format!("preview-worker-{id}"))
            .spawn(move || {
                Self::run(queue, executor, shutdown, token, in_flight, poll_interval);
            })
            .expect("failed to spawn preview worker");

        Self {
            thread: Some(thread),
        }
    }

    fn run(
        queue: Arc<PreviewQueue>,
        executor: PreviewExecutor,
        shutdown: Arc<AtomicBool>,
        token: CancellationToken,
        in_flight: Arc<AtomicUsize>,
        poll_interval: Duration,
    ) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            if let Some(job) = queue.next_job_counted(&in_flight) {
                if !token.is_cancelled() {
                    executor(&job, &token);
                }
                in_flight.fetch_sub(1, Ordering::AcqRel);
            } else {
                thread::sleep(poll_interval);
            }
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            thread.join().expect("preview worker panicked");
        }
    }
}
