//! # Upstream Worker Pool
//!
//! The blocking HTTP client parks the thread it runs on. Run on a connection
//! coroutine, that thread is a `may` scheduler worker shared by every other
//! connection, so one slow controller would stall `/health` and every 400/405
//! reply along with it.
//!
//! [`UpstreamPool`] keeps a fixed set of OS threads for blocking calls. Jobs
//! go in through a `may::sync::mpsc` queue and results come back on a
//! per-call `may::sync::mpsc` channel, so only the calling coroutine waits.
//!
//! ## Configuration
//!
//! - `ROLLGATE_UPSTREAM_WORKERS` / `--upstream-workers`: pool size (default 16).
//!   Calls beyond that many in flight queue until a worker frees up.

use super::RolloutController;
use crate::error::{Result, RollgateError};
use crate::instruction::RoutingInstruction;
use may::sync::mpsc;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error};

/// Default number of upstream worker threads.
pub const DEFAULT_UPSTREAM_WORKERS: usize = 16;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of OS threads for blocking upstream calls.
///
/// Dropping the pool closes the queue; workers finish their current job and
/// exit.
pub struct UpstreamPool {
    queue: Mutex<mpsc::Sender<Job>>,
    workers: usize,
    in_flight: Arc<AtomicUsize>,
}

impl UpstreamPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(RollgateError::config("upstream worker count must be greater than zero"));
        }
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let in_flight = Arc::new(AtomicUsize::new(0));

        for id in 0..workers {
            let rx = Arc::clone(&rx);
            thread::Builder::new()
                .name(format!("rollgate-upstream-{id}"))
                .spawn(move || worker_loop(id, &rx))?;
        }
        debug!(workers, "Upstream worker pool started");

        Ok(Self {
            queue: Mutex::new(tx),
            workers,
            in_flight,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Calls queued or running right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Run `f` on a pool thread and wait for its result.
    ///
    /// Called from a coroutine, only that coroutine is parked while `f` runs.
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel::<T>();
        let in_flight = Arc::clone(&self.in_flight);
        let job: Job = Box::new(move || {
            let out = panic::catch_unwind(AssertUnwindSafe(f));
            in_flight.fetch_sub(1, Ordering::Relaxed);
            match out {
                // The caller only goes away if its coroutine was cancelled.
                Ok(out) => {
                    if reply_tx.send(out).is_err() {
                        debug!("Upstream result dropped, caller is gone");
                    }
                }
                Err(_) => error!("Upstream job panicked"),
            }
        });

        self.in_flight.fetch_add(1, Ordering::Relaxed);
        let sent = match self.queue.lock() {
            Ok(queue) => queue.send(job).is_ok(),
            Err(_) => false,
        };
        if !sent {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            return Err(pool_gone());
        }
        reply_rx
            .recv()
            .map_err(|_| RollgateError::Io(io::Error::other("upstream call did not complete")))
    }
}

fn pool_gone() -> RollgateError {
    RollgateError::Io(io::Error::other("upstream worker pool is unavailable"))
}

fn worker_loop(id: usize, rx: &Mutex<mpsc::Receiver<Job>>) {
    loop {
        let job = match rx.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok(job) = job else {
            break;
        };
        job();
    }
    debug!(worker_id = id, "Upstream worker stopped");
}

/// A [`RolloutController`] whose calls run on an [`UpstreamPool`].
pub struct PooledController {
    inner: Arc<dyn RolloutController>,
    pool: Arc<UpstreamPool>,
}

impl PooledController {
    pub fn new(inner: Arc<dyn RolloutController>, pool: Arc<UpstreamPool>) -> Self {
        Self { inner, pool }
    }
}

impl RolloutController for PooledController {
    fn set_weight(&self, instruction: &RoutingInstruction) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let instruction = instruction.clone();
        self.pool.run(move || inner.set_weight(&instruction))?
    }
}
