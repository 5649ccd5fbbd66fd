//! Single background worker that runs package index builds in FIFO order.
//!
//! One worker may be shared by many engines so that index builds across the
//! process never run concurrently. An optional warm-up gate holds the queue
//! back at startup until [`IndexWorker::release_warmup`] is called or the
//! warm-up interval elapses.

use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub type IndexJob = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug)]
struct WarmupGate {
    released: Mutex<bool>,
    cv: Condvar,
    deadline: Option<Instant>,
}

impl WarmupGate {
    fn new(warmup: Option<Duration>) -> Self {
        Self {
            released: Mutex::new(warmup.is_none()),
            cv: Condvar::new(),
            deadline: warmup.map(|d| Instant::now() + d),
        }
    }

    fn release(&self) {
        let mut released = self.released.lock();
        if !*released {
            *released = true;
            self.cv.notify_all();
        }
    }

    fn wait(&self) {
        let mut released = self.released.lock();
        while !*released {
            let Some(deadline) = self.deadline else {
                break;
            };
            let now = Instant::now();
            if now >= deadline {
                debug!("index worker warm-up interval elapsed");
                *released = true;
                break;
            }
            self.cv.wait_for(&mut released, deadline - now);
        }
    }
}

pub struct IndexWorker {
    sender: Mutex<Option<mpsc::Sender<IndexJob>>>,
    gate: Arc<WarmupGate>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IndexWorker {
    /// Start a worker. With `warmup`, jobs queue up but do not run until
    /// the gate is released or the interval passes.
    pub fn new(warmup: Option<Duration>) -> Arc<Self> {
        let gate = Arc::new(WarmupGate::new(warmup));
        let (tx, rx) = mpsc::channel::<IndexJob>();
        let thread_gate = gate.clone();

        let spawned = std::thread::Builder::new()
            .name("unit-index-worker".to_string())
            .spawn(move || {
                thread_gate.wait();
                info!("package index worker started");
                for job in rx {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        warn!("package index job panicked");
                    }
                }
                debug!("package index worker stopped");
            });

        let (sender, handle) = match spawned {
            Ok(handle) => (Some(tx), Some(handle)),
            Err(e) => {
                warn!(error = %e, "failed to spawn index worker, building indexes inline");
                (None, None)
            }
        };

        Arc::new(Self {
            sender: Mutex::new(sender),
            gate,
            handle: Mutex::new(handle),
        })
    }

    /// Queue a job. If the worker thread is gone the job runs inline.
    pub fn submit(&self, job: IndexJob) {
        let rejected = match self.sender.lock().as_ref() {
            Some(tx) => tx.send(job).err().map(|e| e.0),
            None => Some(job),
        };
        if let Some(job) = rejected {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                warn!("package index job panicked");
            }
        }
    }

    /// Let queued jobs run now instead of waiting out the warm-up interval.
    pub fn release_warmup(&self) {
        self.gate.release();
    }

    /// Block until every job submitted before this call has finished.
    /// Waits for the warm-up gate when it is still closed.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel();
        self.submit(Box::new(move || {
            let _ = tx.send(());
        }));
        let _ = rx.recv();
    }
}

impl Drop for IndexWorker {
    fn drop(&mut self) {
        self.sender.lock().take();
        self.gate.release();
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl std::fmt::Debug for IndexWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWorker")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
