//! Fixed-size worker pool.
//!
//! Jobs are submitted in batches; [`WorkerPool::run_batch`] blocks until
//! every job of the batch has finished, which gives the runner its barrier
//! between stages. A panicking job is caught on the worker thread and
//! reported in the batch result, so the worker stays alive.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, error};

/// A unit of work for the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of one job: `Err` carries the panic payload.
pub type JobResult = Result<(), Box<dyn Any + Send + 'static>>;

enum Message {
    Job { index: usize, job: Job, done: Sender<(usize, JobResult)> },
    Shutdown,
}

struct Worker {
    id: usize,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn spawn(id: usize, receiver: Receiver<Message>) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("sim-worker-{id}"))
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Job { index, job, done } => {
                            let result = panic::catch_unwind(AssertUnwindSafe(job));
                            // The submitter may have given up waiting.
                            let _ = done.send((index, result));
                        }
                        Message::Shutdown => break,
                    }
                }
            })?;
        Ok(Self {
            id,
            handle: Some(handle),
        })
    }
}

/// A pool of worker threads fed from one job queue.
pub struct WorkerPool {
    sender: Sender<Message>,
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Start `size` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned.
    pub fn new(size: usize) -> std::io::Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = unbounded();
        let workers = (0..size)
            .map(|id| Worker::spawn(id, receiver.clone()))
            .collect::<std::io::Result<Vec<_>>>()?;
        debug!(workers = size, "worker pool started");
        Ok(Self { sender, workers })
    }

    /// Returns the number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Run every job in `jobs` on the pool and wait for all of them.
    ///
    /// Results are returned in submission order.
    pub fn run_batch(&self, jobs: Vec<Job>) -> Vec<JobResult> {
        let count = jobs.len();
        let (done_tx, done_rx) = unbounded();
        let mut results: Vec<Option<JobResult>> = (0..count).map(|_| None).collect();

        for (index, job) in jobs.into_iter().enumerate() {
            let message = Message::Job {
                index,
                job,
                done: done_tx.clone(),
            };
            if let Err(err) = self.sender.send(message) {
                // Every worker is gone; run the job here instead.
                if let Message::Job { job, .. } = err.into_inner() {
                    results[index] = Some(panic::catch_unwind(AssertUnwindSafe(job)));
                }
            }
        }
        drop(done_tx);

        while let Ok((index, result)) = done_rx.recv() {
            results[index] = Some(result);
        }

        results
            .into_iter()
            .map(|result| result.unwrap_or_else(|| Err(Box::new("job was dropped before completion") as Box<dyn Any + Send>)))
            .collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take()
                && handle.join().is_err()
            {
                error!(worker = worker.id, "worker thread panicked during shutdown");
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size()).finish()
    }
}

/// Best-effort text of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
