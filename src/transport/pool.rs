//! Shared worker pool for encode/transmit and receive/decode tasks
//!
//! One pool serves every adapter in the process: all outbound drains
//! (serialize + transmit) and all inbound drains (reassemble + decode) run
//! here, keeping the per-adapter network threads free for blocking reads.
//! The pool is an explicit handle constructed once by the orchestrator and
//! passed to each adapter at construction; nothing reaches for it through a
//! global.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of named worker threads
pub struct ThreadPool {
    job_tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `size` workers (`size` must be non-zero)
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "thread pool needs at least one worker");
        let (job_tx, job_rx) = unbounded::<Job>();

        let workers = (0..size)
            .map(|i| {
                let rx: Receiver<Job> = job_rx.clone();
                std::thread::Builder::new()
                    .name(format!("transport-pool-{}", i))
                    .spawn(move || {
                        // Exits when every sender is dropped
                        while let Ok(job) = rx.recv() {
                            job();
                        }
                        log::debug!("pool worker exiting");
                    })
                    .expect("failed to spawn pool worker")
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            workers,
        }
    }

    /// Submit a task for execution on some worker
    pub fn execute<F: FnOnce() + Send + 'static>(&self, job: F) {
        if let Some(tx) = &self.job_tx {
            // Only fails if all workers are gone, which means we are
            // mid-teardown; the job is dropped with them.
            if tx.send(Box::new(job)).is_err() {
                log::warn!("thread pool is shut down, task dropped");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Close the channel so workers drain remaining jobs and exit
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("pool worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_executes_all_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(4);
            for _ in 0..100 {
                let counter = Arc::clone(&counter);
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
            // Drop joins workers after the queue drains
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    #[should_panic]
    fn test_zero_workers_rejected() {
        let _ = ThreadPool::new(0);
    }
}
