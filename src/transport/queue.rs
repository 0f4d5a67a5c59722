//! Thread-safe FIFO bridging one producer path and the shared worker pool
//!
//! The queue carries its own scheduling state: an atomic idle flag that is
//! true exactly when no drain task is scheduled or running. [`push`] tells
//! the caller whether it just took responsibility for scheduling a drain;
//! [`drain`] processes items until the FIFO is observed empty and then hands
//! the flag back, re-checking for items that slipped in between the empty
//! observation and the flag release.
//!
//! Invariant: at any instant either a drain is in flight or the queue is
//! empty and idle, and at most one drain is ever active per queue. Flag
//! transitions go through compare-and-swap, so two concurrent drains on one
//! queue are impossible. Downstream code relies on that exclusivity; the
//! inbound reassembly buffer has exactly one writer because its queue has at
//! most one drain.
//!
//! [`push`]: TransportQueue::push
//! [`drain`]: TransportQueue::drain

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// FIFO with an at-most-one-active-drain guarantee
pub struct TransportQueue<T> {
    fifo: Mutex<VecDeque<T>>,
    idle: AtomicBool,
}

impl<T> TransportQueue<T> {
    /// Create an empty, idle queue
    pub fn new() -> Self {
        Self {
            fifo: Mutex::new(VecDeque::new()),
            idle: AtomicBool::new(true),
        }
    }

    /// Append an item
    ///
    /// Returns `true` when the caller must schedule a drain task; `false`
    /// when a drain is already scheduled or running and will observe the
    /// item. The item is enqueued before the flag check, so a concurrent
    /// drain that wins the flag is guaranteed to see it.
    #[must_use]
    pub fn push(&self, item: T) -> bool {
        self.fifo.lock().push_back(item);
        self.idle
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Process queued items until empty, then release the drain
    ///
    /// Must only be called by the task that won the flag via [`push`]. After
    /// the FIFO is observed empty the idle flag is set, then the FIFO is
    /// checked once more: an item pushed between the empty observation and
    /// the flag release is either picked up here (by reclaiming the flag) or
    /// by the drain its own push scheduled.
    pub fn drain<F: FnMut(T)>(&self, mut process: F) {
        loop {
            while let Some(item) = self.pop() {
                process(item);
            }
            self.idle.store(true, Ordering::Release);

            if self.fifo.lock().is_empty() {
                return;
            }
            // Items raced in; keep draining only if we win the flag back
            if self
                .idle
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
        }
    }

    fn pop(&self) -> Option<T> {
        self.fifo.lock().pop_front()
    }

    /// Number of queued items (snapshot)
    pub fn len(&self) -> usize {
        self.fifo.lock().len()
    }

    /// Whether the FIFO is currently empty (snapshot)
    pub fn is_empty(&self) -> bool {
        self.fifo.lock().is_empty()
    }
}

impl<T> Default for TransportQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::pool::ThreadPool;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_push_reports_scheduling_responsibility() {
        let queue = TransportQueue::new();
        assert!(queue.push(1));
        assert!(!queue.push(2));
        queue.drain(|_| {});
        assert!(queue.push(3));
    }

    #[test]
    fn test_drain_processes_in_fifo_order() {
        let queue = TransportQueue::new();
        for i in 0..10 {
            let _ = queue.push(i);
        }
        let mut seen = Vec::new();
        queue.drain(|i| seen.push(i));
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_picks_up_racing_push() {
        // A push landing after the empty observation but before the flag
        // release must still be drained exactly once, either by the running
        // drain reclaiming the flag or by the push scheduling a new one.
        let queue = Arc::new(TransportQueue::new());
        let processed = Arc::new(AtomicUsize::new(0));

        let _ = queue.push(0usize);
        let q = Arc::clone(&queue);
        let p = Arc::clone(&processed);
        let racer = std::thread::spawn(move || {
            for i in 1..=100usize {
                if q.push(i) {
                    let q2 = Arc::clone(&q);
                    let p2 = Arc::clone(&p);
                    std::thread::spawn(move || {
                        q2.drain(|_| {
                            p2.fetch_add(1, AtomicOrdering::SeqCst);
                        })
                    })
                    .join()
                    .unwrap();
                }
            }
        });
        queue.drain(|_| {
            processed.fetch_add(1, AtomicOrdering::SeqCst);
        });
        racer.join().unwrap();

        // Whatever remains idle-flagged must be drainable by a fresh drain
        if queue.push(usize::MAX) {
            queue.drain(|_| {
                processed.fetch_add(1, AtomicOrdering::SeqCst);
            });
        }
        assert_eq!(processed.load(AtomicOrdering::SeqCst), 102);
    }

    #[test]
    fn test_concurrent_producers_single_drain_exactly_once() {
        const PRODUCERS: usize = 8;
        const ITEMS: usize = 500;

        let pool = Arc::new(ThreadPool::new(4));
        let queue = Arc::new(TransportQueue::new());
        let processed = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let schedule = {
            let queue = Arc::clone(&queue);
            let processed = Arc::clone(&processed);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            move || {
                let queue = Arc::clone(&queue);
                let processed = Arc::clone(&processed);
                let active = Arc::clone(&active);
                let max_active = Arc::clone(&max_active);
                Box::new(move || {
                    let now = active.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                    max_active.fetch_max(now, AtomicOrdering::SeqCst);
                    queue.drain(|_: usize| {
                        processed.fetch_add(1, AtomicOrdering::SeqCst);
                    });
                    active.fetch_sub(1, AtomicOrdering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                let pool = Arc::clone(&pool);
                let schedule = schedule.clone();
                std::thread::spawn(move || {
                    for i in 0..ITEMS {
                        if queue.push(p * ITEMS + i) {
                            pool.execute(schedule());
                        }
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while processed.load(AtomicOrdering::SeqCst) < PRODUCERS * ITEMS
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(processed.load(AtomicOrdering::SeqCst), PRODUCERS * ITEMS);
        assert_eq!(max_active.load(AtomicOrdering::SeqCst), 1, "concurrent drains");
        assert!(queue.is_empty());
    }
}
