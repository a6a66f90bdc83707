//! Background/delivery scheduling.
//!
//! A [`Scheduler`] knows two places to run work: somewhere off the calling
//! thread (background) and the one delivery context on which results are
//! handed back to the embedding application. [`ThreadScheduler`] backs both
//! with real threads; [`ManualScheduler`] queues everything until a test
//! flushes it.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::ThreadPool;

/// A unit of work handed to a scheduler. Ownership moves into the scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs work in the background or on the delivery context.
pub trait Scheduler: Send + Sync {
    /// Run `task` off the calling thread. Background tasks carry no ordering
    /// guarantee relative to each other.
    fn run_in_background(&self, task: Task);

    /// Run `task` on the single delivery context. Delivery tasks run one at a
    /// time in submission order.
    fn run_on_delivery(&self, task: Task);
}

/// Default number of background workers.
pub const DEFAULT_BACKGROUND_WORKERS: usize = 4;

/// Thread name prefix for background workers.
pub const BACKGROUND_POOL_NAME: &str = "courier-worker";

/// Thread name prefix for the delivery thread.
pub const DELIVERY_POOL_NAME: &str = "courier-delivery";

/// Production scheduler: a worker pool plus one dedicated delivery thread.
pub struct ThreadScheduler {
    background: ThreadPool,
    delivery: ThreadPool,
    delivery_thread: ThreadId,
}

impl ThreadScheduler {
    /// Start a scheduler with `background_workers` worker threads.
    pub fn new(background_workers: usize) -> io::Result<Self> {
        let background = ThreadPool::new(BACKGROUND_POOL_NAME, background_workers)?;
        let delivery = ThreadPool::new(DELIVERY_POOL_NAME, 1)?;
        let delivery_thread = delivery.thread_ids()[0];

        Ok(Self {
            background,
            delivery,
            delivery_thread,
        })
    }

    /// Whether the calling thread is this scheduler's delivery thread.
    pub fn is_delivery_thread(&self) -> bool {
        thread::current().id() == self.delivery_thread
    }

    /// Number of background workers.
    pub fn background_workers(&self) -> usize {
        self.background.size()
    }

    /// Drain both queues and stop every thread.
    ///
    /// Must not be called from one of the scheduler's own threads.
    pub fn shutdown(self) {
        self.background.shutdown();
        self.delivery.shutdown();
    }
}

impl Scheduler for ThreadScheduler {
    fn run_in_background(&self, task: Task) {
        if let Err(e) = self.background.submit(task) {
            tracing::error!(error = %e, "dropping background task");
        }
    }

    fn run_on_delivery(&self, task: Task) {
        if let Err(e) = self.delivery.submit(task) {
            tracing::error!(error = %e, "dropping delivery task");
        }
    }
}

/// Deterministic scheduler for tests.
///
/// Nothing runs until [`flush_background`](Self::flush_background) or
/// [`flush_delivery`](Self::flush_delivery) is called, and then everything
/// runs on the calling thread.
#[derive(Default)]
pub struct ManualScheduler {
    background: Mutex<VecDeque<Task>>,
    delivery: Mutex<VecDeque<Task>>,
    background_scheduled: AtomicUsize,
    delivery_scheduled: AtomicUsize,
    delivering: AtomicBool,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued background tasks, including any they enqueue, and return
    /// how many ran.
    pub fn flush_background(&self) -> usize {
        drain(&self.background)
    }

    /// Run queued delivery tasks, including any they enqueue, and return how
    /// many ran.
    pub fn flush_delivery(&self) -> usize {
        self.delivering.store(true, Ordering::SeqCst);
        let ran = drain(&self.delivery);
        self.delivering.store(false, Ordering::SeqCst);
        ran
    }

    /// Total `run_in_background` calls so far.
    pub fn background_scheduled(&self) -> usize {
        self.background_scheduled.load(Ordering::SeqCst)
    }

    /// Total `run_on_delivery` calls so far.
    pub fn delivery_scheduled(&self) -> usize {
        self.delivery_scheduled.load(Ordering::SeqCst)
    }

    /// Background tasks waiting to run.
    pub fn pending_background(&self) -> usize {
        lock(&self.background).len()
    }

    /// Delivery tasks waiting to run.
    pub fn pending_delivery(&self) -> usize {
        lock(&self.delivery).len()
    }

    /// True only while [`flush_delivery`](Self::flush_delivery) is running tasks.
    pub fn is_delivering(&self) -> bool {
        self.delivering.load(Ordering::SeqCst)
    }
}

impl Scheduler for ManualScheduler {
    fn run_in_background(&self, task: Task) {
        self.background_scheduled.fetch_add(1, Ordering::SeqCst);
        lock(&self.background).push_back(task);
    }

    fn run_on_delivery(&self, task: Task) {
        self.delivery_scheduled.fetch_add(1, Ordering::SeqCst);
        lock(&self.delivery).push_back(task);
    }
}

fn lock(queue: &Mutex<VecDeque<Task>>) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

fn drain(queue: &Mutex<VecDeque<Task>>) -> usize {
    let mut ran = 0;
    loop {
        // Release the guard before running so the task can enqueue more work.
        let next = lock(queue).pop_front();
        let Some(task) = next else {
            return ran;
        };
        task();
        ran += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::{mpsc, Arc};
    use std::time::Duration;
    use test_case::test_case;

    #[test]
    fn test_manual_scheduler_defers_until_flush() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicU32::new(0));

        let c = counter.clone();
        scheduler.run_in_background(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_background(), 1);
        assert_eq!(scheduler.flush_background(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_background(), 0);
    }

    #[test]
    fn test_manual_scheduler_queues_are_independent() {
        let scheduler = ManualScheduler::new();
        scheduler.run_on_delivery(Box::new(|| {}));

        assert_eq!(scheduler.flush_background(), 0);
        assert_eq!(scheduler.pending_delivery(), 1);
        assert_eq!(scheduler.background_scheduled(), 0);
        assert_eq!(scheduler.delivery_scheduled(), 1);
    }

    #[test]
    fn test_background_task_can_schedule_delivery() {
        let scheduler = Arc::new(ManualScheduler::new());
        let delivered = Arc::new(AtomicBool::new(false));

        let inner = scheduler.clone();
        let flag = delivered.clone();
        scheduler.run_in_background(Box::new(move || {
            let seen = inner.clone();
            inner.run_on_delivery(Box::new(move || {
                flag.store(seen.is_delivering(), Ordering::SeqCst);
            }));
        }));

        scheduler.flush_background();
        assert!(!delivered.load(Ordering::SeqCst));
        assert_eq!(scheduler.pending_delivery(), 1);

        scheduler.flush_delivery();
        assert!(delivered.load(Ordering::SeqCst));
        assert!(!scheduler.is_delivering());
    }

    #[test]
    fn test_flush_runs_tasks_enqueued_during_drain() {
        let scheduler = Arc::new(ManualScheduler::new());
        let inner = scheduler.clone();
        scheduler.run_in_background(Box::new(move || {
            inner.run_in_background(Box::new(|| {}));
        }));

        assert_eq!(scheduler.flush_background(), 2);
    }

    #[test_case(1 ; "single worker")]
    #[test_case(4 ; "default workers")]
    fn test_thread_scheduler_delivers_on_delivery_thread(workers: usize) {
        let scheduler = Arc::new(ThreadScheduler::new(workers).unwrap());
        assert_eq!(scheduler.background_workers(), workers);
        let (tx, rx) = mpsc::channel();

        let inner = scheduler.clone();
        scheduler.run_in_background(Box::new(move || {
            let on_worker = !inner.is_delivery_thread();
            let check = inner.clone();
            inner.run_on_delivery(Box::new(move || {
                tx.send((on_worker, check.is_delivery_thread())).unwrap();
            }));
        }));

        let (background_off_delivery, delivered_on_delivery) =
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(background_off_delivery);
        assert!(delivered_on_delivery);
        assert!(!scheduler.is_delivery_thread());
    }

    #[test]
    fn test_thread_scheduler_serializes_delivery() {
        let scheduler = ThreadScheduler::new(2).unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..20 {
            let tx = tx.clone();
            scheduler.run_on_delivery(Box::new(move || tx.send(i).unwrap()));
        }
        drop(tx);
        scheduler.shutdown();

        let order: Vec<i32> = rx.iter().collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }
}
