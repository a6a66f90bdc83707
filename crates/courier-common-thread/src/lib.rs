//! Thread management utilities.
//!
//! This crate provides:
//! - Named thread spawning with shutdown coordination
//! - Thread pools that drain queued work before exiting
//! - Panic containment for pooled tasks
//! - The [`scheduler`] abstraction used to hop between worker threads and the
//!   single delivery thread

#![warn(missing_docs)]

pub mod scheduler;

pub use scheduler::{ManualScheduler, Scheduler, Task, ThreadScheduler};

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

const IDLE_POLL: Duration = Duration::from_millis(100);

/// A handle to a named, managed thread.
pub struct ManagedThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    name: String,
    id: ThreadId,
}

impl ManagedThread {
    /// Spawn a new named thread.
    pub fn spawn<F>(name: impl Into<String>, f: F) -> io::Result<Self>
    where
        F: FnOnce(ShutdownSignal) + Send + 'static,
    {
        let name = name.into();
        let shutdown = Arc::new(AtomicBool::new(false));
        let signal = ShutdownSignal(shutdown.clone());

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || f(signal))?;
        let id = handle.thread().id();

        Ok(Self {
            handle: Some(handle),
            shutdown,
            name,
            id,
        })
    }

    /// Signal the thread to shut down.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Wait for the thread to complete.
    pub fn join(mut self) -> thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }

    /// Signal shutdown and wait.
    pub fn shutdown(self) -> thread::Result<()> {
        self.signal_shutdown();
        self.join()
    }

    /// Get the thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the OS thread id.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Check if shutdown was requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        // Never join here: a pool may be dropped from one of its own workers.
        self.signal_shutdown();
    }
}

/// A signal to check for shutdown requests.
#[derive(Clone)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Check if shutdown was requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Error returned when submitting to a pool whose workers are gone.
#[derive(Debug, Clone, thiserror::Error)]
#[error("thread pool '{name}' is closed")]
pub struct PoolClosed {
    /// Name prefix of the pool.
    pub name: String,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of named worker threads.
///
/// Workers exit once shutdown is requested *and* the queue is idle, or once
/// every sender is gone and the queue is drained.
pub struct ThreadPool {
    name: String,
    workers: Vec<ManagedThread>,
    sender: Option<crossbeam_channel::Sender<Job>>,
}

impl ThreadPool {
    /// Create a new pool with `size` workers named `{name}-{index}`.
    pub fn new(name: impl Into<String>, size: usize) -> io::Result<Self> {
        let name = name.into();
        let size = size.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let workers = (0..size)
            .map(|i| {
                let rx = receiver.clone();
                ManagedThread::spawn(format!("{}-{}", name, i), move |signal| {
                    worker_loop(rx, signal)
                })
            })
            .collect::<io::Result<Vec<_>>>()?;

        tracing::debug!(pool = %name, workers = size, "thread pool started");

        Ok(Self {
            name,
            workers,
            sender: Some(sender),
        })
    }

    /// Submit a task to the pool.
    pub fn submit<F>(&self, f: F) -> Result<(), PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        let closed = || PoolClosed {
            name: self.name.clone(),
        };
        let sender = self.sender.as_ref().ok_or_else(closed)?;
        sender.send(Box::new(f)).map_err(|_| closed())
    }

    /// Name prefix of the pool's threads.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Thread ids of every worker.
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.workers.iter().map(ManagedThread::id).collect()
    }

    /// Stop accepting work, let workers drain the queue, and wait for them.
    pub fn shutdown(mut self) {
        self.sender.take();
        for worker in std::mem::take(&mut self.workers) {
            if worker.join().is_err() {
                tracing::error!(pool = %self.name, "worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_loop(rx: crossbeam_channel::Receiver<Job>, signal: ShutdownSignal) {
    loop {
        match rx.recv_timeout(IDLE_POLL) {
            Ok(job) => {
                if let Err(message) = catch_panic(std::panic::AssertUnwindSafe(job)) {
                    tracing::error!(panic = %message, "pooled task panicked");
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if signal.is_requested() {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Catch panics and convert to Result.
pub fn catch_panic<F, T>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T + std::panic::UnwindSafe,
{
    std::panic::catch_unwind(f).map_err(|e| {
        if let Some(s) = e.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = e.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        }
    })
}
