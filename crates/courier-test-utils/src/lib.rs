//! Test utilities for Courier crates.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use courier_http::{HttpResponseCallback, Outcome, Request, Transport, TransportError};
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Creates a temporary file with given content.
pub fn temp_file(content: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join("test_file");
    std::fs::write(&path, content).expect("Failed to write temp file");
    (dir, path)
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(_) => {}
        }
    };
}

/// One scripted transport reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this body.
    Body(String),
    /// Fail with `TransportError::Other(message)`.
    Fail(String),
}

/// A request seen by [`ScriptedTransport`], with the thread that sent it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: Request,
    pub thread: ThreadId,
}

/// [`Transport`] that replays scripted replies in order.
///
/// Once the script runs out, every call gets the fallback reply.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Reply,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    /// Always answer `body`.
    pub fn always(body: impl Into<String>) -> Self {
        Self::with_fallback(Reply::Body(body.into()))
    }

    /// Always fail with `message`.
    pub fn always_failing(message: impl Into<String>) -> Self {
        Self::with_fallback(Reply::Fail(message.into()))
    }

    fn with_fallback(fallback: Reply) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue `reply` ahead of the fallback.
    pub fn then(self, reply: Reply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    /// Number of `execute` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Into a shareable trait object, keeping `self` for inspection.
    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &Request) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            request: request.clone(),
            thread: thread::current().id(),
        });
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Body(body) => Ok(body),
            Reply::Fail(message) => Err(TransportError::Other(message)),
        }
    }
}

/// A delivered outcome with the thread that delivered it.
#[derive(Debug)]
pub struct Delivery {
    pub outcome: Outcome,
    pub thread: ThreadId,
}

/// Collects outcomes handed to callbacks it creates.
#[derive(Clone, Default)]
pub struct RecordingCallback {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl RecordingCallback {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that records into this recorder.
    pub fn callback(&self) -> HttpResponseCallback {
        let deliveries = self.deliveries.clone();
        Box::new(move |outcome| {
            deliveries.lock().unwrap().push(Delivery {
                outcome,
                thread: thread::current().id(),
            });
        })
    }

    /// Number of deliveries so far.
    pub fn count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    /// Take every delivery recorded so far.
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.lock().unwrap())
    }
}
