//! Resilient HTTP client.
//!
//! [`ResilientHttpClient::send_request`] never blocks its caller. The whole
//! send, every retry included, runs as one background task; the terminal
//! [`Outcome`] then hops to the scheduler's delivery context exactly once.
//!
//! A failing endpoint holds one background worker for all of its attempts,
//! and attempts follow each other with no delay. Slow failures can therefore
//! starve a small worker pool. There is no way to cancel a send once it has
//! been dispatched.

use std::sync::Arc;

use courier_common_core::RequestId;
use courier_common_log::spans::{record_error, request_span};
use courier_common_thread::Scheduler;
use tracing::Span;

use crate::error::HttpError;
use crate::request::Request;
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Terminal result of one logical send.
pub type Outcome = Result<String, HttpError>;

/// Receives the outcome of an asynchronous send on the delivery context.
pub type HttpResponseCallback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Dispatches requests to the background and delivers outcomes on the
/// delivery context.
#[derive(Clone)]
pub struct ResilientHttpClient {
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
}

impl ResilientHttpClient {
    /// Create a client over `transport`, scheduling through `scheduler`.
    pub fn new(transport: Arc<dyn Transport>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            transport,
            scheduler,
        }
    }

    /// The scheduler used for dispatch and delivery.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Send `request` in the background under `policy`.
    ///
    /// With a callback, exactly one delivery task is scheduled once the
    /// request reaches a terminal outcome. Without one, the request still
    /// runs but nothing is ever scheduled on the delivery context.
    pub fn send_request(
        &self,
        request: Request,
        policy: RetryPolicy,
        callback: Option<HttpResponseCallback>,
    ) {
        let transport = Arc::clone(&self.transport);
        let scheduler = Arc::clone(&self.scheduler);
        let request_id = RequestId::new();

        self.scheduler.run_in_background(Box::new(move || {
            let span = request_span(
                &request_id.to_string(),
                request.method().as_str(),
                request.url(),
            );
            let outcome = span.in_scope(|| run_with_retry(transport.as_ref(), &request, policy));
            drop(request);

            match callback {
                Some(callback) => {
                    scheduler.run_on_delivery(Box::new(move || callback(outcome)));
                }
                None => {
                    tracing::trace!(id = %request_id, "no callback registered, outcome discarded");
                }
            }
        }));
    }

    /// Send `request` on the calling thread: one attempt, no retry, no
    /// thread hop.
    ///
    /// Blocks until the transport returns, so it must only be called from a
    /// thread that is not the delivery context.
    pub fn send_request_blocking(&self, request: &Request) -> Result<String, HttpError> {
        let span = request_span(
            &RequestId::new().to_string(),
            request.method().as_str(),
            request.url(),
        );
        let _entered = span.enter();
        self.transport.execute(request).map_err(|e| {
            record_error(&e);
            HttpError::Transport(e)
        })
    }
}

/// Run attempts back to back until one succeeds or `policy` is exhausted.
fn run_with_retry(transport: &dyn Transport, request: &Request, policy: RetryPolicy) -> Outcome {
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match transport.execute(request) {
            Ok(body) => {
                Span::current().record("attempts", attempt);
                tracing::debug!(attempt, "request succeeded");
                return Ok(body);
            }
            Err(error) if attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, error = %error, "attempt failed, retrying");
                attempt += 1;
            }
            Err(error) => {
                Span::current().record("attempts", attempt);
                record_error(&error);
                return Err(match policy {
                    RetryPolicy::NoRetry => HttpError::Transport(error),
                    RetryPolicy::RetryUpTo(_) => {
                        tracing::warn!(attempts = attempt, last_error = %error, "retry limit exceeded");
                        HttpError::RetryLimitExceeded { attempts: attempt }
                    }
                });
            }
        }
    }
}
