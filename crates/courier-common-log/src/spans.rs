//! Span helpers for request dispatch and cache access.

use tracing::{debug_span, field, info_span, Span};

/// Create a span covering one logical send, across all of its attempts.
pub fn request_span(request_id: &str, method: &str, url: &str) -> Span {
    info_span!(
        "request",
        id = %request_id,
        method = %method,
        url = %url,
        attempts = field::Empty,
        error = field::Empty,
    )
}

/// Create a span for a cache operation.
pub fn cache_span(operation: &str, key: &str) -> Span {
    debug_span!("cache", op = %operation, key = %key)
}

/// Record an error on the current span.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", field::display(error));
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Complete the timer and record duration.
    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %duration.as_millis(),
            "operation completed"
        );
    }
}

/// Macro for timing a block of code.
#[macro_export]
macro_rules! timed {
    ($name:expr, $body:expr) => {{
        let _timer = $crate::spans::Timer::start($name);
        let result = $body;
        _timer.finish();
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    fn with_subscriber<F>(f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(EnvFilter::new("trace"))
            .finish();

        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_request_span_nesting() {
        with_subscriber(|| {
            let request = request_span("req_1", "GET", "https://example.com/v1/config");
            let _guard1 = request.enter();

            let cache = cache_span("save", "config-key");
            let _guard2 = cache.enter();

            tracing::info!("nested operation");
        });
    }

    #[test]
    fn test_request_span_records_fields() {
        with_subscriber(|| {
            let span = request_span("req_2", "POST", "/v1/payment_methods");
            let _guard = span.enter();

            span.record("attempts", 3);
            let error = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
            record_error(&error);

            tracing::warn!("request finished with error");
        });
    }

    #[test]
    fn test_timed_macro() {
        with_subscriber(|| {
            let result = timed!("macro_test", {
                std::thread::sleep(std::time::Duration::from_millis(5));
                "success"
            });

            assert_eq!(result, "success");
        });
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        timer.finish();
    }
}
