//! Resilient HTTP dispatch for Courier.
//!
//! - [`Request`]: immutable description of one exchange
//! - [`Transport`]: performs it, blocking, exactly once
//! - [`RetryPolicy`]: how many attempts a send may make
//! - [`ResilientHttpClient`]: runs sends in the background and delivers the
//!   [`Outcome`] on the scheduler's delivery context

pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

pub use client::{HttpResponseCallback, Outcome, ResilientHttpClient};
pub use error::{HttpError, TransportError, RETRY_LIMIT_MESSAGE};
pub use request::{headers, Method, Request, RequestBuilder};
pub use response::{parse_json, parse_json_object, ResponseError};
pub use retry::RetryPolicy;
pub use transport::{build_client, check_status, HttpConfig, ReqwestTransport, Transport};
