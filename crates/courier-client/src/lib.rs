//! Courier client facade.
//!
//! [`Gateway`] wires a [`courier_http::ResilientHttpClient`] to a base URL,
//! authorization and session. [`ApiClient`] builds versioned resource calls
//! on top of it without keeping it alive.

pub mod api;
pub mod gateway;

pub use api::{versioned_path, ApiClient, JsonCallback, API_VERSION_PREFIX, PAYMENT_METHOD_ENDPOINT};
pub use gateway::{build_http_client, http_config, Gateway, GatewayError};
