//! Configuration types for Courier.
//!
//! Settings live in `.courier/config.yaml`, may reference environment
//! variables as `${VAR}` or `${VAR:-default}`, and can be overridden by the
//! `COURIER_*` variables in [`vars`].

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;

#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
