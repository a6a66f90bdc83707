//! Courier common core types and utilities.

pub mod id;
pub mod timestamp;

pub use id::{IdParseError, RequestId, SessionId};
pub use timestamp::Timestamp;
