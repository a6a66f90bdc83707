//! Retry policy.
//!
//! A policy bounds how many transport attempts one logical send may make.
//! Attempts run back to back on the same worker with no delay between them.

use std::num::NonZeroU32;

/// Bound on attempts for one logical send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetryPolicy {
    /// One attempt; its error is delivered unchanged.
    #[default]
    NoRetry,
    /// Up to `n` attempts; if all fail the caller sees
    /// [`HttpError::RetryLimitExceeded`](crate::HttpError::RetryLimitExceeded).
    RetryUpTo(NonZeroU32),
}

impl RetryPolicy {
    /// Up to three attempts.
    pub const RETRY_UP_TO_3: RetryPolicy = match NonZeroU32::new(3) {
        Some(n) => RetryPolicy::RetryUpTo(n),
        None => panic!("attempt bound must be non-zero"),
    };

    /// `RetryUpTo(n)`, or `None` when `n` is zero.
    pub fn retry_up_to(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(RetryPolicy::RetryUpTo)
    }

    /// Total attempts permitted, including the first.
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::NoRetry => 1,
            RetryPolicy::RetryUpTo(n) => n.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        assert_eq!(RetryPolicy::default(), RetryPolicy::NoRetry);
        assert_eq!(RetryPolicy::NoRetry.max_attempts(), 1);
        assert_eq!(RetryPolicy::RETRY_UP_TO_3.max_attempts(), 3);
    }

    #[test]
    fn test_zero_is_rejected() {
        assert_eq!(RetryPolicy::retry_up_to(0), None);
    }

    proptest! {
        #[test]
        fn test_retry_up_to_keeps_bound(n in 1u32..1000) {
            let policy = RetryPolicy::retry_up_to(n).unwrap();
            prop_assert_eq!(policy.max_attempts(), n);
        }
    }
}
