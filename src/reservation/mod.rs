//! The two concurrency-control protocols and the retry policy around the
//! optimistic one.
//!
//! Both protocols run inside an already-open transaction owned by the caller;
//! they read and mutate the product row but never commit, roll back or retain
//! the transaction themselves.

pub mod optimistic;
pub mod pessimistic;
pub mod retry;

pub use retry::RetryPolicy;

/// Result of a successful reservation, before the transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub stock_remaining: u32,
    /// `Some` only for the optimistic protocol; the pessimistic path never
    /// bumps the version counter.
    pub new_version: Option<u64>,
}
