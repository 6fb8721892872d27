use thiserror::Error;

use crate::domain::ProductId;

/// Faults raised by the store itself (lost connection, aborted backend,
/// closed service channel). Never conflated with a version conflict.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Constraint violated: {0}")]
    Constraint(&'static str),
}

/// Terminal outcomes of a reservation attempt.
///
/// `NotFound`, `OutOfStock` and `InvalidQuantity` are never retried.
/// `Conflict` is retried by the optimistic path up to the configured limit.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReserveError {
    #[error("Product not found: {0}")]
    NotFound(ProductId),
    #[error("Insufficient stock: requested {requested}, available {available}")]
    OutOfStock { requested: u32, available: u32 },
    #[error("Concurrent modification of product {product_id}: version {expected_version} is stale")]
    Conflict {
        product_id: ProductId,
        expected_version: u64,
    },
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReserveError {
    /// Whether the optimistic retry loop may run another attempt for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReserveError::Conflict { .. })
    }
}
