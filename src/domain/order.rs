use crate::domain::ProductId;
use crate::error::ReserveError;

/// Identifier of an audit row, assigned by the store on insert.
pub type OrderId = u64;

/// Classification of a request's terminal outcome. Written exactly once per
/// client-visible order attempt, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Success,
    FailedOutOfStock,
    FailedConflict,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Success => "SUCCESS",
            OrderStatus::FailedOutOfStock => "FAILED_OUT_OF_STOCK",
            OrderStatus::FailedConflict => "FAILED_CONFLICT",
        }
    }

    /// Audit status for a failed reservation.
    ///
    /// `NotFound` shares the out-of-stock audit status; callers still see the
    /// distinct error kind in the response. Store faults record nothing — the
    /// audit table lives in the same unreachable store.
    pub fn for_failure(err: &ReserveError) -> Option<OrderStatus> {
        match err {
            ReserveError::NotFound(_) | ReserveError::OutOfStock { .. } => {
                Some(OrderStatus::FailedOutOfStock)
            }
            ReserveError::Conflict { .. } => Some(OrderStatus::FailedConflict),
            ReserveError::InvalidQuantity(_) | ReserveError::Store(_) => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted audit row.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub user_id: String,
    pub status: OrderStatus,
}

/// Inbound order request payload.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub product_id: ProductId,
    pub quantity: u32,
    pub user_id: String,
}

impl OrderDraft {
    pub fn new(product_id: ProductId, quantity: u32, user_id: impl Into<String>) -> Self {
        Self {
            product_id,
            quantity,
            user_id: user_id.into(),
        }
    }

    /// Shape-level check only: quantity must be a positive integer.
    pub fn validate(&self) -> Result<(), ReserveError> {
        if self.quantity == 0 {
            return Err(ReserveError::InvalidQuantity(self.quantity));
        }
        Ok(())
    }
}

/// Success response for a placed order.
///
/// `new_version` is `Some` only on the optimistic path; the pessimistic
/// protocol never touches the version counter.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub stock_remaining: u32,
    pub new_version: Option<u64>,
}

/// Counts of audit rows grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderStats {
    pub total: u64,
    pub success: u64,
    pub out_of_stock: u64,
    pub conflict: u64,
}
