//! Transactional store boundary.
//!
//! The protocols never talk to a concrete database; they run against these
//! traits, which promise ACID transactions, row-locking reads
//! (`SELECT … FOR UPDATE` semantics) and conditional updates that report the
//! affected-row count.

pub mod memory;

use async_trait::async_trait;

use crate::domain::{OrderDraft, OrderId, OrderStats, OrderStatus, Product, ProductId};
use crate::error::StoreError;

pub use memory::MemStore;

/// Payload for inserting an audit row. The id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub product_id: ProductId,
    pub quantity: u32,
    pub user_id: String,
    pub status: OrderStatus,
}

impl NewOrder {
    pub fn from_draft(draft: &OrderDraft, status: OrderStatus) -> Self {
        Self {
            product_id: draft.product_id,
            quantity: draft.quantity,
            user_id: draft.user_id.clone(),
            status,
        }
    }
}

/// A connection pool with autocommit helpers.
///
/// `record_order` runs on its own connection: the failure path uses it after
/// the failing transaction has already rolled back.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Autocommit audit insert, independent of any open transaction.
    async fn record_order(&self, order: NewOrder) -> Result<OrderId, StoreError>;

    /// Latest committed state of a product row.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Reset every product to the given stock and version.
    async fn reset_stock(&self, stock: u32, version: u64) -> Result<(), StoreError>;

    /// Fresh aggregation over committed audit rows. In-flight requests are
    /// invisible until their audit row commits.
    async fn order_stats(&self) -> Result<OrderStats, StoreError>;
}

/// One open transaction. Reads observe the latest committed state overlaid
/// with this transaction's own staged writes.
///
/// Dropping a transaction without committing is a rollback: staged writes are
/// discarded and held row locks are released by the store, not by any
/// application-level timer.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Unlocked read.
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Row-locking read. Awaits until this transaction holds the exclusive
    /// lock on the product row; the lock is held until commit or rollback.
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Unconditional decrement, no version bump. Returns the affected-row
    /// count (0 when the row does not exist).
    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<u64, StoreError>;

    /// Conditional decrement gated on the version counter. Blocks on the row
    /// lock like any SQL update, then affects 0 rows when the committed
    /// version no longer equals `expected_version`; otherwise decrements the
    /// stock, increments the version and affects 1 row.
    async fn decrement_stock_versioned(
        &mut self,
        id: ProductId,
        quantity: u32,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Staged audit insert; becomes visible on commit. The assigned id is
    /// burned even if this transaction rolls back, like a SQL sequence.
    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
