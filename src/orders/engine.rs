//! Order placement engine: runs one protocol per request, classifies the
//! terminal outcome and records exactly one audit row for it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::domain::{OrderDraft, OrderReceipt, OrderStats, OrderStatus, Product, ProductId};
use crate::error::ReserveError;
use crate::reservation::{optimistic, pessimistic, Reservation, RetryPolicy};
use crate::store::{NewOrder, Store, StoreTransaction};

/// The core API consumed by any transport layer.
///
/// Each call runs on its own transaction(s); the engine holds no mutable
/// state, so clones may serve any number of concurrent requests.
pub struct OrderEngine<S, C> {
    store: S,
    clock: Arc<C>,
    policy: RetryPolicy,
    validation_delay: Duration,
}

impl<S: Clone, C> Clone for OrderEngine<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            policy: self.policy,
            validation_delay: self.validation_delay,
        }
    }
}

impl<S, C> OrderEngine<S, C>
where
    S: Store,
    C: Clock,
{
    pub fn new(store: S, clock: Arc<C>, config: &Config) -> Self {
        Self {
            store,
            clock,
            policy: config.retry_policy(),
            validation_delay: config.validation_delay,
        }
    }

    /// Place an order under the pessimistic protocol.
    ///
    /// No retry: the row lock serializes contenders, so the only failures are
    /// `NotFound` and `OutOfStock`, both terminal.
    #[instrument(
        fields(
            product_id = %draft.product_id,
            quantity = %draft.quantity,
            user_id = %draft.user_id,
        ),
        skip(self, draft)
    )]
    pub async fn place_order_pessimistic(
        &self,
        draft: OrderDraft,
    ) -> Result<OrderReceipt, ReserveError> {
        info!("Processing pessimistic order");
        draft.validate()?;

        let mut tx = self.store.begin().await?;
        match pessimistic::reserve(
            &mut tx,
            self.clock.as_ref(),
            draft.product_id,
            draft.quantity,
            self.validation_delay,
        )
        .await
        {
            Ok(reservation) => self.finalize_success(tx, &draft, reservation).await,
            Err(err) => {
                tx.rollback().await?;
                self.record_failure(&draft, &err).await;
                Err(err)
            }
        }
    }

    /// Place an order under the optimistic protocol, retrying conflicts.
    ///
    /// Explicit bounded loop: every attempt gets a fresh transaction, rolled
    /// back in full before the backoff sleep. One audit row is written for the
    /// terminal outcome, never one per attempt.
    #[instrument(
        fields(
            product_id = %draft.product_id,
            quantity = %draft.quantity,
            user_id = %draft.user_id,
        ),
        skip(self, draft)
    )]
    pub async fn place_order_optimistic(
        &self,
        draft: OrderDraft,
    ) -> Result<OrderReceipt, ReserveError> {
        info!("Processing optimistic order");
        draft.validate()?;

        let mut attempt = 1;
        loop {
            let mut tx = self.store.begin().await?;
            let outcome = optimistic::reserve(
                &mut tx,
                self.clock.as_ref(),
                draft.product_id,
                draft.quantity,
                self.validation_delay,
            )
            .await;

            match outcome {
                Ok(reservation) => return self.finalize_success(tx, &draft, reservation).await,
                Err(err) => {
                    tx.rollback().await?;
                    if err.is_retryable() && self.policy.attempts_remaining(attempt) {
                        let delay = self.policy.backoff(attempt);
                        debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after conflict");
                        self.clock.sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    self.record_failure(&draft, &err).await;
                    return Err(err);
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<OrderStats, ReserveError> {
        debug!("Aggregating order stats");
        Ok(self.store.order_stats().await?)
    }

    #[instrument(fields(product_id = %id), skip(self))]
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, ReserveError> {
        debug!("Fetching product");
        Ok(self.store.product(id).await?)
    }

    #[instrument(skip(self))]
    pub async fn reset_stock(&self, stock: u32, version: u64) -> Result<(), ReserveError> {
        info!("Resetting product inventory");
        Ok(self.store.reset_stock(stock, version).await?)
    }

    /// Success path: the audit row shares the reservation's transaction, so
    /// stock change and audit commit atomically together.
    async fn finalize_success(
        &self,
        mut tx: S::Tx,
        draft: &OrderDraft,
        reservation: Reservation,
    ) -> Result<OrderReceipt, ReserveError> {
        let order_id = tx
            .insert_order(NewOrder::from_draft(draft, OrderStatus::Success))
            .await?;
        tx.commit().await?;

        info!(
            order_id,
            stock_remaining = reservation.stock_remaining,
            "Order placed successfully"
        );
        Ok(OrderReceipt {
            order_id,
            product_id: draft.product_id,
            quantity: draft.quantity,
            stock_remaining: reservation.stock_remaining,
            new_version: reservation.new_version,
        })
    }

    /// Failure path: the attempt's transaction is already rolled back, so the
    /// audit row goes through a separate autocommit insert. Best-effort: an
    /// audit failure is logged and the original error still reaches the caller.
    async fn record_failure(&self, draft: &OrderDraft, err: &ReserveError) {
        let Some(status) = OrderStatus::for_failure(err) else {
            warn!(error = %err, "No audit row for this failure kind");
            return;
        };
        match self
            .store
            .record_order(NewOrder::from_draft(draft, status))
            .await
        {
            Ok(order_id) => info!(order_id, status = %status, "Recorded failed order"),
            Err(audit_err) => error!(error = %audit_err, "Failed to record audit row"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::clock::ManualClock;
    use crate::domain::{OrderId, Product};
    use crate::error::StoreError;
    use crate::store::memory::MemTransaction;
    use crate::store::MemStore;

    fn engine_with_stock(
        stock: u32,
    ) -> (OrderEngine<MemStore, ManualClock>, MemStore, Arc<ManualClock>) {
        let store = MemStore::new();
        store.insert_product(Product::new(1, "Widget", stock));
        let clock = Arc::new(ManualClock::new());
        let engine = OrderEngine::new(store.clone(), clock.clone(), &Config::instant());
        (engine, store, clock)
    }

    #[tokio::test]
    async fn pessimistic_success_commits_stock_and_audit_together() {
        let (engine, store, _) = engine_with_stock(5);

        let receipt = engine
            .place_order_pessimistic(OrderDraft::new(1, 3, "user_1"))
            .await
            .unwrap();

        assert_eq!(receipt.stock_remaining, 2);
        assert_eq!(receipt.new_version, None);
        assert_eq!(store.product(1).await.unwrap().unwrap().stock, 2);

        let orders = store.committed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, receipt.order_id);
        assert_eq!(orders[0].status, OrderStatus::Success);
    }

    #[tokio::test]
    async fn optimistic_success_returns_new_version() {
        let (engine, store, _) = engine_with_stock(10);

        let receipt = engine
            .place_order_optimistic(OrderDraft::new(1, 1, "user_1"))
            .await
            .unwrap();

        assert_eq!(receipt.stock_remaining, 9);
        assert_eq!(receipt.new_version, Some(2));
        assert_eq!(store.product(1).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn unknown_product_records_out_of_stock_audit() {
        let (engine, store, _) = engine_with_stock(5);

        let err = engine
            .place_order_pessimistic(OrderDraft::new(99, 1, "user_1"))
            .await
            .unwrap_err();
        assert_eq!(err, ReserveError::NotFound(99));

        let orders = store.committed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::FailedOutOfStock);
        assert_eq!(orders[0].product_id, 99);
    }

    #[tokio::test]
    async fn out_of_stock_is_terminal_on_both_paths() {
        let (engine, store, clock) = engine_with_stock(2);

        let err = engine
            .place_order_optimistic(OrderDraft::new(1, 5, "user_1"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReserveError::OutOfStock {
                requested: 5,
                available: 2
            }
        );
        // Terminal: no backoff sleeps happened.
        assert!(clock.recorded().is_empty());

        let orders = store.committed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::FailedOutOfStock);
    }

    #[tokio::test]
    async fn invalid_quantity_is_rejected_without_audit() {
        let (engine, store, _) = engine_with_stock(5);

        let err = engine
            .place_order_pessimistic(OrderDraft::new(1, 0, "user_1"))
            .await
            .unwrap_err();
        assert_eq!(err, ReserveError::InvalidQuantity(0));
        assert!(store.committed_orders().is_empty());
    }

    #[tokio::test]
    async fn stats_reflect_terminal_outcomes() {
        let (engine, _, _) = engine_with_stock(4);

        engine
            .place_order_pessimistic(OrderDraft::new(1, 3, "user_1"))
            .await
            .unwrap();
        engine
            .place_order_pessimistic(OrderDraft::new(1, 3, "user_2"))
            .await
            .unwrap_err();

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.out_of_stock, 1);
        assert_eq!(stats.conflict, 0);
    }

    #[tokio::test]
    async fn reset_stock_restores_inventory() {
        let (engine, store, _) = engine_with_stock(5);
        engine
            .place_order_optimistic(OrderDraft::new(1, 2, "user_1"))
            .await
            .unwrap();

        engine.reset_stock(1000, 1).await.unwrap();
        let product = store.product(1).await.unwrap().unwrap();
        assert_eq!(product.stock, 1000);
        assert_eq!(product.version, 1);
    }

    // ------------------------------------------------------------------
    // Forced-conflict store: delegates to MemStore but fails the version
    // check a configured number of times, making retry behavior
    // deterministic without real contention.
    // ------------------------------------------------------------------

    #[derive(Clone)]
    struct ConflictingStore {
        inner: MemStore,
        forced_conflicts: Arc<AtomicU32>,
    }

    impl ConflictingStore {
        fn new(inner: MemStore, conflicts: u32) -> Self {
            Self {
                inner,
                forced_conflicts: Arc::new(AtomicU32::new(conflicts)),
            }
        }
    }

    struct ConflictingTx {
        inner: MemTransaction,
        forced_conflicts: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Store for ConflictingStore {
        type Tx = ConflictingTx;

        async fn begin(&self) -> Result<ConflictingTx, StoreError> {
            Ok(ConflictingTx {
                inner: self.inner.begin().await?,
                forced_conflicts: self.forced_conflicts.clone(),
            })
        }

        async fn record_order(&self, order: NewOrder) -> Result<OrderId, StoreError> {
            self.inner.record_order(order).await
        }

        async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.product(id).await
        }

        async fn reset_stock(&self, stock: u32, version: u64) -> Result<(), StoreError> {
            self.inner.reset_stock(stock, version).await
        }

        async fn order_stats(&self) -> Result<OrderStats, StoreError> {
            self.inner.order_stats().await
        }
    }

    #[async_trait]
    impl StoreTransaction for ConflictingTx {
        async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.product(id).await
        }

        async fn product_for_update(
            &mut self,
            id: ProductId,
        ) -> Result<Option<Product>, StoreError> {
            self.inner.product_for_update(id).await
        }

        async fn decrement_stock(
            &mut self,
            id: ProductId,
            quantity: u32,
        ) -> Result<u64, StoreError> {
            self.inner.decrement_stock(id, quantity).await
        }

        async fn decrement_stock_versioned(
            &mut self,
            id: ProductId,
            quantity: u32,
            expected_version: u64,
        ) -> Result<u64, StoreError> {
            if self.forced_conflicts.load(Ordering::SeqCst) > 0 {
                self.forced_conflicts.fetch_sub(1, Ordering::SeqCst);
                return Ok(0);
            }
            self.inner
                .decrement_stock_versioned(id, quantity, expected_version)
                .await
        }

        async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId, StoreError> {
            self.inner.insert_order(order).await
        }

        async fn commit(self) -> Result<(), StoreError> {
            self.inner.commit().await
        }

        async fn rollback(self) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    #[tokio::test]
    async fn conflict_is_retried_with_linear_backoff() {
        let mem = MemStore::new();
        mem.insert_product(Product::new(1, "Widget", 10));
        let store = ConflictingStore::new(mem.clone(), 2);
        let clock = Arc::new(ManualClock::new());
        let engine = OrderEngine::new(store, clock.clone(), &Config::instant());

        let receipt = engine
            .place_order_optimistic(OrderDraft::new(1, 1, "user_1"))
            .await
            .unwrap();

        // Two conflicts, then success on the third and final attempt.
        assert_eq!(receipt.stock_remaining, 9);
        assert_eq!(
            clock.recorded(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );

        // Exactly one audit row despite three internal attempts.
        let orders = mem.committed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Success);
    }

    #[tokio::test]
    async fn exhausted_retries_record_a_single_conflict_audit() {
        let mem = MemStore::new();
        mem.insert_product(Product::new(1, "Widget", 10));
        let store = ConflictingStore::new(mem.clone(), 10);
        let clock = Arc::new(ManualClock::new());
        let engine = OrderEngine::new(store, clock.clone(), &Config::instant());

        let err = engine
            .place_order_optimistic(OrderDraft::new(1, 1, "user_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReserveError::Conflict { .. }));

        // Three attempts, two backoff sleeps, untouched stock.
        assert_eq!(
            clock.recorded(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
        assert_eq!(mem.product(1).await.unwrap().unwrap().stock, 10);

        let orders = mem.committed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::FailedConflict);
    }
}
