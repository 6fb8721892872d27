//! In-memory transactional store.
//!
//! Committed tables live behind std mutexes; each product row has a lazily
//! created `Arc<tokio::sync::Mutex<()>>` acting as its exclusive row lock, so
//! lock waits yield to the scheduler instead of blocking a worker thread.
//! Transactions stage copy-on-write rows and apply them atomically on commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::domain::{OrderId, OrderRecord, OrderStats, OrderStatus, Product, ProductId};
use crate::error::StoreError;
use crate::store::{NewOrder, Store, StoreTransaction};

type RowLock = Arc<tokio::sync::Mutex<()>>;

struct Shared {
    products: Mutex<HashMap<ProductId, Product>>,
    orders: Mutex<Vec<OrderRecord>>,
    next_order_id: AtomicU64,
    row_locks: Mutex<HashMap<ProductId, RowLock>>,
}

impl Shared {
    /// One lock per product id, created on first use. Repeated calls return
    /// the same `Arc`, so contenders queue on the same mutex.
    fn row_lock(&self, id: ProductId) -> RowLock {
        let mut locks = self.row_locks.lock().expect("row lock map poisoned");
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Cloning yields another handle to the same store, like a pooled client.
#[derive(Clone)]
pub struct MemStore {
    shared: Arc<Shared>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                products: Mutex::new(HashMap::new()),
                orders: Mutex::new(Vec::new()),
                next_order_id: AtomicU64::new(0),
                row_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Seed helper: upsert a product row outside any transaction.
    pub fn insert_product(&self, product: Product) {
        self.shared
            .products
            .lock()
            .expect("products table poisoned")
            .insert(product.id, product);
    }

    /// Snapshot of the committed audit table, oldest first.
    pub fn committed_orders(&self) -> Vec<OrderRecord> {
        self.shared
            .orders
            .lock()
            .expect("orders table poisoned")
            .clone()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemStore {
    type Tx = MemTransaction;

    async fn begin(&self) -> Result<MemTransaction, StoreError> {
        Ok(MemTransaction {
            shared: self.shared.clone(),
            guards: HashMap::new(),
            staged_products: HashMap::new(),
            staged_orders: Vec::new(),
        })
    }

    async fn record_order(&self, order: NewOrder) -> Result<OrderId, StoreError> {
        let id = self.shared.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = OrderRecord {
            id,
            product_id: order.product_id,
            quantity: order.quantity,
            user_id: order.user_id,
            status: order.status,
        };
        self.shared
            .orders
            .lock()
            .expect("orders table poisoned")
            .push(record);
        Ok(id)
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self
            .shared
            .products
            .lock()
            .expect("products table poisoned")
            .get(&id)
            .cloned())
    }

    async fn reset_stock(&self, stock: u32, version: u64) -> Result<(), StoreError> {
        // A bulk update must wait for in-flight reservations, row by row.
        // Rows are locked in id order so no two multi-row lockers can deadlock.
        let mut ids: Vec<ProductId> = {
            let products = self.shared.products.lock().expect("products table poisoned");
            products.keys().copied().collect()
        };
        ids.sort_unstable();
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.shared.row_lock(*id).lock_owned().await);
        }
        let mut products = self.shared.products.lock().expect("products table poisoned");
        for id in ids {
            if let Some(product) = products.get_mut(&id) {
                product.stock = stock;
                product.version = version;
            }
        }
        Ok(())
    }

    async fn order_stats(&self) -> Result<OrderStats, StoreError> {
        let orders = self.shared.orders.lock().expect("orders table poisoned");
        let mut stats = OrderStats::default();
        for order in orders.iter() {
            stats.total += 1;
            match order.status {
                OrderStatus::Success => stats.success += 1,
                OrderStatus::FailedOutOfStock => stats.out_of_stock += 1,
                OrderStatus::FailedConflict => stats.conflict += 1,
            }
        }
        Ok(stats)
    }
}

/// One open transaction against a [`MemStore`].
///
/// Held row-lock guards are dropped with the transaction, so an aborted or
/// cancelled request releases its locks without any timer.
pub struct MemTransaction {
    shared: Arc<Shared>,
    guards: HashMap<ProductId, OwnedMutexGuard<()>>,
    staged_products: HashMap<ProductId, Product>,
    staged_orders: Vec<OrderRecord>,
}

impl MemTransaction {
    async fn ensure_row_lock(&mut self, id: ProductId) {
        if self.guards.contains_key(&id) {
            return;
        }
        let lock = self.shared.row_lock(id);
        let guard = lock.lock_owned().await;
        self.guards.insert(id, guard);
    }

    /// Latest committed row overlaid with this transaction's staged writes.
    fn read(&self, id: ProductId) -> Option<Product> {
        if let Some(staged) = self.staged_products.get(&id) {
            return Some(staged.clone());
        }
        self.shared
            .products
            .lock()
            .expect("products table poisoned")
            .get(&id)
            .cloned()
    }

    fn stage_decrement(&mut self, mut row: Product, quantity: u32) -> Result<(), StoreError> {
        row.stock = row
            .stock
            .checked_sub(quantity)
            .ok_or(StoreError::Constraint("products.stock must stay >= 0"))?;
        self.staged_products.insert(row.id, row);
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemTransaction {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read(id))
    }

    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.ensure_row_lock(id).await;
        Ok(self.read(id))
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<u64, StoreError> {
        self.ensure_row_lock(id).await;
        match self.read(id) {
            Some(row) => {
                self.stage_decrement(row, quantity)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn decrement_stock_versioned(
        &mut self,
        id: ProductId,
        quantity: u32,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        // Like a SQL update, this waits on the row lock first; the version is
        // re-read only once the lock is held, after any winner has committed.
        self.ensure_row_lock(id).await;
        match self.read(id) {
            Some(row) if row.version == expected_version => {
                let mut row = row;
                row.version += 1;
                self.stage_decrement(row, quantity)?;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId, StoreError> {
        let id = self.shared.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.staged_orders.push(OrderRecord {
            id,
            product_id: order.product_id,
            quantity: order.quantity,
            user_id: order.user_id,
            status: order.status,
        });
        Ok(id)
    }

    async fn commit(self) -> Result<(), StoreError> {
        {
            let mut products = self.shared.products.lock().expect("products table poisoned");
            for (id, row) in &self.staged_products {
                products.insert(*id, row.clone());
            }
        }
        {
            let mut orders = self.shared.orders.lock().expect("orders table poisoned");
            orders.extend(self.staged_orders.iter().cloned());
        }
        // Guards drop here, after the staged writes are visible.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // Staged writes and guards are dropped together.
        Ok(())
    }
}
