//! Pessimistic reservation: take the exclusive row lock first, then check and
//! decrement while nobody else can touch the row.

use std::time::Duration;

use tracing::{debug, error, info, instrument};

use crate::clock::Clock;
use crate::domain::ProductId;
use crate::error::{ReserveError, StoreError};
use crate::reservation::Reservation;
use crate::store::StoreTransaction;

/// Reserve `quantity` units of `product_id` under an exclusive row lock.
///
/// The lock is held for the whole critical section, including the simulated
/// validation work; concurrent contenders queue behind it until the caller's
/// transaction commits or rolls back. A conflict cannot occur by construction:
/// the only failure modes are `NotFound` and `OutOfStock`, both terminal.
#[instrument(name = "pessimistic_reserve", skip(tx, clock, validation_delay))]
pub async fn reserve<T: StoreTransaction, C: Clock + ?Sized>(
    tx: &mut T,
    clock: &C,
    product_id: ProductId,
    quantity: u32,
    validation_delay: Duration,
) -> Result<Reservation, ReserveError> {
    debug!("Acquiring row lock");
    let Some(product) = tx.product_for_update(product_id).await? else {
        error!("Product not found");
        return Err(ReserveError::NotFound(product_id));
    };

    if product.stock < quantity {
        error!(
            available = product.stock,
            requested = quantity,
            "Insufficient stock"
        );
        return Err(ReserveError::OutOfStock {
            requested: quantity,
            available: product.stock,
        });
    }

    // Validation work runs with the lock held. That is the point of this
    // protocol: contenders pay the full lock-hold duration.
    if !validation_delay.is_zero() {
        clock.sleep(validation_delay).await;
    }

    let affected = tx.decrement_stock(product_id, quantity).await?;
    if affected != 1 {
        // The row was present under our lock moments ago.
        return Err(ReserveError::Store(StoreError::Unavailable(
            "locked row vanished mid-transaction".to_string(),
        )));
    }

    let stock_remaining = product.stock - quantity;
    info!(stock_remaining, "Stock reserved under row lock");
    Ok(Reservation {
        stock_remaining,
        new_version: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::Product;
    use crate::store::{MemStore, Store};

    const NO_DELAY: Duration = Duration::ZERO;

    fn store_with_product(stock: u32) -> MemStore {
        let store = MemStore::new();
        store.insert_product(Product::new(1, "Widget", stock));
        store
    }

    #[tokio::test]
    async fn reserves_and_leaves_version_untouched() {
        let store = store_with_product(5);
        let clock = ManualClock::new();

        let mut tx = store.begin().await.unwrap();
        let reservation = reserve(&mut tx, &clock, 1, 3, NO_DELAY).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            reservation,
            Reservation {
                stock_remaining: 2,
                new_version: None
            }
        );
        let product = store.product(1).await.unwrap().unwrap();
        assert_eq!(product.stock, 2);
        assert_eq!(product.version, 1);
    }

    #[tokio::test]
    async fn missing_product_fails_not_found() {
        let store = MemStore::new();
        let clock = ManualClock::new();

        let mut tx = store.begin().await.unwrap();
        let err = reserve(&mut tx, &clock, 42, 1, NO_DELAY).await.unwrap_err();
        assert_eq!(err, ReserveError::NotFound(42));
    }

    #[tokio::test]
    async fn insufficient_stock_fails_out_of_stock() {
        let store = store_with_product(2);
        let clock = ManualClock::new();

        let mut tx = store.begin().await.unwrap();
        let err = reserve(&mut tx, &clock, 1, 3, NO_DELAY).await.unwrap_err();
        assert_eq!(
            err,
            ReserveError::OutOfStock {
                requested: 3,
                available: 2
            }
        );
    }

    #[tokio::test]
    async fn validation_runs_with_lock_held() {
        let store = store_with_product(5);
        let clock = ManualClock::new();

        let mut tx = store.begin().await.unwrap();
        reserve(&mut tx, &clock, 1, 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(clock.recorded(), vec![Duration::from_millis(200)]);
    }

    /// Two contenders whose combined quantity exceeds stock: the loser waits
    /// on the lock and then observes the winner's committed decrement.
    #[tokio::test]
    async fn loser_observes_winner_committed_stock() {
        let store = store_with_product(5);
        let clock = ManualClock::new();

        let mut tx1 = store.begin().await.unwrap();
        reserve(&mut tx1, &clock, 1, 3, NO_DELAY).await.unwrap();

        let loser = {
            let store = store.clone();
            tokio::spawn(async move {
                let clock = ManualClock::new();
                let mut tx2 = store.begin().await.unwrap();
                let result = reserve(&mut tx2, &clock, 1, 3, NO_DELAY).await;
                tx2.rollback().await.unwrap();
                result
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!loser.is_finished(), "second reservation should be blocked");
        tx1.commit().await.unwrap();

        let err = loser.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            ReserveError::OutOfStock {
                requested: 3,
                available: 2
            }
        );
        assert_eq!(store.product(1).await.unwrap().unwrap().stock, 2);
    }
}
