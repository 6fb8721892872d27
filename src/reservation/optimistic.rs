//! Optimistic reservation: read without locking, do the validation work in
//! the open, then attempt a conditional update gated on the version counter.

use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::domain::ProductId;
use crate::error::ReserveError;
use crate::reservation::Reservation;
use crate::store::StoreTransaction;

/// Reserve `quantity` units of `product_id` without blocking other readers.
///
/// Between the unlocked read and the conditional update, other transactions
/// are free to commit against the same row; that window is the designed race.
/// A stale version at update time affects zero rows and surfaces as
/// `Conflict`, which the caller may retry on a fresh transaction.
#[instrument(name = "optimistic_reserve", skip(tx, clock, validation_delay))]
pub async fn reserve<T: StoreTransaction, C: Clock + ?Sized>(
    tx: &mut T,
    clock: &C,
    product_id: ProductId,
    quantity: u32,
    validation_delay: Duration,
) -> Result<Reservation, ReserveError> {
    debug!("Reading stock and version without lock");
    let Some(product) = tx.product(product_id).await? else {
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

    // Unsynchronized validation work: concurrent writers may commit against
    // the row while this runs.
    if !validation_delay.is_zero() {
        clock.sleep(validation_delay).await;
    }

    let affected = tx
        .decrement_stock_versioned(product_id, quantity, product.version)
        .await?;
    if affected == 0 {
        warn!(
            expected_version = product.version,
            "Version check failed, another writer committed first"
        );
        return Err(ReserveError::Conflict {
            product_id,
            expected_version: product.version,
        });
    }

    let stock_remaining = product.stock - quantity;
    let new_version = product.version + 1;
    info!(stock_remaining, new_version, "Stock reserved via version check");
    Ok(Reservation {
        stock_remaining,
        new_version: Some(new_version),
    })
}
