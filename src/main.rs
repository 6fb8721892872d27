use tracing::{error, info, Instrument};

use stockade::{setup_tracing, Config, MemStore, OrderDraft, OrderSystem, Product};

/// Demo driver: seeds one product, then races concurrent orders under each
/// protocol to show how the two strategies resolve the same contention.
#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting inventory reservation demo");

    let store = MemStore::new();
    store.insert_product(Product::new(1, "Widget", 5));

    let system = OrderSystem::new(store.clone(), Config::from_env());
    let client = system.order_client.clone();

    // Scenario 1: two pessimistic orders whose combined quantity exceeds
    // stock. The second blocks on the row lock, then observes the first's
    // committed decrement and fails out of stock.
    let span = tracing::info_span!("pessimistic_contention");
    async {
        info!("Racing two pessimistic orders for 3 units each against stock 5");
        let (first, second) = tokio::join!(
            client.place_order_pessimistic(OrderDraft::new(1, 3, "alice")),
            client.place_order_pessimistic(OrderDraft::new(1, 3, "bob")),
        );
        report("first", first);
        report("second", second);
    }
    .instrument(span)
    .await;

    // Scenario 2: reset to stock 10, then race two optimistic orders. Both
    // read version 1; the loser's conditional update affects zero rows, and a
    // retry on a fresh transaction succeeds against the new version.
    client
        .reset_stock(10, 1)
        .await
        .map_err(|e| e.to_string())?;

    let span = tracing::info_span!("optimistic_contention");
    async {
        info!("Racing two optimistic orders for 1 unit each against stock 10");
        let (first, second) = tokio::join!(
            client.place_order_optimistic(OrderDraft::new(1, 1, "alice")),
            client.place_order_optimistic(OrderDraft::new(1, 1, "bob")),
        );
        report("first", first);
        report("second", second);
    }
    .instrument(span)
    .await;

    let product = client
        .get_product(1)
        .await
        .map_err(|e| e.to_string())?
        .expect("seeded product");
    info!(
        stock = product.stock,
        version = product.version,
        "Final product state"
    );

    let stats = client.stats().await.map_err(|e| e.to_string())?;
    info!(
        total = stats.total,
        success = stats.success,
        out_of_stock = stats.out_of_stock,
        conflict = stats.conflict,
        "Order stats"
    );

    system.shutdown().await?;

    info!("Demo completed");
    Ok(())
}

fn report(label: &str, result: Result<stockade::OrderReceipt, stockade::ReserveError>) {
    match result {
        Ok(receipt) => info!(
            order_id = receipt.order_id,
            stock_remaining = receipt.stock_remaining,
            new_version = ?receipt.new_version,
            "{label} order succeeded"
        ),
        Err(e) => error!(error = %e, "{label} order failed"),
    }
}
