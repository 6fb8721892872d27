use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::clients::OrderClient;
use crate::clock::TokioClock;
use crate::config::Config;
use crate::orders::{OrderEngine, OrderService};
use crate::store::MemStore;

/// The main application system.
///
/// Responsible for wiring the store, clock and engine together, starting the
/// order service, and handling graceful shutdown.
pub struct OrderSystem {
    pub order_client: OrderClient,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl OrderSystem {
    /// Create and start the system on the given store.
    ///
    /// The store is passed in (rather than built here) so callers can seed
    /// inventory and inspect committed state through their own handle.
    #[instrument(name = "order_system", skip(store, config))]
    pub fn new(store: MemStore, config: Config) -> Self {
        info!(
            max_retries = config.max_retries,
            validation_delay_ms = config.validation_delay.as_millis() as u64,
            "Starting order system"
        );

        let engine = OrderEngine::new(store, Arc::new(TokioClock), &config);
        let (order_service, order_client) = OrderService::new(100, engine);
        let handles = vec![tokio::spawn(order_service.run())];

        info!("Order system started successfully");

        Self {
            order_client,
            handles,
        }
    }

    /// Gracefully shutdown: stop accepting requests, then wait for the
    /// service loop to drain.
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down order system");

        let _ = self.order_client.shutdown().await;

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = ?e, "Service shutdown error");
                return Err(format!("Service shutdown error: {:?}", e));
            }
        }

        info!("Order system shutdown complete");
        Ok(())
    }
}
