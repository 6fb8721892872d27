//! Order service actor: receives typed requests and dispatches each one onto
//! its own task.

use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::clients::OrderClient;
use crate::clock::Clock;
use crate::messages::OrderRequest;
use crate::orders::OrderEngine;
use crate::store::Store;

/// Actor front for [`OrderEngine`].
///
/// The run loop never awaits a reservation itself: every request is spawned
/// onto an independent task with a clone of the engine, so in-flight orders
/// overlap and all coordination happens in the store. A request whose caller
/// gave up still runs its attempt to completion; the store is never left with
/// a dangling transaction.
pub struct OrderService<S, C> {
    receiver: mpsc::Receiver<OrderRequest>,
    engine: OrderEngine<S, C>,
}

impl<S, C> OrderService<S, C>
where
    S: Store + Clone,
    C: Clock,
{
    pub fn new(buffer_size: usize, engine: OrderEngine<S, C>) -> (Self, OrderClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let service = Self { receiver, engine };
        let client = OrderClient::new(sender);
        (service, client)
    }

    #[instrument(name = "order_service", skip(self))]
    pub async fn run(mut self) {
        info!("OrderService starting");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                OrderRequest::PlacePessimistic { draft, respond_to } => {
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        let _ = respond_to.send(engine.place_order_pessimistic(draft).await);
                    });
                }
                OrderRequest::PlaceOptimistic { draft, respond_to } => {
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        let _ = respond_to.send(engine.place_order_optimistic(draft).await);
                    });
                }
                OrderRequest::GetProduct { id, respond_to } => {
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        let _ = respond_to.send(engine.product(id).await);
                    });
                }
                OrderRequest::ResetStock {
                    stock,
                    version,
                    respond_to,
                } => {
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        let _ = respond_to.send(engine.reset_stock(stock, version).await);
                    });
                }
                OrderRequest::Stats { respond_to } => {
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        let _ = respond_to.send(engine.stats().await);
                    });
                }
                OrderRequest::Shutdown => {
                    info!("OrderService shutting down");
                    break;
                }
            }
        }

        info!("OrderService stopped");
    }
}
