use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use crate::domain::{OrderDraft, OrderReceipt, OrderStats, Product, ProductId};
use crate::error::{ReserveError, StoreError};
use crate::messages::OrderRequest;

/// Generate client methods with oneshot channel boilerplate and automatic
/// tracing. A closed or dropped service surfaces as a store-level fault, the
/// reservation error kinds pass through untouched.
macro_rules! client_method {
    ($client:ty => fn $method:ident($($param:ident: $param_type:ty),*) -> $return_type:ty as $request:ident::$variant:ident) => {
        impl $client {
            #[instrument(skip(self))]
            pub async fn $method(&self, $($param: $param_type),*) -> Result<$return_type, ReserveError> {
                debug!("Sending request");
                let (respond_to, response) = oneshot::channel();
                self.sender.send($request::$variant {
                    $($param,)*
                    respond_to,
                }).await.map_err(|_| StoreError::Unavailable("order service closed".to_string()))?;

                response
                    .await
                    .map_err(|_| ReserveError::Store(StoreError::Unavailable("order service dropped request".to_string())))?
            }
        }
    };
}

/// Client handle for the order service. Thin wrapper around the message
/// channel with macro-generated methods.
#[derive(Clone)]
pub struct OrderClient {
    sender: mpsc::Sender<OrderRequest>,
}

impl OrderClient {
    pub fn new(sender: mpsc::Sender<OrderRequest>) -> Self {
        Self { sender }
    }

    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), ReserveError> {
        debug!("Sending shutdown request");
        self.sender
            .send(OrderRequest::Shutdown)
            .await
            .map_err(|_| StoreError::Unavailable("order service closed".to_string()))?;
        Ok(())
    }
}

client_method!(OrderClient => fn place_order_pessimistic(draft: OrderDraft) -> OrderReceipt as OrderRequest::PlacePessimistic);
client_method!(OrderClient => fn place_order_optimistic(draft: OrderDraft) -> OrderReceipt as OrderRequest::PlaceOptimistic);
client_method!(OrderClient => fn get_product(id: ProductId) -> Option<Product> as OrderRequest::GetProduct);
client_method!(OrderClient => fn reset_stock(stock: u32, version: u64) -> () as OrderRequest::ResetStock);
client_method!(OrderClient => fn stats() -> OrderStats as OrderRequest::Stats);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_service_surfaces_as_store_fault() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let client = OrderClient::new(sender);

        let err = client.stats().await.unwrap_err();
        assert!(matches!(err, ReserveError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn dropped_responder_surfaces_as_store_fault() {
        let (sender, mut receiver) = mpsc::channel(1);
        let client = OrderClient::new(sender);

        let drain = tokio::spawn(async move {
            // Drop the respond_to channel without answering.
            let _ = receiver.recv().await;
        });

        let err = client.stats().await.unwrap_err();
        assert!(matches!(err, ReserveError::Store(StoreError::Unavailable(_))));
        drain.await.unwrap();
    }
}
