use tokio::sync::oneshot;

use crate::domain::{OrderDraft, OrderReceipt, OrderStats, Product, ProductId};
use crate::error::ReserveError;

/// Generic type aliases for service communication
pub type ServiceResult<T, E> = std::result::Result<T, E>;
pub type ServiceResponse<T, E> = oneshot::Sender<ServiceResult<T, E>>;

/// Typed message enum for the order service. Each variant carries its
/// parameters and a oneshot channel for the response.
#[derive(Debug)]
pub enum OrderRequest {
    PlacePessimistic {
        draft: OrderDraft,
        respond_to: ServiceResponse<OrderReceipt, ReserveError>,
    },
    PlaceOptimistic {
        draft: OrderDraft,
        respond_to: ServiceResponse<OrderReceipt, ReserveError>,
    },
    GetProduct {
        id: ProductId,
        respond_to: ServiceResponse<Option<Product>, ReserveError>,
    },
    ResetStock {
        stock: u32,
        version: u64,
        respond_to: ServiceResponse<(), ReserveError>,
    },
    Stats {
        respond_to: ServiceResponse<OrderStats, ReserveError>,
    },
    Shutdown,
}
