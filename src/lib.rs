//! # Stockade
//!
//! An inventory reservation service that must never let stock go negative,
//! built around two competing concurrency-control strategies:
//!
//! - **Pessimistic**: take the exclusive row lock before checking and
//!   decrementing stock; contenders queue behind the lock for its whole
//!   hold time ([`reservation::pessimistic`]).
//! - **Optimistic**: read stock and a version counter without locking, then
//!   commit through a conditional update gated on the version; stale versions
//!   fail with a conflict and are retried with linear backoff
//!   ([`reservation::optimistic`], [`reservation::RetryPolicy`]).
//!
//! Every request's terminal outcome — success, out of stock, or exhausted
//! conflicts — is recorded as exactly one audit row, and [`OrderEngine`]
//! exposes the aggregated counts. The store boundary is a pair of traits
//! ([`store::Store`], [`store::StoreTransaction`]); [`store::MemStore`]
//! implements them in memory with real row-lock and version-check semantics.

pub mod app_system;
pub mod clients;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod messages;
pub mod orders;
pub mod reservation;
pub mod store;


pub use app_system::{setup_tracing, OrderSystem};
pub use clients::OrderClient;
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::Config;
pub use domain::{
    OrderDraft, OrderId, OrderReceipt, OrderRecord, OrderStats, OrderStatus, Product, ProductId,
};
pub use error::{ReserveError, StoreError};
pub use orders::{OrderEngine, OrderService};
pub use reservation::RetryPolicy;
pub use store::{MemStore, NewOrder, Store, StoreTransaction};
