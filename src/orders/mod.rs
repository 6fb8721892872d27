pub mod engine;
pub mod service;

pub use engine::OrderEngine;
pub use service::OrderService;
