//! Order lifecycle: creation, state machine, expiry
//!
//! - [`OrderManager`] - all order mutations, serialized per order
//! - [`ExpiryScheduler`] - deferred closure of unpaid orders

pub mod expiry;
pub mod manager;

pub use expiry::{ExpiryJob, ExpiryScheduler, TokioExpiryScheduler, expiry_channel, spawn_expiry_worker};
pub use manager::OrderManager;
