//! Data models
//!
//! Shared between market-server and clients (via API).
//! All IDs are `i64`.

pub mod catalog;
pub mod design;
pub mod order;
pub mod payment;
pub mod vip;

// Re-exports
pub use catalog::*;
pub use design::*;
pub use order::*;
pub use payment::*;
pub use vip::*;
