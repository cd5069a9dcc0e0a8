//! Shared types for the marketplace platform
//!
//! Common types used across crates: domain models, the unified error
//! system, and small utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use http;
pub use serde::{Deserialize, Serialize};
