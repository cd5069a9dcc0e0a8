//! Cross-cutting services consumed by the order engine

pub mod session;

pub use session::{MembershipView, SessionCache};
