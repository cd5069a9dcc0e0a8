//! Payment gateway integration: signing, prepay sessions and webhook
//! settlement.

pub mod callback;
pub mod crypto;
pub mod gateway;

pub use callback::CallbackProcessor;
pub use gateway::PaymentGateway;

/// Callback signature headers set by the gateway
pub const HEADER_SIGNATURE: &str = "Pay-Signature";
pub const HEADER_TIMESTAMP: &str = "Pay-Timestamp";
pub const HEADER_NONCE: &str = "Pay-Nonce";
pub const HEADER_SERIAL: &str = "Pay-Serial";
