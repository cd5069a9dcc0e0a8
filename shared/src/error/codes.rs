//! Unified error codes for the marketplace platform
//!
//! This module defines all error codes used across market-server and clients.
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Wallet identity missing for payment operation
    WalletNotBound = 1002,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order has been cancelled or closed
    OrderClosed = 4003,
    /// Order is not in a payable state
    OrderStateInvalid = 4004,
    /// Order has expired
    OrderExpired = 4005,
    /// Duplicate unpaid order exists for the same product
    OrderDuplicatePending = 4006,

    // ==================== 5xxx: Payment ====================
    /// Payment failed
    PaymentFailed = 5001,
    /// Prepay request to the gateway failed
    PrepayFailed = 5002,
    /// Callback signature verification failed
    SignatureInvalid = 5003,
    /// Callback resource decryption failed
    DecryptFailed = 5004,
    /// Payment record not found for order
    PaymentRecordMissing = 5005,
    /// Transaction conflicts with an existing payment
    TransactionConflict = 5006,
    /// Payment amount is invalid
    InvalidAmount = 5007,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// SKU not found
    SkuNotFound = 6002,
    /// SKU is disabled
    SkuDisabled = 6003,
    /// Product is out of stock
    ProductOutOfStock = 6004,
    /// VIP plan not found
    VipPlanNotFound = 6101,
    /// Design not found
    DesignNotFound = 6201,
    /// Design is already bought out
    DesignBoughtOut = 6202,
    /// License plan not found
    LicensePlanNotFound = 6203,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timed out
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// Failed to acquire a coordination lock in time
    LockTimeout = 9006,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Check if this code represents success
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the default English message for this error code
    pub const fn message(self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Success",
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field missing",

            // Auth
            ErrorCode::NotAuthenticated => "Not authenticated",
            ErrorCode::WalletNotBound => "No wallet identity bound to this account",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderClosed => "Order has been cancelled or closed",
            ErrorCode::OrderStateInvalid => "Order is not in a payable state",
            ErrorCode::OrderExpired => "Order has expired",
            ErrorCode::OrderDuplicatePending => "An unpaid order for this product already exists",

            // Payment
            ErrorCode::PaymentFailed => "Payment failed",
            ErrorCode::PrepayFailed => "Failed to create prepay transaction",
            ErrorCode::SignatureInvalid => "Callback signature verification failed",
            ErrorCode::DecryptFailed => "Callback resource decryption failed",
            ErrorCode::PaymentRecordMissing => "Payment record not found for order",
            ErrorCode::TransactionConflict => "Transaction conflicts with an existing payment",
            ErrorCode::InvalidAmount => "Payment amount is invalid",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::SkuNotFound => "SKU not found",
            ErrorCode::SkuDisabled => "SKU is disabled",
            ErrorCode::ProductOutOfStock => "Product is out of stock",
            ErrorCode::VipPlanNotFound => "VIP plan not found",
            ErrorCode::DesignNotFound => "Design not found",
            ErrorCode::DesignBoughtOut => "Design is already bought out",
            ErrorCode::LicensePlanNotFound => "License plan not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::LockTimeout => "System busy, please retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::WalletNotBound),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4003 => Ok(ErrorCode::OrderClosed),
            4004 => Ok(ErrorCode::OrderStateInvalid),
            4005 => Ok(ErrorCode::OrderExpired),
            4006 => Ok(ErrorCode::OrderDuplicatePending),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::PrepayFailed),
            5003 => Ok(ErrorCode::SignatureInvalid),
            5004 => Ok(ErrorCode::DecryptFailed),
            5005 => Ok(ErrorCode::PaymentRecordMissing),
            5006 => Ok(ErrorCode::TransactionConflict),
            5007 => Ok(ErrorCode::InvalidAmount),

            // Product
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::SkuNotFound),
            6003 => Ok(ErrorCode::SkuDisabled),
            6004 => Ok(ErrorCode::ProductOutOfStock),
            6101 => Ok(ErrorCode::VipPlanNotFound),
            6201 => Ok(ErrorCode::DesignNotFound),
            6202 => Ok(ErrorCode::DesignBoughtOut),
            6203 => Ok(ErrorCode::LicensePlanNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),
            9006 => Ok(ErrorCode::LockTimeout),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::SignatureInvalid.code(), 5003);
        assert_eq!(ErrorCode::LockTimeout.code(), 9006);
    }

    #[test]
    fn test_roundtrip() {
        for code in [
            ErrorCode::Success,
            ErrorCode::NotAuthenticated,
            ErrorCode::OrderStateInvalid,
            ErrorCode::TransactionConflict,
            ErrorCode::DesignBoughtOut,
            ErrorCode::InternalError,
        ] {
            let value: u16 = code.into();
            assert_eq!(ErrorCode::try_from(value), Ok(code));
        }
    }

    #[test]
    fn test_invalid_code() {
        assert_eq!(ErrorCode::try_from(65535), Err(InvalidErrorCode(65535)));
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&ErrorCode::OrderExpired).unwrap();
        assert_eq!(json, "4005");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::OrderExpired);
    }
}
