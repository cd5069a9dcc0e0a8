//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::ProductNotFound
            | Self::SkuNotFound
            | Self::VipPlanNotFound
            | Self::DesignNotFound
            | Self::LicensePlanNotFound
            | Self::PaymentRecordMissing => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::OrderAlreadyPaid
            | Self::OrderDuplicatePending
            | Self::TransactionConflict
            | Self::DesignBoughtOut => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::WalletNotBound | Self::SignatureInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::PermissionDenied => StatusCode::FORBIDDEN,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::NetworkError | Self::TimeoutError | Self::LockTimeout => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 502 Bad Gateway (upstream gateway failed)
            Self::PrepayFailed => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError | Self::ConfigError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
