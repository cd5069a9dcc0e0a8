//! Request identity extraction
//!
//! The upstream gateway terminates authentication and forwards the
//! resolved identity in headers; handlers only declare what they need.
//! `X-User-Id` carries the platform user id, `X-Wallet-Openid` the
//! wallet identity when the user has bound one.

use axum::extract::FromRequestParts;
use http::request::Parts;

use shared::error::{AppError, ErrorCode};

pub const HEADER_USER_ID: &str = "X-User-Id";
pub const HEADER_WALLET_OPENID: &str = "X-Wallet-Openid";

/// Authenticated caller of the current request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub openid: Option<String>,
}

impl CurrentUser {
    /// Wallet identity, required for anything that touches the gateway
    pub fn require_openid(&self) -> Result<&str, AppError> {
        self.openid
            .as_deref()
            .ok_or_else(|| AppError::new(ErrorCode::WalletNotBound))
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(HEADER_USER_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| AppError::new(ErrorCode::NotAuthenticated))?;
        let openid = parts
            .headers
            .get(HEADER_WALLET_OPENID)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        Ok(Self { user_id, openid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = http::Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_extracts_identity() {
        let mut p = parts(&[(HEADER_USER_ID, "7"), (HEADER_WALLET_OPENID, "oid-7")]);
        let user = CurrentUser::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(user.user_id, 7);
        assert_eq!(user.require_openid().unwrap(), "oid-7");
    }

    #[tokio::test]
    async fn test_missing_user_id_rejected() {
        let mut p = parts(&[]);
        let err = CurrentUser::from_request_parts(&mut p, &())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_unparseable_user_id_rejected() {
        let mut p = parts(&[(HEADER_USER_ID, "not-a-number")]);
        let err = CurrentUser::from_request_parts(&mut p, &())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_openid_optional_until_required() {
        let mut p = parts(&[(HEADER_USER_ID, "7")]);
        let user = CurrentUser::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(
            user.require_openid().unwrap_err().code,
            ErrorCode::WalletNotBound
        );
    }
}
