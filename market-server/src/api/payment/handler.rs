//! Payment API Handlers

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use shared::error::{ApiResponse, AppResult};
use shared::models::PrepayParams;

use crate::api::auth::CurrentUser;
use crate::core::ServerState;
use crate::payment::{HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE, HEADER_TIMESTAMP};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepayQuery {
    pub order_id: i64,
}

/// Create (or replay) the prepay session for a pending order
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<PrepayQuery>,
) -> AppResult<ApiResponse<PrepayParams>> {
    let openid = user.require_openid()?;
    let params = state
        .payment_gateway
        .create_prepay_session(user.user_id, openid, query.order_id)
        .await?;
    Ok(ApiResponse::success(params))
}

/// Gateway notification endpoint.
///
/// The gateway expects a literal `SUCCESS` body on acceptance and
/// retries on any non-2xx status, so errors are mapped to their HTTP
/// status with the message as the body instead of the usual JSON
/// envelope.
pub async fn notify(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let timestamp = header_str(&headers, HEADER_TIMESTAMP);
    let nonce = header_str(&headers, HEADER_NONCE);
    let signature = header_str(&headers, HEADER_SIGNATURE);
    let (Some(timestamp), Some(nonce), Some(signature)) = (timestamp, nonce, signature) else {
        return (StatusCode::UNAUTHORIZED, "missing signature headers").into_response();
    };
    // Serial identifies the platform key that signed the notification
    let serial = header_str(&headers, HEADER_SERIAL).unwrap_or("");
    tracing::debug!(serial, timestamp, "payment notification received");

    match state
        .callback_processor
        .process(timestamp, nonce, signature, &body)
        .await
    {
        Ok(()) => (StatusCode::OK, "SUCCESS").into_response(),
        Err(e) => {
            tracing::warn!(code = ?e.code, message = %e.message, "notification rejected");
            (e.http_status(), e.message).into_response()
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
