//! Order API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};
use shared::models::{Order, OrderDetail};

use crate::api::auth::CurrentUser;
use crate::core::ServerState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_id: i64,
    pub sku_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: i64,
}

/// Create a pending order for one SKU
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<ApiResponse<CreateOrderResponse>> {
    let order_id = state
        .order_manager
        .create_order(user.user_id, payload.product_id, payload.sku_id)
        .await?;
    Ok(ApiResponse::success(CreateOrderResponse { order_id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdQuery {
    pub order_id: i64,
}

/// Order detail, owner only
pub async fn detail(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<OrderIdQuery>,
) -> AppResult<ApiResponse<OrderDetail>> {
    let detail = state
        .order_manager
        .get_order_detail(query.order_id, Some(user.user_id))?;
    Ok(ApiResponse::success(detail))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default = "default_page_no")]
    pub page_no: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_no() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub total: usize,
    pub page_no: usize,
    pub page_size: usize,
}

/// Caller's orders, newest first
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<OrderListResponse>> {
    let (orders, total) = state
        .order_manager
        .list_orders(user.user_id, query.page_no, query.page_size);
    Ok(ApiResponse::success(OrderListResponse {
        orders,
        total,
        page_no: query.page_no.max(1),
        page_size: query.page_size.clamp(1, 100),
    }))
}

/// Cancel a pending order
pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<OrderIdQuery>,
) -> AppResult<ApiResponse<()>> {
    let cancelled = state
        .order_manager
        .close_order(query.order_id, Some(user.user_id))
        .await?;
    if !cancelled {
        return Err(AppError::with_message(
            ErrorCode::OrderStateInvalid,
            "order state does not allow cancellation",
        ));
    }
    Ok(ApiResponse::ok())
}
