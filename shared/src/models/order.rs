//! Order Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// `Pending` is the only non-terminal state. `Paid`, `Cancelled` and
/// `TimeoutClosed` are absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    TimeoutClosed,
}

impl OrderStatus {
    /// Whether an order in this state can still change state
    #[inline]
    pub const fn is_pending(self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

/// Payment method selected at order creation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Wallet,
}

/// Item type drives fulfillment dispatch after payment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderItemType {
    Physical,
    Vip,
    Design,
}

/// Order entity
///
/// `merchant_order_no` and `serial_no` are globally unique. Orders are
/// never deleted; closed orders remain queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    /// Display name derived from the purchased product
    pub name: String,
    pub status: OrderStatus,
    /// Total amount in currency units, equals the sum of item totals
    pub total_amount: Decimal,
    pub pay_time: Option<DateTime<Utc>>,
    /// Instant after which an unpaid order is closed by the expiry worker
    pub expire_time: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    /// Outbound reference sent to the payment gateway
    pub merchant_order_no: String,
    /// Human-facing order serial
    pub serial_no: String,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line item, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub item_type: OrderItemType,
    pub product_id: i64,
    pub sku_id: Option<i64>,
    pub product_name: String,
    pub sku_name: Option<String>,
    pub quantity: i32,
    /// Unit price in currency units
    pub unit_price: Decimal,
    /// quantity * unit_price
    pub total_price: Decimal,
}

/// Frozen copy of the product and SKU at purchase time
///
/// Written once alongside the order; Decimal fields inside the JSON are
/// serialized as strings so the snapshot is stable across readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub order_id: i64,
    pub product_id: i64,
    pub snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Order plus its items, the cached detail view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::TimeoutClosed).unwrap(),
            "\"timeout_closed\""
        );
        let back: OrderStatus = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(back, OrderStatus::Paid);
    }

    #[test]
    fn test_status_is_pending() {
        assert!(OrderStatus::Pending.is_pending());
        assert!(!OrderStatus::Paid.is_pending());
        assert!(!OrderStatus::Cancelled.is_pending());
        assert!(!OrderStatus::TimeoutClosed.is_pending());
    }

    #[test]
    fn test_item_type_serde() {
        assert_eq!(
            serde_json::to_string(&OrderItemType::Vip).unwrap(),
            "\"vip\""
        );
        let back: OrderItemType = serde_json::from_str("\"physical\"").unwrap();
        assert_eq!(back, OrderItemType::Physical);
    }
}
