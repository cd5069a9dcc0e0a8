//! Payment Record Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Gateway trade state, serialized exactly as the gateway sends it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeState {
    #[default]
    Notpay,
    Success,
    Closed,
    Refund,
    Revoked,
    Userpaying,
    Payerror,
}

impl TradeState {
    /// Whether this state is terminal for settlement purposes
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, TradeState::Success)
    }
}

/// One gateway transaction attempt for an order
///
/// `merchant_order_no` is unique; `transaction_id` is unique once set.
/// A record that reached `Success` never regresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub order_id: i64,
    pub merchant_id: String,
    pub merchant_order_no: String,
    /// Gateway-side transaction id, assigned on settlement
    pub transaction_id: Option<String>,
    pub trade_type: Option<String>,
    pub trade_state: TradeState,
    pub trade_state_desc: Option<String>,
    pub bank_type: Option<String>,
    /// RFC3339 settlement time as received from the gateway
    pub success_time: Option<String>,
    /// Payer identity at the gateway
    pub payer_id: Option<String>,
    /// Order amount in currency units
    pub total_amount: Decimal,
    /// Amount actually paid, in currency units
    pub payer_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-side parameters for invoking the payment sheet
///
/// `pay_sign` covers `appId\nts\nnonce\npackage\n` with the merchant key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepayParams {
    pub app_id: String,
    pub time_stamp: String,
    pub nonce_str: String,
    /// `prepay_id=<id>` as the gateway expects
    pub package: String,
    pub sign_type: String,
    pub pay_sign: String,
}
