//! Webhook callback processing
//!
//! Verify, decrypt, then dispatch by event type. Settlement is
//! exactly-once with respect to effects: the transaction id is checked
//! before and after taking the callback lock, and the order's own
//! Pending -> Paid transition is the commit point, so a redelivered
//! notification after a fulfillment failure is processed again while a
//! true duplicate is acknowledged without side effects.
//!
//! Response discipline (mapped by the HTTP handler):
//! - accepted or already processed  -> 2xx, body "SUCCESS"
//! - bad signature / decrypt / malformed -> 4xx, nothing mutated
//! - transient failure (lock, fulfillment) -> 5xx, gateway retries

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{OrderStatus, TradeState};

use crate::core::config::OrderConfig;
use crate::fulfillment::FulfillmentDispatcher;
use crate::lock::LockCoordinator;
use crate::orders::OrderManager;
use crate::payment::gateway::PaymentGateway;
use crate::store::{MarketStore, StoreError};

pub const EVENT_TRANSACTION_SUCCESS: &str = "TRANSACTION.SUCCESS";
pub const EVENT_TRANSACTION_CLOSED: &str = "TRANSACTION.CLOSED";

/// Outer notification envelope, signed but not encrypted
#[derive(Debug, Deserialize)]
pub struct NotifyEnvelope {
    pub id: String,
    pub event_type: String,
    pub resource: EncryptedResource,
}

/// AES-256-GCM payload; `associated_data` is echoed in the clear and
/// is exactly the AEAD associated data (empty when absent)
#[derive(Debug, Deserialize)]
pub struct EncryptedResource {
    #[serde(default)]
    pub algorithm: Option<String>,
    pub ciphertext: String,
    pub nonce: String,
    #[serde(default)]
    pub associated_data: String,
}

/// Decrypted transaction resource
#[derive(Debug, Deserialize)]
pub struct TransactionResource {
    pub out_trade_no: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub trade_type: Option<String>,
    pub trade_state: TradeState,
    #[serde(default)]
    pub trade_state_desc: Option<String>,
    #[serde(default)]
    pub bank_type: Option<String>,
    #[serde(default)]
    pub success_time: Option<String>,
    #[serde(default)]
    pub payer: Option<PayerInfo>,
    #[serde(default)]
    pub amount: Option<AmountInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PayerInfo {
    pub openid: String,
}

#[derive(Debug, Deserialize)]
pub struct AmountInfo {
    pub total: i64,
    #[serde(default)]
    pub payer_total: Option<i64>,
}

pub struct CallbackProcessor {
    store: Arc<MarketStore>,
    gateway: Arc<PaymentGateway>,
    orders: Arc<OrderManager>,
    dispatcher: Arc<FulfillmentDispatcher>,
    locks: Arc<LockCoordinator>,
    config: OrderConfig,
}

impl CallbackProcessor {
    pub fn new(
        store: Arc<MarketStore>,
        gateway: Arc<PaymentGateway>,
        orders: Arc<OrderManager>,
        dispatcher: Arc<FulfillmentDispatcher>,
        locks: Arc<LockCoordinator>,
        config: OrderConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            orders,
            dispatcher,
            locks,
            config,
        }
    }

    /// Process one notification; `Ok` means "acknowledge with SUCCESS"
    pub async fn process(
        &self,
        timestamp: &str,
        nonce: &str,
        signature: &str,
        body: &str,
    ) -> AppResult<()> {
        if !self.gateway.verify_callback(timestamp, nonce, body, signature) {
            return Err(AppError::new(ErrorCode::SignatureInvalid));
        }

        let envelope: NotifyEnvelope = serde_json::from_str(body).map_err(|e| {
            AppError::validation(format!("malformed notification: {}", e))
        })?;

        match envelope.event_type.as_str() {
            EVENT_TRANSACTION_SUCCESS => {
                let txn = self.decrypt_transaction(&envelope.resource)?;
                self.handle_success(txn).await
            }
            EVENT_TRANSACTION_CLOSED => {
                let txn = self.decrypt_transaction(&envelope.resource)?;
                self.handle_closed(txn).await
            }
            other => {
                // Unknown events are acknowledged so the gateway stops
                // redelivering them
                tracing::warn!(event_type = other, id = %envelope.id, "ignoring unknown event");
                Ok(())
            }
        }
    }

    fn decrypt_transaction(&self, resource: &EncryptedResource) -> AppResult<TransactionResource> {
        let plaintext = self.gateway.decrypt_resource(
            &resource.ciphertext,
            &resource.nonce,
            &resource.associated_data,
        )?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| AppError::validation(format!("malformed transaction resource: {}", e)))
    }

    async fn handle_success(&self, txn: TransactionResource) -> AppResult<()> {
        let transaction_id = txn
            .transaction_id
            .clone()
            .ok_or_else(|| AppError::validation("success notification without transaction_id"))?;
        if txn.trade_state != TradeState::Success {
            tracing::warn!(
                transaction_id,
                trade_state = ?txn.trade_state,
                "success event with non-success state, acknowledged"
            );
            return Ok(());
        }

        // Fast path: seen this transaction and finished with it
        if self.already_settled(&transaction_id) {
            return Ok(());
        }

        let record = self
            .store
            .get_payment_by_merchant_no(&txn.out_trade_no)
            .ok_or_else(|| {
                AppError::new(ErrorCode::PaymentRecordMissing)
                    .with_detail("out_trade_no", txn.out_trade_no.clone())
            })?;

        // Same reference, different transaction: refuse to overwrite
        if let Some(existing) = &record.transaction_id
            && existing != &transaction_id
        {
            return Err(AppError::new(ErrorCode::TransactionConflict)
                .with_detail("existing", existing.clone())
                .with_detail("incoming", transaction_id.clone()));
        }

        // Reported amount must match what we asked for
        if let Some(amount) = &txn.amount {
            let expected = super::gateway::to_minor_units(record.total_amount)?;
            if amount.total != expected {
                return Err(AppError::validation("settlement amount mismatch")
                    .with_detail("expected", expected)
                    .with_detail("reported", amount.total));
            }
        }

        let lock_key = format!("pay:callback:{}", transaction_id);
        let guard = self
            .locks
            .acquire(
                &lock_key,
                Duration::from_secs(self.config.callback_lock_ttl_secs),
                Duration::from_secs(self.config.callback_lock_wait_secs),
            )
            .await;
        let _guard = match guard {
            Ok(g) => g,
            Err(_) => {
                // Someone else is (or was) settling this transaction;
                // one re-check decides between ack and retry
                if self.already_settled(&transaction_id) {
                    return Ok(());
                }
                return Err(AppError::lock_timeout(lock_key));
            }
        };

        // Double check under the lock
        if self.already_settled(&transaction_id) {
            return Ok(());
        }

        let payer_amount = txn
            .amount
            .as_ref()
            .and_then(|a| a.payer_total)
            .map(|minor| Decimal::new(minor, 2));
        let record = match self.store.set_payment_success(
            &txn.out_trade_no,
            &transaction_id,
            txn.trade_type.clone(),
            txn.trade_state_desc.clone(),
            txn.bank_type.clone(),
            txn.success_time.clone(),
            txn.payer.as_ref().map(|p| p.openid.clone()),
            payer_amount,
        ) {
            Ok(record) => record,
            // Another record already owns this transaction id; treat a
            // settled holder as "already processed"
            Err(StoreError::UniqueViolation { .. }) => {
                if self.already_settled(&transaction_id) {
                    return Ok(());
                }
                return Err(AppError::new(ErrorCode::TransactionConflict)
                    .with_detail("transaction_id", transaction_id));
            }
            Err(e) => return Err(e.into()),
        };

        let order = self
            .store
            .get_order(record.order_id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Paid => return Ok(()),
            _ => {
                // Money arrived for an order we already closed; keep
                // the settlement on record, skip fulfillment
                tracing::error!(
                    order_id = order.id,
                    status = ?order.status,
                    transaction_id,
                    "settlement received for a closed order"
                );
                return Ok(());
            }
        }

        // Fulfill before committing the Paid transition: a fulfillment
        // failure leaves the order Pending and the redelivery retries
        let detail = self.orders.get_order_detail(order.id, None)?;
        self.dispatcher.dispatch(&detail).await.map_err(|e| {
            tracing::error!(order_id = order.id, error = %e, "fulfillment failed, requesting retry");
            AppError::internal(format!("fulfillment failed: {}", e.message))
        })?;

        let pay_time = parse_pay_time(txn.success_time.as_deref());
        let marked = self
            .orders
            .mark_order_as_paid(order.id, pay_time, None)
            .await?;
        if !marked {
            tracing::error!(order_id = order.id, "order left pending state during settlement");
        }
        tracing::info!(order_id = order.id, transaction_id, "settlement processed");
        Ok(())
    }

    /// Settled = transaction recorded successful and its order is no
    /// longer pending
    fn already_settled(&self, transaction_id: &str) -> bool {
        let Some(record) = self.store.get_payment_by_transaction_id(transaction_id) else {
            return false;
        };
        if record.trade_state != TradeState::Success {
            return false;
        }
        self.store
            .get_order(record.order_id)
            .is_some_and(|o| o.status != OrderStatus::Pending)
    }

    async fn handle_closed(&self, txn: TransactionResource) -> AppResult<()> {
        let lock_key = format!("pay:callback:closed:{}", txn.out_trade_no);
        let _guard = self
            .locks
            .acquire(
                &lock_key,
                Duration::from_secs(self.config.closed_lock_ttl_secs),
                Duration::from_secs(self.config.closed_lock_wait_secs),
            )
            .await
            .map_err(|_| AppError::lock_timeout(lock_key))?;

        match self.store.set_payment_closed(&txn.out_trade_no) {
            Ok(true) => {
                tracing::info!(out_trade_no = %txn.out_trade_no, "payment closed");
            }
            // Already closed, or success won the race; both are acks
            Ok(false) => {
                tracing::debug!(out_trade_no = %txn.out_trade_no, "close was a no-op");
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(out_trade_no = %txn.out_trade_no, "close for unknown payment");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

fn parse_pay_time(success_time: Option<&str>) -> DateTime<Utc> {
    success_time
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
