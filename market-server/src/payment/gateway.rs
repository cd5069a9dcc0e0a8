//! Payment gateway client
//!
//! Builds signed prepay requests, hands the client its pay-sheet
//! parameters and exposes the verify/decrypt primitives the webhook
//! processor needs. Canonical strings follow the gateway's v3 protocol:
//!
//! - request:  `METHOD\nPATH\nTIMESTAMP\nNONCE\nBODY\n`
//! - client:   `appId\nTIMESTAMP\nNONCE\npackage\n`
//! - callback: `TIMESTAMP\nNONCE\nBODY\n`

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{OrderStatus, PaymentRecord, PrepayParams, TradeState};
use shared::util::{gen_nonce, snowflake_id};

use crate::cache::TtlCache;
use crate::core::config::GatewayConfig;
use crate::lock::LockCoordinator;
use crate::payment::crypto::{RsaSigner, RsaVerifier, aes_gcm_decrypt};
use crate::store::MarketStore;

/// Description limit imposed by the gateway
const MAX_DESCRIPTION_CHARS: usize = 127;

const PREPAY_LOCK_TTL: Duration = Duration::from_secs(10);
const PREPAY_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Canonical string for an outbound request signature
pub fn request_sign_message(method: &str, path: &str, ts: i64, nonce: &str, body: &str) -> String {
    format!("{}\n{}\n{}\n{}\n{}\n", method, path, ts, nonce, body)
}

/// Canonical string the client pay-sheet signature covers
pub fn client_sign_message(app_id: &str, ts: &str, nonce: &str, package: &str) -> String {
    format!("{}\n{}\n{}\n{}\n", app_id, ts, nonce, package)
}

/// Canonical string a callback signature covers
pub fn callback_sign_message(ts: &str, nonce: &str, body: &str) -> String {
    format!("{}\n{}\n{}\n", ts, nonce, body)
}

/// Clip to the gateway's description limit, marking the cut with "..."
pub fn truncate_description(description: &str) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_CHARS {
        return description.to_string();
    }
    let head: String = description.chars().take(MAX_DESCRIPTION_CHARS - 3).collect();
    format!("{}...", head)
}

/// Currency units to gateway minor units; zero or negative is invalid
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    let minor = (amount * Decimal::from(100)).round_dp(0);
    let value = minor
        .to_i64()
        .ok_or_else(|| AppError::new(ErrorCode::InvalidAmount))?;
    if value <= 0 {
        return Err(AppError::new(ErrorCode::InvalidAmount)
            .with_detail("amount", amount.to_string()));
    }
    Ok(value)
}

#[derive(Debug, Serialize)]
struct PrepayRequest<'a> {
    appid: &'a str,
    mchid: &'a str,
    description: String,
    out_trade_no: &'a str,
    notify_url: &'a str,
    amount: PrepayAmount,
    payer: PrepayPayer<'a>,
}

#[derive(Debug, Serialize)]
struct PrepayAmount {
    total: i64,
    currency: &'static str,
}

#[derive(Debug, Serialize)]
struct PrepayPayer<'a> {
    openid: &'a str,
}

#[derive(Debug, Deserialize)]
struct PrepayResponse {
    prepay_id: String,
}

pub struct PaymentGateway {
    config: GatewayConfig,
    http: reqwest::Client,
    signer: RsaSigner,
    verifier: RsaVerifier,
    api_key: Vec<u8>,
    store: Arc<MarketStore>,
    locks: Arc<LockCoordinator>,
    prepay_cache: TtlCache<i64, PrepayParams>,
}

impl PaymentGateway {
    pub fn new(
        config: GatewayConfig,
        signer: RsaSigner,
        verifier: RsaVerifier,
        store: Arc<MarketStore>,
        locks: Arc<LockCoordinator>,
    ) -> AppResult<Self> {
        let api_key = config.api_v3_key.as_bytes().to_vec();
        if api_key.len() != 32 {
            return Err(AppError::with_message(
                ErrorCode::ConfigError,
                "gateway API v3 key must be exactly 32 bytes",
            ));
        }
        Ok(Self {
            config,
            http: reqwest::Client::new(),
            signer,
            verifier,
            api_key,
            store,
            locks,
            prepay_cache: TtlCache::new(),
        })
    }

    /// Load keys from the configured PEM paths
    pub fn from_config(
        config: GatewayConfig,
        store: Arc<MarketStore>,
        locks: Arc<LockCoordinator>,
    ) -> AppResult<Self> {
        let private_pem = std::fs::read_to_string(&config.private_key_path).map_err(|e| {
            AppError::with_message(
                ErrorCode::ConfigError,
                format!("cannot read {}: {}", config.private_key_path, e),
            )
        })?;
        let platform_pem = std::fs::read_to_string(&config.platform_key_path).map_err(|e| {
            AppError::with_message(
                ErrorCode::ConfigError,
                format!("cannot read {}: {}", config.platform_key_path, e),
            )
        })?;
        let signer = RsaSigner::from_pem(&private_pem)?;
        let verifier = RsaVerifier::from_pem(&platform_pem)?;
        Self::new(config, signer, verifier, store, locks)
    }

    /// Authorization header for an outbound gateway request
    pub fn build_authorization(&self, method: &str, path: &str, body: &str) -> AppResult<String> {
        let ts = Utc::now().timestamp();
        let nonce = gen_nonce(32);
        let message = request_sign_message(method, path, ts, &nonce, body);
        let signature = self.signer.sign_b64(&message)?;
        Ok(format!(
            "SHA256-RSA2048 mchid=\"{}\",nonce_str=\"{}\",timestamp=\"{}\",serial_no=\"{}\",signature=\"{}\"",
            self.config.merchant_id, nonce, ts, self.config.key_serial, signature
        ))
    }

    /// Create (or replay) the prepay session for a pending order.
    ///
    /// Serialized per user and order; a concurrent duplicate request
    /// gets the identical cached session instead of a second gateway
    /// transaction.
    pub async fn create_prepay_session(
        &self,
        user_id: i64,
        openid: &str,
        order_id: i64,
    ) -> AppResult<PrepayParams> {
        let key = format!("pay:prepay:{}:{}", user_id, order_id);
        let _guard = self
            .locks
            .acquire(&key, PREPAY_LOCK_TTL, PREPAY_LOCK_WAIT)
            .await
            .map_err(|_| AppError::lock_timeout(key.clone()))?;

        if let Some(cached) = self.prepay_cache.get(&order_id) {
            return Ok(cached);
        }

        let order = self
            .store
            .get_order(order_id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        if order.user_id != user_id {
            return Err(AppError::permission_denied("order belongs to another user"));
        }
        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Paid => return Err(AppError::new(ErrorCode::OrderAlreadyPaid)),
            _ => return Err(AppError::new(ErrorCode::OrderClosed)),
        }
        let now = Utc::now();
        if order.expire_time <= now {
            return Err(AppError::new(ErrorCode::OrderExpired));
        }

        let items = self.store.get_order_items(order_id);
        let description = truncate_description(
            &items
                .iter()
                .map(|i| i.product_name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );
        let total = to_minor_units(order.total_amount)?;

        let request = PrepayRequest {
            appid: &self.config.app_id,
            mchid: &self.config.merchant_id,
            description,
            out_trade_no: &order.merchant_order_no,
            notify_url: &self.config.notify_url,
            amount: PrepayAmount {
                total,
                currency: "CNY",
            },
            payer: PrepayPayer { openid },
        };
        let prepay_id = self.post_prepay(&request).await?;

        // Record the attempt before handing anything to the client
        let record_id = self
            .store
            .get_payment_by_order(order_id)
            .map(|r| r.id)
            .unwrap_or_else(snowflake_id);
        self.store.upsert_payment(PaymentRecord {
            id: record_id,
            order_id,
            merchant_id: self.config.merchant_id.clone(),
            merchant_order_no: order.merchant_order_no.clone(),
            transaction_id: None,
            trade_type: Some("JSAPI".into()),
            trade_state: TradeState::Notpay,
            trade_state_desc: None,
            bank_type: None,
            success_time: None,
            payer_id: Some(openid.to_string()),
            total_amount: order.total_amount,
            payer_amount: None,
            created_at: now,
            updated_at: now,
        })?;

        let ts = now.timestamp().to_string();
        let nonce = gen_nonce(32);
        let package = format!("prepay_id={}", prepay_id);
        let pay_sign = self
            .signer
            .sign_b64(&client_sign_message(&self.config.app_id, &ts, &nonce, &package))?;
        let params = PrepayParams {
            app_id: self.config.app_id.clone(),
            time_stamp: ts,
            nonce_str: nonce,
            package,
            sign_type: "RSA".into(),
            pay_sign,
        };

        // Valid exactly as long as the order is
        if let Ok(remaining) = (order.expire_time - now).to_std() {
            self.prepay_cache.insert(order_id, params.clone(), remaining);
        }
        tracing::info!(order_id, user_id, "prepay session created");
        Ok(params)
    }

    async fn post_prepay(&self, request: &PrepayRequest<'_>) -> AppResult<String> {
        let path = "/v3/pay/transactions/jsapi";
        let body = serde_json::to_string(request)
            .map_err(|e| AppError::internal(format!("serialize prepay request: {}", e)))?;
        let authorization = self.build_authorization("POST", path, &body)?;

        let response = self
            .http
            .post(format!("{}{}", self.config.base_url, path))
            .header("Authorization", authorization)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                AppError::with_message(ErrorCode::PrepayFailed, format!("gateway unreachable: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(status = %status, body = %text, "prepay rejected by gateway");
            return Err(AppError::new(ErrorCode::PrepayFailed)
                .with_detail("status", status.as_u16())
                .with_detail("body", text));
        }
        let parsed: PrepayResponse = serde_json::from_str(&text).map_err(|e| {
            AppError::with_message(
                ErrorCode::PrepayFailed,
                format!("malformed prepay response: {}", e),
            )
        })?;
        Ok(parsed.prepay_id)
    }

    /// Verify a callback signature over `ts\nnonce\nbody\n`
    pub fn verify_callback(&self, ts: &str, nonce: &str, body: &str, signature_b64: &str) -> bool {
        self.verifier
            .verify_b64(&callback_sign_message(ts, nonce, body), signature_b64)
    }

    /// Decrypt a callback resource ciphertext (base64, tag appended)
    pub fn decrypt_resource(
        &self,
        ciphertext_b64: &str,
        nonce: &str,
        associated_data: &str,
    ) -> AppResult<Vec<u8>> {
        let ciphertext = B64.decode(ciphertext_b64).map_err(|_| {
            AppError::new(ErrorCode::DecryptFailed).with_detail("reason", "ciphertext not base64")
        })?;
        aes_gcm_decrypt(
            &self.api_key,
            nonce.as_bytes(),
            associated_data.as_bytes(),
            &ciphertext,
        )
    }
}
