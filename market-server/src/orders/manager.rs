//! Order lifecycle manager
//!
//! Owns creation and every state transition of an order. All mutations
//! of one order are serialized under the `order:modify:{id}` lock, and
//! creation for one purchase intent under `order:create:{...}`, so the
//! API, the webhook processor and the expiry worker can race freely
//! without double transitions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    Order, OrderDetail, OrderItem, OrderItemType, OrderStatus, PaymentMethod, Product,
    ProductSnapshot, ProductType, Sku,
};
use shared::util::{gen_order_no, snowflake_id};

use crate::cache::TtlCache;
use crate::core::config::OrderConfig;
use crate::lock::LockCoordinator;
use crate::orders::expiry::ExpiryScheduler;
use crate::store::MarketStore;

pub struct OrderManager {
    store: Arc<MarketStore>,
    locks: Arc<LockCoordinator>,
    detail_cache: Arc<TtlCache<i64, OrderDetail>>,
    scheduler: Arc<dyn ExpiryScheduler>,
    config: OrderConfig,
}

impl OrderManager {
    pub fn new(
        store: Arc<MarketStore>,
        locks: Arc<LockCoordinator>,
        scheduler: Arc<dyn ExpiryScheduler>,
        config: OrderConfig,
    ) -> Self {
        Self {
            store,
            locks,
            detail_cache: Arc::new(TtlCache::new()),
            scheduler,
            config,
        }
    }

    pub fn store(&self) -> &Arc<MarketStore> {
        &self.store
    }

    /// Create a pending order for one SKU.
    ///
    /// Serialized per purchase intent; a duplicate unpaid order for the
    /// same user and product is rejected instead of silently stacking.
    pub async fn create_order(&self, user_id: i64, product_id: i64, sku_id: i64) -> AppResult<i64> {
        let key = format!("order:create:{}:{}:{}", user_id, product_id, sku_id);
        let _guard = self
            .locks
            .acquire(
                &key,
                Duration::from_secs(self.config.create_lock_ttl_secs),
                Duration::from_secs(self.config.create_lock_wait_secs),
            )
            .await
            .map_err(|_| AppError::lock_timeout(key.clone()))?;

        let now = Utc::now();
        if let Some(existing) = self.store.find_pending_order(user_id, product_id, now) {
            return Err(AppError::new(ErrorCode::OrderDuplicatePending)
                .with_detail("order_id", existing.id.to_string()));
        }

        let (product, sku) = self.validate_purchase(product_id, sku_id)?;

        let order_id = snowflake_id();
        let expire_time = now + chrono::Duration::minutes(self.config.expire_minutes);
        let order = Order {
            id: order_id,
            user_id,
            name: order_name(&product),
            status: OrderStatus::Pending,
            total_amount: sku.price,
            pay_time: None,
            expire_time,
            payment_method: PaymentMethod::Wallet,
            merchant_order_no: gen_order_no("MKT"),
            serial_no: gen_order_no("SN"),
            remark: None,
            created_at: now,
            updated_at: now,
        };
        let item = OrderItem {
            id: snowflake_id(),
            order_id,
            item_type: item_type_of(&product),
            product_id,
            sku_id: Some(sku_id),
            product_name: product.name.clone(),
            sku_name: Some(sku.name.clone()),
            quantity: 1,
            unit_price: sku.price,
            total_price: sku.price,
        };
        let snapshot = ProductSnapshot {
            order_id,
            product_id,
            snapshot: serde_json::json!({ "product": product, "sku": sku }),
            created_at: now,
        };

        self.store.create_order(order, vec![item], snapshot)?;
        self.scheduler.schedule_close(
            order_id,
            Duration::from_secs(self.config.expire_minutes as u64 * 60),
        );

        // Warm the detail view
        if let Some(detail) = self.store.get_order_detail(order_id) {
            self.detail_cache.insert(
                order_id,
                detail,
                Duration::from_secs(self.config.detail_cache_ttl_secs),
            );
        }

        tracing::info!(order_id, user_id, product_id, sku_id, "order created");
        Ok(order_id)
    }

    fn validate_purchase(&self, product_id: i64, sku_id: i64) -> AppResult<(Product, Sku)> {
        let product = self
            .store
            .get_product(product_id)
            .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound))?;
        if !product.is_published {
            return Err(AppError::new(ErrorCode::ProductNotFound)
                .with_detail("reason", "unpublished"));
        }
        let sku = self
            .store
            .get_sku(sku_id)
            .ok_or_else(|| AppError::new(ErrorCode::SkuNotFound))?;
        if sku.product_id != product_id {
            return Err(AppError::new(ErrorCode::SkuNotFound)
                .with_detail("reason", "sku does not belong to product"));
        }
        if !sku.is_enabled {
            return Err(AppError::new(ErrorCode::SkuDisabled));
        }
        if !sku.has_stock() {
            return Err(AppError::new(ErrorCode::ProductOutOfStock));
        }
        Ok((product, sku))
    }

    /// User-initiated cancellation.
    ///
    /// Returns `false` when the order is no longer pending; a closed or
    /// paid order is left untouched.
    pub async fn close_order(&self, order_id: i64, user_id: Option<i64>) -> AppResult<bool> {
        let _guard = self.modify_lock(order_id).await?;
        let order = self
            .store
            .get_order(order_id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        if let Some(uid) = user_id
            && order.user_id != uid
        {
            return Err(AppError::permission_denied("order belongs to another user"));
        }
        let changed =
            self.store
                .update_order_status(order_id, OrderStatus::Pending, OrderStatus::Cancelled, None);
        if changed {
            self.detail_cache.invalidate(&order_id);
            tracing::info!(order_id, "order cancelled");
        }
        Ok(changed)
    }

    /// Expiry-worker closure; never an error on an already-settled order
    pub async fn close_timeout_order(&self, order_id: i64) -> AppResult<bool> {
        let _guard = self.modify_lock(order_id).await?;
        let Some(order) = self.store.get_order(order_id) else {
            return Ok(false);
        };
        if !order.status.is_pending() {
            return Ok(false);
        }
        let now = Utc::now();
        if order.expire_time > now {
            // Fired early; push the remainder back onto the queue
            let remaining = (order.expire_time - now)
                .to_std()
                .unwrap_or(Duration::from_secs(1));
            self.scheduler.schedule_close(order_id, remaining);
            return Ok(false);
        }
        let changed = self.store.update_order_status(
            order_id,
            OrderStatus::Pending,
            OrderStatus::TimeoutClosed,
            None,
        );
        if changed {
            self.detail_cache.invalidate(&order_id);
        }
        Ok(changed)
    }

    /// Settlement transition, invoked by the webhook processor.
    ///
    /// Returns `false` if the order already left `Pending`; the caller
    /// decides whether that means "already processed".
    pub async fn mark_order_as_paid(
        &self,
        order_id: i64,
        pay_time: DateTime<Utc>,
        user_id: Option<i64>,
    ) -> AppResult<bool> {
        let _guard = self.modify_lock(order_id).await?;
        let order = self
            .store
            .get_order(order_id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        if let Some(uid) = user_id
            && order.user_id != uid
        {
            return Err(AppError::permission_denied("order belongs to another user"));
        }
        let changed = self.store.update_order_status(
            order_id,
            OrderStatus::Pending,
            OrderStatus::Paid,
            Some(pay_time),
        );
        if changed {
            // Replace the stale pending view right away
            if let Some(detail) = self.store.get_order_detail(order_id) {
                self.detail_cache.insert(
                    order_id,
                    detail,
                    Duration::from_secs(self.config.detail_cache_ttl_secs),
                );
            }
            tracing::info!(order_id, "order marked paid");
        }
        Ok(changed)
    }

    /// Read-through detail view with an ownership guard
    pub fn get_order_detail(&self, order_id: i64, user_id: Option<i64>) -> AppResult<OrderDetail> {
        let detail = match self.detail_cache.get(&order_id) {
            Some(d) => d,
            None => {
                let d = self
                    .store
                    .get_order_detail(order_id)
                    .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
                self.detail_cache.insert(
                    order_id,
                    d.clone(),
                    Duration::from_secs(self.config.detail_cache_ttl_secs),
                );
                d
            }
        };
        if let Some(uid) = user_id
            && detail.order.user_id != uid
        {
            return Err(AppError::permission_denied("order belongs to another user"));
        }
        Ok(detail)
    }

    pub fn list_orders(
        &self,
        user_id: i64,
        page_no: usize,
        page_size: usize,
    ) -> (Vec<Order>, usize) {
        self.store.list_orders(user_id, page_no, page_size)
    }

    async fn modify_lock(&self, order_id: i64) -> AppResult<crate::lock::LockGuard> {
        let key = format!("order:modify:{}", order_id);
        self.locks
            .acquire(
                &key,
                Duration::from_secs(self.config.modify_lock_ttl_secs),
                Duration::from_secs(self.config.modify_lock_wait_secs),
            )
            .await
            .map_err(|_| AppError::lock_timeout(key))
    }
}

fn item_type_of(product: &Product) -> OrderItemType {
    match product.product_type {
        ProductType::Physical => OrderItemType::Physical,
        ProductType::Vip => OrderItemType::Vip,
        ProductType::Design => OrderItemType::Design,
    }
}

fn order_name(product: &Product) -> String {
    match product.product_type {
        ProductType::Physical => product.name.clone(),
        ProductType::Vip => format!("{} - VIP", product.name),
        ProductType::Design => format!("{} - License", product.name),
    }
}
