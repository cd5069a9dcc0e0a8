//! In-memory transactional store
//!
//! All domain tables live behind one `RwLock<StoreInner>` so that
//! multi-table writes (order + items + snapshot, settlement + license +
//! design state) are atomic with respect to every reader. Unique
//! indexes on `merchant_order_no`, `serial_no` and `transaction_id` are
//! maintained alongside the tables and violations surface as
//! [`StoreError::UniqueViolation`], which callers treat the same way a
//! database unique constraint would be treated.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    Design, DesignLicense, DesignState, LicensePlan, Order, OrderDetail, OrderItem, OrderStatus,
    PaymentRecord, Product, ProductSnapshot, Sku, TradeState, VipMembership, VipPlan,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write
    #[error("unique violation on {field}: {value}")]
    UniqueViolation { field: &'static str, value: String },

    /// The referenced row does not exist
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::UniqueViolation { field, value } => {
                AppError::with_message(ErrorCode::AlreadyExists, err.to_string())
                    .with_detail("field", *field)
                    .with_detail("value", value.clone())
            }
            StoreError::NotFound { entity } => AppError::not_found(*entity),
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    orders: HashMap<i64, Order>,
    order_items: HashMap<i64, Vec<OrderItem>>,
    snapshots: HashMap<i64, ProductSnapshot>,
    payments: HashMap<i64, PaymentRecord>,

    // Unique indexes
    order_by_merchant_no: HashMap<String, i64>,
    order_by_serial_no: HashMap<String, i64>,
    payment_by_merchant_no: HashMap<String, i64>,
    payment_by_txn: HashMap<String, i64>,
    payment_by_order: HashMap<i64, i64>,

    // Catalog and plans (read-mostly collaborator data)
    products: HashMap<i64, Product>,
    skus: HashMap<i64, Sku>,
    vip_plans: HashMap<i64, VipPlan>,
    license_plans: HashMap<i64, LicensePlan>,
    designs: HashMap<i64, Design>,

    memberships: HashMap<i64, VipMembership>,
    licenses: Vec<DesignLicense>,
}

/// The marketplace persistence substrate
#[derive(Debug, Default)]
pub struct MarketStore {
    inner: RwLock<StoreInner>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Orders ====================

    /// Persist an order with its items and product snapshot atomically.
    ///
    /// Fails without side effects if `merchant_order_no` or `serial_no`
    /// collide with an existing order.
    pub fn create_order(
        &self,
        order: Order,
        items: Vec<OrderItem>,
        snapshot: ProductSnapshot,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner
            .order_by_merchant_no
            .contains_key(&order.merchant_order_no)
        {
            return Err(StoreError::UniqueViolation {
                field: "merchant_order_no",
                value: order.merchant_order_no,
            });
        }
        if inner.order_by_serial_no.contains_key(&order.serial_no) {
            return Err(StoreError::UniqueViolation {
                field: "serial_no",
                value: order.serial_no,
            });
        }
        inner
            .order_by_merchant_no
            .insert(order.merchant_order_no.clone(), order.id);
        inner
            .order_by_serial_no
            .insert(order.serial_no.clone(), order.id);
        inner.order_items.insert(order.id, items);
        inner.snapshots.insert(order.id, snapshot);
        inner.orders.insert(order.id, order);
        Ok(())
    }

    pub fn get_order(&self, order_id: i64) -> Option<Order> {
        self.inner.read().orders.get(&order_id).cloned()
    }

    pub fn get_order_by_merchant_no(&self, merchant_order_no: &str) -> Option<Order> {
        let inner = self.inner.read();
        let id = inner.order_by_merchant_no.get(merchant_order_no)?;
        inner.orders.get(id).cloned()
    }

    pub fn get_order_items(&self, order_id: i64) -> Vec<OrderItem> {
        self.inner
            .read()
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_order_detail(&self, order_id: i64) -> Option<OrderDetail> {
        let inner = self.inner.read();
        let order = inner.orders.get(&order_id)?.clone();
        let items = inner
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default();
        Some(OrderDetail { order, items })
    }

    pub fn get_snapshot(&self, order_id: i64) -> Option<ProductSnapshot> {
        self.inner.read().snapshots.get(&order_id).cloned()
    }

    /// Find an unexpired pending order for the same purchase intent
    pub fn find_pending_order(
        &self,
        user_id: i64,
        product_id: i64,
        now: DateTime<Utc>,
    ) -> Option<Order> {
        let inner = self.inner.read();
        inner
            .orders
            .values()
            .find(|o| {
                o.user_id == user_id
                    && o.status == OrderStatus::Pending
                    && o.expire_time > now
                    && inner
                        .order_items
                        .get(&o.id)
                        .is_some_and(|items| items.iter().any(|i| i.product_id == product_id))
            })
            .cloned()
    }

    /// Compare-and-set the order status.
    ///
    /// Returns `false` when the order is missing or not in `expected`;
    /// nothing is written in that case.
    pub fn update_order_status(
        &self,
        order_id: i64,
        expected: OrderStatus,
        next: OrderStatus,
        pay_time: Option<DateTime<Utc>>,
    ) -> bool {
        let mut inner = self.inner.write();
        let Some(order) = inner.orders.get_mut(&order_id) else {
            return false;
        };
        if order.status != expected {
            return false;
        }
        order.status = next;
        if pay_time.is_some() {
            order.pay_time = pay_time;
        }
        order.updated_at = Utc::now();
        true
    }

    /// Orders for one user, newest first, trivially paged
    pub fn list_orders(&self, user_id: i64, page_no: usize, page_size: usize) -> (Vec<Order>, usize) {
        let inner = self.inner.read();
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = orders.len();
        let page_no = page_no.max(1);
        let page_size = page_size.clamp(1, 100);
        let page = orders
            .into_iter()
            .skip((page_no - 1) * page_size)
            .take(page_size)
            .collect();
        (page, total)
    }

    // ==================== Payments ====================

    /// Insert or replace the payment record for its order.
    ///
    /// The `merchant_order_no` index only admits one record per
    /// reference; re-upserting the same order's record is fine.
    pub fn upsert_payment(&self, record: PaymentRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.payment_by_merchant_no.get(&record.merchant_order_no)
            && inner.payments.get(existing).is_some_and(|p| p.id != record.id)
        {
            return Err(StoreError::UniqueViolation {
                field: "merchant_order_no",
                value: record.merchant_order_no,
            });
        }
        inner
            .payment_by_merchant_no
            .insert(record.merchant_order_no.clone(), record.id);
        inner.payment_by_order.insert(record.order_id, record.id);
        if let Some(txn) = &record.transaction_id {
            inner.payment_by_txn.insert(txn.clone(), record.id);
        }
        inner.payments.insert(record.id, record);
        Ok(())
    }

    pub fn get_payment_by_order(&self, order_id: i64) -> Option<PaymentRecord> {
        let inner = self.inner.read();
        let id = inner.payment_by_order.get(&order_id)?;
        inner.payments.get(id).cloned()
    }

    pub fn get_payment_by_merchant_no(&self, merchant_order_no: &str) -> Option<PaymentRecord> {
        let inner = self.inner.read();
        let id = inner.payment_by_merchant_no.get(merchant_order_no)?;
        inner.payments.get(id).cloned()
    }

    pub fn get_payment_by_transaction_id(&self, transaction_id: &str) -> Option<PaymentRecord> {
        let inner = self.inner.read();
        let id = inner.payment_by_txn.get(transaction_id)?;
        inner.payments.get(id).cloned()
    }

    /// Settlement fields reported by the gateway on success
    #[allow(clippy::too_many_arguments)]
    pub fn set_payment_success(
        &self,
        merchant_order_no: &str,
        transaction_id: &str,
        trade_type: Option<String>,
        trade_state_desc: Option<String>,
        bank_type: Option<String>,
        success_time: Option<String>,
        payer_id: Option<String>,
        payer_amount: Option<rust_decimal::Decimal>,
    ) -> Result<PaymentRecord, StoreError> {
        let mut inner = self.inner.write();
        if let Some(other) = inner.payment_by_txn.get(transaction_id) {
            let other = *other;
            let same = inner
                .payment_by_merchant_no
                .get(merchant_order_no)
                .is_some_and(|id| *id == other);
            if !same {
                return Err(StoreError::UniqueViolation {
                    field: "transaction_id",
                    value: transaction_id.to_string(),
                });
            }
        }
        let Some(id) = inner.payment_by_merchant_no.get(merchant_order_no).copied() else {
            return Err(StoreError::NotFound { entity: "payment" });
        };
        inner.payment_by_txn.insert(transaction_id.to_string(), id);
        let record = inner
            .payments
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "payment" })?;
        // Success never regresses
        if record.trade_state != TradeState::Success {
            record.trade_state = TradeState::Success;
        }
        record.transaction_id = Some(transaction_id.to_string());
        record.trade_type = trade_type;
        record.trade_state_desc = trade_state_desc;
        record.bank_type = bank_type;
        record.success_time = success_time;
        record.payer_id = payer_id;
        record.payer_amount = payer_amount;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// Mark the record closed unless it already settled successfully.
    ///
    /// Returns `true` when the state was changed.
    pub fn set_payment_closed(&self, merchant_order_no: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let Some(id) = inner.payment_by_merchant_no.get(merchant_order_no).copied() else {
            return Err(StoreError::NotFound { entity: "payment" });
        };
        let record = inner
            .payments
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "payment" })?;
        if record.trade_state == TradeState::Success {
            return Ok(false);
        }
        if record.trade_state == TradeState::Closed {
            return Ok(false);
        }
        record.trade_state = TradeState::Closed;
        record.updated_at = Utc::now();
        Ok(true)
    }

    // ==================== Catalog ====================

    pub fn insert_product(&self, product: Product) {
        self.inner.write().products.insert(product.id, product);
    }

    pub fn insert_sku(&self, sku: Sku) {
        self.inner.write().skus.insert(sku.id, sku);
    }

    pub fn get_product(&self, product_id: i64) -> Option<Product> {
        self.inner.read().products.get(&product_id).cloned()
    }

    pub fn get_sku(&self, sku_id: i64) -> Option<Sku> {
        self.inner.read().skus.get(&sku_id).cloned()
    }

    /// Take the product off the storefront
    pub fn unpublish_product(&self, product_id: i64) -> bool {
        let mut inner = self.inner.write();
        match inner.products.get_mut(&product_id) {
            Some(p) => {
                p.is_published = false;
                true
            }
            None => false,
        }
    }

    // ==================== Plans ====================

    pub fn insert_vip_plan(&self, plan: VipPlan) {
        self.inner.write().vip_plans.insert(plan.id, plan);
    }

    pub fn get_vip_plan(&self, plan_id: i64) -> Option<VipPlan> {
        self.inner.read().vip_plans.get(&plan_id).cloned()
    }

    pub fn insert_license_plan(&self, plan: LicensePlan) {
        self.inner.write().license_plans.insert(plan.id, plan);
    }

    pub fn get_license_plan(&self, plan_id: i64) -> Option<LicensePlan> {
        self.inner.read().license_plans.get(&plan_id).cloned()
    }

    // ==================== Memberships ====================

    pub fn get_membership(&self, user_id: i64) -> Option<VipMembership> {
        self.inner.read().memberships.get(&user_id).cloned()
    }

    /// Read-modify-write the user's membership under the store lock
    pub fn apply_membership<F>(&self, user_id: i64, f: F) -> VipMembership
    where
        F: FnOnce(Option<VipMembership>) -> VipMembership,
    {
        let mut inner = self.inner.write();
        let next = f(inner.memberships.get(&user_id).cloned());
        inner.memberships.insert(user_id, next.clone());
        next
    }

    // ==================== Designs and licenses ====================

    pub fn insert_design(&self, design: Design) {
        self.inner.write().designs.insert(design.id, design);
    }

    pub fn get_design(&self, design_id: i64) -> Option<Design> {
        self.inner.read().designs.get(&design_id).cloned()
    }

    /// Record a sold license; an exclusive sale also buys the design
    /// out and unpublishes the linked product, atomically.
    pub fn record_license(
        &self,
        license: DesignLicense,
        exclusive: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let design_id = license.design_id;
        let Some(design) = inner.designs.get_mut(&design_id) else {
            return Err(StoreError::NotFound { entity: "design" });
        };
        if exclusive {
            design.state = DesignState::BoughtOut;
            if let Some(product_id) = design.product_id
                && let Some(product) = inner.products.get_mut(&product_id)
            {
                product.is_published = false;
            }
        }
        inner.licenses.push(license);
        Ok(())
    }

    pub fn list_licenses(&self, user_id: i64) -> Vec<DesignLicense> {
        self.inner
            .read()
            .licenses
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::{OrderItemType, PaymentMethod};

    fn sample_order(id: i64, merchant_no: &str, serial: &str) -> Order {
        let now = Utc::now();
        Order {
            id,
            user_id: 7,
            name: "test order".into(),
            status: OrderStatus::Pending,
            total_amount: Decimal::new(990, 2),
            pay_time: None,
            expire_time: now + chrono::Duration::minutes(30),
            payment_method: PaymentMethod::Wallet,
            merchant_order_no: merchant_no.into(),
            serial_no: serial.into(),
            remark: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_item(order_id: i64) -> OrderItem {
        OrderItem {
            id: order_id * 10,
            order_id,
            item_type: OrderItemType::Physical,
            product_id: 1,
            sku_id: Some(11),
            product_name: "widget".into(),
            sku_name: Some("default".into()),
            quantity: 1,
            unit_price: Decimal::new(990, 2),
            total_price: Decimal::new(990, 2),
        }
    }

    fn sample_snapshot(order_id: i64) -> ProductSnapshot {
        ProductSnapshot {
            order_id,
            product_id: 1,
            snapshot: serde_json::json!({"name": "widget", "price": "9.90"}),
            created_at: Utc::now(),
        }
    }

    fn sample_payment(id: i64, order_id: i64, merchant_no: &str) -> PaymentRecord {
        let now = Utc::now();
        PaymentRecord {
            id,
            order_id,
            merchant_id: "mch-dev".into(),
            merchant_order_no: merchant_no.into(),
            transaction_id: None,
            trade_type: None,
            trade_state: TradeState::Notpay,
            trade_state_desc: None,
            bank_type: None,
            success_time: None,
            payer_id: None,
            total_amount: Decimal::new(990, 2),
            payer_amount: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_order_and_read_back() {
        let store = MarketStore::new();
        store
            .create_order(
                sample_order(1, "MKT1", "SN1"),
                vec![sample_item(1)],
                sample_snapshot(1),
            )
            .unwrap();

        let detail = store.get_order_detail(1).unwrap();
        assert_eq!(detail.order.merchant_order_no, "MKT1");
        assert_eq!(detail.items.len(), 1);
        assert!(store.get_snapshot(1).is_some());
        assert_eq!(store.get_order_by_merchant_no("MKT1").unwrap().id, 1);
    }

    #[test]
    fn test_duplicate_merchant_no_rejected() {
        let store = MarketStore::new();
        store
            .create_order(
                sample_order(1, "MKT1", "SN1"),
                vec![sample_item(1)],
                sample_snapshot(1),
            )
            .unwrap();
        let err = store.create_order(
            sample_order(2, "MKT1", "SN2"),
            vec![sample_item(2)],
            sample_snapshot(2),
        );
        assert!(matches!(
            err,
            Err(StoreError::UniqueViolation {
                field: "merchant_order_no",
                ..
            })
        ));
        // Nothing from the failed write is visible
        assert!(store.get_order(2).is_none());
    }

    #[test]
    fn test_update_order_status_cas() {
        let store = MarketStore::new();
        store
            .create_order(
                sample_order(1, "MKT1", "SN1"),
                vec![sample_item(1)],
                sample_snapshot(1),
            )
            .unwrap();

        assert!(store.update_order_status(
            1,
            OrderStatus::Pending,
            OrderStatus::Paid,
            Some(Utc::now())
        ));
        // Terminal state is absorbing
        assert!(!store.update_order_status(1, OrderStatus::Pending, OrderStatus::Cancelled, None));
        let order = store.get_order(1).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.pay_time.is_some());
    }

    #[test]
    fn test_payment_success_and_conflict() {
        let store = MarketStore::new();
        store.upsert_payment(sample_payment(1, 1, "MKT1")).unwrap();
        store.upsert_payment(sample_payment(2, 2, "MKT2")).unwrap();

        let record = store
            .set_payment_success("MKT1", "TXN1", None, None, None, None, None, None)
            .unwrap();
        assert_eq!(record.trade_state, TradeState::Success);
        assert_eq!(record.transaction_id.as_deref(), Some("TXN1"));
        assert_eq!(store.get_payment_by_transaction_id("TXN1").unwrap().id, 1);

        // Same transaction id on a different record is a conflict
        let err = store.set_payment_success("MKT2", "TXN1", None, None, None, None, None, None);
        assert!(matches!(
            err,
            Err(StoreError::UniqueViolation {
                field: "transaction_id",
                ..
            })
        ));
    }

    #[test]
    fn test_payment_closed_never_overrides_success() {
        let store = MarketStore::new();
        store.upsert_payment(sample_payment(1, 1, "MKT1")).unwrap();
        store
            .set_payment_success("MKT1", "TXN1", None, None, None, None, None, None)
            .unwrap();

        assert!(!store.set_payment_closed("MKT1").unwrap());
        assert_eq!(
            store.get_payment_by_merchant_no("MKT1").unwrap().trade_state,
            TradeState::Success
        );
    }

    #[test]
    fn test_payment_closed_idempotent() {
        let store = MarketStore::new();
        store.upsert_payment(sample_payment(1, 1, "MKT1")).unwrap();
        assert!(store.set_payment_closed("MKT1").unwrap());
        assert!(!store.set_payment_closed("MKT1").unwrap());
        assert_eq!(
            store.get_payment_by_merchant_no("MKT1").unwrap().trade_state,
            TradeState::Closed
        );
    }

    #[test]
    fn test_record_license_buyout_unpublishes_product() {
        let store = MarketStore::new();
        store.insert_product(Product {
            id: 1,
            name: "poster".into(),
            product_type: shared::models::ProductType::Design,
            is_published: true,
            design_id: Some(5),
        });
        store.insert_design(Design {
            id: 5,
            user_id: 9,
            title: "poster".into(),
            product_id: Some(1),
            state: DesignState::Approved,
        });

        store
            .record_license(
                DesignLicense {
                    id: 1,
                    user_id: 7,
                    design_id: 5,
                    plan_id: 1,
                    kind: shared::models::LicenseKind::Buyout,
                    is_buyout: true,
                    created_at: Utc::now(),
                },
                true,
            )
            .unwrap();

        assert_eq!(store.get_design(5).unwrap().state, DesignState::BoughtOut);
        assert!(!store.get_product(1).unwrap().is_published);
        assert_eq!(store.list_licenses(7).len(), 1);
    }

    #[test]
    fn test_list_orders_paging() {
        let store = MarketStore::new();
        for i in 1..=5 {
            let mut order = sample_order(i, &format!("MKT{}", i), &format!("SN{}", i));
            order.created_at = Utc::now() + chrono::Duration::seconds(i);
            store
                .create_order(order, vec![sample_item(i)], sample_snapshot(i))
                .unwrap();
        }
        let (page, total) = store.list_orders(7, 1, 2);
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        // Newest first
        assert_eq!(page[0].id, 5);
        let (page2, _) = store.list_orders(7, 3, 2);
        assert_eq!(page2.len(), 1);
    }

    #[test]
    fn test_apply_membership() {
        let store = MarketStore::new();
        let now = Utc::now();
        let m = store.apply_membership(7, |existing| {
            assert!(existing.is_none());
            VipMembership {
                user_id: 7,
                total_days: 30,
                start_time: now,
                end_time: now + chrono::Duration::days(30),
            }
        });
        assert_eq!(m.total_days, 30);
        let m2 = store.apply_membership(7, |existing| {
            let mut m = existing.unwrap();
            m.total_days += 30;
            m.end_time += chrono::Duration::days(30);
            m
        });
        assert_eq!(m2.total_days, 60);
        assert_eq!(store.get_membership(7).unwrap().total_days, 60);
    }
}
