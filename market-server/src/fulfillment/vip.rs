//! VIP membership fulfillment
//!
//! Grants the purchased plan's days. An unexpired membership stacks
//! (the end moves out, the start is untouched); a lapsed one restarts
//! from now. `total_days` accumulates across both cases.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{OrderDetail, OrderItem, VipMembership};

use super::FulfillmentHandler;
use crate::services::SessionCache;
use crate::store::MarketStore;

pub struct VipFulfillment {
    store: Arc<MarketStore>,
    session: Arc<SessionCache>,
}

impl VipFulfillment {
    pub fn new(store: Arc<MarketStore>, session: Arc<SessionCache>) -> Self {
        Self { store, session }
    }
}

#[async_trait]
impl FulfillmentHandler for VipFulfillment {
    async fn handle(&self, order: &OrderDetail, item: &OrderItem) -> AppResult<()> {
        let sku_id = item
            .sku_id
            .ok_or_else(|| AppError::new(ErrorCode::SkuNotFound))?;
        let sku = self
            .store
            .get_sku(sku_id)
            .ok_or_else(|| AppError::new(ErrorCode::SkuNotFound))?;
        let plan_id = sku
            .vip_plan_id
            .ok_or_else(|| AppError::new(ErrorCode::VipPlanNotFound))?;
        let plan = self
            .store
            .get_vip_plan(plan_id)
            .ok_or_else(|| AppError::new(ErrorCode::VipPlanNotFound))?;

        let user_id = order.order.user_id;
        let days = plan.days * i64::from(item.quantity.max(1));
        let now = Utc::now();
        let grant = chrono::Duration::days(days);

        let membership = self.store.apply_membership(user_id, |existing| {
            match existing {
                None => VipMembership {
                    user_id,
                    total_days: days,
                    start_time: now,
                    end_time: now + grant,
                },
                Some(mut m) if m.end_time > now => {
                    // Still active: stack onto the current window
                    m.total_days += days;
                    m.end_time += grant;
                    m
                }
                Some(mut m) => {
                    // Lapsed: restart from now
                    m.total_days += days;
                    m.start_time = now;
                    m.end_time = now + grant;
                    m
                }
            }
        });

        self.session.refresh_membership(user_id);
        tracing::info!(
            user_id,
            plan_id,
            days,
            end_time = %membership.end_time,
            "vip membership granted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::{
        Order, OrderItemType, OrderStatus, PaymentMethod, Product, ProductType, Sku, VipPlan,
    };

    fn setup() -> (Arc<MarketStore>, Arc<SessionCache>, VipFulfillment) {
        let store = Arc::new(MarketStore::new());
        let session = Arc::new(SessionCache::new(Arc::clone(&store)));
        store.insert_product(Product {
            id: 2,
            name: "vip".into(),
            product_type: ProductType::Vip,
            is_published: true,
            design_id: None,
        });
        store.insert_vip_plan(VipPlan {
            id: 1,
            name: "monthly".into(),
            days: 30,
            price: Decimal::new(1990, 2),
        });
        store.insert_sku(Sku {
            id: 21,
            product_id: 2,
            name: "monthly".into(),
            price: Decimal::new(1990, 2),
            stock: -1,
            is_enabled: true,
            vip_plan_id: Some(1),
            license_plan_id: None,
            design_id: None,
        });
        let handler = VipFulfillment::new(Arc::clone(&store), Arc::clone(&session));
        (store, session, handler)
    }

    fn paid_order(user_id: i64) -> OrderDetail {
        let now = Utc::now();
        OrderDetail {
            order: Order {
                id: 1,
                user_id,
                name: "vip - VIP".into(),
                status: OrderStatus::Paid,
                total_amount: Decimal::new(1990, 2),
                pay_time: Some(now),
                expire_time: now,
                payment_method: PaymentMethod::Wallet,
                merchant_order_no: "MKT1".into(),
                serial_no: "SN1".into(),
                remark: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![vip_item()],
        }
    }

    fn vip_item() -> OrderItem {
        OrderItem {
            id: 10,
            order_id: 1,
            item_type: OrderItemType::Vip,
            product_id: 2,
            sku_id: Some(21),
            product_name: "vip".into(),
            sku_name: Some("monthly".into()),
            quantity: 1,
            unit_price: Decimal::new(1990, 2),
            total_price: Decimal::new(1990, 2),
        }
    }

    #[tokio::test]
    async fn test_first_grant_creates_window() {
        let (store, session, handler) = setup();
        let order = paid_order(7);
        handler.handle(&order, &order.items[0]).await.unwrap();

        let m = store.get_membership(7).unwrap();
        assert_eq!(m.total_days, 30);
        assert!(m.is_active(Utc::now()));
        assert!(session.membership_view(7).is_active);
    }

    #[tokio::test]
    async fn test_active_membership_stacks() {
        let (store, _, handler) = setup();
        let order = paid_order(7);
        handler.handle(&order, &order.items[0]).await.unwrap();
        let first_end = store.get_membership(7).unwrap().end_time;

        handler.handle(&order, &order.items[0]).await.unwrap();
        let m = store.get_membership(7).unwrap();
        assert_eq!(m.total_days, 60);
        assert_eq!(m.end_time, first_end + chrono::Duration::days(30));
    }

    #[tokio::test]
    async fn test_lapsed_membership_restarts() {
        let (store, _, handler) = setup();
        let past = Utc::now() - chrono::Duration::days(100);
        store.apply_membership(7, |_| VipMembership {
            user_id: 7,
            total_days: 30,
            start_time: past,
            end_time: past + chrono::Duration::days(30),
        });

        let order = paid_order(7);
        let before = Utc::now();
        handler.handle(&order, &order.items[0]).await.unwrap();

        let m = store.get_membership(7).unwrap();
        assert_eq!(m.total_days, 60);
        assert!(m.start_time >= before);
        assert!(m.end_time > Utc::now());
    }

    #[tokio::test]
    async fn test_missing_plan_fails() {
        let (store, _, handler) = setup();
        store.insert_sku(Sku {
            id: 22,
            product_id: 2,
            name: "broken".into(),
            price: Decimal::ONE,
            stock: -1,
            is_enabled: true,
            vip_plan_id: None,
            license_plan_id: None,
            design_id: None,
        });
        let mut order = paid_order(7);
        order.items[0].sku_id = Some(22);
        let err = handler.handle(&order, &order.items[0]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::VipPlanNotFound);
    }
}
