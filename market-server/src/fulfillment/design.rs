//! Design license fulfillment
//!
//! Issues the purchased license. An exclusive plan (buyout or
//! commercial) also takes the design off the market: state moves to
//! bought-out and the linked storefront product is unpublished, in the
//! same store transaction as the license insert.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{DesignLicense, LicenseKind, OrderDetail, OrderItem};
use shared::util::snowflake_id;

use super::FulfillmentHandler;
use crate::services::SessionCache;
use crate::store::MarketStore;

pub struct DesignFulfillment {
    store: Arc<MarketStore>,
    session: Arc<SessionCache>,
}

impl DesignFulfillment {
    pub fn new(store: Arc<MarketStore>, session: Arc<SessionCache>) -> Self {
        Self { store, session }
    }
}

#[async_trait]
impl FulfillmentHandler for DesignFulfillment {
    async fn handle(&self, order: &OrderDetail, item: &OrderItem) -> AppResult<()> {
        let sku_id = item
            .sku_id
            .ok_or_else(|| AppError::new(ErrorCode::SkuNotFound))?;
        let sku = self
            .store
            .get_sku(sku_id)
            .ok_or_else(|| AppError::new(ErrorCode::SkuNotFound))?;
        let plan_id = sku
            .license_plan_id
            .ok_or_else(|| AppError::new(ErrorCode::LicensePlanNotFound))?;
        let plan = self
            .store
            .get_license_plan(plan_id)
            .ok_or_else(|| AppError::new(ErrorCode::LicensePlanNotFound))?;

        // The SKU may carry the design link directly, otherwise the
        // product does
        let design_id = match sku.design_id {
            Some(id) => id,
            None => self
                .store
                .get_product(item.product_id)
                .and_then(|p| p.design_id)
                .ok_or_else(|| AppError::new(ErrorCode::DesignNotFound))?,
        };
        let design = self
            .store
            .get_design(design_id)
            .ok_or_else(|| AppError::new(ErrorCode::DesignNotFound))?;
        if design.state == shared::models::DesignState::BoughtOut {
            return Err(AppError::new(ErrorCode::DesignBoughtOut));
        }

        let user_id = order.order.user_id;
        let exclusive = plan.kind.is_exclusive();
        self.store.record_license(
            DesignLicense {
                id: snowflake_id(),
                user_id,
                design_id,
                plan_id,
                kind: plan.kind,
                is_buyout: plan.kind == LicenseKind::Buyout,
                created_at: Utc::now(),
            },
            exclusive,
        )?;

        self.session.invalidate_purchases(user_id);
        tracing::info!(
            user_id,
            design_id,
            plan_id,
            kind = ?plan.kind,
            exclusive,
            "design license issued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::{
        Design, DesignState, LicensePlan, Order, OrderItemType, OrderStatus, PaymentMethod,
        Product, ProductType, Sku,
    };

    fn setup(kind: LicenseKind) -> (Arc<MarketStore>, DesignFulfillment) {
        let store = Arc::new(MarketStore::new());
        let session = Arc::new(SessionCache::new(Arc::clone(&store)));
        store.insert_design(Design {
            id: 5,
            user_id: 9,
            title: "poster".into(),
            product_id: Some(3),
            state: DesignState::Approved,
        });
        store.insert_product(Product {
            id: 3,
            name: "poster".into(),
            product_type: ProductType::Design,
            is_published: true,
            design_id: Some(5),
        });
        store.insert_license_plan(LicensePlan {
            id: 1,
            kind,
            base_price: Decimal::new(5000, 2),
        });
        store.insert_sku(Sku {
            id: 31,
            product_id: 3,
            name: "license".into(),
            price: Decimal::new(5000, 2),
            stock: -1,
            is_enabled: true,
            vip_plan_id: None,
            license_plan_id: Some(1),
            design_id: Some(5),
        });
        let handler = DesignFulfillment::new(Arc::clone(&store), session);
        (store, handler)
    }

    fn paid_order(user_id: i64) -> OrderDetail {
        let now = Utc::now();
        OrderDetail {
            order: Order {
                id: 1,
                user_id,
                name: "poster - License".into(),
                status: OrderStatus::Paid,
                total_amount: Decimal::new(5000, 2),
                pay_time: Some(now),
                expire_time: now,
                payment_method: PaymentMethod::Wallet,
                merchant_order_no: "MKT1".into(),
                serial_no: "SN1".into(),
                remark: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![OrderItem {
                id: 10,
                order_id: 1,
                item_type: OrderItemType::Design,
                product_id: 3,
                sku_id: Some(31),
                product_name: "poster".into(),
                sku_name: Some("license".into()),
                quantity: 1,
                unit_price: Decimal::new(5000, 2),
                total_price: Decimal::new(5000, 2),
            }],
        }
    }

    #[tokio::test]
    async fn test_normal_license_keeps_design_listed() {
        let (store, handler) = setup(LicenseKind::Normal);
        let order = paid_order(7);
        handler.handle(&order, &order.items[0]).await.unwrap();

        let licenses = store.list_licenses(7);
        assert_eq!(licenses.len(), 1);
        assert!(!licenses[0].is_buyout);
        assert_eq!(store.get_design(5).unwrap().state, DesignState::Approved);
        assert!(store.get_product(3).unwrap().is_published);
    }

    #[tokio::test]
    async fn test_buyout_takes_design_off_market() {
        let (store, handler) = setup(LicenseKind::Buyout);
        let order = paid_order(7);
        handler.handle(&order, &order.items[0]).await.unwrap();

        let licenses = store.list_licenses(7);
        assert!(licenses[0].is_buyout);
        assert_eq!(store.get_design(5).unwrap().state, DesignState::BoughtOut);
        assert!(!store.get_product(3).unwrap().is_published);
    }

    #[tokio::test]
    async fn test_commercial_license_is_exclusive_but_not_buyout() {
        let (store, handler) = setup(LicenseKind::Commercial);
        let order = paid_order(7);
        handler.handle(&order, &order.items[0]).await.unwrap();

        let licenses = store.list_licenses(7);
        assert!(!licenses[0].is_buyout);
        assert_eq!(store.get_design(5).unwrap().state, DesignState::BoughtOut);
        assert!(!store.get_product(3).unwrap().is_published);
    }

    #[tokio::test]
    async fn test_bought_out_design_rejects_further_licenses() {
        let (store, handler) = setup(LicenseKind::Normal);
        store.insert_design(Design {
            id: 5,
            user_id: 9,
            title: "poster".into(),
            product_id: Some(3),
            state: DesignState::BoughtOut,
        });
        let order = paid_order(7);
        let err = handler.handle(&order, &order.items[0]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DesignBoughtOut);
    }
}
