//! Physical goods fulfillment

use async_trait::async_trait;

use shared::error::AppResult;
use shared::models::{OrderDetail, OrderItem};

use super::FulfillmentHandler;

/// Logistics is handled outside this system; settlement only logs.
pub struct PhysicalFulfillment;

#[async_trait]
impl FulfillmentHandler for PhysicalFulfillment {
    async fn handle(&self, order: &OrderDetail, item: &OrderItem) -> AppResult<()> {
        tracing::info!(
            order_id = order.order.id,
            product_id = item.product_id,
            quantity = item.quantity,
            "physical item awaiting shipment"
        );
        Ok(())
    }
}
