//! Post-payment fulfillment
//!
//! After an order settles, every item is handed to the handler
//! registered for its type. Handlers must be idempotent-friendly: the
//! webhook processor guarantees they run at most once per settled
//! order, but a handler failure makes the whole callback retryable, so
//! a handler may see the same item again after a partial failure.

mod design;
mod physical;
mod vip;

pub use design::DesignFulfillment;
pub use physical::PhysicalFulfillment;
pub use vip::VipFulfillment;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use shared::error::{AppError, AppResult};
use shared::models::{OrderDetail, OrderItem, OrderItemType};

use crate::services::SessionCache;
use crate::store::MarketStore;

/// One item type's settlement side effects
#[async_trait]
pub trait FulfillmentHandler: Send + Sync {
    async fn handle(&self, order: &OrderDetail, item: &OrderItem) -> AppResult<()>;
}

/// Item-type to handler registry, built once at startup
pub struct FulfillmentDispatcher {
    handlers: HashMap<OrderItemType, Box<dyn FulfillmentHandler>>,
}

impl FulfillmentDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The production registry: physical, VIP and design handlers
    pub fn standard(store: Arc<MarketStore>, session: Arc<SessionCache>) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(OrderItemType::Physical, Box::new(PhysicalFulfillment));
        dispatcher.register(
            OrderItemType::Vip,
            Box::new(VipFulfillment::new(Arc::clone(&store), Arc::clone(&session))),
        );
        dispatcher.register(
            OrderItemType::Design,
            Box::new(DesignFulfillment::new(store, session)),
        );
        dispatcher
    }

    pub fn register(&mut self, item_type: OrderItemType, handler: Box<dyn FulfillmentHandler>) {
        self.handlers.insert(item_type, handler);
    }

    /// Fulfill every item of a settled order; the first failure aborts
    pub async fn dispatch(&self, order: &OrderDetail) -> AppResult<()> {
        for item in &order.items {
            let handler = self.handlers.get(&item.item_type).ok_or_else(|| {
                AppError::internal(format!("no fulfillment handler for {:?}", item.item_type))
            })?;
            handler.handle(order, item).await?;
            tracing::info!(
                order_id = order.order.id,
                item_id = item.id,
                item_type = ?item.item_type,
                "item fulfilled"
            );
        }
        Ok(())
    }
}

impl Default for FulfillmentDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
