use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity},
    entities::order_item::{self, Entity as OrderItemEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{CartLine, OrderStatus},
    services::pricing::PricingBreakdown,
};

/// Checkout's order placement payload: the cart lines plus the priced
/// breakdown they were accepted at.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, max = 50, message = "Order number is required"))]
    pub order_number: String,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub lines: Vec<CartLine>,
    pub breakdown: PricingBreakdown,
    pub tracking_provider: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a pending order and its item rows in one transaction.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, order_number = %request.order_number))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request.validate()?;
        for line in &request.lines {
            line.check().map_err(ServiceError::ValidationError)?;
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self
            .db
            .begin()
            .await
            .map_err(ServiceError::DatabaseError)?;

        let order = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(request.order_number.clone()),
            customer_id: Set(request.customer_id),
            status: Set(OrderStatus::Pending.to_string()),
            subtotal: Set(request.breakdown.subtotal),
            discount_total: Set(request.breakdown.member_discount
                + request.breakdown.coupon_discount
                + request.breakdown.points_discount),
            shipping_total: Set(request.breakdown.shipping_fee),
            tax_total: Set(request.breakdown.tax),
            total_amount: Set(request.breakdown.total),
            currency: Set(request.breakdown.currency.clone()),
            tracking_provider: Set(request.tracking_provider),
            tracking_number: Set(request.tracking_number),
            paid_at: Set(None),
            shipped_at: Set(None),
            completed_at: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let items = Self::insert_items(&txn, order_id, &request.lines, now).await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, item_count = items.len(), "Order created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order created event");
            }
        }

        Ok(OrderWithItems { order, items })
    }

    /// Replaces an order's item set wholesale and refreshes the monetary
    /// fields from a new breakdown. Item rows are immutable, so a full
    /// order update deletes and recreates the set instead of editing rows.
    #[instrument(skip(self, lines, breakdown), fields(order_id = %order_id))]
    pub async fn replace_items(
        &self,
        order_id: Uuid,
        lines: Vec<CartLine>,
        breakdown: PricingBreakdown,
    ) -> Result<OrderWithItems, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        for line in &lines {
            line.check().map_err(ServiceError::ValidationError)?;
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let now = Utc::now();
        let items = Self::insert_items(&txn, order_id, &lines, now).await?;

        let mut active: OrderActiveModel = order.clone().into();
        active.subtotal = Set(breakdown.subtotal);
        active.discount_total = Set(breakdown.member_discount
            + breakdown.coupon_discount
            + breakdown.points_discount);
        active.shipping_total = Set(breakdown.shipping_fee);
        active.tax_total = Set(breakdown.tax);
        active.total_amount = Set(breakdown.total);
        active.updated_at = Set(Some(now));
        active.version = Set(order.version + 1);
        let order = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, item_count = items.len(), "Order items replaced");

        Ok(OrderWithItems { order, items })
    }

    /// Fetches an order together with its items.
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(OrderWithItems { order, items })
    }

    async fn insert_items(
        txn: &sea_orm::DatabaseTransaction,
        order_id: Uuid,
        lines: &[CartLine],
        now: chrono::DateTime<Utc>,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                sku: Set(line.sku.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                line_total: Set(line.line_total()),
                created_at: Set(now),
            }
            .insert(txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
            items.push(item);
        }
        Ok(items)
    }
}
