use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::LoyaltyConfig,
    db::DbPool,
    entities::order::{ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderStatus, RelatedType},
    services::loyalty::LoyaltyService,
};

/// Per-ID results of a bulk status change. There is no cross-ID transaction:
/// IDs that succeeded stay changed when later ones fail, and this list is
/// the source of truth for what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransitionOutcome {
    pub updated: u32,
    pub failed: Vec<BulkTransitionFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransitionFailure {
    pub id: Uuid,
    pub reason: String,
}

/// Drives order status changes, lifecycle timestamp stamping, and the
/// completion side effects (point award, tracking sync request).
#[derive(Clone)]
pub struct OrderLifecycleService {
    db: Arc<DbPool>,
    loyalty: LoyaltyService,
    loyalty_config: LoyaltyConfig,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderLifecycleService {
    pub fn new(
        db: Arc<DbPool>,
        loyalty: LoyaltyService,
        loyalty_config: LoyaltyConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            loyalty,
            loyalty_config,
            event_sender,
        }
    }

    /// Moves an order to `new_status`.
    ///
    /// Any jump between two distinct statuses is allowed (admin overrides
    /// such as pending → completed are legitimate), so only membership in
    /// the status set is validated. Lifecycle timestamps are first-write
    /// wins: re-entering a status never overwrites the recorded time. A
    /// transition to the current status is a no-op.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn transition_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
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

        let old_status = order
            .order_status()
            .map_err(|e| ServiceError::InvalidStatus(e.to_string()))?;

        if old_status == new_status {
            txn.rollback().await.map_err(ServiceError::DatabaseError)?;
            return Ok(order);
        }

        let now = Utc::now();
        let already_stamped = order.timestamp_for(new_status).is_some();

        let mut active: OrderActiveModel = order.clone().into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(now));
        active.version = Set(order.version + 1);

        if !already_stamped {
            match new_status {
                OrderStatus::Paid => active.paid_at = Set(Some(now)),
                OrderStatus::Shipped => active.shipped_at = Set(Some(now)),
                OrderStatus::Completed => active.completed_at = Set(Some(now)),
                OrderStatus::Cancelled => active.cancelled_at = Set(Some(now)),
                OrderStatus::Pending | OrderStatus::Refunded => {}
            }
        }

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );

        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status,
        })
        .await;

        if new_status == OrderStatus::Shipped {
            self.emit(Event::TrackingSyncRequested {
                order_id,
                tracking_provider: updated.tracking_provider.clone(),
                tracking_number: updated.tracking_number.clone(),
            })
            .await;
        }

        if new_status == OrderStatus::Completed {
            self.emit(Event::OrderCompleted(order_id)).await;
            // The status change is already committed; a failure here is
            // returned so the caller can retry, and the retry is safe
            // because the award is idempotent per order.
            self.award_completion_points(&updated).await?;
        }

        Ok(updated)
    }

    /// Applies the same transition to each ID independently, collecting
    /// per-ID failures without aborting the batch and without rollback of
    /// earlier successes.
    #[instrument(skip(self, order_ids), fields(count = order_ids.len(), new_status = %new_status))]
    pub async fn bulk_transition_status(
        &self,
        order_ids: Vec<Uuid>,
        new_status: OrderStatus,
    ) -> Result<BulkTransitionOutcome, ServiceError> {
        let mut updated = 0u32;
        let mut failed = Vec::new();

        for order_id in order_ids {
            match self.transition_status(order_id, new_status).await {
                Ok(_) => updated += 1,
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Bulk status change failed for order");
                    failed.push(BulkTransitionFailure {
                        id: order_id,
                        reason: e.response_message(),
                    });
                }
            }
        }

        info!(updated, failed = failed.len(), "Bulk status change finished");
        Ok(BulkTransitionOutcome { updated, failed })
    }

    /// Awards `floor(total × points_per_unit)` once per order, gated by the
    /// loyalty toggle.
    async fn award_completion_points(&self, order: &OrderModel) -> Result<(), ServiceError> {
        if !self.loyalty_config.enabled {
            return Ok(());
        }
        if self.loyalty_config.points_per_unit <= rust_decimal::Decimal::ZERO {
            return Ok(());
        }

        let points = (order.total_amount * self.loyalty_config.points_per_unit)
            .floor()
            .to_i64()
            .unwrap_or(0);
        if points <= 0 {
            return Ok(());
        }

        let outcome = self
            .loyalty
            .award(
                order.customer_id,
                RelatedType::Order,
                order.id,
                points,
                order.total_amount,
            )
            .await?;

        if !outcome.credited {
            info!(order_id = %order.id, "Completion points were already awarded");
        }

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send lifecycle event");
            }
        }
    }
}
