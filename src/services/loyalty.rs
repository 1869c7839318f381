use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::points_balance::{self, Entity as PointsBalance},
    entities::reward_transaction::{self, Entity as RewardTransaction, RewardAction},
    errors::ServiceError,
    events::{Event, EventSender},
    models::RelatedType,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AwardOutcome {
    /// False when an earn row for this key already existed and the call
    /// was a no-op.
    pub credited: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RedeemOutcome {
    pub debited: bool,
}

/// Append-only loyalty ledger with an exactly-once earn guarantee per
/// `(user, related_type, related_id)` key.
#[derive(Clone)]
pub struct LoyaltyService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    /// Serialises the check-then-insert of `award` per idempotency key so
    /// concurrent retries cannot both pass the existence check. Entries are
    /// evicted once the last caller for a key releases its lock, so the map
    /// holds only in-flight keys. Multi-process deployments additionally
    /// need the composite unique index on the ledger table.
    award_locks: Arc<DashMap<(Uuid, RelatedType, Uuid), Arc<Mutex<()>>>>,
}

impl LoyaltyService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db,
            event_sender,
            award_locks: Arc::new(DashMap::new()),
        }
    }

    /// Credits `points` to the user exactly once per related entity.
    ///
    /// A second call with the same `(user, related_type, related_id)` finds
    /// the existing earn row and returns `credited: false` without touching
    /// the balance, which is what makes retried order-completion webhooks
    /// safe.
    #[instrument(skip(self), fields(user_id = %user_id, related_id = %related_id))]
    pub async fn award(
        &self,
        user_id: Uuid,
        related_type: RelatedType,
        related_id: Uuid,
        points: i64,
        amount_context: Decimal,
    ) -> Result<AwardOutcome, ServiceError> {
        if points <= 0 {
            return Err(ServiceError::ValidationError(
                "Award points must be positive".to_string(),
            ));
        }

        let key = (user_id, related_type, related_id);
        let lock = self
            .award_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;
        let result = self
            .award_locked(user_id, related_type, related_id, points, amount_context)
            .await;
        drop(guard);
        drop(lock);
        // Evict the key unless another caller still holds a clone of the
        // lock; otherwise the map grows by one entry per awarded order.
        self.award_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn award_locked(
        &self,
        user_id: Uuid,
        related_type: RelatedType,
        related_id: Uuid,
        points: i64,
        amount_context: Decimal,
    ) -> Result<AwardOutcome, ServiceError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(ServiceError::DatabaseError)?;

        let existing = RewardTransaction::find()
            .filter(reward_transaction::Column::UserId.eq(user_id))
            .filter(reward_transaction::Column::RelatedType.eq(related_type.to_string()))
            .filter(reward_transaction::Column::RelatedId.eq(related_id))
            .filter(reward_transaction::Column::Action.eq(RewardAction::Earn))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if existing.is_some() {
            txn.rollback().await.map_err(ServiceError::DatabaseError)?;
            info!(user_id = %user_id, related_id = %related_id, "Points already awarded, skipping");
            return Ok(AwardOutcome { credited: false });
        }

        let now = Utc::now();
        match PointsBalance::find_by_id(user_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
        {
            Some(balance) => {
                let new_balance = balance.balance + points;
                let mut active: points_balance::ActiveModel = balance.into();
                active.balance = Set(new_balance);
                active.updated_at = Set(now);
                active.update(&txn).await.map_err(ServiceError::DatabaseError)?;
            }
            None => {
                points_balance::ActiveModel {
                    user_id: Set(user_id),
                    balance: Set(points),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
            }
        }

        reward_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            related_type: Set(related_type.to_string()),
            related_id: Set(related_id),
            action: Set(RewardAction::Earn),
            points_delta: Set(points),
            amount_delta: Set(amount_context),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(user_id = %user_id, points, related_id = %related_id, "Points awarded");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::PointsAwarded {
                user_id,
                related_type: related_type.to_string(),
                related_id,
                points,
                timestamp: now,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, user_id = %user_id, "Failed to send points awarded event");
            }
        }

        Ok(AwardOutcome { credited: true })
    }

    /// Debits `points` from the user and appends a redeem row.
    ///
    /// The decrement is a conditional UPDATE guarded by `balance >= points`,
    /// so concurrent redemptions cannot drive the balance negative; the
    /// loser sees zero affected rows.
    #[instrument(skip(self), fields(user_id = %user_id, related_id = %related_id))]
    pub async fn redeem(
        &self,
        user_id: Uuid,
        related_type: RelatedType,
        related_id: Uuid,
        points: i64,
        amount: Decimal,
    ) -> Result<RedeemOutcome, ServiceError> {
        if points <= 0 {
            return Err(ServiceError::ValidationError(
                "Redeem points must be positive".to_string(),
            ));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(ServiceError::DatabaseError)?;

        let now = Utc::now();
        let result = PointsBalance::update_many()
            .col_expr(
                points_balance::Column::Balance,
                Expr::col(points_balance::Column::Balance).sub(points),
            )
            .col_expr(points_balance::Column::UpdatedAt, Expr::value(now))
            .filter(points_balance::Column::UserId.eq(user_id))
            .filter(points_balance::Column::Balance.gte(points))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            let available = match PointsBalance::find_by_id(user_id)
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?
            {
                Some(balance) => balance.balance,
                None => 0,
            };
            txn.rollback().await.map_err(ServiceError::DatabaseError)?;
            return Err(ServiceError::InsufficientPoints {
                requested: points,
                available,
            });
        }

        reward_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            related_type: Set(related_type.to_string()),
            related_id: Set(related_id),
            action: Set(RewardAction::Redeem),
            points_delta: Set(points),
            amount_delta: Set(amount),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(user_id = %user_id, points, related_id = %related_id, "Points redeemed");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::PointsRedeemed {
                user_id,
                related_type: related_type.to_string(),
                related_id,
                points,
                timestamp: now,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, user_id = %user_id, "Failed to send points redeemed event");
            }
        }

        Ok(RedeemOutcome { debited: true })
    }

    /// Number of award keys currently holding a serialisation lock. A
    /// quiescent service reports zero; the map never retains finished keys.
    pub fn award_lock_count(&self) -> usize {
        self.award_locks.len()
    }

    /// Current points balance for a user; users without a row have zero.
    pub async fn balance(&self, user_id: Uuid) -> Result<i64, ServiceError> {
        Ok(PointsBalance::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .map(|row| row.balance)
            .unwrap_or(0))
    }
}
