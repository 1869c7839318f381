use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    config::LoyaltyConfig,
    db::DbPool,
    entities::gift_card::{self, Entity as GiftCard, GiftCardStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    models::RelatedType,
    services::loyalty::{AwardOutcome, LoyaltyService},
};

#[derive(Clone)]
pub struct GiftCardService {
    db: Arc<DbPool>,
    loyalty: LoyaltyService,
    loyalty_config: LoyaltyConfig,
    event_sender: Option<Arc<EventSender>>,
}

impl GiftCardService {
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

    async fn find_by_code(&self, code: &str) -> Result<gift_card::Model, ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Gift card code must not be empty".to_string(),
            ));
        }

        GiftCard::find()
            .filter(gift_card::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Gift card '{}' not found", code)))
    }

    /// Spends `amount` from the card's balance.
    ///
    /// The decrement is a conditional UPDATE guarded by `balance >= amount`
    /// and active status, so concurrent applications of the last few units
    /// cannot both succeed and the balance can never go negative. A drained
    /// card flips to `used`.
    #[instrument(skip(self))]
    pub async fn apply(&self, code: &str, amount: Decimal) -> Result<gift_card::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Applied amount must be positive".to_string(),
            ));
        }

        let card = self.find_by_code(code).await?;
        if card.status != GiftCardStatus::Active {
            return Err(ServiceError::StateConflict(format!(
                "Gift card '{}' is {}",
                card.code,
                match card.status {
                    GiftCardStatus::Used => "already used",
                    GiftCardStatus::Expired => "expired",
                    GiftCardStatus::Active => unreachable!(),
                }
            )));
        }

        let result = GiftCard::update_many()
            .col_expr(
                gift_card::Column::Balance,
                Expr::col(gift_card::Column::Balance).sub(amount),
            )
            .col_expr(gift_card::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(gift_card::Column::Id.eq(card.id))
            .filter(gift_card::Column::Status.eq(GiftCardStatus::Active))
            .filter(gift_card::Column::Balance.gte(amount))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::StateConflict(format!(
                "Gift card '{}' has insufficient balance for {}",
                card.code, amount
            )));
        }

        let updated = GiftCard::find_by_id(card.id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Gift card {} not found", card.id)))?;

        let updated = if updated.balance == Decimal::ZERO {
            let mut active: gift_card::ActiveModel = updated.into();
            active.status = sea_orm::ActiveValue::Set(GiftCardStatus::Used);
            active.updated_at = sea_orm::ActiveValue::Set(Utc::now());
            sea_orm::ActiveModelTrait::update(active, &*self.db)
                .await
                .map_err(ServiceError::DatabaseError)?
        } else {
            updated
        };

        if let Some(event_sender) = &self.event_sender {
            let event = Event::GiftCardApplied {
                gift_card_id: updated.id,
                amount,
                remaining_balance: updated.balance,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, gift_card_id = %updated.id, "Failed to send gift card event");
            }
        }

        Ok(updated)
    }

    /// Converts a card's remaining balance into loyalty points for its owner.
    ///
    /// Draining the balance uses an optimistic guard on the previously seen
    /// balance; the follow-up credit goes through the ledger and is therefore
    /// idempotent per card even if this call is retried.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn redeem_to_points(
        &self,
        code: &str,
        user_id: Uuid,
    ) -> Result<AwardOutcome, ServiceError> {
        let card = self.find_by_code(code).await?;

        if card.owner_id != user_id {
            return Err(ServiceError::StateConflict(format!(
                "Gift card '{}' belongs to another user",
                card.code
            )));
        }
        if card.status != GiftCardStatus::Active || card.balance <= Decimal::ZERO {
            return Err(ServiceError::StateConflict(format!(
                "Gift card '{}' has no redeemable balance",
                card.code
            )));
        }

        let points = (card.balance / self.loyalty_config.point_value)
            .floor()
            .to_i64()
            .unwrap_or(0);
        if points <= 0 {
            return Err(ServiceError::StateConflict(format!(
                "Gift card '{}' balance is below one point",
                card.code
            )));
        }

        let result = GiftCard::update_many()
            .col_expr(gift_card::Column::Balance, Expr::value(Decimal::ZERO))
            .col_expr(gift_card::Column::Status, Expr::value(GiftCardStatus::Used))
            .col_expr(gift_card::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(gift_card::Column::Id.eq(card.id))
            .filter(gift_card::Column::Status.eq(GiftCardStatus::Active))
            .filter(gift_card::Column::Balance.eq(card.balance))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(card.id));
        }

        self.loyalty
            .award(user_id, RelatedType::GiftCard, card.id, points, card.balance)
            .await
    }
}
