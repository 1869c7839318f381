use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RewardAction {
    #[sea_orm(string_value = "earn")]
    Earn,
    #[sea_orm(string_value = "redeem")]
    Redeem,
}

/// Append-only loyalty ledger. For `earn` rows, `(user_id, related_type,
/// related_id)` is the idempotency key: at most one earn row may exist per
/// key, which is what makes order-completion awards retry-safe. Deployments
/// should back this with a composite unique index.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reward_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    /// Entity kind the transaction relates to ("order", "gift_card", ...)
    pub related_type: String,

    pub related_id: Uuid,
    pub action: RewardAction,

    /// Points credited (positive for earn) or debited (positive for redeem)
    pub points_delta: i64,

    /// Monetary context of the transaction (order total, redeemed amount)
    pub amount_delta: Decimal,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Signed points movement (positive earn, negative redeem).
    pub fn signed_points(&self) -> i64 {
        match self.action {
            RewardAction::Earn => self.points_delta,
            RewardAction::Redeem => -self.points_delta,
        }
    }
}
