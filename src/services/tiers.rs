use std::sync::Arc;

use sea_orm::{EntityTrait, QueryOrder};
use tracing::instrument;

use crate::{
    db::DbPool,
    entities::member_tier::{self, Entity as MemberTier},
    errors::ServiceError,
};

/// Picks the tier whose bracket contains `points`.
///
/// `tiers` must be ordered by ascending `min_points`; the top tier carries
/// `max_points = None` and matches on the lower bound alone. Brackets cover
/// the whole axis, so the fallback to the lowest tier only fires on
/// misconfigured data.
pub fn resolve_tier(points: i64, tiers: &[member_tier::Model]) -> Option<&member_tier::Model> {
    tiers
        .iter()
        .find(|tier| {
            points >= tier.min_points
                && tier.max_points.map_or(true, |max| points <= max)
        })
        .or_else(|| tiers.first())
}

#[derive(Clone)]
pub struct TierService {
    db: Arc<DbPool>,
}

impl TierService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Loads all configured tiers ordered by ascending lower bound.
    #[instrument(skip(self))]
    pub async fn load_tiers(&self) -> Result<Vec<member_tier::Model>, ServiceError> {
        MemberTier::find()
            .order_by_asc(member_tier::Column::MinPoints)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
