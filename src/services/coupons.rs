use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::coupon::{self, CouponStatus, Entity as Coupon},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CouponService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Looks up a coupon by code and checks every redeemability gate,
    /// returning the specific rejection so checkout can display it.
    /// The min-amount rule is not checked here: a coupon below its minimum
    /// simply contributes no discount.
    #[instrument(skip(self))]
    pub async fn find_redeemable(&self, code: &str) -> Result<coupon::Model, ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Coupon code must not be empty".to_string(),
            ));
        }

        let coupon = Coupon::find()
            .filter(coupon::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon '{}' not found", code)))?;

        if coupon.status != CouponStatus::Active {
            return Err(ServiceError::StateConflict(format!(
                "Coupon '{}' is not active",
                code
            )));
        }

        let now = Utc::now();
        if let Some(expiry) = coupon.expires_at {
            if expiry <= now {
                return Err(ServiceError::StateConflict(format!(
                    "Coupon '{}' expired at {}",
                    code, expiry
                )));
            }
        }

        if let Some(limit) = coupon.usage_limit {
            if coupon.usage_count >= limit {
                return Err(ServiceError::StateConflict(format!(
                    "Coupon '{}' has reached its usage limit",
                    code
                )));
            }
        }

        Ok(coupon)
    }

    /// Consumes one use of the coupon.
    ///
    /// The increment is a single conditional UPDATE guarded by the usage
    /// limit, so two concurrent redemptions of the last remaining use cannot
    /// both succeed: the loser sees zero affected rows and gets a conflict.
    #[instrument(skip(self), fields(coupon_id = %coupon_id))]
    pub async fn redeem_usage(
        &self,
        coupon_id: Uuid,
        order_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let result = Coupon::update_many()
            .col_expr(
                coupon::Column::UsageCount,
                Expr::col(coupon::Column::UsageCount).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(coupon::Column::Status.eq(CouponStatus::Active))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.is_null())
                    .add(
                        Expr::col(coupon::Column::UsageCount)
                            .lt(Expr::col(coupon::Column::UsageLimit)),
                    ),
            )
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::StateConflict(format!(
                "Coupon {} is exhausted or no longer active",
                coupon_id
            )));
        }

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::CouponRedeemed { coupon_id, order_id })
                .await
            {
                warn!(error = %e, coupon_id = %coupon_id, "Failed to send coupon redeemed event");
            }
        }

        Ok(())
    }
}
