use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a coupon's `value` is interpreted against the cart subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum CouponType {
    /// `value` percent off the subtotal
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// `value` off, capped at the subtotal
    #[sea_orm(string_value = "fixed")]
    Fixed,
    /// `value` points converted at the configured point value
    #[sea_orm(string_value = "points")]
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum CouponStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "disabled")]
    Disabled,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub code: String,

    pub coupon_type: CouponType,
    pub value: Decimal,
    pub min_amount: Option<Decimal>,
    pub status: CouponStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: i32,
    pub usage_limit: Option<i32>,

    /// Personal coupons carry the owning user; None means shareable.
    pub owner_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
