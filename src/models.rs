use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Order statuses recognised by the lifecycle engine.
///
/// Transitions between any two distinct statuses are permitted: admin
/// workflows rely on manual overrides such as jumping pending → completed,
/// so no transition graph is enforced here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }
}

/// Entity kinds a reward transaction can reference. Stored as strings so the
/// ledger schema stays open to new flows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelatedType {
    Order,
    GiftCard,
    Referral,
    CheckIn,
}

/// One cart line as submitted by the storefront. Input-only: order placement
/// copies these into immutable order item rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CartLine {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,
    pub unit_price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub weight: Option<Decimal>,
    pub volume: Option<Decimal>,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Field-level checks beyond the derive: negative prices are rejected.
    pub fn check(&self) -> Result<(), String> {
        if self.quantity < 1 {
            return Err(format!("Quantity must be at least 1 for SKU {}", self.sku));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(format!("Unit price must not be negative for SKU {}", self.sku));
        }
        Ok(())
    }
}
