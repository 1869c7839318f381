// Pure pricing calculators
pub mod discounts;
pub mod shipping;
pub mod tax;
pub mod tiers;

// Pipeline orchestration
pub mod pricing;

// Redemption instruments
pub mod coupons;
pub mod gift_cards;

// Order lifecycle
pub mod order_lifecycle;
pub mod orders;

// Loyalty ledger
pub mod loyalty;
