pub mod coupon;
pub mod gift_card;
pub mod member_tier;
pub mod order;
pub mod order_item;
pub mod points_balance;
pub mod reward_transaction;
pub mod shipping_rule;
pub mod shipping_template;
pub mod tax_rate;
