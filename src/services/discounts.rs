use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    config::LoyaltyConfig,
    entities::coupon::{self, CouponType},
    entities::member_tier,
};

/// A shopper's request to pay part of the cart with points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointsRedemption {
    pub requested_points: i64,
    pub available_points: i64,
}

/// Per-source discount amounts against one subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountBreakdown {
    pub member_discount: Decimal,
    pub coupon_discount: Decimal,
    pub points_discount: Decimal,
    pub discounted_subtotal: Decimal,
}

/// Stacks member, coupon, and points discounts against `subtotal`.
///
/// The three sources are additive on the *original* subtotal, never
/// compounded, and the evaluation order is fixed. Individual discounts may
/// together exceed the subtotal; the only guard is the final floor at zero,
/// so none of the intermediate amounts can be assumed to fit under it.
pub fn stack_discounts(
    subtotal: Decimal,
    tier: Option<&member_tier::Model>,
    coupon: Option<&coupon::Model>,
    redemption: Option<PointsRedemption>,
    loyalty: &LoyaltyConfig,
) -> DiscountBreakdown {
    let member_discount = match tier {
        Some(tier) => subtotal * tier.discount_percent / Decimal::from(100),
        None => Decimal::ZERO,
    };

    let coupon_discount = coupon
        .map(|coupon| coupon_discount(subtotal, coupon, loyalty))
        .unwrap_or(Decimal::ZERO);

    let points_discount = redemption
        .map(|redemption| points_discount(subtotal, redemption, loyalty))
        .unwrap_or(Decimal::ZERO);

    let discounted_subtotal =
        (subtotal - member_discount - coupon_discount - points_discount).max(Decimal::ZERO);

    DiscountBreakdown {
        member_discount,
        coupon_discount,
        points_discount,
        discounted_subtotal,
    }
}

fn coupon_discount(subtotal: Decimal, coupon: &coupon::Model, loyalty: &LoyaltyConfig) -> Decimal {
    if let Some(min_amount) = coupon.min_amount {
        if subtotal < min_amount {
            return Decimal::ZERO;
        }
    }

    match coupon.coupon_type {
        CouponType::Percentage => subtotal * coupon.value / Decimal::from(100),
        CouponType::Fixed => coupon.value.min(subtotal),
        CouponType::Points => (coupon.value * loyalty.point_value).min(subtotal),
    }
}

fn points_discount(
    subtotal: Decimal,
    redemption: PointsRedemption,
    loyalty: &LoyaltyConfig,
) -> Decimal {
    if redemption.requested_points <= 0 {
        return Decimal::ZERO;
    }

    let requested = Decimal::from(redemption.requested_points) * loyalty.point_value;
    let available = Decimal::from(redemption.available_points.max(0)) * loyalty.point_value;
    // Absolute cap: a redemption never covers more than the configured share
    // of the subtotal, regardless of the other two limits.
    let cap = subtotal * loyalty.redemption_cap_ratio;

    requested.min(available).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::entities::coupon::CouponStatus;

    fn tier(pct: Decimal) -> member_tier::Model {
        member_tier::Model {
            id: 1,
            name: "silver".to_string(),
            min_points: 1000,
            max_points: Some(4999),
            discount_percent: pct,
        }
    }

    fn coupon(coupon_type: CouponType, value: Decimal, min_amount: Option<Decimal>) -> coupon::Model {
        coupon::Model {
            id: Uuid::new_v4(),
            code: "TEST".to_string(),
            coupon_type,
            value,
            min_amount,
            status: CouponStatus::Active,
            expires_at: None,
            usage_count: 0,
            usage_limit: None,
            owner_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn member_discount_is_percent_of_subtotal() {
        let result = stack_discounts(
            dec!(200),
            Some(&tier(dec!(10))),
            None,
            None,
            &LoyaltyConfig::default(),
        );
        assert_eq!(result.member_discount, dec!(20));
        assert_eq!(result.discounted_subtotal, dec!(180));
    }

    #[test]
    fn coupon_below_min_amount_contributes_nothing() {
        let coupon = coupon(CouponType::Fixed, dec!(15), Some(dec!(50)));
        let result = stack_discounts(dec!(40), None, Some(&coupon), None, &LoyaltyConfig::default());
        assert_eq!(result.coupon_discount, dec!(0));
        assert_eq!(result.discounted_subtotal, dec!(40));
    }

    #[test]
    fn fixed_coupon_is_capped_at_subtotal() {
        let coupon = coupon(CouponType::Fixed, dec!(80), None);
        let result = stack_discounts(dec!(60), None, Some(&coupon), None, &LoyaltyConfig::default());
        assert_eq!(result.coupon_discount, dec!(60));
    }

    #[test]
    fn points_coupon_converts_at_point_value() {
        // 500-point coupon at $0.01/point -> $5
        let coupon = coupon(CouponType::Points, dec!(500), None);
        let result = stack_discounts(dec!(60), None, Some(&coupon), None, &LoyaltyConfig::default());
        assert_eq!(result.coupon_discount, dec!(5.00));
    }

    #[test]
    fn redemption_caps_at_half_subtotal() {
        let redemption = PointsRedemption {
            requested_points: 20_000,
            available_points: 20_000,
        };
        let result =
            stack_discounts(dec!(100), None, None, Some(redemption), &LoyaltyConfig::default());
        // 20,000 points would be worth $200; the cap limits it to $50.
        assert_eq!(result.points_discount, dec!(50.0));
    }

    #[test]
    fn redemption_limited_by_available_balance() {
        let redemption = PointsRedemption {
            requested_points: 5_000,
            available_points: 1_000,
        };
        let result =
            stack_discounts(dec!(100), None, None, Some(redemption), &LoyaltyConfig::default());
        assert_eq!(result.points_discount, dec!(10.00));
    }

    #[test]
    fn discounts_are_additive_not_compounded() {
        // 10% member + 10% coupon on 100 must be 20 off, not 19.
        let coupon = coupon(CouponType::Percentage, dec!(10), None);
        let result = stack_discounts(
            dec!(100),
            Some(&tier(dec!(10))),
            Some(&coupon),
            None,
            &LoyaltyConfig::default(),
        );
        assert_eq!(result.member_discount + result.coupon_discount, dec!(20));
        assert_eq!(result.discounted_subtotal, dec!(80));
    }

    #[test]
    fn total_never_goes_negative() {
        let coupon = coupon(CouponType::Fixed, dec!(90), None);
        let redemption = PointsRedemption {
            requested_points: 10_000,
            available_points: 10_000,
        };
        let result = stack_discounts(
            dec!(100),
            Some(&tier(dec!(50))),
            Some(&coupon),
            Some(redemption),
            &LoyaltyConfig::default(),
        );
        // 50 + 90 + 50 = 190 of discounts against a 100 subtotal
        assert_eq!(result.discounted_subtotal, dec!(0));
    }

    #[test]
    fn worked_scenario_silver_fixed_coupon_and_points() {
        // subtotal 120, silver 10%, fixed $15 coupon (min $50),
        // 2000 points requested at $0.01 with 2000 available
        let coupon = coupon(CouponType::Fixed, dec!(15), Some(dec!(50)));
        let redemption = PointsRedemption {
            requested_points: 2000,
            available_points: 2000,
        };
        let result = stack_discounts(
            dec!(120),
            Some(&tier(dec!(10))),
            Some(&coupon),
            Some(redemption),
            &LoyaltyConfig::default(),
        );
        assert_eq!(result.member_discount, dec!(12.0));
        assert_eq!(result.coupon_discount, dec!(15));
        assert_eq!(result.points_discount, dec!(20.00));
        assert_eq!(result.discounted_subtotal, dec!(73.00));
    }
}
