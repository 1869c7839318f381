//! Coupon usage-limit and gift-card balance tests, including the conditional
//! update guards under concurrent redemption.

mod common;

use assert_matches::assert_matches;
use commerce_engine::{
    entities::coupon::{self, CouponStatus},
    entities::gift_card::GiftCardStatus,
    errors::ServiceError,
    models::RelatedType,
};
use common::{reward_rows, seed_coupon, seed_gift_card, setup_engine, CouponSpec};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

#[tokio::test]
async fn redeem_usage_increments_up_to_the_limit() {
    let engine = setup_engine().await;
    let seeded = seed_coupon(
        &engine.db,
        CouponSpec {
            code: "TWICE",
            usage_limit: Some(2),
            ..Default::default()
        },
    )
    .await;

    engine.coupons.redeem_usage(seeded.id, None).await.unwrap();
    engine.coupons.redeem_usage(seeded.id, None).await.unwrap();
    let err = engine.coupons.redeem_usage(seeded.id, None).await.unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));

    let row = coupon::Entity::find_by_id(seeded.id)
        .one(&*engine.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.usage_count, 2);
}

#[tokio::test]
async fn concurrent_redemptions_of_last_use_cannot_both_succeed() {
    let engine = setup_engine().await;
    let seeded = seed_coupon(
        &engine.db,
        CouponSpec {
            code: "LAST",
            usage_count: 4,
            usage_limit: Some(5),
            ..Default::default()
        },
    )
    .await;

    let coupons_a = engine.coupons.clone();
    let coupons_b = engine.coupons.clone();
    let (a, b) = tokio::join!(
        coupons_a.redeem_usage(seeded.id, None),
        coupons_b.redeem_usage(seeded.id, None),
    );

    assert_eq!(
        [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one redemption wins the last use"
    );

    let row = coupon::Entity::find_by_id(seeded.id)
        .one(&*engine.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.usage_count, 5, "usage never exceeds the limit");
}

#[tokio::test]
async fn unlimited_coupons_never_exhaust() {
    let engine = setup_engine().await;
    let seeded = seed_coupon(
        &engine.db,
        CouponSpec {
            code: "FOREVER",
            usage_limit: None,
            ..Default::default()
        },
    )
    .await;

    for _ in 0..10 {
        engine.coupons.redeem_usage(seeded.id, None).await.unwrap();
    }

    let row = coupon::Entity::find_by_id(seeded.id)
        .one(&*engine.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.usage_count, 10);
}

#[tokio::test]
async fn disabled_coupon_cannot_be_consumed() {
    let engine = setup_engine().await;
    let seeded = seed_coupon(
        &engine.db,
        CouponSpec {
            code: "OFF",
            status: CouponStatus::Disabled,
            ..Default::default()
        },
    )
    .await;

    let err = engine.coupons.redeem_usage(seeded.id, None).await.unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
}

#[tokio::test]
async fn gift_card_apply_decrements_and_drains_to_used() {
    let engine = setup_engine().await;
    let owner = Uuid::new_v4();
    let card = seed_gift_card(&engine.db, "GC-100", dec!(100), owner, GiftCardStatus::Active).await;

    let after_first = engine.gift_cards.apply(&card.code, dec!(60)).await.unwrap();
    assert_eq!(after_first.balance, dec!(40));
    assert_eq!(after_first.status, GiftCardStatus::Active);

    let after_second = engine.gift_cards.apply(&card.code, dec!(40)).await.unwrap();
    assert_eq!(after_second.balance, dec!(0));
    assert_eq!(after_second.status, GiftCardStatus::Used);

    let err = engine.gift_cards.apply(&card.code, dec!(1)).await.unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
}

#[tokio::test]
async fn gift_card_apply_rejects_overdraw_without_mutation() {
    let engine = setup_engine().await;
    let owner = Uuid::new_v4();
    let card = seed_gift_card(&engine.db, "GC-20", dec!(20), owner, GiftCardStatus::Active).await;

    let err = engine.gift_cards.apply(&card.code, dec!(20.01)).await.unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));

    let unchanged = engine.gift_cards.apply(&card.code, dec!(20)).await.unwrap();
    assert_eq!(unchanged.balance, dec!(0));
}

#[tokio::test]
async fn gift_card_redeems_into_points_once() {
    let engine = setup_engine().await;
    let owner = Uuid::new_v4();
    let card = seed_gift_card(&engine.db, "GC-P", dec!(25.50), owner, GiftCardStatus::Active).await;

    let outcome = engine
        .gift_cards
        .redeem_to_points(&card.code, owner)
        .await
        .unwrap();
    assert!(outcome.credited);
    // floor(25.50 / 0.01) points
    assert_eq!(engine.loyalty.balance(owner).await.unwrap(), 2550);

    let rows = reward_rows(&engine.db, owner).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].related_type, RelatedType::GiftCard.to_string());

    // The card is drained; a retry has nothing left to redeem.
    let err = engine
        .gift_cards
        .redeem_to_points(&card.code, owner)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
}

#[tokio::test]
async fn gift_card_of_another_user_cannot_be_redeemed() {
    let engine = setup_engine().await;
    let owner = Uuid::new_v4();
    let card = seed_gift_card(&engine.db, "GC-X", dec!(10), owner, GiftCardStatus::Active).await;

    let err = engine
        .gift_cards
        .redeem_to_points(&card.code, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
}
