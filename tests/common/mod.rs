//! Shared harness for integration tests: an in-memory SQLite database with
//! the engine schema built from the entity definitions, plus seed helpers.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use commerce_engine::{
    config::EngineConfig,
    db::{self, DbConfig, DbPool},
    entities::{
        coupon::{self, CouponStatus, CouponType},
        gift_card::{self, GiftCardStatus},
        member_tier, order, order_item, points_balance, reward_transaction, shipping_rule,
        shipping_template::{self, TemplateType},
        tax_rate,
    },
    models::OrderStatus,
    Engine,
};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Index, ActiveModelTrait, ActiveValue::Set, ConnectionTrait, EntityTrait, Schema,
};
use uuid::Uuid;

/// Builds a fresh single-connection in-memory database with the full schema.
pub async fn setup_db() -> Arc<DbPool> {
    let config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&config)
        .await
        .expect("failed to open in-memory sqlite");

    let backend = pool.get_database_backend();
    let schema = Schema::new(backend);

    macro_rules! create_table {
        ($entity:expr) => {
            pool.execute(backend.build(&schema.create_table_from_entity($entity)))
                .await
                .expect("failed to create table");
        };
    }

    create_table!(member_tier::Entity);
    create_table!(coupon::Entity);
    create_table!(gift_card::Entity);
    create_table!(shipping_template::Entity);
    create_table!(shipping_rule::Entity);
    create_table!(tax_rate::Entity);
    create_table!(points_balance::Entity);
    create_table!(reward_transaction::Entity);
    create_table!(order::Entity);
    create_table!(order_item::Entity);

    // Belt-and-braces for the award idempotency guarantee; the engine's
    // keyed lock makes it exactly-once in-process, this index makes it so
    // across processes.
    let earn_index = Index::create()
        .name("ux_reward_transactions_earn_key")
        .table(reward_transaction::Entity)
        .col(reward_transaction::Column::UserId)
        .col(reward_transaction::Column::RelatedType)
        .col(reward_transaction::Column::RelatedId)
        .col(reward_transaction::Column::Action)
        .unique()
        .to_owned();
    pool.execute(backend.build(&earn_index))
        .await
        .expect("failed to create earn index");

    Arc::new(pool)
}

/// A wired engine over a fresh database, with default configuration.
pub async fn setup_engine() -> Engine {
    setup_engine_with(|_| {}).await
}

/// A wired engine with a configuration tweak applied before wiring.
pub async fn setup_engine_with(tweak: impl FnOnce(&mut EngineConfig)) -> Engine {
    let db = setup_db().await;
    let mut config = EngineConfig::new("sqlite::memory:");
    tweak(&mut config);
    let (event_sender, mut rx) = commerce_engine::events::channel(64);
    // Drain events so senders never block on a full channel.
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    Engine::new(db, config, Some(Arc::new(event_sender)))
}

pub async fn seed_tier(
    db: &DbPool,
    name: &str,
    min_points: i64,
    max_points: Option<i64>,
    discount_percent: Decimal,
) -> member_tier::Model {
    member_tier::ActiveModel {
        name: Set(name.to_string()),
        min_points: Set(min_points),
        max_points: Set(max_points),
        discount_percent: Set(discount_percent),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to seed tier")
}

/// The standard bronze/silver/gold bracket set used across tests.
pub async fn seed_standard_tiers(db: &DbPool) {
    seed_tier(db, "bronze", 0, Some(999), Decimal::ZERO).await;
    seed_tier(db, "silver", 1000, Some(4999), Decimal::from(10)).await;
    seed_tier(db, "gold", 5000, None, Decimal::from(15)).await;
}

pub struct CouponSpec {
    pub code: &'static str,
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub min_amount: Option<Decimal>,
    pub status: CouponStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: i32,
    pub usage_limit: Option<i32>,
}

impl Default for CouponSpec {
    fn default() -> Self {
        Self {
            code: "TEST",
            coupon_type: CouponType::Fixed,
            value: Decimal::from(15),
            min_amount: None,
            status: CouponStatus::Active,
            expires_at: None,
            usage_count: 0,
            usage_limit: None,
        }
    }
}

pub async fn seed_coupon(db: &DbPool, spec: CouponSpec) -> coupon::Model {
    let now = Utc::now();
    coupon::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(spec.code.to_string()),
        coupon_type: Set(spec.coupon_type),
        value: Set(spec.value),
        min_amount: Set(spec.min_amount),
        status: Set(spec.status),
        expires_at: Set(spec.expires_at),
        usage_count: Set(spec.usage_count),
        usage_limit: Set(spec.usage_limit),
        owner_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("failed to seed coupon")
}

pub async fn seed_gift_card(
    db: &DbPool,
    code: &str,
    balance: Decimal,
    owner_id: Uuid,
    status: GiftCardStatus,
) -> gift_card::Model {
    let now = Utc::now();
    gift_card::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        original_value: Set(balance),
        balance: Set(balance),
        owner_id: Set(owner_id),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("failed to seed gift card")
}

pub async fn seed_template(
    db: &DbPool,
    template_type: TemplateType,
    base_fee: Decimal,
    free_threshold: Option<Decimal>,
    rules: &[(Decimal, Decimal, Decimal)],
) -> shipping_template::Model {
    let template = shipping_template::ActiveModel {
        name: Set("standard".to_string()),
        template_type: Set(template_type),
        base_fee: Set(base_fee),
        free_threshold: Set(free_threshold),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to seed template");

    for (position, (min, max, fee)) in rules.iter().enumerate() {
        shipping_rule::ActiveModel {
            template_id: Set(template.id),
            position: Set(position as i32 + 1),
            min_value: Set(*min),
            max_value: Set(*max),
            fee: Set(*fee),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("failed to seed rule");
    }

    template
}

pub async fn seed_tax_rate(
    db: &DbPool,
    name: &str,
    percent: Decimal,
    is_active: bool,
) -> tax_rate::Model {
    tax_rate::ActiveModel {
        name: Set(name.to_string()),
        percent: Set(percent),
        region: Set(None),
        is_active: Set(is_active),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to seed tax rate")
}

pub async fn seed_order(
    db: &DbPool,
    customer_id: Uuid,
    total: Decimal,
    status: OrderStatus,
) -> order::Model {
    let now = Utc::now();
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(format!("ORD-{}", &Uuid::new_v4().to_string()[..8])),
        customer_id: Set(customer_id),
        status: Set(status.to_string()),
        subtotal: Set(total),
        discount_total: Set(Decimal::ZERO),
        shipping_total: Set(Decimal::ZERO),
        tax_total: Set(Decimal::ZERO),
        total_amount: Set(total),
        currency: Set("USD".to_string()),
        tracking_provider: Set(None),
        tracking_number: Set(None),
        paid_at: Set(None),
        shipped_at: Set(None),
        completed_at: Set(None),
        cancelled_at: Set(None),
        created_at: Set(now),
        updated_at: Set(Some(now)),
        version: Set(1),
    }
    .insert(db)
    .await
    .expect("failed to seed order")
}

/// All reward transactions for a user, oldest first.
pub async fn reward_rows(db: &DbPool, user_id: Uuid) -> Vec<reward_transaction::Model> {
    use sea_orm::{ColumnTrait, QueryFilter, QueryOrder};
    reward_transaction::Entity::find()
        .filter(reward_transaction::Column::UserId.eq(user_id))
        .order_by_asc(reward_transaction::Column::CreatedAt)
        .all(db)
        .await
        .expect("failed to load reward rows")
}

pub fn cart_line(price: Decimal, quantity: i32) -> commerce_engine::models::CartLine {
    commerce_engine::models::CartLine {
        product_id: Uuid::new_v4(),
        sku: format!("SKU-{}", &Uuid::new_v4().to_string()[..8]),
        unit_price: price,
        quantity,
        weight: None,
        volume: None,
    }
}
