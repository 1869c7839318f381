//! Order Pricing & Lifecycle Engine
//!
//! The computed core of an e-commerce backend: the cart pricing pipeline
//! (member tiers, coupon stacking, points redemption, shipping rules, tax)
//! and the order status machine with its idempotent loyalty ledger. HTTP
//! routing, auth, and schema ownership live in the embedding application;
//! this crate only needs an injected database connection.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    coupons::CouponService, gift_cards::GiftCardService, loyalty::LoyaltyService,
    order_lifecycle::OrderLifecycleService, orders::OrderService, pricing::PricingService,
    tiers::TierService,
};

/// The fully wired engine. Construction is explicit dependency injection:
/// the embedding process builds one `Engine` at startup and hands services
/// to its handlers; there are no process-wide singletons.
#[derive(Clone)]
pub struct Engine {
    pub db: Arc<DbPool>,
    pub config: EngineConfig,
    pub tiers: TierService,
    pub coupons: CouponService,
    pub gift_cards: GiftCardService,
    pub pricing: PricingService,
    pub orders: OrderService,
    pub lifecycle: OrderLifecycleService,
    pub loyalty: LoyaltyService,
}

impl Engine {
    pub fn new(
        db: Arc<DbPool>,
        config: EngineConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let tiers = TierService::new(db.clone());
        let coupons = CouponService::new(db.clone(), event_sender.clone());
        let loyalty = LoyaltyService::new(db.clone(), event_sender.clone());
        let gift_cards = GiftCardService::new(
            db.clone(),
            loyalty.clone(),
            config.loyalty.clone(),
            event_sender.clone(),
        );
        let pricing = PricingService::new(
            db.clone(),
            tiers.clone(),
            coupons.clone(),
            config.loyalty.clone(),
            config.pricing.clone(),
        );
        let orders = OrderService::new(db.clone(), event_sender.clone());
        let lifecycle = OrderLifecycleService::new(
            db.clone(),
            loyalty.clone(),
            config.loyalty.clone(),
            event_sender,
        );

        Self {
            db,
            config,
            tiers,
            coupons,
            gift_cards,
            pricing,
            orders,
            lifecycle,
            loyalty,
        }
    }
}
