use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    config::{LoyaltyConfig, PricingConfig},
    db::DbPool,
    entities::{
        coupon, member_tier, shipping_rule,
        shipping_template::{self, Entity as ShippingTemplate},
        tax_rate::{self, Entity as TaxRate},
    },
    errors::ServiceError,
    models::CartLine,
    services::{
        coupons::CouponService,
        discounts::{stack_discounts, PointsRedemption},
        shipping, tax,
        tiers::{resolve_tier, TierService},
    },
};

/// Everything checkout needs to price a cart. Read-only: pricing a cart
/// mutates nothing, so storefronts call this on every cart change for a
/// live preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    pub lines: Vec<CartLine>,

    /// The customer's current points balance; drives both tier resolution
    /// and the redemption availability limit.
    pub customer_points_balance: i64,

    pub coupon_code: Option<String>,

    /// Points the customer asked to redeem against this cart.
    pub redeem_points: Option<i64>,

    pub shipping_template_id: Option<i32>,

    /// Selected tax rates; `None` applies the flat default policy.
    pub tax_rate_ids: Option<Vec<i32>>,

    /// Carried through to the breakdown as a label only.
    pub currency: String,
}

/// Full audit breakdown of one pricing run. Every intermediate value is
/// kept so receipts can show how the total was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub subtotal: Decimal,
    pub tier_name: Option<String>,
    pub member_discount: Decimal,
    pub coupon_discount: Decimal,
    pub points_discount: Decimal,
    pub discounted_subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
}

/// Resolved collaborator state for one pure pricing run.
#[derive(Debug, Default)]
pub struct ResolvedPricingContext<'a> {
    pub tier: Option<&'a member_tier::Model>,
    pub coupon: Option<&'a coupon::Model>,
    pub redemption: Option<PointsRedemption>,
    pub template: Option<(&'a shipping_template::Model, &'a [shipping_rule::Model])>,
    pub tax_rates: Option<&'a [tax_rate::Model]>,
}

/// Deterministic pricing composition over already-resolved state:
/// subtotal → discount stack → shipping → tax → total.
pub fn price_cart(
    lines: &[CartLine],
    ctx: &ResolvedPricingContext<'_>,
    currency: &str,
    loyalty: &LoyaltyConfig,
    pricing: &PricingConfig,
) -> PricingBreakdown {
    let subtotal: Decimal = lines.iter().map(CartLine::line_total).sum();

    let discounts = stack_discounts(subtotal, ctx.tier, ctx.coupon, ctx.redemption, loyalty);

    let shipping_fee = match ctx.template {
        Some((template, rules)) => {
            shipping::template_fee(template, rules, lines, discounts.discounted_subtotal)
        }
        None => shipping::default_fee(discounts.discounted_subtotal, pricing),
    };

    let tax = tax::calculate_tax(
        discounts.discounted_subtotal,
        shipping_fee,
        ctx.tax_rates,
        pricing,
    );

    let total = discounts.discounted_subtotal + shipping_fee + tax;

    PricingBreakdown {
        subtotal,
        tier_name: ctx.tier.map(|t| t.name.clone()),
        member_discount: discounts.member_discount,
        coupon_discount: discounts.coupon_discount,
        points_discount: discounts.points_discount,
        discounted_subtotal: discounts.discounted_subtotal,
        shipping_fee,
        tax,
        total,
        currency: currency.to_string(),
    }
}

/// Orchestrates tier lookup, coupon validation, template and tax-rate
/// resolution, then delegates to the pure composition.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DbPool>,
    tiers: TierService,
    coupons: CouponService,
    loyalty: LoyaltyConfig,
    pricing: PricingConfig,
}

impl PricingService {
    pub fn new(
        db: Arc<DbPool>,
        tiers: TierService,
        coupons: CouponService,
        loyalty: LoyaltyConfig,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            db,
            tiers,
            coupons,
            loyalty,
            pricing,
        }
    }

    /// Prices a cart and returns the full breakdown.
    ///
    /// Business rejections (unknown coupon, expired coupon, unknown
    /// template) come back as typed errors carrying the specific reason.
    #[instrument(skip(self, request), fields(line_count = request.lines.len()))]
    pub async fn compute_pricing(
        &self,
        request: &PricingRequest,
    ) -> Result<PricingBreakdown, ServiceError> {
        if request.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cart has no items".to_string(),
            ));
        }
        for line in &request.lines {
            line.check().map_err(ServiceError::ValidationError)?;
        }

        let tiers = self.tiers.load_tiers().await?;
        let tier = resolve_tier(request.customer_points_balance, &tiers);

        let coupon = match &request.coupon_code {
            Some(code) => Some(self.coupons.find_redeemable(code).await?),
            None => None,
        };

        let redemption = request.redeem_points.map(|points| PointsRedemption {
            requested_points: points,
            available_points: request.customer_points_balance,
        });

        let template = match request.shipping_template_id {
            Some(template_id) => {
                let template = ShippingTemplate::find_by_id(template_id)
                    .one(&*self.db)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Shipping template {} not found",
                            template_id
                        ))
                    })?;
                let rules = shipping_rule::Entity::find()
                    .filter(shipping_rule::Column::TemplateId.eq(template_id))
                    .order_by_asc(shipping_rule::Column::Position)
                    .all(&*self.db)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                Some((template, rules))
            }
            None => None,
        };

        let tax_rates = match request.tax_rate_ids.as_deref() {
            // An empty selection means "no selection": fall through to the
            // default flat policy rather than zero tax.
            None | Some([]) => None,
            Some(ids) => {
                let rates = TaxRate::find()
                    .filter(tax_rate::Column::Id.is_in(ids.iter().copied()))
                    .all(&*self.db)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                // A selection naming unknown rates must not silently price
                // the cart with less tax than intended.
                let unique: HashSet<i32> = ids.iter().copied().collect();
                if rates.len() != unique.len() {
                    return Err(ServiceError::NotFound(
                        "One or more selected tax rates do not exist".to_string(),
                    ));
                }
                Some(rates)
            }
        };

        let ctx = ResolvedPricingContext {
            tier,
            coupon: coupon.as_ref(),
            redemption,
            template: template
                .as_ref()
                .map(|(t, rules)| (t, rules.as_slice())),
            tax_rates: tax_rates.as_deref(),
        };

        Ok(price_cart(
            &request.lines,
            &ctx,
            &request.currency,
            &self.loyalty,
            &self.pricing,
        ))
    }
}
