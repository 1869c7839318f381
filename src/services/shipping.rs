use rust_decimal::Decimal;

use crate::{
    config::PricingConfig,
    entities::shipping_rule,
    entities::shipping_template::{self, TemplateType},
    models::CartLine,
};

/// Flat fallback policy when the shopper selected no shipping template:
/// free at/above the configured threshold, a flat fee below it. The
/// threshold compares against the *discounted* subtotal.
pub fn default_fee(discounted_subtotal: Decimal, pricing: &PricingConfig) -> Decimal {
    if discounted_subtotal >= pricing.free_shipping_threshold {
        Decimal::ZERO
    } else {
        pricing.default_shipping_fee
    }
}

/// Reduces the cart to the single scalar a template matches its rules on.
pub fn cart_scalar(
    template_type: TemplateType,
    lines: &[CartLine],
    discounted_subtotal: Decimal,
) -> Decimal {
    match template_type {
        TemplateType::Weight => lines
            .iter()
            .map(|l| l.weight.unwrap_or(Decimal::ZERO) * Decimal::from(l.quantity))
            .sum(),
        TemplateType::Volume => lines
            .iter()
            .map(|l| l.volume.unwrap_or(Decimal::ZERO) * Decimal::from(l.quantity))
            .sum(),
        TemplateType::Quantity => lines.iter().map(|l| Decimal::from(l.quantity)).sum(),
        TemplateType::Amount => discounted_subtotal,
        TemplateType::Items => Decimal::from(lines.len() as i64),
    }
}

/// Computes the fee for a selected template.
///
/// The free-shipping threshold short-circuits before any rule is examined.
/// Rules are scanned in stored order and the first containing range wins;
/// overlapping ranges are legal and admins order them by priority, so this
/// must never be changed to a best-match scan. `base_fee` applies when no
/// rule matches.
pub fn template_fee(
    template: &shipping_template::Model,
    rules: &[shipping_rule::Model],
    lines: &[CartLine],
    discounted_subtotal: Decimal,
) -> Decimal {
    if let Some(threshold) = template.free_threshold {
        if discounted_subtotal >= threshold {
            return Decimal::ZERO;
        }
    }

    let value = cart_scalar(template.template_type, lines, discounted_subtotal);

    rules
        .iter()
        .find(|rule| rule.min_value <= value && value <= rule.max_value)
        .map(|rule| rule.fee)
        .unwrap_or(template.base_fee)
}
