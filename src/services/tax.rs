use rust_decimal::Decimal;

use crate::{config::PricingConfig, entities::tax_rate};

/// Applies tax to (discounted subtotal + shipping).
///
/// With a selection, the percentages of all selected *active* rates stack by
/// summation. With no selection at all, the configured flat default applies,
/// mirroring the shipping fallback policy.
pub fn calculate_tax(
    discounted_subtotal: Decimal,
    shipping_fee: Decimal,
    selected_rates: Option<&[tax_rate::Model]>,
    pricing: &PricingConfig,
) -> Decimal {
    let total_percent = match selected_rates {
        Some(rates) => rates
            .iter()
            .filter(|r| r.is_active)
            .map(|r| r.percent)
            .sum(),
        None => pricing.default_tax_percent,
    };

    (discounted_subtotal + shipping_fee) * total_percent / Decimal::from(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rate(id: i32, percent: Decimal, active: bool) -> tax_rate::Model {
        tax_rate::Model {
            id,
            name: format!("rate-{id}"),
            percent,
            region: None,
            is_active: active,
        }
    }

    #[test]
    fn rates_stack_by_summation() {
        let rates = vec![rate(1, dec!(7.5), true), rate(2, dec!(2.5), true)];
        let tax = calculate_tax(dec!(80), dec!(20), Some(&rates), &PricingConfig::default());
        assert_eq!(tax, dec!(10.000));
    }

    #[test]
    fn inactive_rates_are_ignored() {
        let rates = vec![rate(1, dec!(7.5), true), rate(2, dec!(2.5), false)];
        let tax = calculate_tax(dec!(100), dec!(0), Some(&rates), &PricingConfig::default());
        assert_eq!(tax, dec!(7.500));
    }

    #[test]
    fn empty_selection_is_zero_tax_not_default() {
        let tax = calculate_tax(dec!(100), dec!(0), Some(&[]), &PricingConfig::default());
        assert_eq!(tax, dec!(0));
    }

    #[test]
    fn no_selection_uses_flat_default() {
        let tax = calculate_tax(dec!(73), dec!(10), None, &PricingConfig::default());
        assert_eq!(tax, dec!(8.30));
    }
}
