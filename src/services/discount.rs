//! Budget-level discount guard against the aggregate minimum-price floor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::metrics;
use crate::models::Discount;
use crate::money::Money;

/// The pricing facts of one line that the guard needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscountLine {
    pub quantity: i32,
    pub unit_price: Money,
    pub minimum_price: Money,
    pub base_price_with_margin: Money,
    #[serde(default)]
    pub customization_per_unit: Money,
    /// Line total after item-level discount.
    pub total_price: Money,
}

impl DiscountLine {
    /// Lowest unit price this line may be sold at without authorization.
    pub fn floor_unit_price(&self) -> Money {
        Ord::max(
            self.minimum_price,
            self.base_price_with_margin + self.customization_per_unit,
        )
    }

    pub fn minimum_total(&self) -> Money {
        self.floor_unit_price()
            .multiply_by_scalar(Decimal::from(self.quantity))
    }

    pub fn is_below_minimum(&self) -> bool {
        self.minimum_price.is_positive() && self.unit_price < self.minimum_price
    }

    fn is_at_or_below_minimum(&self) -> bool {
        self.minimum_price.is_positive() && self.unit_price <= self.minimum_price
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BelowMinimumItem {
    pub index: usize,
    pub unit_price: Money,
    pub minimum_price: Money,
    pub shortfall: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscountEvaluation {
    pub items_subtotal: Money,
    pub minimum_total: Money,
    pub requested_discount: Money,
    /// True when every line already sits at or below its own floor.
    pub discount_disabled: bool,
    pub discounted_total: Money,
    /// Allowed total: the discounted total, clamped to the floor unless authorized.
    pub total: Money,
    /// Effective reduction from the subtotal, never negative.
    pub discount_amount: Money,
    pub requires_approval: bool,
    pub clamped: bool,
    /// Gap between the discounted total and the floor, zero when none.
    pub shortfall: Money,
    pub below_minimum_items: Vec<BelowMinimumItem>,
}

/// Evaluates `discount` over `items`. `authorized` records an administrator's
/// override, which lifts the clamp but still reports the approval requirement.
pub fn evaluate_budget_discount(
    items: &[DiscountLine],
    discount: Discount,
    authorized: bool,
) -> Result<DiscountEvaluation, ServiceError> {
    discount.validate_bounds()?;

    let items_subtotal = Money::sum(items.iter().map(|i| i.total_price)).rounded();
    let minimum_total = Money::sum(items.iter().map(DiscountLine::minimum_total)).rounded();

    let below_minimum_items: Vec<BelowMinimumItem> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.is_below_minimum())
        .map(|(index, item)| BelowMinimumItem {
            index,
            unit_price: item.unit_price,
            minimum_price: item.minimum_price,
            shortfall: item.minimum_price - item.unit_price,
        })
        .collect();

    let discount_disabled = !items.is_empty() && items.iter().all(|i| i.is_at_or_below_minimum());
    let requested_discount = discount.amount_for(items_subtotal).rounded();
    let applied_discount = if discount_disabled {
        Money::ZERO
    } else {
        requested_discount
    };

    let discounted_total = (items_subtotal - applied_discount).non_negative();
    let under_floor = discounted_total < minimum_total;
    let requires_approval = under_floor || !below_minimum_items.is_empty();
    let clamped = under_floor && !authorized;
    let total = if clamped {
        metrics::DISCOUNT_CLAMPS.inc();
        minimum_total
    } else {
        discounted_total
    };

    Ok(DiscountEvaluation {
        items_subtotal,
        minimum_total,
        requested_discount,
        discount_disabled,
        discounted_total,
        total,
        discount_amount: (items_subtotal - total).non_negative(),
        requires_approval,
        clamped,
        shortfall: (minimum_total - discounted_total).non_negative(),
        below_minimum_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, unit: Decimal, minimum: Decimal) -> DiscountLine {
        let unit_price = Money::new(unit);
        DiscountLine {
            quantity,
            unit_price,
            minimum_price: Money::new(minimum),
            base_price_with_margin: Money::new(minimum),
            customization_per_unit: Money::ZERO,
            total_price: unit_price.multiply_by_scalar(Decimal::from(quantity)),
        }
    }

    #[test]
    fn small_discount_passes_untouched() {
        let items = [line(2, dec!(142.86), dec!(111.11))];
        let eval = evaluate_budget_discount(&items, Discount::percentage(dec!(5)), false).unwrap();
        assert_eq!(eval.items_subtotal, Money::new(dec!(285.72)));
        assert_eq!(eval.total, Money::new(dec!(271.43)));
        assert!(!eval.requires_approval);
        assert!(!eval.clamped);
    }

    #[test]
    fn discount_below_floor_is_clamped_and_needs_approval() {
        let items = [line(2, dec!(142.86), dec!(111.11))];
        let eval = evaluate_budget_discount(&items, Discount::fixed(dec!(100)), false).unwrap();
        assert_eq!(eval.minimum_total, Money::new(dec!(222.22)));
        assert_eq!(eval.discounted_total, Money::new(dec!(185.72)));
        assert_eq!(eval.total, Money::new(dec!(222.22)));
        assert_eq!(eval.shortfall, Money::new(dec!(36.50)));
        assert!(eval.requires_approval);
        assert!(eval.clamped);
    }

    #[test]
    fn authorization_lifts_the_clamp() {
        let items = [line(2, dec!(142.86), dec!(111.11))];
        let eval = evaluate_budget_discount(&items, Discount::fixed(dec!(100)), true).unwrap();
        assert_eq!(eval.total, Money::new(dec!(185.72)));
        assert!(eval.requires_approval);
        assert!(!eval.clamped);
    }

    #[test]
    fn floor_counts_customization_over_base_price() {
        let mut item = line(1, dec!(200), dec!(111.11));
        item.base_price_with_margin = Money::new(dec!(100));
        item.customization_per_unit = Money::new(dec!(30));
        assert_eq!(item.floor_unit_price(), Money::new(dec!(130)));
    }

    #[test]
    fn discount_disabled_when_every_item_sits_on_its_floor() {
        let items = [line(1, dec!(111.11), dec!(111.11)), line(3, dec!(50), dec!(50))];
        let eval = evaluate_budget_discount(&items, Discount::percentage(dec!(20)), false).unwrap();
        assert!(eval.discount_disabled);
        assert_eq!(eval.total, eval.items_subtotal);
        assert!(!eval.requires_approval);
    }

    #[test]
    fn below_minimum_items_are_reported() {
        let items = [line(1, dec!(100), dec!(111.11)), line(1, dec!(300), dec!(111.11))];
        let eval = evaluate_budget_discount(&items, Discount::NONE, false).unwrap();
        assert!(eval.requires_approval);
        assert_eq!(eval.below_minimum_items.len(), 1);
        assert_eq!(eval.below_minimum_items[0].index, 0);
        assert_eq!(eval.below_minimum_items[0].shortfall, Money::new(dec!(11.11)));
    }

    #[test]
    fn invalid_bounds_are_the_only_error() {
        assert_matches!(
            evaluate_budget_discount(&[], Discount::percentage(dec!(101)), false),
            Err(ServiceError::ValidationError(_))
        );
        let empty = evaluate_budget_discount(&[], Discount::fixed(dec!(10)), false).unwrap();
        assert_eq!(empty.total, Money::ZERO);
    }
}
