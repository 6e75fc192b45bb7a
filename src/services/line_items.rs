//! Line item pricing: margin on total unit cost, manual overrides, item discounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::metrics;
use crate::models::{Discount, PriceSource};
use crate::money::Money;
use crate::services::discount::DiscountLine;
use crate::services::pricing::{calculate_margin_price, PricingSettings};

/// Everything needed to price one budget line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItemDraft {
    /// Product cost per unit.
    pub unit_cost: Decimal,
    pub quantity: i32,
    /// Item-level customization cost per unit.
    #[serde(default)]
    pub customization_value: Decimal,
    /// Budget-wide customization cost per unit.
    #[serde(default)]
    pub general_customization_value: Decimal,
    #[serde(default)]
    pub price_source: PriceSource,
    /// Required when `price_source` is `manual`.
    #[serde(default)]
    pub manual_unit_price: Option<Decimal>,
    #[serde(default)]
    pub discount: Discount,
}

impl LineItemDraft {
    fn check(&self) -> Result<(), ServiceError> {
        if self.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity must be at least 1, got {}",
                self.quantity
            )));
        }
        for (label, value) in [
            ("Unit cost", self.unit_cost),
            ("Customization value", self.customization_value),
            ("General customization value", self.general_customization_value),
        ] {
            if value < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "{} cannot be negative, got {}",
                    label, value
                )));
            }
        }
        if self.price_source == PriceSource::Manual {
            match self.manual_unit_price {
                None => {
                    return Err(ServiceError::ValidationError(
                        "Manual price source requires a unit price".into(),
                    ))
                }
                Some(price) if price < Decimal::ZERO => {
                    return Err(ServiceError::ValidationError(format!(
                        "Manual unit price cannot be negative, got {}",
                        price
                    )))
                }
                Some(_) => {}
            }
        }
        self.discount.validate_bounds()
    }

    /// Customization cost per unit, item-level plus budget-wide.
    pub fn customization_per_unit(&self) -> Money {
        Money::new(self.customization_value + self.general_customization_value)
    }

    pub fn total_unit_cost(&self) -> Money {
        Money::new(self.unit_cost) + self.customization_per_unit()
    }
}

/// Per-unit gap between a unit price and its floor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Shortfall {
    pub unit_price: Money,
    pub minimum_price: Money,
    pub difference: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricedLine {
    pub unit_price: Money,
    pub minimum_price: Money,
    /// Minimum-margin price over the product cost alone.
    pub base_price_with_margin: Money,
    pub customization_per_unit: Money,
    pub quantity: i32,
    pub gross_total: Money,
    pub discount_amount: Money,
    pub total_price: Money,
    pub below_minimum: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<Shortfall>,
}

impl PricedLine {
    /// Contribution of this line to the running revenue of the budget.
    pub fn revenue(&self) -> Money {
        self.unit_price.multiply_by_scalar(Decimal::from(self.quantity))
    }

    pub fn to_discount_line(&self) -> DiscountLine {
        DiscountLine {
            quantity: self.quantity,
            unit_price: self.unit_price,
            minimum_price: self.minimum_price,
            base_price_with_margin: self.base_price_with_margin,
            customization_per_unit: self.customization_per_unit,
            total_price: self.total_price,
        }
    }
}

/// Prices one line. The margin is taken on the total unit cost so customizations
/// are margined rather than added on top of an already-margined price.
pub fn price_line_item(
    draft: &LineItemDraft,
    running_revenue: Money,
    settings: Option<&PricingSettings>,
) -> Result<PricedLine, ServiceError> {
    draft.check()?;

    let margin = calculate_margin_price(draft.total_unit_cost(), running_revenue, settings)?;
    let base = calculate_margin_price(Money::new(draft.unit_cost), running_revenue, settings)?;

    let unit_price = match (draft.price_source, draft.manual_unit_price) {
        (PriceSource::Manual, Some(price)) => Money::new(price).rounded(),
        _ => margin.ideal_price.rounded(),
    };
    let minimum_price = margin.minimum_price.rounded();

    let quantity = Decimal::from(draft.quantity);
    let gross_total = unit_price.multiply_by_scalar(quantity);
    let discount_amount = draft.discount.amount_for(gross_total).rounded();
    let total_price = (gross_total - discount_amount).non_negative().rounded();

    let below_minimum = minimum_price.is_positive() && unit_price < minimum_price;
    let shortfall = below_minimum.then(|| Shortfall {
        unit_price,
        minimum_price,
        difference: minimum_price - unit_price,
    });

    metrics::LINES_PRICED.inc();

    Ok(PricedLine {
        unit_price,
        minimum_price,
        base_price_with_margin: base.minimum_price.rounded(),
        customization_per_unit: draft.customization_per_unit(),
        quantity: draft.quantity,
        gross_total,
        discount_amount,
        total_price,
        below_minimum,
        shortfall,
    })
}

/// Prices lines in order, threading the revenue of the lines already priced.
pub fn price_line_items(
    drafts: &[LineItemDraft],
    settings: Option<&PricingSettings>,
) -> Result<Vec<PricedLine>, ServiceError> {
    let mut running_revenue = Money::ZERO;
    let mut priced = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let line = price_line_item(draft, running_revenue, settings)?;
        running_revenue += line.revenue();
        priced.push(line);
    }
    Ok(priced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pricing::MarginTier;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn settings() -> PricingSettings {
        PricingSettings {
            tiers: vec![
                MarginTier {
                    revenue_threshold: dec!(0),
                    margin_percent: dec!(30),
                },
                MarginTier {
                    revenue_threshold: dec!(1000),
                    margin_percent: dec!(20),
                },
            ],
            minimum_margin_percent: dec!(10),
        }
    }

    fn draft(cost: Decimal, quantity: i32) -> LineItemDraft {
        LineItemDraft {
            unit_cost: cost,
            quantity,
            customization_value: Decimal::ZERO,
            general_customization_value: Decimal::ZERO,
            price_source: PriceSource::Computed,
            manual_unit_price: None,
            discount: Discount::NONE,
        }
    }

    #[test]
    fn computed_price_uses_selected_tier() {
        let line = price_line_item(&draft(dec!(100), 3), Money::ZERO, Some(&settings())).unwrap();
        assert_eq!(line.unit_price, Money::new(dec!(142.86)));
        assert_eq!(line.minimum_price, Money::new(dec!(111.11)));
        assert_eq!(line.total_price, Money::new(dec!(428.58)));
        assert!(!line.below_minimum);
    }

    #[test]
    fn customization_is_margined_not_added_on_top() {
        let mut d = draft(dec!(70), 1);
        d.customization_value = dec!(20);
        d.general_customization_value = dec!(10);
        let line = price_line_item(&d, Money::ZERO, Some(&settings())).unwrap();
        // (70 + 20 + 10) / 0.7
        assert_eq!(line.unit_price, Money::new(dec!(142.86)));
        // 70 / 0.9
        assert_eq!(line.base_price_with_margin, Money::new(dec!(77.78)));
    }

    #[test]
    fn running_revenue_unlocks_next_tier() {
        let lines =
            price_line_items(&[draft(dec!(700), 1), draft(dec!(100), 1)], Some(&settings()))
                .unwrap();
        assert_eq!(lines[0].unit_price, Money::new(dec!(1000)));
        assert_eq!(lines[1].unit_price, Money::new(dec!(125)));
    }

    #[test]
    fn manual_price_below_floor_is_flagged_with_shortfall() {
        let mut d = draft(dec!(100), 2);
        d.price_source = PriceSource::Manual;
        d.manual_unit_price = Some(dec!(105));
        let line = price_line_item(&d, Money::ZERO, Some(&settings())).unwrap();
        assert_eq!(line.unit_price, Money::new(dec!(105)));
        assert!(line.below_minimum);
        let shortfall = line.shortfall.unwrap();
        assert_eq!(shortfall.difference, Money::new(dec!(6.11)));
    }

    #[test]
    fn item_discount_applies_to_gross_total_and_floors_at_zero() {
        let mut d = draft(dec!(100), 2);
        d.discount = Discount::percentage(dec!(10));
        let line = price_line_item(&d, Money::ZERO, Some(&settings())).unwrap();
        assert_eq!(line.discount_amount, Money::new(dec!(28.57)));
        assert_eq!(line.total_price, Money::new(dec!(257.15)));

        d.discount = Discount::fixed(dec!(10000));
        let line = price_line_item(&d, Money::ZERO, Some(&settings())).unwrap();
        assert_eq!(line.total_price, Money::ZERO);
    }

    #[test]
    fn unmanaged_pricing_never_flags() {
        let line = price_line_item(&draft(dec!(55.5), 1), Money::ZERO, None).unwrap();
        assert_eq!(line.unit_price, Money::new(dec!(55.5)));
        assert!(!line.below_minimum);
    }

    #[test]
    fn invalid_drafts_are_rejected() {
        assert_matches!(
            price_line_item(&draft(dec!(10), 0), Money::ZERO, None),
            Err(ServiceError::ValidationError(_))
        );
        let mut d = draft(dec!(10), 1);
        d.price_source = PriceSource::Manual;
        assert_matches!(
            price_line_item(&d, Money::ZERO, None),
            Err(ServiceError::ValidationError(_))
        );
    }
}
