//! Tiered margin pricing and the persisted pricing settings.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, DbPool};
use crate::entities::{margin_tier, pricing_settings};
use crate::errors::ServiceError;
use crate::money::Money;

/// A (revenue threshold, margin) rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginTier {
    pub revenue_threshold: Decimal,
    /// Margin on sale price, in percent.
    pub margin_percent: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct PricingSettings {
    #[validate(length(max = 50, message = "At most 50 margin tiers are supported"))]
    pub tiers: Vec<MarginTier>,
    pub minimum_margin_percent: Decimal,
}

impl PricingSettings {
    /// Margins must lie in `[0, 100)` and thresholds must be non-negative and unique.
    pub fn check(&self) -> Result<(), ServiceError> {
        check_margin("minimum margin", self.minimum_margin_percent)?;

        let mut seen = HashSet::new();
        for tier in &self.tiers {
            check_margin("tier margin", tier.margin_percent)?;
            if tier.revenue_threshold.is_sign_negative() {
                return Err(ServiceError::PricingConfigError(format!(
                    "Revenue threshold cannot be negative, got {}",
                    tier.revenue_threshold
                )));
            }
            if !seen.insert(tier.revenue_threshold.normalize()) {
                return Err(ServiceError::PricingConfigError(format!(
                    "Duplicate revenue threshold {}",
                    tier.revenue_threshold
                )));
            }
        }
        Ok(())
    }

    /// Tiers sorted by ascending threshold.
    pub fn sorted_tiers(&self) -> Vec<MarginTier> {
        let mut tiers = self.tiers.clone();
        tiers.sort_by(|a, b| a.revenue_threshold.cmp(&b.revenue_threshold));
        tiers
    }

    /// Margin of the highest tier not exceeding `running_revenue`.
    /// Below every threshold the lowest tier applies; no tiers at all means no margin.
    pub fn margin_for(&self, running_revenue: Money) -> Decimal {
        let tiers = self.sorted_tiers();
        tiers
            .iter()
            .filter(|t| t.revenue_threshold <= running_revenue.amount())
            .last()
            .or_else(|| tiers.first())
            .map(|t| t.margin_percent)
            .unwrap_or(Decimal::ZERO)
    }
}

fn check_margin(label: &str, margin: Decimal) -> Result<(), ServiceError> {
    if margin.is_sign_negative() || margin >= Decimal::ONE_HUNDRED {
        return Err(ServiceError::PricingConfigError(format!(
            "{} must be in [0, 100), got {}",
            label, margin
        )));
    }
    Ok(())
}

/// Ideal and minimum sale price, unrounded.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MarginPrice {
    pub ideal_price: Money,
    pub minimum_price: Money,
}

/// `cost / (1 - margin/100)`: margin expressed on the sale price.
pub fn price_for_margin(cost: Money, margin_percent: Decimal) -> Result<Money, ServiceError> {
    check_margin("margin", margin_percent)?;
    let divisor = Decimal::ONE - margin_percent / Decimal::ONE_HUNDRED;
    cost.divide_by_scalar(divisor).ok_or_else(|| {
        ServiceError::PricingConfigError(format!("Margin {} yields no price", margin_percent))
    })
}

/// Prices `cost` against the tier selected by `running_revenue`.
/// Without settings the cost is returned unchanged and no floor applies.
pub fn calculate_margin_price(
    cost: Money,
    running_revenue: Money,
    settings: Option<&PricingSettings>,
) -> Result<MarginPrice, ServiceError> {
    let Some(settings) = settings else {
        return Ok(MarginPrice {
            ideal_price: cost,
            minimum_price: Money::ZERO,
        });
    };
    settings.check()?;

    Ok(MarginPrice {
        ideal_price: price_for_margin(cost, settings.margin_for(running_revenue))?,
        minimum_price: price_for_margin(cost, settings.minimum_margin_percent)?,
    })
}

/// Settings actually used for a pricing call: a malformed configuration is either
/// surfaced or, when `unmanaged_fallback` is set, replaced by unmanaged pricing.
pub fn effective_settings(
    settings: Option<PricingSettings>,
    unmanaged_fallback: bool,
) -> Result<Option<PricingSettings>, ServiceError> {
    match settings {
        Some(s) => match s.check() {
            Ok(()) => Ok(Some(s)),
            Err(e) if unmanaged_fallback => {
                warn!(error = %e, "Malformed pricing settings, falling back to unmanaged pricing");
                Ok(None)
            }
            Err(e) => Err(e),
        },
        None => Ok(None),
    }
}

/// Single-row store for margin tiers and the minimum margin.
#[derive(Clone)]
pub struct PricingSettingsService {
    db_pool: Arc<DbPool>,
}

impl PricingSettingsService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn get(&self) -> Result<Option<PricingSettings>, ServiceError> {
        let db = &*self.db_pool;
        let Some(row) = pricing_settings::Entity::find().one(db).await? else {
            return Ok(None);
        };

        let tiers = margin_tier::Entity::find()
            .filter(margin_tier::Column::SettingsId.eq(row.id))
            .order_by_asc(margin_tier::Column::RevenueThreshold)
            .all(db)
            .await?
            .into_iter()
            .map(|t| MarginTier {
                revenue_threshold: t.revenue_threshold,
                margin_percent: t.margin_percent,
            })
            .collect();

        Ok(Some(PricingSettings {
            tiers,
            minimum_margin_percent: row.minimum_margin_percent,
        }))
    }

    /// Replaces the stored settings wholesale.
    #[instrument(skip(self, settings), fields(tiers = settings.tiers.len()))]
    pub async fn replace(&self, settings: PricingSettings) -> Result<PricingSettings, ServiceError> {
        settings.validate()?;
        settings.check()?;

        let started = std::time::Instant::now();
        let txn = db::begin(&self.db_pool).await?;

        pricing_settings::Entity::delete_many().exec(&txn).await?;

        let settings_id = Uuid::new_v4();
        pricing_settings::ActiveModel {
            id: Set(settings_id),
            minimum_margin_percent: Set(settings.minimum_margin_percent),
            updated_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        for tier in settings.sorted_tiers() {
            margin_tier::ActiveModel {
                id: Set(Uuid::new_v4()),
                settings_id: Set(settings_id),
                revenue_threshold: Set(tier.revenue_threshold),
                margin_percent: Set(tier.margin_percent),
            }
            .insert(&txn)
            .await?;
        }

        db::commit(txn, started).await?;
        info!(%settings_id, "Pricing settings replaced");

        Ok(PricingSettings {
            tiers: settings.sorted_tiers(),
            minimum_margin_percent: settings.minimum_margin_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn settings(tiers: &[(Decimal, Decimal)], minimum: Decimal) -> PricingSettings {
        PricingSettings {
            tiers: tiers
                .iter()
                .map(|(threshold, margin)| MarginTier {
                    revenue_threshold: *threshold,
                    margin_percent: *margin,
                })
                .collect(),
            minimum_margin_percent: minimum,
        }
    }

    #[test]
    fn single_tier_prices_on_sale_margin() {
        let s = settings(&[(dec!(0), dec!(30))], dec!(10));
        let price = calculate_margin_price(Money::new(dec!(100)), Money::ZERO, Some(&s)).unwrap();
        assert_eq!(price.ideal_price.rounded(), Money::new(dec!(142.86)));
        assert_eq!(price.minimum_price.rounded(), Money::new(dec!(111.11)));
    }

    #[test]
    fn highest_reached_threshold_wins_regardless_of_input_order() {
        let s = settings(
            &[(dec!(5000), dec!(20)), (dec!(0), dec!(40)), (dec!(1000), dec!(30))],
            dec!(10),
        );
        assert_eq!(s.margin_for(Money::new(dec!(0))), dec!(40));
        assert_eq!(s.margin_for(Money::new(dec!(999.99))), dec!(40));
        assert_eq!(s.margin_for(Money::new(dec!(1000))), dec!(30));
        assert_eq!(s.margin_for(Money::new(dec!(7200))), dec!(20));
    }

    #[test]
    fn revenue_below_every_threshold_uses_lowest_tier() {
        let s = settings(&[(dec!(500), dec!(25)), (dec!(100), dec!(35))], dec!(5));
        assert_eq!(s.margin_for(Money::new(dec!(10))), dec!(35));
    }

    #[test]
    fn missing_settings_means_unmanaged_pricing() {
        let price = calculate_margin_price(Money::new(dec!(80)), Money::ZERO, None).unwrap();
        assert_eq!(price.ideal_price, Money::new(dec!(80)));
        assert_eq!(price.minimum_price, Money::ZERO);
    }

    #[test]
    fn full_margin_fails_fast() {
        let s = settings(&[(dec!(0), dec!(100))], dec!(10));
        assert_matches!(
            calculate_margin_price(Money::new(dec!(10)), Money::ZERO, Some(&s)),
            Err(ServiceError::PricingConfigError(_))
        );

        let s = settings(&[(dec!(0), dec!(30))], dec!(120));
        assert_matches!(s.check(), Err(ServiceError::PricingConfigError(_)));
    }

    #[test]
    fn duplicate_thresholds_are_rejected() {
        let s = settings(&[(dec!(100), dec!(30)), (dec!(100.00), dec!(20))], dec!(10));
        assert_matches!(s.check(), Err(ServiceError::PricingConfigError(_)));
    }

    #[test]
    fn fallback_only_when_configured() {
        let bad = settings(&[(dec!(0), dec!(150))], dec!(10));
        assert_matches!(effective_settings(Some(bad.clone()), false), Err(_));
        assert_eq!(effective_settings(Some(bad), true).unwrap(), None);
    }
}
