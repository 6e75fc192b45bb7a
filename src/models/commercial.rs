use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::money::Money;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscountType {
    #[default]
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

/// A discount request, either at item or at budget level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    #[serde(rename = "type", default)]
    pub kind: DiscountType,
    #[serde(default)]
    pub value: Decimal,
}

impl Discount {
    pub const NONE: Discount = Discount {
        kind: DiscountType::None,
        value: Decimal::ZERO,
    };

    pub fn percentage(value: Decimal) -> Self {
        Self {
            kind: DiscountType::Percentage,
            value,
        }
    }

    pub fn fixed(value: Decimal) -> Self {
        Self {
            kind: DiscountType::Fixed,
            value,
        }
    }

    /// Percentages must lie in `[0, 100]`, fixed values must be non-negative.
    pub fn validate_bounds(&self) -> Result<(), ServiceError> {
        match self.kind {
            DiscountType::None => Ok(()),
            DiscountType::Percentage
                if self.value < Decimal::ZERO || self.value > Decimal::ONE_HUNDRED =>
            {
                Err(ServiceError::ValidationError(format!(
                    "Percentage discount must be between 0 and 100, got {}",
                    self.value
                )))
            }
            DiscountType::Fixed if self.value < Decimal::ZERO => {
                Err(ServiceError::ValidationError(format!(
                    "Fixed discount cannot be negative, got {}",
                    self.value
                )))
            }
            _ => Ok(()),
        }
    }

    /// Discount amount against `base`, never larger than `base`.
    pub fn amount_for(&self, base: Money) -> Money {
        let raw = match self.kind {
            DiscountType::None => Money::ZERO,
            DiscountType::Percentage => base.percentage_of(self.value),
            DiscountType::Fixed => Money::new(self.value),
        };
        Ord::min(raw, base.non_negative())
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceSource {
    #[default]
    #[sea_orm(string_value = "computed")]
    Computed,
    #[sea_orm(string_value = "manual")]
    Manual,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryType {
    #[default]
    #[sea_orm(string_value = "delivery")]
    Delivery,
    #[sea_orm(string_value = "pickup")]
    Pickup,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    #[sea_orm(string_value = "pix")]
    Pix,
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "bank_slip")]
    BankSlip,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "debit_card")]
    DebitCard,
    #[sea_orm(string_value = "credit_card")]
    CreditCard,
}

impl PaymentMethod {
    /// Methods that accrue financing interest when split in installments.
    pub fn is_financed(&self) -> bool {
        matches!(self, Self::CreditCard)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommissionType {
    #[sea_orm(string_value = "vendor")]
    Vendor,
    #[sea_orm(string_value = "partner")]
    Partner,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "vendor")]
    Vendor,
    #[sea_orm(string_value = "partner")]
    Partner,
    #[sea_orm(string_value = "producer")]
    Producer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn discount_bounds() {
        assert!(Discount::percentage(dec!(100)).validate_bounds().is_ok());
        assert!(Discount::percentage(dec!(100.01)).validate_bounds().is_err());
        assert!(Discount::percentage(dec!(-1)).validate_bounds().is_err());
        assert!(Discount::fixed(dec!(-0.01)).validate_bounds().is_err());
        assert!(Discount::NONE.validate_bounds().is_ok());
    }

    #[test]
    fn fixed_discount_is_capped_by_its_base() {
        let base = Money::new(dec!(50));
        assert_eq!(Discount::fixed(dec!(80)).amount_for(base), base);
        assert_eq!(
            Discount::percentage(dec!(10)).amount_for(base),
            Money::new(dec!(5))
        );
    }

    #[test]
    fn only_credit_card_is_financed() {
        assert!(PaymentMethod::CreditCard.is_financed());
        assert!(!PaymentMethod::Pix.is_financed());
        assert!(!PaymentMethod::BankSlip.is_financed());
    }
}
