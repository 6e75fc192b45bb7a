//! Budget totals: subtotal, guarded discount, shipping, financing and down payment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::{DeliveryType, Discount, PaymentMethod};
use crate::money::Money;
use crate::services::discount::{evaluate_budget_discount, DiscountEvaluation, DiscountLine};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationInput {
    pub items: Vec<DiscountLine>,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub discount_authorized: bool,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default = "one")]
    pub installments: u32,
    /// Monthly rate in percent.
    #[serde(default)]
    pub monthly_interest_rate: Decimal,
    /// Defaults to half of the total when absent.
    #[serde(default)]
    pub down_payment: Option<Decimal>,
}

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BudgetTotals {
    pub subtotal: Money,
    pub minimum_total: Money,
    pub discount_amount: Money,
    pub discounted_total: Money,
    pub shipping: Money,
    pub interest: Money,
    pub total: Money,
    pub down_payment: Money,
    pub down_payment_custom: bool,
    pub remaining: Money,
    pub requires_approval: bool,
    pub discount: DiscountEvaluation,
}

/// Shipping charged for the delivery type; pickups ship for free.
pub fn shipping_for(delivery_type: DeliveryType, shipping_cost: Decimal) -> Money {
    match delivery_type {
        DeliveryType::Pickup => Money::ZERO,
        DeliveryType::Delivery => Money::new(shipping_cost).rounded(),
    }
}

/// Simple (not compound) interest over the whole installment plan.
pub fn financing_interest(
    base_total: Money,
    method: PaymentMethod,
    installments: u32,
    monthly_rate: Decimal,
) -> Money {
    if !method.is_financed() || installments <= 1 {
        return Money::ZERO;
    }
    base_total
        .percentage_of(monthly_rate)
        .multiply_by_scalar(Decimal::from(installments))
        .rounded()
}

/// Aggregates a budget. The result is a pure function of `input`.
pub fn aggregate_budget_total(input: &AggregationInput) -> Result<BudgetTotals, ServiceError> {
    if input.installments == 0 {
        return Err(ServiceError::ValidationError(
            "Installments must be at least 1".into(),
        ));
    }
    if input.shipping_cost < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Shipping cost cannot be negative, got {}",
            input.shipping_cost
        )));
    }
    if input.monthly_interest_rate < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Interest rate cannot be negative, got {}",
            input.monthly_interest_rate
        )));
    }
    if matches!(input.down_payment, Some(d) if d < Decimal::ZERO) {
        return Err(ServiceError::ValidationError(
            "Down payment cannot be negative".into(),
        ));
    }

    let discount = evaluate_budget_discount(&input.items, input.discount, input.discount_authorized)?;
    let shipping = shipping_for(input.delivery_type, input.shipping_cost);
    let base_total = discount.total + shipping;
    let interest = financing_interest(
        base_total,
        input.payment_method,
        input.installments,
        input.monthly_interest_rate,
    );
    let total = (base_total + interest).rounded();

    let (down_payment, down_payment_custom) = match input.down_payment {
        Some(value) => (Money::new(value).rounded(), true),
        None => (
            total
                .divide_by_scalar(Decimal::TWO)
                .unwrap_or(Money::ZERO)
                .rounded(),
            false,
        ),
    };

    Ok(BudgetTotals {
        subtotal: discount.items_subtotal,
        minimum_total: discount.minimum_total,
        discount_amount: discount.discount_amount,
        discounted_total: discount.total,
        shipping,
        interest,
        total,
        down_payment,
        down_payment_custom,
        remaining: (total - down_payment).non_negative(),
        requires_approval: discount.requires_approval,
        discount,
    })
}
