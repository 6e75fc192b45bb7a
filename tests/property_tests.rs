//! Property-based tests for the pricing, discount and settlement arithmetic.

use budget_engine::{
    models::{DeliveryType, Discount, PaymentMethod, ReceivableStatus},
    money::Money,
    services::{
        aggregation::{aggregate_budget_total, AggregationInput},
        commissions::{plan_commissions, CommissionContext},
        discount::{evaluate_budget_discount, DiscountLine},
        line_items::{price_line_items, LineItemDraft},
        pricing::{price_for_margin, MarginTier, PricingSettings},
        receivables::{derive_receivable_status, ReceivableKind},
    },
};
use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

fn cents(max: i64) -> impl Strategy<Value = Decimal> {
    (1i64..max).prop_map(|c| Decimal::new(c, 2))
}

fn margin() -> impl Strategy<Value = Decimal> {
    (0i64..9_500).prop_map(|m| Decimal::new(m, 2))
}

fn settings() -> impl Strategy<Value = PricingSettings> {
    (margin(), margin(), 0i64..1_000)
        .prop_map(|(low, high, min)| PricingSettings {
            tiers: vec![
                MarginTier {
                    revenue_threshold: Decimal::ZERO,
                    margin_percent: low,
                },
                MarginTier {
                    revenue_threshold: Decimal::new(500_000, 2),
                    margin_percent: high,
                },
            ],
            minimum_margin_percent: Decimal::new(min, 2),
        })
}

fn line() -> impl Strategy<Value = DiscountLine> {
    (1i32..20, cents(200_000), cents(200_000)).prop_map(|(quantity, unit, minimum)| {
        let unit_price = Money::new(unit);
        DiscountLine {
            quantity,
            unit_price,
            minimum_price: Money::new(minimum),
            base_price_with_margin: Money::new(minimum),
            customization_per_unit: Money::ZERO,
            total_price: unit_price.multiply_by_scalar(Decimal::from(quantity)),
        }
    })
}

fn discount() -> impl Strategy<Value = Discount> {
    prop_oneof![
        Just(Discount::NONE),
        (0i64..10_000).prop_map(|p| Discount::percentage(Decimal::new(p, 2))),
        cents(500_000).prop_map(Discount::fixed),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn margin_price_never_undercuts_cost(cost in cents(10_000_000), m in margin()) {
        let price = price_for_margin(Money::new(cost), m).unwrap();
        prop_assert!(price.amount() >= cost);
        let exact = cost / (Decimal::ONE - m / Decimal::ONE_HUNDRED);
        prop_assert_eq!(
            price.rounded().amount(),
            exact.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        );
    }

    #[test]
    fn higher_margins_price_higher(cost in cents(1_000_000), a in margin(), b in margin()) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let p_low = price_for_margin(Money::new(cost), low).unwrap();
        let p_high = price_for_margin(Money::new(cost), high).unwrap();
        prop_assert!(p_low <= p_high);
    }

    #[test]
    fn priced_lines_respect_the_floor(
        settings in settings(),
        costs in prop::collection::vec((cents(100_000), 1i32..10), 1..6),
    ) {
        let drafts: Vec<LineItemDraft> = costs
            .iter()
            .map(|(cost, quantity)| LineItemDraft {
                unit_cost: *cost,
                quantity: *quantity,
                customization_value: Decimal::ZERO,
                general_customization_value: Decimal::ZERO,
                price_source: Default::default(),
                manual_unit_price: None,
                discount: Discount::NONE,
            })
            .collect();
        let priced = price_line_items(&drafts, Some(&settings)).unwrap();
        prop_assert_eq!(priced.len(), drafts.len());
        for line in &priced {
            if settings.tiers.iter().all(|t| t.margin_percent >= settings.minimum_margin_percent) {
                prop_assert!(!line.below_minimum);
            }
            prop_assert!(line.total_price.amount() >= Decimal::ZERO);
        }
    }

    #[test]
    fn unauthorized_discounts_are_clamped_to_the_floor(
        items in prop::collection::vec(line(), 1..5),
        discount in discount(),
    ) {
        let eval = evaluate_budget_discount(&items, discount, false).unwrap();
        if eval.discounted_total < eval.minimum_total {
            prop_assert!(eval.requires_approval);
            prop_assert!(eval.clamped);
            prop_assert_eq!(eval.total, eval.minimum_total);
        } else {
            prop_assert_eq!(eval.total, eval.discounted_total);
        }
        prop_assert!(eval.total >= eval.minimum_total);
        prop_assert!(eval.total <= eval.items_subtotal.max(eval.minimum_total));
    }

    #[test]
    fn authorization_never_raises_the_total(
        items in prop::collection::vec(line(), 1..5),
        discount in discount(),
    ) {
        let held = evaluate_budget_discount(&items, discount, false).unwrap();
        let authorized = evaluate_budget_discount(&items, discount, true).unwrap();
        prop_assert!(authorized.total <= held.total);
        prop_assert_eq!(authorized.requires_approval, held.requires_approval);
        prop_assert!(!authorized.clamped);
    }

    #[test]
    fn aggregation_is_a_pure_function(
        items in prop::collection::vec(line(), 1..5),
        discount in discount(),
        shipping in cents(50_000),
        installments in 1u32..13,
        financed in any::<bool>(),
        delivery in any::<bool>(),
    ) {
        let input = AggregationInput {
            items,
            discount,
            discount_authorized: false,
            delivery_type: if delivery { DeliveryType::Delivery } else { DeliveryType::Pickup },
            shipping_cost: shipping,
            payment_method: if financed { PaymentMethod::CreditCard } else { PaymentMethod::Pix },
            installments,
            monthly_interest_rate: Decimal::new(199, 2),
            down_payment: None,
        };
        let first = aggregate_budget_total(&input).unwrap();
        let second = aggregate_budget_total(&input).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.down_payment + first.remaining, first.total);
        if !delivery {
            prop_assert!(first.shipping.is_zero());
        }
    }

    #[test]
    fn payment_order_does_not_change_the_balance(
        amounts in prop::collection::vec(cents(100_000), 1..8),
    ) {
        let forward = Money::sum(amounts.iter().copied().map(Money::new)).rounded();
        let backward = Money::sum(amounts.iter().rev().copied().map(Money::new)).rounded();
        prop_assert_eq!(forward, backward);

        let amount = Money::new(Decimal::new(5_000_000, 2));
        let minimum = Money::new(Decimal::new(1_000_000, 2));
        let now = Utc::now();
        let a = derive_receivable_status(ReceivableKind::Order, amount, forward, minimum, None, now);
        let b = derive_receivable_status(ReceivableKind::Order, amount, backward, minimum, None, now);
        prop_assert_eq!(a, b);
        if forward >= amount {
            prop_assert_eq!(a, ReceivableStatus::Paid);
        }
    }

    #[test]
    fn partner_shares_split_the_pool(
        partners in 1usize..9,
        pool in 0i64..3_000,
    ) {
        let ctx = CommissionContext {
            vendor_id: Uuid::new_v4(),
            vendor_rate: None,
            partner_ids: (0..partners).map(|_| Uuid::new_v4()).collect(),
            partner_pool_rate: Decimal::new(pool, 2),
        };
        let plans = plan_commissions(&ctx);
        prop_assert_eq!(plans.len(), partners);
        let share = plans[0].percentage;
        prop_assert!(plans.iter().all(|p| p.percentage == share));
        let total: Decimal = plans.iter().map(|p| p.percentage).sum();
        // 4dp rounding per share
        prop_assert!((total - ctx.partner_pool_rate).abs() <= Decimal::new(5, 5) * Decimal::from(partners as u64));
    }
}
