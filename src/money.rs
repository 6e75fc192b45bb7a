//! Exact decimal money arithmetic.
//!
//! Every monetary value in the engine flows through [`Money`]. Intermediate
//! results keep full `Decimal` precision; rounding to cents happens only when
//! a value is persisted ([`Money::to_stored`]), serialized or displayed, or
//! when a caller explicitly asks for [`Money::rounded`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of fractional digits used at rest and on the wire.
pub const MONEY_SCALE: u32 = 2;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, MONEY_SCALE))
    }

    /// Full-precision amount, not rounded.
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Rounds half away from zero to cents.
    pub fn rounded(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Rounded amount with a fixed scale of exactly two digits, for storage.
    pub fn to_stored(&self) -> Decimal {
        let mut value = self.rounded().0;
        value.rescale(MONEY_SCALE);
        value
    }

    pub fn add(&self, other: Money) -> Money {
        Money(self.0 + other.0)
    }

    pub fn subtract(&self, other: Money) -> Money {
        Money(self.0 - other.0)
    }

    pub fn multiply_by_scalar(&self, factor: Decimal) -> Money {
        Money(self.0 * factor)
    }

    /// Divides by a scalar, returning `None` on a zero divisor.
    pub fn divide_by_scalar(&self, divisor: Decimal) -> Option<Money> {
        self.0.checked_div(divisor).map(Money)
    }

    /// `self × percent / 100`, kept at full precision.
    pub fn percentage_of(&self, percent: Decimal) -> Money {
        Money(self.0 * percent / HUNDRED)
    }

    /// Three-way comparison; `Ordering` is `-1 | 0 | 1` as `i8`.
    pub fn compare(&self, other: &Money) -> Ordering {
        self.0.cmp(&other.0)
    }

    pub fn sum<I: IntoIterator<Item = Money>>(values: I) -> Money {
        values.into_iter().fold(Money::ZERO, |acc, value| acc + value)
    }

    /// Floors the value at zero.
    pub fn non_negative(&self) -> Money {
        Ord::max(*self, Money::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, value| acc + value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_stored())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_stored().to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Decimal as Deserialize>::deserialize(deserializer).map(Money)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn margin_division_rounds_only_at_the_boundary() {
        let cost = Money::new(dec!(100));
        let ideal = cost.divide_by_scalar(dec!(0.7)).unwrap();
        assert_eq!(ideal.rounded(), Money::new(dec!(142.86)));
        // keeps precision until asked
        assert!(ideal.amount().scale() > MONEY_SCALE);

        let minimum = cost.divide_by_scalar(dec!(0.9)).unwrap();
        assert_eq!(minimum.rounded(), Money::new(dec!(111.11)));
    }

    #[test]
    fn division_by_zero_is_none() {
        assert!(Money::new(dec!(10)).divide_by_scalar(Decimal::ZERO).is_none());
    }

    #[test]
    fn tenths_do_not_drift() {
        let total = Money::sum(vec![Money::new(dec!(0.1)), Money::new(dec!(0.2))]);
        assert_eq!(total, Money::new(dec!(0.3)));
    }

    #[test]
    fn percentage_and_scalar() {
        let value = Money::new(dec!(1000));
        assert_eq!(value.percentage_of(dec!(7.5)), Money::new(dec!(75)));
        assert_eq!(
            Money::new(dec!(19.99)).multiply_by_scalar(dec!(3)),
            Money::new(dec!(59.97))
        );
    }

    #[test]
    fn compare_is_three_way() {
        let a = Money::new(dec!(1.00));
        let b = Money::new(dec!(1));
        assert_eq!(a.compare(&b), Ordering::Equal);
        assert_eq!(a.compare(&Money::new(dec!(2))) as i8, -1);
        assert_eq!(Money::new(dec!(3)).compare(&a) as i8, 1);
    }

    #[test]
    fn half_cent_rounds_away_from_zero() {
        assert_eq!(Money::new(dec!(2.345)).rounded(), Money::new(dec!(2.35)));
        assert_eq!(Money::new(dec!(-2.345)).rounded(), Money::new(dec!(-2.35)));
    }

    #[test]
    fn serializes_with_two_fraction_digits() {
        let json = serde_json::to_string(&Money::new(dec!(5))).unwrap();
        assert_eq!(json, "\"5.00\"");
        let json = serde_json::to_string(&Money::new(dec!(142.857142))).unwrap();
        assert_eq!(json, "\"142.86\"");

        let back: Money = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(back, Money::new(dec!(12.50)));
    }

    #[test]
    fn deserializes_strings_and_numbers() {
        #[derive(Deserialize)]
        struct Line {
            price: Money,
        }
        let line: Line = serde_json::from_str(r#"{"price": "99.90"}"#).unwrap();
        assert_eq!(line.price, Money::new(dec!(99.90)));
        let line: Line = serde_json::from_str(r#"{"price": 40}"#).unwrap();
        assert_eq!(line.price, Money::new(dec!(40)));
        assert!(serde_json::from_str::<Line>(r#"{"price": "abc"}"#).is_err());
    }

    #[test]
    fn non_negative_floors_at_zero() {
        assert_eq!(Money::new(dec!(-4)).non_negative(), Money::ZERO);
        assert_eq!(Money::new(dec!(4)).non_negative(), Money::new(dec!(4)));
    }
}
