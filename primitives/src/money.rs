use num::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub};
use parse_display::{Display, FromStr, ParseError};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, iter::Sum, ops::Sub};

/// A monetary amount expressed as whole minor units (cents).
///
/// Unlike a floating point amount, every arithmetic operation is checked:
/// overflow and underflow produce `None` instead of silently wrapping or
/// going negative. `Money` never represents a negative amount - a debit
/// that would underflow a balance is rejected by the caller before it
/// reaches here.
///
/// (De)serializes as a decimal string (`"12.34"`), not as a JSON number, to
/// avoid floating point round-tripping through clients.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, FromStr, Serialize, Deserialize, Hash, Default)]
#[serde(into = "String", try_from = "String")]
pub struct Money(u64);

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.to_string()
    }
}

impl TryFrom<String> for Money {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Money {
    /// Two digits after the decimal point - cents.
    pub const PRECISION: u8 = 2;
    pub const MULTIPLIER: u64 = 10_u64.pow(Self::PRECISION as u32);

    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn to_cents(self) -> u64 {
        self.0
    }

    /// Fails if the whole number, once scaled, would not fit in a `u64`.
    pub fn from_whole(whole: u64) -> Option<Self> {
        whole.checked_mul(Self::MULTIPLIER).map(Self)
    }

    pub fn checked_add(&self, rhs: &Money) -> Option<Self> {
        CheckedAdd::checked_add(self, rhs)
    }

    pub fn checked_sub(&self, rhs: &Money) -> Option<Self> {
        CheckedSub::checked_sub(self, rhs)
    }

    pub fn checked_mul(&self, rhs: &Money) -> Option<Self> {
        CheckedMul::checked_mul(self, rhs)
    }

    pub fn checked_div(&self, rhs: &Money) -> Option<Self> {
        CheckedDiv::checked_div(self, rhs)
    }

    /// Saturates to zero instead of underflowing; used for display-only
    /// "remaining budget" computations where a negative remainder has no
    /// meaning.
    pub fn saturating_sub(&self, rhs: &Money) -> Self {
        Money(self.0.saturating_sub(rhs.0))
    }

    pub fn to_float_string(self) -> String {
        let mut string_value = self.0.to_string();
        let value_length = string_value.len();
        let precision: usize = Self::PRECISION.into();

        if value_length > precision {
            string_value.insert(value_length - precision, '.');
            string_value
        } else {
            format!("0.{:0>2}", string_value)
        }
    }

    /// Ratio of `self` to `whole`, clamped to `[0.0, 1.0]`. Used by the
    /// scorer's budget factor; returns `0.0` when `whole` is zero.
    pub fn ratio(&self, whole: &Money) -> f64 {
        if whole.0 == 0 {
            0.0
        } else {
            (self.0 as f64 / whole.0 as f64).clamp(0.0, 1.0)
        }
    }
}

impl From<u64> for Money {
    fn from(cents: u64) -> Self {
        Self(cents)
    }
}

impl fmt::Debug for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Money({})", self.to_float_string())
    }
}

impl Sub<Money> for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl CheckedAdd for Money {
    fn checked_add(&self, v: &Self) -> Option<Self> {
        self.0.checked_add(v.0).map(Self)
    }
}

impl CheckedSub for Money {
    fn checked_sub(&self, v: &Self) -> Option<Self> {
        self.0.checked_sub(v.0).map(Self)
    }
}

impl CheckedMul for Money {
    fn checked_mul(&self, v: &Self) -> Option<Self> {
        self.0
            .checked_mul(v.0)
            .and_then(|product| product.checked_div(Self::MULTIPLIER))
            .map(Self)
    }
}

impl CheckedDiv for Money {
    fn checked_div(&self, v: &Self) -> Option<Self> {
        if v.0 == 0 {
            return None;
        }

        self.0.checked_mul(Self::MULTIPLIER).map(|n| Self(n / v.0))
    }
}

impl<'a> Sum<&'a Money> for Option<Money> {
    fn sum<I: Iterator<Item = &'a Money>>(mut iter: I) -> Self {
        iter.try_fold(0_u64, |acc, money| acc.checked_add(money.0))
            .map(Money)
    }
}

impl PartialEq<u64> for Money {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<u64> for Money {
    fn partial_cmp(&self, other: &u64) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}

#[cfg(feature = "postgres")]
mod postgres {
    use super::Money;
    use bytes::BytesMut;
    use std::error::Error;
    use tokio_postgres::types::{accepts, to_sql_checked, FromSql, IsNull, ToSql, Type};

    impl<'a> FromSql<'a> for Money {
        fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Money, Box<dyn Error + Sync + Send>> {
            let value = <i64 as FromSql>::from_sql(ty, raw)?;

            Ok(Money(u64::try_from(value)?))
        }

        accepts!(INT8);
    }

    impl ToSql for Money {
        fn to_sql(&self, ty: &Type, w: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
            <i64 as ToSql>::to_sql(&self.0.try_into()?, ty, w)
        }

        accepts!(INT8);

        to_sql_checked!();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn displays_and_parses_decimal_cents() {
        let five_and_change = Money::from_cents(512);
        assert_eq!("5.12", five_and_change.to_string());
        assert_eq!(Money::from_cents(512), "5.12".parse().unwrap());

        let whole = Money::from_whole(8).unwrap();
        assert_eq!(Money::from_cents(800), whole);
    }

    #[test]
    fn checked_add_and_sub_reject_overflow_and_underflow() {
        let a = Money::from_cents(100);
        let b = Money::from_cents(40);

        assert_eq!(Some(Money::from_cents(140)), a.checked_add(&b));
        assert_eq!(Some(Money::from_cents(60)), a.checked_sub(&b));
        assert_eq!(None, b.checked_sub(&a));

        let max = Money::from_cents(u64::MAX);
        assert_eq!(None, max.checked_add(&Money::from_cents(1)));
    }

    #[test]
    fn ratio_clamps_and_handles_zero_whole() {
        let spent = Money::from_cents(25);
        let budget = Money::from_cents(100);

        assert_eq!(0.25, spent.ratio(&budget));
        assert_eq!(0.0, spent.ratio(&Money::ZERO));
        assert_eq!(1.0, budget.ratio(&spent));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let amount = Money::from_cents(1050);
        assert_eq!(
            serde_json::Value::String("10.50".to_string()),
            serde_json::to_value(amount).unwrap()
        );
    }
}
