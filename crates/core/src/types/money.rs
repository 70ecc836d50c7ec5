//! Rupiah amounts using decimal arithmetic.
//!
//! Every price in the store is in Indonesian Rupiah. Amounts are kept as
//! [`Decimal`] so variant deltas and shipping costs add up exactly; the
//! payment gateway only accepts whole Rupiah, see [`Money::to_gross_amount`].

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of Indonesian Rupiah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero Rupiah.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from whole Rupiah.
    #[must_use]
    pub fn from_rupiah(rupiah: i64) -> Self {
        Self(Decimal::from(rupiah))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Whether the amount has no fractional Rupiah.
    #[must_use]
    pub fn is_whole(&self) -> bool {
        self.0.fract().is_zero()
    }

    /// Multiply by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Whole-Rupiah amount for the payment gateway, rounded half-up.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_gross_amount(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;

        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Format for display, e.g. `Rp150.000`.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .abs()
            .trunc()
            .to_string();

        let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
        for (i, ch) in rounded.chars().enumerate() {
            if i > 0 && (rounded.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        if self.is_negative() {
            format!("-Rp{grouped}")
        } else {
            format!("Rp{grouped}")
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        self.times(rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_rupiah(0).display(), "Rp0");
        assert_eq!(Money::from_rupiah(950).display(), "Rp950");
        assert_eq!(Money::from_rupiah(1_000).display(), "Rp1.000");
        assert_eq!(Money::from_rupiah(150_000).display(), "Rp150.000");
        assert_eq!(Money::from_rupiah(12_345_678).display(), "Rp12.345.678");
        assert_eq!(Money::from_rupiah(-25_000).display(), "-Rp25.000");
    }

    #[test]
    fn test_arithmetic() {
        let base = Money::from_rupiah(250_000);
        let delta = Money::from_rupiah(15_000);
        assert_eq!((base + delta).times(3), Money::from_rupiah(795_000));
        assert_eq!(base * 2, Money::from_rupiah(500_000));

        let total: Money = [base, delta, Money::ZERO].iter().sum();
        assert_eq!(total, Money::from_rupiah(265_000));
    }

    #[test]
    fn test_gross_amount_rounds_half_up() {
        assert_eq!(Money::new(Decimal::new(1_005, 1)).to_gross_amount(), Some(101));
        assert_eq!(Money::new(Decimal::new(1_004, 1)).to_gross_amount(), Some(100));
        assert_eq!(Money::from_rupiah(75_000).to_gross_amount(), Some(75_000));
    }

    #[test]
    fn test_is_whole() {
        assert!(Money::from_rupiah(250_000).is_whole());
        assert!(Money::new(Decimal::new(25_000_000, 2)).is_whole());
        assert!(!Money::new(Decimal::new(25_000_050, 2)).is_whole());
    }

    #[test]
    fn test_serde_accepts_numbers_and_strings() {
        let from_number: Money = serde_json::from_str("125000").unwrap();
        let from_string: Money = serde_json::from_str("\"125000.00\"").unwrap();
        assert_eq!(from_number, from_string);
    }
}
