//! Fixed-point money type with 4 decimal places precision.
//!
//! Uses `rust_decimal` internally with scale enforcement so that conservation
//! and scaling checks can use exact equality instead of float tolerances.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// A monetary amount that maintains exactly 4 decimal places of precision.
///
/// The smallest representable step (`0.0001`) is the ledger's minor unit.
/// Values may be negative; only signed real-time updates use that.
///
/// Checked arithmetic stays within `-MAX..=MAX`, where scale 4 always fits
/// in a `Decimal` mantissa.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use wallet_ledger::Amount;
///
/// let amount = Amount::from_str("10.5").unwrap();
/// assert_eq!(amount.to_string(), "10.5000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 4;

    /// Zero value.
    pub const ZERO: Self = Amount(Decimal::ZERO);

    /// Largest magnitude produced by parsing or checked arithmetic (10^24).
    pub const MAX: Self = Amount(Decimal::from_parts(
        0x1000_0000,
        0x3E25_0261,
        0x204F_CE5E,
        false,
        Self::SCALE,
    ));

    /// Creates a new `Amount` from a `Decimal`, normalizing to 4 decimal places.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value;
        normalized.rescale(Self::SCALE);
        Amount(normalized)
    }

    /// Returns the underlying decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Strictly less than zero.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Amount(self.0.abs())
    }

    /// `None` if `value` lies outside `-MAX..=MAX`.
    fn bounded(value: Decimal) -> Option<Self> {
        (value.abs() <= Self::MAX.0).then(|| Amount::new(value))
    }

    /// Adds two amounts, returning `None` if the sum leaves `-MAX..=MAX`.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).and_then(Amount::bounded)
    }

    /// Subtracts two amounts, returning `None` if the result leaves `-MAX..=MAX`.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).and_then(Amount::bounded)
    }

    /// Multiplies by `rate` and rounds the product half-to-even back to 4 places.
    ///
    /// This is the interest rounding rule: `balance.scaled_by(rate)` is the
    /// interest credited for one accrual. Returns `None` if the product
    /// leaves `-MAX..=MAX`.
    pub fn scaled_by(self, rate: Decimal) -> Option<Self> {
        self.0.checked_mul(rate).and_then(|product| {
            Amount::bounded(
                product.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointNearestEven),
            )
        })
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount::new(Decimal::from(value))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    /// Rejects values outside `-MAX..=MAX`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed)?;
        Amount::bounded(decimal).ok_or(if decimal.is_sign_negative() {
            rust_decimal::Error::LessThanMinimumPossibleValue
        } else {
            rust_decimal::Error::ExceedsMaximumPossibleValue
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = self.0.scale();
        if scale >= Self::SCALE {
            return write!(f, "{:.4}", self.0);
        }
        // Only values past MAX end up here. Pad by hand: fixed-precision
        // formatting overruns rust_decimal's buffer at this many digits.
        write!(f, "{}", self.0)?;
        if scale == 0 {
            f.write_str(".")?;
        }
        for _ in scale..Self::SCALE {
            f.write_str("0")?;
        }
        Ok(())
    }
}

// The operators below panic outside the `Decimal` range. Ledger balances
// and their total stay within `MAX`, so sums of them cannot.

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount::new(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
