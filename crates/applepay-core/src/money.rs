//! Money
//!
//! Fixed-point amounts shared by the sheet, the relay and the processor.
//! Every amount crosses a process boundary as a decimal string with exactly
//! two fractional digits. `rust_decimal` only - never use f64 for money!

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CheckoutError, Result};

/// Fractional digits carried by every amount on the wire
pub const AMOUNT_SCALE: u32 = 2;

/// A non-negative monetary amount with two fractional digits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Round half away from zero to two digits; negative values are rejected
    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO {
            return Err(CheckoutError::InvalidAmount(value.to_string()));
        }
        Ok(Self(round2(value)))
    }

    /// Parse a decimal string such as `"10"`, `"5.5"` or `"10.00"`
    pub fn parse(s: &str) -> Result<Self> {
        Self::new(parse_exact(s)?)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount> {
        self.0
            .checked_add(other.0)
            .ok_or_else(|| CheckoutError::InvalidAmount(format!("{} + {} overflows", self, other)))
            .and_then(Amount::new)
    }

    /// Integer amount in the currency's smallest unit.
    ///
    /// `exponent` is the ISO 4217 minor-unit exponent (2 for GBP, 0 for JPY,
    /// 3 for KWD). Returns `None` when the amount has more precision than the
    /// currency can carry or does not fit an `i64`.
    pub fn to_minor_units(&self, exponent: u32) -> Option<i64> {
        let factor = Decimal::from(10i64.checked_pow(exponent)?);
        let scaled = self.0.checked_mul(factor)?;
        if !scaled.fract().is_zero() {
            return None;
        }
        scaled.trunc().to_i64()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        Amount::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Amount::new(value).map_err(serde::de::Error::custom)
    }
}

fn round2(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(AMOUNT_SCALE);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded
}

/// Full-precision, non-negative decimal
fn parse_exact(s: &str) -> Result<Decimal> {
    let value = Decimal::from_str(s.trim()).map_err(|_| CheckoutError::InvalidAmount(s.to_string()))?;
    if value < Decimal::ZERO {
        return Err(CheckoutError::InvalidAmount(s.to_string()));
    }
    Ok(value)
}

/// Sheet total: `round2(subtotal + shipping)` as a two-digit decimal string.
///
/// Operands are summed at full precision and rounded once.
pub fn calculate_total(subtotal: &str, shipping: &str) -> Result<String> {
    let (subtotal, shipping) = (parse_exact(subtotal)?, parse_exact(shipping)?);
    let total = subtotal
        .checked_add(shipping)
        .ok_or_else(|| CheckoutError::InvalidAmount(format!("{} + {} overflows", subtotal, shipping)))?;
    Ok(Amount::new(total)?.to_string())
}
