//! Decimal pricing primitives.
//!
//! Prices are plain [`Decimal`] amounts in the storefront's currency
//! (no minor-unit scaling). Promotional discounts are expressed as a
//! validated [`Percent`].

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Percent`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PercentError {
    /// The value is below zero.
    #[error("percentage cannot be negative (got {0})")]
    Negative(Decimal),
    /// The value is above one hundred.
    #[error("percentage cannot exceed 100 (got {0})")]
    TooLarge(Decimal),
}

/// A percentage in the inclusive range `0..=100`.
///
/// ## Examples
///
/// ```
/// use basket_core::Percent;
/// use rust_decimal::Decimal;
///
/// let twenty = Percent::new(Decimal::from(20)).unwrap();
/// assert_eq!(twenty.apply(Decimal::from(89)), Decimal::new(712, 1));
///
/// assert!(Percent::new(Decimal::from(101)).is_err());
/// assert!(Percent::new(Decimal::from(-1)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percent(Decimal);

impl Percent {
    /// Zero percent.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a percentage, rejecting values outside `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns `PercentError` if the value is negative or above 100.
    pub fn new(value: Decimal) -> Result<Self, PercentError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PercentError::Negative(value));
        }
        if value > Decimal::ONE_HUNDRED {
            return Err(PercentError::TooLarge(value));
        }
        Ok(Self(value))
    }

    /// The raw percentage value (e.g. `20` for 20%).
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// The fraction of the original amount that remains after the discount.
    #[must_use]
    pub fn remaining_fraction(&self) -> Decimal {
        Decimal::ONE - self.0 / Decimal::ONE_HUNDRED
    }

    /// Apply this discount to an amount: `amount * (1 - pct / 100)`.
    #[must_use]
    pub fn apply(&self, amount: Decimal) -> Decimal {
        amount * self.remaining_fraction()
    }
}

impl TryFrom<Decimal> for Percent {
    type Error = PercentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percent> for Decimal {
    fn from(pct: Percent) -> Self {
        pct.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_bounds() {
        assert!(Percent::new(Decimal::ZERO).is_ok());
        assert!(Percent::new(Decimal::ONE_HUNDRED).is_ok());
        assert_eq!(
            Percent::new(Decimal::from(150)),
            Err(PercentError::TooLarge(Decimal::from(150)))
        );
        assert_eq!(
            Percent::new(Decimal::from(-5)),
            Err(PercentError::Negative(Decimal::from(-5)))
        );
    }

    #[test]
    fn test_percent_apply_is_exact() {
        let pct = Percent::new(Decimal::from(20)).unwrap();
        // 89 * 3 * 0.8 = 213.6 with no binary rounding
        assert_eq!(pct.apply(Decimal::from(267)), Decimal::new(2136, 1));
    }

    #[test]
    fn test_percent_deserialize_validates() {
        let ok: Percent = serde_json::from_str("15").unwrap();
        assert_eq!(ok.value(), Decimal::from(15));
        assert!(serde_json::from_str::<Percent>("120").is_err());
    }

    #[test]
    fn test_percent_display() {
        let pct = Percent::new(Decimal::new(125, 1)).unwrap();
        assert_eq!(pct.to_string(), "12.5%");
    }
}
