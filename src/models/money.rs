use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{AppError, Result};

/// A validated, non-negative US-dollar amount.
///
/// Amounts arrive as JSON numbers and are rejected at the boundary when they
/// are NaN, infinite, or negative, so the ledger never sees a malformed value.
/// Stored and rendered as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(AppError::invalid_data("amount must be a valid number"));
        }

        let decimal = Decimal::from_f64(value)
            .ok_or_else(|| AppError::invalid_data("amount is out of range"))?;

        if decimal.is_sign_negative() {
            return Err(AppError::invalid_data("amount must not be negative"));
        }

        Ok(Money(decimal.normalize()))
    }

    /// $1 = 1 SMS credit, fractional dollars truncated.
    pub fn credits(&self) -> i64 {
        self.0.floor().to_i64().unwrap_or(0)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Money;
    use rust_decimal_macros::dec;

    #[test]
    fn credits_are_floored_never_rounded() {
        assert_eq!(Money::from_f64(4.99).unwrap().credits(), 4);
        assert_eq!(Money::from_f64(20.0).unwrap().credits(), 20);
        assert_eq!(Money::from_f64(0.5).unwrap().credits(), 0);
        assert_eq!(Money::from_f64(0.0).unwrap().credits(), 0);
        assert_eq!(Money::from_f64(59.999).unwrap().credits(), 59);
    }

    #[test]
    fn rejects_non_finite_amounts() {
        assert!(Money::from_f64(f64::NAN).is_err());
        assert!(Money::from_f64(f64::INFINITY).is_err());
        assert!(Money::from_f64(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn rejects_negative_amounts() {
        assert!(Money::from_f64(-0.01).is_err());
        assert!(Money::from_f64(-20.0).is_err());
    }

    #[test]
    fn normalizes_trailing_zeros() {
        assert_eq!(Money::from_f64(20.0).unwrap().amount(), dec!(20));
        assert_eq!(Money::from_f64(20.0).unwrap().to_string(), "20");
    }

    #[test]
    fn serializes_as_decimal_string() {
        let money = Money::from_f64(4.99).unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"4.99\"");
    }

    #[test]
    fn deserializes_from_string() {
        let money: Money = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(money.credits(), 12);
    }
}
