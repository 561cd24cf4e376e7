//! Money primitives
//!
//! Domain primitives for monetary amounts and currency codes.
//! Both are validated at construction time, ensuring invalid values
//! cannot exist in the system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Maximum amount: DECIMAL(12,2) leaves ten integral digits
const MAX_AMOUNT: &str = "9999999999.99";

/// Maximum decimal places
const MAX_SCALE: u32 = 2;

/// Amount represents a validated monetary value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum 2 decimal places
/// - Fits DECIMAL(12,2) storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("invalid amount format: {0}")]
    Parse(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 2 decimal places
    /// - `AmountError::Overflow` if value does not fit DECIMAL(12,2)
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        if value.scale() > MAX_SCALE {
            return Err(AmountError::TooManyDecimals(value.scale()));
        }

        let max = Decimal::from_str(MAX_AMOUNT).expect("Invalid MAX_AMOUNT constant");
        if value > max {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| AmountError::Parse(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// ISO-4217 style currency code: exactly three ASCII uppercase letters.
///
/// The service default is JPY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyError {
    #[error("currency must be a 3-letter code (got {0:?})")]
    Invalid(String),
}

impl Currency {
    pub fn new(code: impl Into<String>) -> Result<Self, CurrencyError> {
        let code = code.into();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(CurrencyError::Invalid(code));
        }
        Ok(Self(code))
    }

    /// The service default currency.
    pub fn jpy() -> Self {
        Self("JPY".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::jpy()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(Decimal::new(1200, 0)).unwrap();
        assert_eq!(amount.value(), Decimal::new(1200, 0));
        assert_eq!(amount.to_string(), "1200.00");
    }

    #[test]
    fn test_amount_rejects_zero_and_negative() {
        assert!(matches!(
            Amount::new(Decimal::ZERO),
            Err(AmountError::NotPositive(_))
        ));
        assert!(matches!(
            Amount::new(Decimal::new(-100, 2)),
            Err(AmountError::NotPositive(_))
        ));
    }

    #[test]
    fn test_amount_scale_limit() {
        assert!(Amount::new(Decimal::new(12345, 2)).is_ok());
        assert!(matches!(
            Amount::new(Decimal::new(12345, 3)),
            Err(AmountError::TooManyDecimals(3))
        ));
    }

    #[test]
    fn test_amount_overflow() {
        let too_big = Decimal::from_str("10000000000.00").unwrap();
        assert!(matches!(Amount::new(too_big), Err(AmountError::Overflow)));

        let max = Decimal::from_str(MAX_AMOUNT).unwrap();
        assert!(Amount::new(max).is_ok());
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Amount = "350.50".parse().unwrap();
        assert_eq!(amount.value(), Decimal::new(35050, 2));

        assert!("abc".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
    }

    #[test]
    fn test_currency_validation() {
        assert_eq!(Currency::new("USD").unwrap().as_str(), "USD");
        assert!(Currency::new("usd").is_err());
        assert!(Currency::new("JPYY").is_err());
        assert!(Currency::new("J1").is_err());
        assert_eq!(Currency::default().as_str(), "JPY");
    }
}
