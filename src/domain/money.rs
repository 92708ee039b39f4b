use crate::error::TravelError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative monetary value in the catalog's single currency.
///
/// Wraps `rust_decimal::Decimal` so fares are computed without floating point
/// drift and a negative price can never enter the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, TravelError> {
        if value >= Decimal::ZERO {
            Ok(Self(value.normalize()))
        } else {
            Err(TravelError::ValidationError(
                "price must be a valid non-negative number".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::new(value).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = TravelError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn overflow() -> TravelError {
    TravelError::ValidationError("amount exceeds the supported range".to_string())
}

impl Money {
    pub fn checked_add(self, rhs: Self) -> Result<Self, TravelError> {
        self.0
            .checked_add(rhs.0)
            .map(|v| Self(v.normalize()))
            .ok_or_else(overflow)
    }

    /// Scales by a non-negative factor such as a traveller count.
    pub fn checked_scale(self, factor: Decimal) -> Result<Self, TravelError> {
        if factor < Decimal::ZERO {
            return Err(TravelError::ValidationError(
                "multiplier must not be negative".to_string(),
            ));
        }
        self.0
            .checked_mul(factor)
            .map(|v| Self(v.normalize()))
            .ok_or_else(overflow)
    }

    /// Sums amounts, failing instead of wrapping or panicking on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Result<Self, TravelError> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, m| acc.checked_add(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_validation() {
        assert!(Money::new(dec!(0)).is_ok());
        assert!(Money::new(dec!(1000.50)).is_ok());
        assert!(matches!(
            Money::new(dec!(-0.01)),
            Err(TravelError::ValidationError(_))
        ));
    }

    #[test]
    fn test_money_arithmetic() {
        let price = Money::new(dec!(1000)).unwrap();
        assert_eq!(price.checked_scale(dec!(2)).unwrap(), Money::new(dec!(2000)).unwrap());
        assert_eq!(price.checked_scale(dec!(0.5)).unwrap(), Money::new(dec!(500)).unwrap());
        assert_eq!(
            price.checked_add(Money::new(dec!(250)).unwrap()).unwrap(),
            Money::new(dec!(1250)).unwrap()
        );
        assert_eq!(
            Money::checked_sum([price, price, Money::ZERO]).unwrap(),
            Money::new(dec!(2000)).unwrap()
        );
    }

    #[test]
    fn test_money_overflow_and_negative_factor_are_errors() {
        let max = Money::new(Decimal::MAX).unwrap();
        assert!(matches!(
            max.checked_scale(dec!(2)),
            Err(TravelError::ValidationError(_))
        ));
        assert!(matches!(
            max.checked_add(Money::new(dec!(1)).unwrap()),
            Err(TravelError::ValidationError(_))
        ));
        assert!(Money::checked_sum([max, max]).is_err());
        assert!(Money::new(dec!(10)).unwrap().checked_scale(dec!(-1)).is_err());
    }

    #[test]
    fn test_money_rejects_negative_json() {
        let parsed: Result<Money, _> = serde_json::from_str("\"-5\"");
        assert!(parsed.is_err());

        let parsed: Money = serde_json::from_str("\"5000\"").unwrap();
        assert_eq!(parsed, Money::new(dec!(5000)).unwrap());
    }
}
