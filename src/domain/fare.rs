use super::money::Money;
use crate::error::TravelError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Children travel at half the package price.
pub const CHILD_FARE_MULTIPLIER: Decimal = dec!(0.5);

/// Decomposition of a booking's total price into its adult and child parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakup {
    pub adult_fare: Money,
    pub child_fare: Money,
    pub child_multiplier: Decimal,
    pub total_amount: Money,
}

/// Computes the fare for a party of travellers at the given unit price.
///
/// `adult_fare = adults * price`, `child_fare = children * price * 0.5` and the
/// total is their sum. Negative counts and amounts too large for `Decimal`
/// are rejected as validation errors.
pub fn compute_fare(adults: i64, children: i64, unit_price: Money) -> Result<FareBreakup, TravelError> {
    if adults < 0 || children < 0 {
        return Err(TravelError::ValidationError(
            "traveller counts must not be negative".to_string(),
        ));
    }

    let adult_fare = unit_price.checked_scale(Decimal::from(adults))?;
    let child_fare = unit_price
        .checked_scale(Decimal::from(children))?
        .checked_scale(CHILD_FARE_MULTIPLIER)?;

    Ok(FareBreakup {
        adult_fare,
        child_fare,
        child_multiplier: CHILD_FARE_MULTIPLIER,
        total_amount: adult_fare.checked_add(child_fare)?,
    })
}
