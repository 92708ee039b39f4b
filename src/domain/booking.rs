use super::fare::{FareBreakup, compute_fare};
use super::money::Money;
use super::package::Package;
use crate::error::TravelError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_ADULTS: i64 = 20;
pub const MAX_CHILDREN: i64 = 20;
pub const MAX_TRAVELLERS: i64 = 20;
pub const MIN_PAYMENT_LABEL_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "CC")]
    CreditCard,
    #[serde(rename = "DC")]
    DebitCard,
    #[serde(rename = "UPI")]
    Upi,
    #[serde(rename = "NETBANKING")]
    NetBanking,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CC",
            PaymentMethod::DebitCard => "DC",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::NetBanking => "NETBANKING",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = TravelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CC" => Ok(PaymentMethod::CreditCard),
            "DC" => Ok(PaymentMethod::DebitCard),
            "UPI" => Ok(PaymentMethod::Upi),
            "NETBANKING" => Ok(PaymentMethod::NetBanking),
            _ => Err(TravelError::ValidationError(
                "Invalid payment method".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

/// Booking progression. Variant order is the lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    AwaitingPayment,
    AwaitingAdminConfirmation,
    Confirmed,
}

impl FromStr for PaymentStatus {
    type Err = TravelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            _ => Err(TravelError::ValidationError(
                "Invalid payment status".to_string(),
            )),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = TravelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AWAITING_PAYMENT" => Ok(BookingStatus::AwaitingPayment),
            "AWAITING_ADMIN_CONFIRMATION" => Ok(BookingStatus::AwaitingAdminConfirmation),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            _ => Err(TravelError::ValidationError(
                "Invalid booking status".to_string(),
            )),
        }
    }
}

/// Every `(from, to)` booking status change a transition may perform.
pub const TRANSITION_TABLE: [(BookingStatus, BookingStatus); 2] = [
    (
        BookingStatus::AwaitingPayment,
        BookingStatus::AwaitingAdminConfirmation,
    ),
    (
        BookingStatus::AwaitingAdminConfirmation,
        BookingStatus::Confirmed,
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub method: PaymentMethod,
    pub label: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub confirmed_at: DateTime<Utc>,
    pub confirmed_by: String,
}

/// The lifecycle position of a booking.
///
/// Payment and booking status are derived from the variant, so only the legal
/// combinations can be represented:
///
/// | variant                     | payment | booking                       |
/// |-----------------------------|---------|-------------------------------|
/// | `AwaitingPayment`           | PENDING | AWAITING_PAYMENT              |
/// | `PaymentFailed`             | FAILED  | AWAITING_PAYMENT              |
/// | `AwaitingAdminConfirmation` | SUCCESS | AWAITING_ADMIN_CONFIRMATION   |
/// | `Confirmed`                 | SUCCESS | CONFIRMED                     |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingState {
    AwaitingPayment,
    PaymentFailed,
    AwaitingAdminConfirmation {
        payment: PaymentReceipt,
    },
    Confirmed {
        payment: PaymentReceipt,
        confirmation: Confirmation,
    },
}

impl BookingState {
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            BookingState::AwaitingPayment => PaymentStatus::Pending,
            BookingState::PaymentFailed => PaymentStatus::Failed,
            BookingState::AwaitingAdminConfirmation { .. } | BookingState::Confirmed { .. } => {
                PaymentStatus::Success
            }
        }
    }

    pub fn booking_status(&self) -> BookingStatus {
        match self {
            BookingState::AwaitingPayment | BookingState::PaymentFailed => {
                BookingStatus::AwaitingPayment
            }
            BookingState::AwaitingAdminConfirmation { .. } => {
                BookingStatus::AwaitingAdminConfirmation
            }
            BookingState::Confirmed { .. } => BookingStatus::Confirmed,
        }
    }

    pub fn payment(&self) -> Option<&PaymentReceipt> {
        match self {
            BookingState::AwaitingAdminConfirmation { payment }
            | BookingState::Confirmed { payment, .. } => Some(payment),
            _ => None,
        }
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        match self {
            BookingState::Confirmed { confirmation, .. } => Some(confirmation),
            _ => None,
        }
    }
}

/// Result of driving a transition on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The booking already sits at the transition's terminal condition.
    AlreadyApplied,
}

/// Validated traveller counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Travellers {
    adults: u32,
    children: u32,
}

impl Travellers {
    pub fn new(adults: i64, children: i64) -> Result<Self, TravelError> {
        if !(1..=MAX_ADULTS).contains(&adults) {
            return Err(TravelError::ValidationError(format!(
                "adults must be an integer between 1 and {}",
                MAX_ADULTS
            )));
        }
        if !(0..=MAX_CHILDREN).contains(&children) {
            return Err(TravelError::ValidationError(format!(
                "children must be an integer between 0 and {}",
                MAX_CHILDREN
            )));
        }
        if !(1..=MAX_TRAVELLERS).contains(&(adults + children)) {
            return Err(TravelError::ValidationError(format!(
                "total travellers must be between 1 and {}",
                MAX_TRAVELLERS
            )));
        }
        // Both counts are within 0..=20 here.
        Ok(Self {
            adults: adults as u32,
            children: children as u32,
        })
    }

    pub fn adults(&self) -> u32 {
        self.adults
    }

    pub fn children(&self) -> u32 {
        self.children
    }

    pub fn seats(&self) -> u32 {
        self.adults + self.children
    }
}

/// Parses a travel date (RFC 3339 timestamp or `YYYY-MM-DD`, read as UTC
/// midnight) and requires it to lie strictly after `now`.
pub fn parse_travel_date(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TravelError> {
    let input = input.trim();
    let parsed = DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        });

    match parsed {
        Some(date) if date > now => Ok(date),
        _ => Err(TravelError::ValidationError(
            "travelDate must be a valid future date".to_string(),
        )),
    }
}

/// Trims and validates the payment label shown back to the traveller.
pub fn normalize_payment_label(label: &str) -> Result<String, TravelError> {
    let label = label.trim();
    if label.chars().count() < MIN_PAYMENT_LABEL_LEN {
        return Err(TravelError::ValidationError(
            "Payment details are required".to_string(),
        ));
    }
    Ok(label.to_string())
}

/// A seat reservation on a package and its progress towards confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub adults: u32,
    pub children: u32,
    pub seats_booked: u32,
    pub travel_date: DateTime<Utc>,
    pub fare_breakup: FareBreakup,
    pub state: BookingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every successful update.
    pub version: u64,
}

impl Booking {
    /// Builds the initial `AWAITING_PAYMENT` booking priced at `package`'s
    /// current price. Fails when the fare cannot be represented.
    pub fn reserve(
        user_id: Uuid,
        package: &Package,
        travellers: Travellers,
        travel_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, TravelError> {
        let fare_breakup = compute_fare(
            i64::from(travellers.adults()),
            i64::from(travellers.children()),
            package.price,
        )?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            package_id: package.id,
            adults: travellers.adults(),
            children: travellers.children(),
            seats_booked: travellers.seats(),
            travel_date,
            fare_breakup,
            state: BookingState::AwaitingPayment,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn total_amount(&self) -> Money {
        self.fare_breakup.total_amount
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.state.payment_status()
    }

    pub fn booking_status(&self) -> BookingStatus {
        self.state.booking_status()
    }

    /// Records a successful payment.
    ///
    /// A booking that is already paid is left untouched so that a retried
    /// payment never produces a second transaction.
    pub fn pay(&mut self, receipt: PaymentReceipt) -> Result<Transition, TravelError> {
        match &self.state {
            BookingState::AwaitingPayment | BookingState::PaymentFailed => {
                let now = receipt.completed_at;
                self.advance(
                    BookingState::AwaitingAdminConfirmation { payment: receipt },
                    now,
                )?;
                Ok(Transition::Applied)
            }
            BookingState::AwaitingAdminConfirmation { .. } | BookingState::Confirmed { .. } => {
                Ok(Transition::AlreadyApplied)
            }
        }
    }

    /// Admin confirmation of a paid booking.
    pub fn confirm(&mut self, confirmation: Confirmation) -> Result<Transition, TravelError> {
        match &self.state {
            BookingState::AwaitingPayment | BookingState::PaymentFailed => Err(
                TravelError::ValidationError("Only paid bookings can be confirmed".to_string()),
            ),
            BookingState::AwaitingAdminConfirmation { payment } => {
                let now = confirmation.confirmed_at;
                let payment = payment.clone();
                self.advance(
                    BookingState::Confirmed {
                        payment,
                        confirmation,
                    },
                    now,
                )?;
                Ok(Transition::Applied)
            }
            BookingState::Confirmed { .. } => Ok(Transition::AlreadyApplied),
        }
    }

    fn advance(&mut self, next: BookingState, now: DateTime<Utc>) -> Result<(), TravelError> {
        let edge = (self.booking_status(), next.booking_status());
        if !TRANSITION_TABLE.contains(&edge) {
            return Err(TravelError::ConflictError(format!(
                "illegal booking transition {:?} -> {:?}",
                edge.0, edge.1
            )));
        }
        if self.payment_status() == PaymentStatus::Success
            && next.payment_status() != PaymentStatus::Success
        {
            return Err(TravelError::ConflictError(
                "a successful payment cannot be reverted".to_string(),
            ));
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Optional status filters for booking listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub payment_status: Option<PaymentStatus>,
    pub booking_status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.payment_status
            .is_none_or(|status| booking.payment_status() == status)
            && self
                .booking_status
                .is_none_or(|status| booking.booking_status() == status)
    }
}
