use super::booking::{Booking, BookingStatus, PaymentMethod, PaymentStatus};
use super::fare::FareBreakup;
use super::money::Money;
use super::package::Package;
use super::user::{Role, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateBooking,
    PaymentSuccess,
    ConfirmBooking,
    CreatePackage,
    UpdatePackage,
    DeletePackage,
    UpdateUserRole,
    DeleteUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditEntity {
    Booking,
    User,
    Package,
}

/// Flat view of a booking at one point in time, with the owner's contact
/// details resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSnapshot {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub package_id: Uuid,
    pub adults: u32,
    pub children: u32,
    pub seats_booked: u32,
    pub travel_date: DateTime<Utc>,
    pub total_amount: Money,
    pub fare_breakup: FareBreakup,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub transaction_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_label: Option<String>,
    pub payment_completed_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingSnapshot {
    pub fn of(booking: &Booking, owner: Option<&User>) -> Self {
        let payment = booking.state.payment();
        let confirmation = booking.state.confirmation();
        Self {
            booking_id: booking.id,
            user_id: booking.user_id,
            user_name: owner.map(|u| u.name.clone()),
            user_email: owner.map(|u| u.email.clone()),
            package_id: booking.package_id,
            adults: booking.adults,
            children: booking.children,
            seats_booked: booking.seats_booked,
            travel_date: booking.travel_date,
            total_amount: booking.total_amount(),
            fare_breakup: booking.fare_breakup,
            payment_status: booking.payment_status(),
            booking_status: booking.booking_status(),
            transaction_id: payment.map(|p| p.transaction_id.clone()),
            payment_method: payment.map(|p| p.method),
            payment_label: payment.map(|p| p.label.clone()),
            payment_completed_at: payment.map(|p| p.completed_at),
            confirmed_at: confirmation.map(|c| c.confirmed_at),
            confirmed_by: confirmation.map(|c| c.confirmed_by.clone()),
            created_at: booking.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSnapshot {
    pub package_id: Uuid,
    pub title: String,
    pub country: String,
    pub price: Money,
    pub total_seats: u32,
    pub available_seats: u32,
    pub updated_by: String,
}

impl From<&Package> for PackageSnapshot {
    fn from(pkg: &Package) -> Self {
        Self {
            package_id: pkg.id,
            title: pkg.title.clone(),
            country: pkg.country.clone(),
            price: pkg.price,
            total_seats: pkg.total_seats,
            available_seats: pkg.available_seats,
            updated_by: pkg.updated_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSnapshot {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Before/after payload of an audit entry, one shape per entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "UPPERCASE")]
pub enum Snapshot {
    Booking(Box<BookingSnapshot>),
    Package(PackageSnapshot),
    User(UserSnapshot),
}

impl Snapshot {
    pub fn entity(&self) -> AuditEntity {
        match self {
            Snapshot::Booking(_) => AuditEntity::Booking,
            Snapshot::Package(_) => AuditEntity::Package,
            Snapshot::User(_) => AuditEntity::User,
        }
    }

    pub fn as_booking(&self) -> Option<&BookingSnapshot> {
        match self {
            Snapshot::Booking(b) => Some(b.as_ref()),
            _ => None,
        }
    }
}

impl From<BookingSnapshot> for Snapshot {
    fn from(snapshot: BookingSnapshot) -> Self {
        Snapshot::Booking(Box::new(snapshot))
    }
}

impl From<PackageSnapshot> for Snapshot {
    fn from(snapshot: PackageSnapshot) -> Self {
        Snapshot::Package(snapshot)
    }
}

impl From<UserSnapshot> for Snapshot {
    fn from(snapshot: UserSnapshot) -> Self {
        Snapshot::User(snapshot)
    }
}

/// One immutable record in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Time-ordered (UUIDv7), so key order is append order.
    pub id: Uuid,
    pub action: AuditAction,
    pub entity: AuditEntity,
    pub entity_id: String,
    pub performed_by: String,
    pub old_data: Option<Snapshot>,
    pub new_data: Option<Snapshot>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        entity: AuditEntity,
        entity_id: impl ToString,
        performed_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            action,
            entity,
            entity_id: entity_id.to_string(),
            performed_by: performed_by.into(),
            old_data: None,
            new_data: None,
            created_at,
        }
    }

    pub fn with_old(mut self, snapshot: impl Into<Snapshot>) -> Self {
        self.old_data = Some(snapshot.into());
        self
    }

    pub fn with_new(mut self, snapshot: impl Into<Snapshot>) -> Self {
        self.new_data = Some(snapshot.into());
        self
    }
}
