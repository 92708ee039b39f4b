use super::audit::AuditRecorder;
use super::inventory::SeatInventory;
use super::{Stores, lookup_user, require_admin};
use crate::domain::audit::{AuditAction, AuditEntity, AuditEntry, BookingSnapshot};
use crate::domain::booking::{
    Booking, BookingFilter, BookingStatus, Confirmation, PaymentMethod, PaymentReceipt, PaymentStatus,
    Transition, Travellers, normalize_payment_label, parse_travel_date,
};
use crate::domain::clock::Clock;
use crate::domain::package::Package;
use crate::domain::page::{Page, PageRequest};
use crate::domain::ports::{BookingStoreRef, PackageStoreRef, UserStoreRef};
use crate::domain::user::{Actor, PaymentPreference, Role, performed_by};
use crate::error::{Result, TravelError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Input of [`BookingService::create_booking`].
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub adults: i64,
    pub children: i64,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub travel_date: String,
}

/// Input of [`BookingService::simulate_payment`].
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub label: String,
    /// Also store method and label as the actor's default payment preference.
    pub make_default: bool,
}

/// A booking together with the package it reserves, for admin views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub booking: BookingSnapshot,
    pub package: Option<Package>,
}

/// Drives bookings through `AWAITING_PAYMENT -> AWAITING_ADMIN_CONFIRMATION -> CONFIRMED`.
///
/// Every transition follows the same order: validate, mutate the booking (or
/// the seat inventory) in the store, then append one audit entry. Payment and
/// confirmation are idempotent at their terminal condition, so callers may
/// retry any of them after a timeout or a retryable error.
pub struct BookingService {
    packages: PackageStoreRef,
    users: UserStoreRef,
    bookings: BookingStoreRef,
    inventory: SeatInventory,
    audit: AuditRecorder,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(stores: &Stores, audit: AuditRecorder, clock: Arc<dyn Clock>) -> Self {
        Self {
            packages: stores.packages.clone(),
            users: stores.users.clone(),
            bookings: stores.bookings.clone(),
            inventory: SeatInventory::new(stores.packages.clone()),
            audit,
            clock,
        }
    }

    /// Reserves seats on a package and records a booking awaiting payment.
    pub async fn create_booking(&self, request: NewBooking) -> Result<Booking> {
        let now = self.clock.now();
        let travellers = Travellers::new(request.adults, request.children)?;
        let travel_date = parse_travel_date(&request.travel_date, now)?;
        let seats = travellers.seats();

        let package = self
            .packages
            .find_by_id(request.package_id)
            .await?
            .ok_or(TravelError::NotFoundError("Package"))?;

        // Fast, friendly rejection. Not race-safe on its own: the conditional
        // reserve below is what actually guards the counter.
        if package.available_seats < seats {
            warn!(
                package_id = %package.id,
                requested = seats,
                available = package.available_seats,
                "not enough seats"
            );
            return Err(TravelError::CapacityError(format!(
                "Only {} seats are available for this package",
                package.available_seats
            )));
        }

        let owner = self.users.find_by_id(request.user_id).await?;

        // Priced before any seat is taken so a rejected fare leaves inventory alone.
        let booking = Booking::reserve(request.user_id, &package, travellers, travel_date, now)?;

        let reserved = match self.inventory.reserve(package.id, seats).await? {
            Some(pkg) => pkg,
            None => {
                warn!(package_id = %package.id, requested = seats, "seat reservation lost a race");
                return Err(TravelError::CapacityError(
                    "Unable to reserve seats. Please refresh and try again.".to_string(),
                ));
            }
        };

        let booking = match self.bookings.create(booking).await {
            Ok(b) => b,
            Err(e) => {
                error!(
                    package_id = %reserved.id,
                    seats,
                    error = %e,
                    "booking write failed after seats were reserved"
                );
                return Err(e);
            }
        };

        info!(
            booking_id = %booking.id,
            package_id = %booking.package_id,
            seats = booking.seats_booked,
            total = %booking.total_amount(),
            "booking created"
        );

        let entry = AuditEntry::new(
            AuditAction::CreateBooking,
            AuditEntity::Booking,
            booking.id,
            performed_by(Role::User, owner.as_ref(), request.user_id),
            now,
        )
        .with_new(BookingSnapshot::of(&booking, owner.as_ref()));
        self.audit.record(entry).await?;

        Ok(booking)
    }

    /// Marks a booking as paid. Always succeeds for a valid request since the
    /// payment itself is simulated.
    pub async fn simulate_payment(
        &self,
        booking_id: Uuid,
        actor: Actor,
        request: PaymentRequest,
    ) -> Result<Booking> {
        let label = normalize_payment_label(&request.label)?;

        let mut booking = self.load(booking_id).await?;
        if !actor.is_admin() && booking.user_id != actor.user_id {
            warn!(%booking_id, user_id = %actor.user_id, "payment on foreign booking rejected");
            return Err(TravelError::AuthorizationError(
                "You do not have access to this booking".to_string(),
            ));
        }

        if booking.payment_status() == PaymentStatus::Success {
            debug!(%booking_id, "booking already paid");
            return Ok(booking);
        }

        let now = self.clock.now();
        let before = booking.clone();
        let receipt = PaymentReceipt {
            transaction_id: new_transaction_id(now),
            method: request.method,
            label: label.clone(),
            completed_at: now,
        };
        if booking.pay(receipt)? == Transition::AlreadyApplied {
            return Ok(booking);
        }

        let (updated, applied) = self
            .persist(booking, |b| b.payment_status() == PaymentStatus::Success)
            .await?;
        if !applied {
            return Ok(updated);
        }

        info!(
            %booking_id,
            transaction_id = updated.state.payment().map(|p| p.transaction_id.as_str()).unwrap_or_default(),
            method = %request.method,
            "payment recorded"
        );

        if request.make_default
            && let Err(e) = self
                .users
                .update_default_payment(actor.user_id, request.method, &label)
                .await
        {
            error!(user_id = %actor.user_id, error = %e, "failed to store default payment method");
        }

        let owner = lookup_user(&self.users, updated.user_id).await;
        let actor_user = if actor.user_id == updated.user_id {
            owner.clone()
        } else {
            lookup_user(&self.users, actor.user_id).await
        };

        let entry = AuditEntry::new(
            AuditAction::PaymentSuccess,
            AuditEntity::Booking,
            updated.id,
            actor.performed_by(actor_user.as_ref()),
            now,
        )
        .with_old(BookingSnapshot::of(&before, owner.as_ref()))
        .with_new(BookingSnapshot::of(&updated, owner.as_ref()));
        self.audit.record(entry).await?;

        Ok(updated)
    }

    /// Admin confirmation of a paid booking.
    pub async fn confirm_booking(&self, booking_id: Uuid, admin: Actor) -> Result<Booking> {
        require_admin(&admin)?;

        let mut booking = self.load(booking_id).await?;
        let now = self.clock.now();
        let before = booking.clone();
        let confirmation = Confirmation {
            confirmed_at: now,
            confirmed_by: format!("{}:{}", Role::Admin, admin.user_id),
        };

        if booking.confirm(confirmation)? == Transition::AlreadyApplied {
            debug!(%booking_id, "booking already confirmed");
            return Ok(booking);
        }

        let (updated, applied) = self
            .persist(booking, |b| b.booking_status() == BookingStatus::Confirmed)
            .await?;
        if !applied {
            return Ok(updated);
        }

        info!(%booking_id, admin_id = %admin.user_id, "booking confirmed");

        let owner = lookup_user(&self.users, updated.user_id).await;
        let admin_user = lookup_user(&self.users, admin.user_id).await;
        let entry = AuditEntry::new(
            AuditAction::ConfirmBooking,
            AuditEntity::Booking,
            updated.id,
            admin.performed_by(admin_user.as_ref()),
            now,
        )
        .with_old(BookingSnapshot::of(&before, owner.as_ref()))
        .with_new(BookingSnapshot::of(&updated, owner.as_ref()));
        self.audit.record(entry).await?;

        Ok(updated)
    }

    pub async fn booking(&self, booking_id: Uuid, actor: Actor) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if !actor.is_admin() && booking.user_id != actor.user_id {
            return Err(TravelError::AuthorizationError(
                "You do not have access to this booking".to_string(),
            ));
        }
        Ok(booking)
    }

    pub async fn my_bookings(
        &self,
        user_id: Uuid,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<Booking>> {
        self.bookings.find_by_user(user_id, filter, page).await
    }

    pub async fn all_bookings(
        &self,
        admin: Actor,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<Booking>> {
        require_admin(&admin)?;
        self.bookings.find_all(filter, page).await
    }

    pub async fn booking_for_admin(&self, booking_id: Uuid, admin: Actor) -> Result<BookingDetails> {
        require_admin(&admin)?;
        let booking = self.load(booking_id).await?;
        let owner = self.users.find_by_id(booking.user_id).await?;
        let package = self.packages.find_by_id(booking.package_id).await?;
        Ok(BookingDetails {
            booking: BookingSnapshot::of(&booking, owner.as_ref()),
            package,
        })
    }

    pub async fn payment_preference(&self, user_id: Uuid) -> Result<PaymentPreference> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(TravelError::NotFoundError("User"))?;
        Ok(PaymentPreference {
            default_payment_method: user.default_payment_method,
            default_payment_label: user.default_payment_label,
        })
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or(TravelError::NotFoundError("Booking"))
    }

    /// Writes a transitioned booking with a version check.
    ///
    /// When a concurrent writer got there first and the stored booking already
    /// satisfies `reached`, that record is returned with `applied = false` so
    /// the caller neither overwrites it nor audits twice.
    async fn persist(
        &self,
        booking: Booking,
        reached: impl Fn(&Booking) -> bool,
    ) -> Result<(Booking, bool)> {
        let booking_id = booking.id;
        match self.bookings.update(booking).await {
            Ok(updated) => Ok((updated, true)),
            Err(TravelError::ConflictError(msg)) => {
                let current = self.load(booking_id).await?;
                if reached(&current) {
                    debug!(%booking_id, "concurrent transition already applied");
                    Ok((current, false))
                } else {
                    Err(TravelError::ConflictError(msg))
                }
            }
            Err(e) => Err(e),
        }
    }
}

/// Time-based identifier with a random suffix so two payments in the same
/// millisecond still differ.
fn new_transaction_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TXN_{}_{}", now.timestamp_millis(), &suffix[..8]).to_uppercase()
}
