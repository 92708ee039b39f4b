//! Application layer containing the booking lifecycle orchestration.
//!
//! Services here coordinate the domain state machine with the storage ports.
//! They are cheap to share behind an `Arc` and are safe to call from many
//! concurrent request handlers: the only shared counter, a package's seat
//! inventory, is mutated exclusively through the store's atomic reservation.

pub mod admin;
pub mod audit;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod inventory;

use crate::domain::clock::Clock;
use crate::domain::ports::{AuditStoreRef, BookingStoreRef, PackageStoreRef, UserStoreRef};
use crate::domain::user::{Actor, User};
use crate::error::{Result, TravelError};
use admin::AdminService;
use audit::AuditRecorder;
use booking::BookingService;
use catalog::PackageService;
use config::ServiceConfig;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// The storage backends a service set runs against.
#[derive(Clone)]
pub struct Stores {
    pub packages: PackageStoreRef,
    pub users: UserStoreRef,
    pub bookings: BookingStoreRef,
    pub audit: AuditStoreRef,
}

pub struct Services {
    pub bookings: BookingService,
    pub catalog: PackageService,
    pub admin: AdminService,
    /// Shared by all three services.
    pub audit: AuditRecorder,
}

impl Services {
    /// Builds the services over one shared audit recorder. With
    /// [`AuditPolicy::Deferred`](config::AuditPolicy::Deferred) this spawns the
    /// audit worker, so call it from within a Tokio runtime.
    pub fn new(stores: Stores, config: ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        let audit = AuditRecorder::new(stores.audit.clone(), config.audit_policy);
        Self {
            bookings: BookingService::new(&stores, audit.clone(), clock.clone()),
            catalog: PackageService::new(&stores, audit.clone(), clock.clone()),
            admin: AdminService::new(&stores, audit.clone(), clock),
            audit,
        }
    }
}

pub(crate) fn require_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        warn!(user_id = %actor.user_id, "admin operation rejected");
        Err(TravelError::AuthorizationError(
            "Admin access required".to_string(),
        ))
    }
}

/// Resolves a user for display purposes only (audit labels, snapshots).
///
/// Runs after the state change is committed, so a lookup failure degrades to
/// an anonymous label instead of failing the operation.
pub(crate) async fn lookup_user(users: &UserStoreRef, id: Uuid) -> Option<User> {
    match users.find_by_id(id).await {
        Ok(user) => user,
        Err(e) => {
            warn!(user_id = %id, error = %e, "user lookup for audit label failed");
            None
        }
    }
}
