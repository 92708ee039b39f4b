use super::audit::AuditEntry;
use super::booking::{Booking, BookingFilter, PaymentMethod};
use super::package::{Package, PackagePatch, PackageQuery};
use super::page::{Page, PageRequest};
use super::user::{Role, User};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn create(&self, package: Package) -> Result<Package>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Package>>;
    /// Merges `patch` into the stored package as one atomic step, so seats
    /// reserved concurrently are not overwritten. Returns `None` when the
    /// package does not exist.
    async fn update(
        &self,
        id: Uuid,
        patch: &PackagePatch,
        performed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Package>>;
    async fn delete(&self, id: Uuid) -> Result<Option<Package>>;
    /// Atomically takes `seats` from the package if at least that many are
    /// available. Returns the updated package, or `None` when the package is
    /// missing or short on seats (nothing is consumed in that case).
    async fn reserve_seats(&self, id: Uuid, seats: u32) -> Result<Option<Package>>;
    /// Matching packages, newest first.
    async fn search(&self, query: &PackageQuery, page: PageRequest) -> Result<Page<Package>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Package>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: User) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    /// Users newest first.
    async fn list(&self, page: PageRequest) -> Result<Page<User>>;
    async fn count(&self) -> Result<usize>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>>;
    async fn update_default_payment(
        &self,
        id: Uuid,
        method: PaymentMethod,
        label: &str,
    ) -> Result<Option<User>>;
    async fn delete(&self, id: Uuid) -> Result<Option<User>>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create(&self, booking: Booking) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    /// Writes `booking` only if the stored version still equals
    /// `booking.version`, then bumps the version.
    ///
    /// Fails with `NotFoundError` for an unknown booking and `ConflictError`
    /// when the stored record moved on since it was read.
    async fn update(&self, booking: Booking) -> Result<Booking>;
    /// Bookings owned by `user_id`, newest first.
    async fn find_by_user(
        &self,
        user_id: Uuid,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<Booking>>;
    /// All bookings, newest first.
    async fn find_all(&self, filter: BookingFilter, page: PageRequest) -> Result<Page<Booking>>;
    /// Every booking matching `filter`, unpaginated. Feeds analytics.
    async fn scan(&self, filter: BookingFilter) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<()>;
    /// Entries newest first.
    async fn list(&self, page: PageRequest) -> Result<Page<AuditEntry>>;
}

pub type PackageStoreRef = Arc<dyn PackageStore>;
pub type UserStoreRef = Arc<dyn UserStore>;
pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type AuditStoreRef = Arc<dyn AuditStore>;
