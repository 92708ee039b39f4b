use crate::domain::audit::AuditEntry;
use crate::domain::booking::{Booking, BookingFilter, PaymentMethod};
use crate::domain::package::{Package, PackagePatch, PackageQuery};
use crate::domain::page::{Page, PageRequest};
use crate::domain::ports::{AuditStore, BookingStore, PackageStore, UserStore};
use crate::domain::user::{Role, User};
use crate::error::{Result, TravelError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory package store.
///
/// Seat reservations check and decrement under a single write-lock guard,
/// which makes them atomic with respect to every other store operation.
#[derive(Default, Clone)]
pub struct InMemoryPackageStore {
    packages: Arc<RwLock<HashMap<Uuid, Package>>>,
}

impl InMemoryPackageStore {
    /// Creates a new, empty in-memory package store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageStore for InMemoryPackageStore {
    async fn create(&self, package: Package) -> Result<Package> {
        let mut packages = self.packages.write().await;
        packages.insert(package.id, package.clone());
        Ok(package)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Package>> {
        let packages = self.packages.read().await;
        Ok(packages.get(&id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &PackagePatch,
        performed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Package>> {
        let mut packages = self.packages.write().await;
        let Some(slot) = packages.get_mut(&id) else {
            return Ok(None);
        };
        let merged = slot.merged(patch, performed_by, now)?;
        *slot = merged.clone();
        Ok(Some(merged))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Package>> {
        let mut packages = self.packages.write().await;
        Ok(packages.remove(&id))
    }

    async fn reserve_seats(&self, id: Uuid, seats: u32) -> Result<Option<Package>> {
        let mut packages = self.packages.write().await;
        let Some(pkg) = packages.get_mut(&id) else {
            return Ok(None);
        };
        if pkg.try_reserve(seats) {
            Ok(Some(pkg.clone()))
        } else {
            Ok(None)
        }
    }

    async fn search(&self, query: &PackageQuery, page: PageRequest) -> Result<Page<Package>> {
        let packages = self.packages.read().await;
        let mut matching: Vec<Package> = packages
            .values()
            .filter(|p| p.matches(query))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page.slice(matching))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Package>> {
        let packages = self.packages.read().await;
        Ok(ids.iter().filter_map(|id| packages.get(id).cloned()).collect())
    }
}

/// A thread-safe in-memory user store.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(TravelError::ConflictError(
                "Email is already registered".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn list(&self, page: PageRequest) -> Result<Page<User>> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page.slice(all))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.users.read().await.len())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn update_default_payment(
        &self,
        id: Uuid,
        method: PaymentMethod,
        label: &str,
    ) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.default_payment_method = Some(method);
            user.default_payment_label = Some(label.trim().to_string());
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.remove(&id))
    }
}

/// A thread-safe in-memory booking store with version-checked updates.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn matching(&self, pred: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let bookings = self.bookings.read().await;
        let mut found: Vec<Booking> = bookings.values().filter(|b| pred(b)).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        found
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, booking: Booking) -> Result<Booking> {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&id).cloned())
    }

    async fn update(&self, mut booking: Booking) -> Result<Booking> {
        let mut bookings = self.bookings.write().await;
        let current = bookings
            .get_mut(&booking.id)
            .ok_or(TravelError::NotFoundError("Booking"))?;
        if current.version != booking.version {
            return Err(TravelError::ConflictError(
                "Booking was modified concurrently".to_string(),
            ));
        }
        booking.version += 1;
        *current = booking.clone();
        Ok(booking)
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<Booking>> {
        let found = self
            .matching(|b| b.user_id == user_id && filter.matches(b))
            .await;
        Ok(page.slice(found))
    }

    async fn find_all(&self, filter: BookingFilter, page: PageRequest) -> Result<Page<Booking>> {
        Ok(page.slice(self.matching(|b| filter.matches(b)).await))
    }

    async fn scan(&self, filter: BookingFilter) -> Result<Vec<Booking>> {
        Ok(self.matching(|b| filter.matches(b)).await)
    }
}

/// An append-only in-memory audit log.
#[derive(Default, Clone)]
pub struct InMemoryAuditStore {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in append order.
    pub async fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<Page<AuditEntry>> {
        let entries = self.entries.read().await;
        let newest_first: Vec<AuditEntry> = entries.iter().rev().cloned().collect();
        Ok(page.slice(newest_first))
    }
}
