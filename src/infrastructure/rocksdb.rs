use crate::domain::audit::AuditEntry;
use crate::domain::booking::{Booking, BookingFilter, PaymentMethod};
use crate::domain::package::{Package, PackagePatch, PackageQuery};
use crate::domain::page::{Page, PageRequest};
use crate::domain::ports::{AuditStore, BookingStore, PackageStore, UserStore};
use crate::domain::user::{Role, User};
use crate::error::{Result, TravelError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, OptimisticTransactionDB,
    Options,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Column Family for packages and their seat counters.
pub const CF_PACKAGES: &str = "packages";
/// Column Family for user accounts.
pub const CF_USERS: &str = "users";
/// Column Family mapping a lowercased email to its user id.
pub const CF_USER_EMAILS: &str = "user_emails";
/// Column Family for bookings.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family for the audit trail, keyed by time-ordered entry id.
pub const CF_AUDIT: &str = "audit";

const MAX_COMMIT_ATTEMPTS: usize = 32;

/// A persistent store implementation using RocksDB.
///
/// Every port is served from one optimistic-transaction database with a
/// Column Family per entity. Read-modify-write operations (seat reservation,
/// versioned booking updates) read with `get_for_update` and retry when the
/// commit detects a concurrent writer, so two reservations can never both
/// observe the same seat count.
///
/// This struct is thread-safe (`Clone` shares the underlying database).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<OptimisticTransactionDB>,
}

/// Outcome of one attempt at an atomic update.
enum Step<T> {
    Write(T),
    Skip,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing Column Families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_PACKAGES, CF_USERS, CF_USER_EMAILS, CF_BOOKINGS, CF_AUDIT]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = OptimisticTransactionDB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| TravelError::internal(format!("{name} column family not found")))
    }

    fn put<T: Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn remove<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        let existing = self.get(cf, key)?;
        if existing.is_some() {
            self.db.delete_cf(self.cf(cf)?, key)?;
        }
        Ok(existing)
    }

    fn scan<T: DeserializeOwned>(&self, cf: &'static str, mode: IteratorMode) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, mode) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    /// Reads the value under `key`, lets `apply` decide on a replacement and
    /// commits it in one optimistic transaction.
    ///
    /// Returns `Ok(None)` when the key is missing or `apply` chose to skip.
    /// Commits that lose a race are retried against the fresh value.
    fn update_atomically<T, F>(&self, cf: &'static str, key: &[u8], mut apply: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(T) -> Result<Step<T>>,
    {
        let handle = self.cf(cf)?;
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let txn = self.db.transaction();
            let Some(bytes) = txn.get_for_update_cf(handle, key, true)? else {
                return Ok(None);
            };
            let next = match apply(serde_json::from_slice(&bytes)?)? {
                Step::Write(next) => next,
                Step::Skip => return Ok(None),
            };
            txn.put_cf(handle, key, serde_json::to_vec(&next)?)?;
            match txn.commit() {
                Ok(()) => return Ok(Some(next)),
                Err(e) if matches!(e.kind(), ErrorKind::Busy | ErrorKind::TryAgain) => {
                    debug!(cf, attempt, "optimistic commit lost a race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TravelError::ConflictError(
            "Too many concurrent updates, please retry".to_string(),
        ))
    }

    fn create_user(&self, user: &User) -> Result<()> {
        let emails = self.cf(CF_USER_EMAILS)?;
        let users = self.cf(CF_USERS)?;
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let txn = self.db.transaction();
            if txn
                .get_for_update_cf(emails, user.email.as_bytes(), true)?
                .is_some()
            {
                return Err(TravelError::ConflictError(
                    "Email is already registered".to_string(),
                ));
            }
            txn.put_cf(emails, user.email.as_bytes(), user.id.as_bytes())?;
            txn.put_cf(users, user.id.as_bytes(), serde_json::to_vec(user)?)?;
            match txn.commit() {
                Ok(()) => return Ok(()),
                Err(e) if matches!(e.kind(), ErrorKind::Busy | ErrorKind::TryAgain) => {
                    debug!(attempt, "user registration lost a race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TravelError::ConflictError(
            "Too many concurrent updates, please retry".to_string(),
        ))
    }

    fn bookings_where(&self, pred: impl Fn(&Booking) -> bool) -> Result<Vec<Booking>> {
        let mut found: Vec<Booking> = self
            .scan::<Booking>(CF_BOOKINGS, IteratorMode::Start)?
            .into_iter()
            .filter(|b| pred(b))
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}

#[async_trait]
impl PackageStore for RocksDBStore {
    async fn create(&self, package: Package) -> Result<Package> {
        self.put(CF_PACKAGES, package.id.as_bytes(), &package)?;
        Ok(package)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Package>> {
        self.get(CF_PACKAGES, id.as_bytes())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &PackagePatch,
        performed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Package>> {
        self.update_atomically(CF_PACKAGES, id.as_bytes(), |pkg: Package| {
            pkg.merged(patch, performed_by, now).map(Step::Write)
        })
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Package>> {
        self.remove(CF_PACKAGES, id.as_bytes())
    }

    async fn reserve_seats(&self, id: Uuid, seats: u32) -> Result<Option<Package>> {
        self.update_atomically(CF_PACKAGES, id.as_bytes(), |mut pkg: Package| {
            Ok(if pkg.try_reserve(seats) {
                Step::Write(pkg)
            } else {
                Step::Skip
            })
        })
    }

    async fn search(&self, query: &PackageQuery, page: PageRequest) -> Result<Page<Package>> {
        let mut matching: Vec<Package> = self
            .scan::<Package>(CF_PACKAGES, IteratorMode::Start)?
            .into_iter()
            .filter(|p| p.matches(query))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page.slice(matching))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Package>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(pkg) = self.get(CF_PACKAGES, id.as_bytes())? {
                found.push(pkg);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl UserStore for RocksDBStore {
    async fn create(&self, user: User) -> Result<User> {
        self.create_user(&user)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.get(CF_USERS, id.as_bytes())
    }

    async fn list(&self, page: PageRequest) -> Result<Page<User>> {
        let mut all: Vec<User> = self.scan(CF_USERS, IteratorMode::Start)?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page.slice(all))
    }

    async fn count(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.db.iterator_cf(self.cf(CF_USERS)?, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        self.update_atomically(CF_USERS, id.as_bytes(), |mut user: User| {
            user.role = role;
            Ok(Step::Write(user))
        })
    }

    async fn update_default_payment(
        &self,
        id: Uuid,
        method: PaymentMethod,
        label: &str,
    ) -> Result<Option<User>> {
        self.update_atomically(CF_USERS, id.as_bytes(), |mut user: User| {
            user.default_payment_method = Some(method);
            user.default_payment_label = Some(label.trim().to_string());
            Ok(Step::Write(user))
        })
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>> {
        let removed: Option<User> = self.remove(CF_USERS, id.as_bytes())?;
        if let Some(user) = &removed {
            self.db
                .delete_cf(self.cf(CF_USER_EMAILS)?, user.email.as_bytes())?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn create(&self, booking: Booking) -> Result<Booking> {
        self.put(CF_BOOKINGS, booking.id.as_bytes(), &booking)?;
        Ok(booking)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        self.get(CF_BOOKINGS, id.as_bytes())
    }

    async fn update(&self, booking: Booking) -> Result<Booking> {
        let expected = booking.version;
        let updated = self.update_atomically(CF_BOOKINGS, booking.id.as_bytes(), |current: Booking| {
            if current.version != expected {
                return Err(TravelError::ConflictError(
                    "Booking was modified concurrently".to_string(),
                ));
            }
            let mut next = booking.clone();
            next.version = expected + 1;
            Ok(Step::Write(next))
        })?;
        updated.ok_or(TravelError::NotFoundError("Booking"))
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<Booking>> {
        let found = self.bookings_where(|b| b.user_id == user_id && filter.matches(b))?;
        Ok(page.slice(found))
    }

    async fn find_all(&self, filter: BookingFilter, page: PageRequest) -> Result<Page<Booking>> {
        Ok(page.slice(self.bookings_where(|b| filter.matches(b))?))
    }

    async fn scan(&self, filter: BookingFilter) -> Result<Vec<Booking>> {
        self.bookings_where(|b| filter.matches(b))
    }
}

#[async_trait]
impl AuditStore for RocksDBStore {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        // v7 ids sort by creation time, so key order is append order.
        self.put(CF_AUDIT, entry.id.as_bytes(), &entry)
    }

    async fn list(&self, page: PageRequest) -> Result<Page<AuditEntry>> {
        let newest_first: Vec<AuditEntry> = self.scan(CF_AUDIT, IteratorMode::End)?;
        Ok(page.slice(newest_first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{AuditAction, AuditEntity};
    use crate::domain::booking::Travellers;
    use crate::domain::package::fixtures;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn package(seats: u32) -> Package {
        Package::from_draft(fixtures::draft(dec!(1000), seats), "SYSTEM", Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in [CF_PACKAGES, CF_USERS, CF_USER_EMAILS, CF_BOOKINGS, CF_AUDIT] {
            assert!(store.db.cf_handle(name).is_some(), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_rocksdb_package_reservation() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let pkg = PackageStore::create(&store, package(4)).await.unwrap();

        let after = store.reserve_seats(pkg.id, 3).await.unwrap().unwrap();
        assert_eq!(after.available_seats, 1);
        assert!(store.reserve_seats(pkg.id, 2).await.unwrap().is_none());

        let stored = PackageStore::find_by_id(&store, pkg.id).await.unwrap().unwrap();
        assert_eq!(stored.available_seats, 1);
    }

    #[tokio::test]
    async fn test_rocksdb_package_update_keeps_reserved_seats() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let pkg = PackageStore::create(&store, package(4)).await.unwrap();
        store.reserve_seats(pkg.id, 2).await.unwrap();

        let patch = PackagePatch {
            title: Some("Renamed".to_string()),
            ..PackagePatch::default()
        };
        let updated = PackageStore::update(&store, pkg.id, &patch, "ADMIN:Root (1)", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.available_seats, 2);
    }

    #[tokio::test]
    async fn test_rocksdb_booking_versioning() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let now = Utc::now();
        let booking = Booking::reserve(
            Uuid::new_v4(),
            &package(10),
            Travellers::new(2, 0).unwrap(),
            now + Duration::days(5),
            now,
        )
        .unwrap();
        BookingStore::create(&store, booking.clone()).await.unwrap();

        let first = BookingStore::update(&store, booking.clone()).await.unwrap();
        assert_eq!(first.version, 1);
        assert!(matches!(
            BookingStore::update(&store, booking).await,
            Err(TravelError::ConflictError(_))
        ));
    }

    #[tokio::test]
    async fn test_rocksdb_user_email_is_unique() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let user = User::new("Asha Rao", "asha@example.com", Role::User, Utc::now()).unwrap();
        UserStore::create(&store, user.clone()).await.unwrap();

        let dup = User::new("Asha Again", "asha@example.com", Role::User, Utc::now()).unwrap();
        assert!(matches!(
            UserStore::create(&store, dup.clone()).await,
            Err(TravelError::ConflictError(_))
        ));

        // Deleting frees the address again.
        UserStore::delete(&store, user.id).await.unwrap();
        UserStore::create(&store, dup).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_audit_newest_first() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        for i in 0..3 {
            let entry = AuditEntry::new(
                AuditAction::CreatePackage,
                AuditEntity::Package,
                i,
                "SYSTEM",
                Utc::now(),
            );
            store.append(entry).await.unwrap();
        }

        let page = AuditStore::list(&store, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<&str> = page.items.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, ["2", "1", "0"]);
    }
}
