#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use skytravels::application::config::{AuditPolicy, ServiceConfig};
use skytravels::application::{Services, Stores};
use skytravels::domain::audit::AuditEntry;
use skytravels::domain::clock::{Clock, FixedClock};
use skytravels::domain::money::Money;
use skytravels::domain::package::{Package, PackageDraft};
use skytravels::domain::page::{Page, PageRequest};
use skytravels::domain::ports::AuditStore;
use skytravels::domain::user::{Role, User};
use skytravels::error::{Result, TravelError};
use skytravels::infrastructure::in_memory::{
    InMemoryAuditStore, InMemoryBookingStore, InMemoryPackageStore, InMemoryUserStore,
};
use std::sync::Arc;

/// A set of services over fresh in-memory stores and a frozen clock.
pub struct Harness {
    pub services: Services,
    pub stores: Stores,
    pub audit: InMemoryAuditStore,
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
}

/// A date safely after [`now`].
pub const TRAVEL_DATE: &str = "2025-03-15";

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(now()))
}

pub fn harness() -> Harness {
    harness_with(AuditPolicy::BestEffort)
}

pub fn harness_with(policy: AuditPolicy) -> Harness {
    let audit = InMemoryAuditStore::new();
    let stores = Stores {
        packages: Arc::new(InMemoryPackageStore::new()),
        users: Arc::new(InMemoryUserStore::new()),
        bookings: Arc::new(InMemoryBookingStore::new()),
        audit: Arc::new(audit.clone()),
    };
    let services = Services::new(
        stores.clone(),
        ServiceConfig {
            audit_policy: policy,
        },
        clock(),
    );
    Harness {
        services,
        stores,
        audit,
    }
}

/// Services whose audit store rejects every append.
pub fn harness_with_failing_audit(policy: AuditPolicy) -> (Services, Stores) {
    let stores = Stores {
        packages: Arc::new(InMemoryPackageStore::new()),
        users: Arc::new(InMemoryUserStore::new()),
        bookings: Arc::new(InMemoryBookingStore::new()),
        audit: Arc::new(FailingAuditStore),
    };
    let services = Services::new(
        stores.clone(),
        ServiceConfig {
            audit_policy: policy,
        },
        clock(),
    );
    (services, stores)
}

pub fn draft(price: Decimal, seats: u32) -> PackageDraft {
    PackageDraft {
        title: "Goa Beach Retreat".to_string(),
        country: "India".to_string(),
        duration: "4 Days / 3 Nights".to_string(),
        price: Money::new(price).unwrap(),
        destinations: vec!["Panaji".to_string(), "Calangute".to_string()],
        images: vec![
            "https://img.example.com/goa-1.jpg".to_string(),
            "https://img.example.com/goa-2.jpg".to_string(),
        ],
        itinerary: vec![
            "Arrival and sunset cruise".to_string(),
            "North Goa beaches".to_string(),
            "Departure".to_string(),
        ],
        description: "Sun, sand and seafood".to_string(),
        total_seats: seats,
        available_seats: None,
    }
}

pub async fn seed_package(stores: &Stores, price: Decimal, seats: u32) -> Package {
    let package = Package::from_draft(draft(price, seats), "SYSTEM", now()).unwrap();
    stores.packages.create(package).await.unwrap()
}

pub async fn seed_user(stores: &Stores, name: &str, email: &str, role: Role) -> User {
    let user = User::new(name, email, role, now()).unwrap();
    stores.users.create(user).await.unwrap()
}

pub struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, _entry: AuditEntry) -> Result<()> {
        Err(TravelError::IoError(std::io::Error::other(
            "audit store unavailable",
        )))
    }

    async fn list(&self, _page: PageRequest) -> Result<Page<AuditEntry>> {
        Ok(PageRequest::default().slice(Vec::new()))
    }
}
