use super::audit::AuditRecorder;
use super::{Stores, lookup_user, require_admin};
use crate::domain::audit::{AuditAction, AuditEntity, AuditEntry, UserSnapshot};
use crate::domain::booking::{BookingFilter, PaymentStatus};
use crate::domain::clock::Clock;
use crate::domain::money::Money;
use crate::domain::page::{Page, PageRequest};
use crate::domain::ports::{BookingStoreRef, PackageStoreRef, UserStoreRef};
use crate::domain::user::{Actor, Role, User};
use crate::error::{Result, TravelError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const TOP_PACKAGES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPackage {
    pub package_id: Uuid,
    pub title: String,
    pub country: String,
    pub bookings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_users: usize,
    pub total_bookings: usize,
    pub successful_bookings: usize,
    pub total_revenue: Money,
    pub top_packages: Vec<TopPackage>,
}

/// User management, reporting and audit-trail access. Admin only.
pub struct AdminService {
    packages: PackageStoreRef,
    users: UserStoreRef,
    bookings: BookingStoreRef,
    audit: AuditRecorder,
    clock: Arc<dyn Clock>,
}

impl AdminService {
    pub fn new(stores: &Stores, audit: AuditRecorder, clock: Arc<dyn Clock>) -> Self {
        Self {
            packages: stores.packages.clone(),
            users: stores.users.clone(),
            bookings: stores.bookings.clone(),
            audit,
            clock,
        }
    }

    pub async fn users(&self, admin: Actor, page: PageRequest) -> Result<Page<User>> {
        require_admin(&admin)?;
        self.users.list(page).await
    }

    pub async fn update_user_role(&self, admin: Actor, target: Uuid, role: Role) -> Result<User> {
        require_admin(&admin)?;
        let existing = self
            .users
            .find_by_id(target)
            .await?
            .ok_or(TravelError::NotFoundError("User"))?;

        let updated = self
            .users
            .update_role(target, role)
            .await?
            .ok_or(TravelError::NotFoundError("User"))?;
        info!(user_id = %target, from = %existing.role, to = %role, "user role changed");

        let entry = AuditEntry::new(
            AuditAction::UpdateUserRole,
            AuditEntity::User,
            target,
            self.performer(admin).await,
            self.clock.now(),
        )
        .with_old(UserSnapshot::from(&existing))
        .with_new(UserSnapshot::from(&updated));
        self.audit.record(entry).await?;

        Ok(updated)
    }

    pub async fn delete_user(&self, admin: Actor, target: Uuid) -> Result<User> {
        require_admin(&admin)?;
        if target == admin.user_id {
            return Err(TravelError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }
        let performed_by = self.performer(admin).await;

        let removed = self
            .users
            .delete(target)
            .await?
            .ok_or(TravelError::NotFoundError("User"))?;
        info!(user_id = %target, "user deleted");

        let entry = AuditEntry::new(
            AuditAction::DeleteUser,
            AuditEntity::User,
            target,
            performed_by,
            self.clock.now(),
        )
        .with_old(UserSnapshot::from(&removed));
        self.audit.record(entry).await?;

        Ok(removed)
    }

    pub async fn analytics(&self, admin: Actor) -> Result<Analytics> {
        require_admin(&admin)?;
        let total_users = self.users.count().await?;
        let all = self.bookings.scan(BookingFilter::default()).await?;
        let paid: Vec<_> = all
            .iter()
            .filter(|b| b.payment_status() == PaymentStatus::Success)
            .collect();

        let total_revenue = Money::checked_sum(paid.iter().map(|b| b.total_amount()))?;

        let mut per_package: HashMap<Uuid, usize> = HashMap::new();
        for booking in &paid {
            *per_package.entry(booking.package_id).or_default() += 1;
        }
        let mut ranked: Vec<(Uuid, usize)> = per_package.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(TOP_PACKAGES);

        let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
        let packages: HashMap<Uuid, _> = self
            .packages
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        // Packages deleted since they were booked drop out of the ranking.
        let top_packages = ranked
            .into_iter()
            .filter_map(|(id, bookings)| {
                packages.get(&id).map(|p| TopPackage {
                    package_id: id,
                    title: p.title.clone(),
                    country: p.country.clone(),
                    bookings,
                })
            })
            .collect();

        Ok(Analytics {
            total_users,
            total_bookings: all.len(),
            successful_bookings: paid.len(),
            total_revenue,
            top_packages,
        })
    }

    pub async fn audit_logs(&self, admin: Actor, page: PageRequest) -> Result<Page<AuditEntry>> {
        require_admin(&admin)?;
        self.audit.entries(page).await
    }

    async fn performer(&self, admin: Actor) -> String {
        let user = lookup_user(&self.users, admin.user_id).await;
        admin.performed_by(user.as_ref())
    }
}
