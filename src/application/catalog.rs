use super::audit::AuditRecorder;
use super::{Stores, lookup_user, require_admin};
use crate::domain::audit::{AuditAction, AuditEntity, AuditEntry, PackageSnapshot};
use crate::domain::clock::Clock;
use crate::domain::package::{Package, PackageDraft, PackagePatch, PackageQuery};
use crate::domain::page::{Page, PageRequest};
use crate::domain::ports::{PackageStoreRef, UserStoreRef};
use crate::domain::user::Actor;
use crate::error::{Result, TravelError};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Package browsing for travellers and package administration for admins.
pub struct PackageService {
    packages: PackageStoreRef,
    users: UserStoreRef,
    audit: AuditRecorder,
    clock: Arc<dyn Clock>,
}

impl PackageService {
    pub fn new(stores: &Stores, audit: AuditRecorder, clock: Arc<dyn Clock>) -> Self {
        Self {
            packages: stores.packages.clone(),
            users: stores.users.clone(),
            audit,
            clock,
        }
    }

    pub async fn search(&self, query: &PackageQuery, page: PageRequest) -> Result<Page<Package>> {
        if let (Some(min), Some(max)) = (query.min_price, query.max_price)
            && min > max
        {
            return Err(TravelError::ValidationError(
                "minPrice must not exceed maxPrice".to_string(),
            ));
        }
        self.packages.search(query, page).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Package> {
        self.packages
            .find_by_id(id)
            .await?
            .ok_or(TravelError::NotFoundError("Package"))
    }

    pub async fn create(&self, actor: Actor, draft: PackageDraft) -> Result<Package> {
        require_admin(&actor)?;
        let performed_by = self.performer(actor).await;
        let now = self.clock.now();

        let package = Package::from_draft(draft, &performed_by, now)?;
        let created = self.packages.create(package).await?;
        info!(package_id = %created.id, title = %created.title, "package created");

        let entry = AuditEntry::new(
            AuditAction::CreatePackage,
            AuditEntity::Package,
            created.id,
            performed_by,
            now,
        )
        .with_new(PackageSnapshot::from(&created));
        self.audit.record(entry).await?;

        Ok(created)
    }

    pub async fn update(&self, actor: Actor, id: Uuid, patch: PackagePatch) -> Result<Package> {
        require_admin(&actor)?;
        let existing = self.get(id).await?;
        let performed_by = self.performer(actor).await;
        let now = self.clock.now();

        let updated = self
            .packages
            .update(id, &patch, &performed_by, now)
            .await?
            .ok_or(TravelError::NotFoundError("Package"))?;
        info!(package_id = %updated.id, "package updated");

        let entry = AuditEntry::new(
            AuditAction::UpdatePackage,
            AuditEntity::Package,
            id,
            performed_by,
            now,
        )
        .with_old(PackageSnapshot::from(&existing))
        .with_new(PackageSnapshot::from(&updated));
        self.audit.record(entry).await?;

        Ok(updated)
    }

    pub async fn delete(&self, actor: Actor, id: Uuid) -> Result<()> {
        require_admin(&actor)?;
        let removed = self
            .packages
            .delete(id)
            .await?
            .ok_or(TravelError::NotFoundError("Package"))?;
        info!(package_id = %id, "package deleted");

        let entry = AuditEntry::new(
            AuditAction::DeletePackage,
            AuditEntity::Package,
            id,
            self.performer(actor).await,
            self.clock.now(),
        )
        .with_old(PackageSnapshot::from(&removed));
        self.audit.record(entry).await
    }

    async fn performer(&self, actor: Actor) -> String {
        let user = lookup_user(&self.users, actor.user_id).await;
        actor.performed_by(user.as_ref())
    }
}
