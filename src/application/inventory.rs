use crate::domain::package::Package;
use crate::domain::ports::PackageStoreRef;
use crate::error::{Result, TravelError};
use uuid::Uuid;

/// Guards each package's remaining seat count.
///
/// Seats only leave inventory through [`SeatInventory::reserve`], which relies
/// on the store's single conditional decrement. There is no release path:
/// seats held by an unpaid booking stay held.
#[derive(Clone)]
pub struct SeatInventory {
    packages: PackageStoreRef,
}

impl SeatInventory {
    pub fn new(packages: PackageStoreRef) -> Self {
        Self { packages }
    }

    /// Takes `seats` from the package when enough remain.
    ///
    /// `Ok(None)` means the reservation was refused and nothing was consumed.
    pub async fn reserve(&self, package_id: Uuid, seats: u32) -> Result<Option<Package>> {
        if seats == 0 {
            return Err(TravelError::ValidationError(
                "at least one seat must be reserved".to_string(),
            ));
        }
        self.packages.reserve_seats(package_id, seats).await
    }

    pub async fn available(&self, package_id: Uuid) -> Result<Option<u32>> {
        Ok(self
            .packages
            .find_by_id(package_id)
            .await?
            .map(|p| p.available_seats))
    }
}
