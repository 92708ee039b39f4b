use super::money::Money;
use crate::error::TravelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A travel package and the seat inventory it owns.
///
/// `available_seats` is only ever lowered through [`Package::try_reserve`],
/// which stores call inside their atomic conditional update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: Uuid,
    pub title: String,
    pub country: String,
    pub duration: String,
    pub price: Money,
    pub destinations: Vec<String>,
    pub images: Vec<String>,
    pub itinerary: Vec<String>,
    pub description: String,
    pub total_seats: u32,
    pub available_seats: u32,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    /// Builds a package from a validated draft. Seats default to full capacity.
    pub fn from_draft(
        draft: PackageDraft,
        performed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, TravelError> {
        let package = Self {
            id: Uuid::new_v4(),
            title: draft.title.trim().to_string(),
            country: draft.country.trim().to_string(),
            duration: draft.duration.trim().to_string(),
            price: draft.price,
            destinations: trim_all(draft.destinations),
            images: trim_all(draft.images),
            itinerary: trim_all(draft.itinerary),
            description: draft.description.trim().to_string(),
            total_seats: draft.total_seats,
            available_seats: draft.available_seats.unwrap_or(draft.total_seats),
            created_by: performed_by.to_string(),
            updated_by: performed_by.to_string(),
            created_at: now,
            updated_at: now,
        };
        package.validate()?;
        Ok(package)
    }

    /// Returns a copy with the patch merged in, re-validated as a whole.
    pub fn merged(
        &self,
        patch: &PackagePatch,
        performed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, TravelError> {
        let patch = patch.clone();
        let mut merged = self.clone();
        if let Some(title) = patch.title {
            merged.title = title.trim().to_string();
        }
        if let Some(country) = patch.country {
            merged.country = country.trim().to_string();
        }
        if let Some(duration) = patch.duration {
            merged.duration = duration.trim().to_string();
        }
        if let Some(price) = patch.price {
            merged.price = price;
        }
        if let Some(destinations) = patch.destinations {
            merged.destinations = trim_all(destinations);
        }
        if let Some(images) = patch.images {
            merged.images = trim_all(images);
        }
        if let Some(itinerary) = patch.itinerary {
            merged.itinerary = trim_all(itinerary);
        }
        if let Some(description) = patch.description {
            merged.description = description.trim().to_string();
        }
        if let Some(total_seats) = patch.total_seats {
            merged.total_seats = total_seats;
        }
        if let Some(available_seats) = patch.available_seats {
            merged.available_seats = available_seats;
        }
        merged.updated_by = performed_by.to_string();
        merged.updated_at = now;
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<(), TravelError> {
        if self.title.is_empty()
            || self.country.is_empty()
            || self.duration.is_empty()
            || self.description.is_empty()
        {
            return Err(TravelError::ValidationError(
                "title, country, duration and description are required".to_string(),
            ));
        }
        if self.destinations.is_empty() || self.destinations.iter().any(String::is_empty) {
            return Err(TravelError::ValidationError(
                "destinations must be a non-empty array".to_string(),
            ));
        }
        if self.images.len() < 2 {
            return Err(TravelError::ValidationError(
                "images must be an array with at least 2 URLs".to_string(),
            ));
        }
        if !self.images.iter().all(|img| is_valid_image_ref(img)) {
            return Err(TravelError::ValidationError(
                "each image must be a valid URL, data URL, or uploaded image path".to_string(),
            ));
        }
        if self.itinerary.len() < 3 {
            return Err(TravelError::ValidationError(
                "itinerary must be an array with at least 3 day entries".to_string(),
            ));
        }
        if self.total_seats < 1 {
            return Err(TravelError::ValidationError(
                "totalSeats must be an integer greater than 0".to_string(),
            ));
        }
        if self.available_seats > self.total_seats {
            return Err(TravelError::ValidationError(
                "availableSeats must be between 0 and totalSeats".to_string(),
            ));
        }
        Ok(())
    }

    /// Conditional decrement: takes `seats` only when that many remain.
    ///
    /// Returns `false` without touching the counter otherwise. Callers must run
    /// this under the store's atomic update so the check and the decrement can
    /// not be separated by a concurrent reservation.
    pub fn try_reserve(&mut self, seats: u32) -> bool {
        if seats == 0 || self.available_seats < seats {
            return false;
        }
        self.available_seats -= seats;
        true
    }

    pub fn matches(&self, query: &PackageQuery) -> bool {
        if let Some(min) = query.min_price
            && self.price < min
        {
            return false;
        }
        if let Some(max) = query.max_price
            && self.price > max
        {
            return false;
        }
        match query.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                let hit = |s: &str| s.to_lowercase().contains(&term);
                hit(&self.title)
                    || hit(&self.country)
                    || hit(&self.duration)
                    || hit(&self.description)
                    || self.destinations.iter().any(|d| hit(d))
            }
        }
    }
}

fn trim_all(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|v| v.trim().to_string()).collect()
}

fn is_valid_image_ref(value: &str) -> bool {
    let no_space = |rest: &str| !rest.is_empty() && !rest.chars().any(char::is_whitespace);
    let lower = value.to_ascii_lowercase();

    if let Some(rest) = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .or_else(|| lower.strip_prefix("/uploads/"))
    {
        return no_space(rest);
    }

    if let Some(rest) = lower.strip_prefix("data:image/")
        && let Some((subtype, payload)) = rest.split_once(";base64,")
    {
        let subtype_ok = !subtype.is_empty()
            && subtype
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'));
        let payload_ok = !payload.is_empty()
            && payload
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='));
        return subtype_ok && payload_ok;
    }

    false
}

/// Input for creating a package.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDraft {
    pub title: String,
    pub country: String,
    pub duration: String,
    pub price: Money,
    pub destinations: Vec<String>,
    pub images: Vec<String>,
    pub itinerary: Vec<String>,
    pub description: String,
    pub total_seats: u32,
    #[serde(default)]
    pub available_seats: Option<u32>,
}

/// Partial update of a package; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagePatch {
    pub title: Option<String>,
    pub country: Option<String>,
    pub duration: Option<String>,
    pub price: Option<Money>,
    pub destinations: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub itinerary: Option<Vec<String>>,
    pub description: Option<String>,
    pub total_seats: Option<u32>,
    pub available_seats: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct PackageQuery {
    pub search: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal::Decimal;

    pub fn draft(price: Decimal, seats: u32) -> PackageDraft {
        PackageDraft {
            title: "Kyoto in Autumn".to_string(),
            country: "Japan".to_string(),
            duration: "5 Days / 4 Nights".to_string(),
            price: Money::new(price).unwrap(),
            destinations: vec!["Kyoto".to_string(), "Nara".to_string()],
            images: vec![
                "https://img.example.com/kyoto-1.jpg".to_string(),
                "/uploads/kyoto-2.jpg".to_string(),
            ],
            itinerary: vec![
                "Arrival".to_string(),
                "Temples".to_string(),
                "Departure".to_string(),
            ],
            description: "Maple season walking tour".to_string(),
            total_seats: seats,
            available_seats: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::draft;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_draft_defaults_available_seats() {
        let pkg = Package::from_draft(draft(dec!(1000), 40), "ADMIN:Root (1)", Utc::now()).unwrap();
        assert_eq!(pkg.total_seats, 40);
        assert_eq!(pkg.available_seats, 40);
        assert_eq!(pkg.created_by, "ADMIN:Root (1)");
    }

    #[test]
    fn test_draft_validation() {
        let mut d = draft(dec!(1000), 0);
        assert!(Package::from_draft(d.clone(), "SYSTEM", Utc::now()).is_err());

        d.total_seats = 10;
        d.available_seats = Some(11);
        assert!(Package::from_draft(d.clone(), "SYSTEM", Utc::now()).is_err());

        d.available_seats = Some(10);
        d.images = vec!["https://img.example.com/only-one.jpg".to_string()];
        assert!(Package::from_draft(d.clone(), "SYSTEM", Utc::now()).is_err());

        d.images = vec!["ftp://x/y.jpg".to_string(), "/uploads/a.png".to_string()];
        assert!(Package::from_draft(d.clone(), "SYSTEM", Utc::now()).is_err());

        d.images = vec![
            "data:image/png;base64,iVBORw0KGgo=".to_string(),
            "/uploads/a.png".to_string(),
        ];
        assert!(Package::from_draft(d.clone(), "SYSTEM", Utc::now()).is_ok());

        d.itinerary.truncate(2);
        assert!(Package::from_draft(d, "SYSTEM", Utc::now()).is_err());
    }

    #[test]
    fn test_merge_revalidates() {
        let pkg = Package::from_draft(draft(dec!(1000), 40), "SYSTEM", Utc::now()).unwrap();

        let patch = PackagePatch {
            price: Some(Money::new(dec!(1200)).unwrap()),
            ..Default::default()
        };
        let merged = pkg.merged(&patch, "ADMIN:Root (1)", Utc::now()).unwrap();
        assert_eq!(merged.price, Money::new(dec!(1200)).unwrap());
        assert_eq!(merged.updated_by, "ADMIN:Root (1)");
        assert_eq!(merged.created_by, "SYSTEM");

        let patch = PackagePatch {
            total_seats: Some(10),
            ..Default::default()
        };
        // 40 available seats no longer fit into 10 total
        assert!(pkg.merged(&patch, "ADMIN:Root (1)", Utc::now()).is_err());
    }

    #[test]
    fn test_try_reserve_is_conditional() {
        let mut pkg = Package::from_draft(draft(dec!(1000), 3), "SYSTEM", Utc::now()).unwrap();
        assert!(pkg.try_reserve(2));
        assert_eq!(pkg.available_seats, 1);
        assert!(!pkg.try_reserve(2));
        assert_eq!(pkg.available_seats, 1);
        assert!(!pkg.try_reserve(0));
        assert!(pkg.try_reserve(1));
        assert_eq!(pkg.available_seats, 0);
    }

    #[test]
    fn test_query_matching() {
        let pkg = Package::from_draft(draft(dec!(1000), 3), "SYSTEM", Utc::now()).unwrap();

        let by_destination = PackageQuery {
            search: Some("nara".to_string()),
            ..Default::default()
        };
        assert!(pkg.matches(&by_destination));

        let too_cheap = PackageQuery {
            max_price: Some(Money::new(dec!(999)).unwrap()),
            ..Default::default()
        };
        assert!(!pkg.matches(&too_cheap));

        let miss = PackageQuery {
            search: Some("Peru".to_string()),
            min_price: Some(Money::new(dec!(10)).unwrap()),
            ..Default::default()
        };
        assert!(!pkg.matches(&miss));
    }
}
