use crate::domain::money::Money;
use crate::domain::package::PackageDraft;
use crate::error::{Result, TravelError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

/// One row of a package seed file. List columns hold `|`-separated items.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageRow {
    title: String,
    country: String,
    duration: String,
    price: String,
    destinations: String,
    images: String,
    itinerary: String,
    description: String,
    total_seats: u32,
    #[serde(default)]
    available_seats: Option<u32>,
}

impl TryFrom<PackageRow> for PackageDraft {
    type Error = TravelError;

    fn try_from(row: PackageRow) -> Result<Self> {
        let price = Decimal::from_str(row.price.trim()).map_err(|_| {
            TravelError::ValidationError("price must be a valid non-negative number".to_string())
        })?;
        Ok(PackageDraft {
            title: row.title,
            country: row.country,
            duration: row.duration,
            price: Money::new(price)?,
            destinations: split_list(&row.destinations),
            images: split_list(&row.images),
            itinerary: split_list(&row.itinerary),
            description: row.description,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
        })
    }
}

fn split_list(cell: &str) -> Vec<String> {
    cell.split('|')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads package drafts from a CSV source, e.g. a catalog seed file.
///
/// Rows are trimmed and deserialized lazily. Full package validation happens
/// later, when the draft is turned into a [`Package`](crate::domain::package::Package).
pub struct PackageReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PackageReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one draft per data row.
    pub fn drafts(self) -> impl Iterator<Item = Result<PackageDraft>> {
        self.reader
            .into_deserialize::<PackageRow>()
            .map(|row| row.map_err(TravelError::from).and_then(PackageDraft::try_from))
    }
}
