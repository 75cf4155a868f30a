//! CSV export of listings (a results page or the comparison set).

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::Listing;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingRow<'a> {
    id: &'a str,
    title: &'a str,
    brand: &'a str,
    model: &'a str,
    year: u16,
    mileage: Option<u32>,
    fuel_type: &'static str,
    transmission: &'static str,
    price: u64,
    currency: &'static str,
    location: &'a str,
    tags: String,
    image: Option<&'a str>,
}

impl<'a> From<&'a Listing> for ListingRow<'a> {
    fn from(listing: &'a Listing) -> Self {
        Self {
            id: &listing.id,
            title: &listing.title,
            brand: &listing.brand,
            model: &listing.model,
            year: listing.year,
            mileage: listing.mileage,
            fuel_type: listing.fuel_type.as_str(),
            transmission: listing.transmission.as_str(),
            price: listing.price,
            currency: listing.currency.as_str(),
            location: &listing.location,
            tags: listing.tags.join("; "),
            image: listing.primary_image().map(|i| i.url.as_str()),
        }
    }
}

/// Header row plus one row per listing. An empty input still yields the header.
pub fn listings_to_csv<'a>(listings: impl IntoIterator<Item = &'a Listing>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut rows = 0usize;
    for listing in listings {
        writer
            .serialize(ListingRow::from(listing))
            .with_context(|| format!("Failed to write CSV row for listing {}", listing.id))?;
        rows += 1;
    }
    if rows == 0 {
        writer.write_record(HEADER)?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    tracing::debug!(rows, bytes = bytes.len(), "Exported listings to CSV");
    Ok(bytes)
}

const HEADER: [&str; 13] = [
    "id",
    "title",
    "brand",
    "model",
    "year",
    "mileage",
    "fuelType",
    "transmission",
    "price",
    "currency",
    "location",
    "tags",
    "image",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ListingSource, sample_catalog};

    #[test]
    fn writes_header_and_rows() {
        let catalog = sample_catalog();
        let listings: Vec<&Listing> = ["car-001", "car-010"]
            .iter()
            .filter_map(|id| catalog.listing(id))
            .collect();
        let csv = String::from_utf8(listings_to_csv(listings).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(
            lines[1],
            "car-001,BMW Seria 3 2.0 Diesel,BMW,Seria 3,2019,86000,diesel,automatic,23500,EUR,\
             Bucuresti,diesel; sedan; navigation,/static/cars/car-001/front.jpg"
        );
        // undeclared mileage is an empty field
        assert!(lines[2].starts_with("car-010,Toyota RAV4 2.5 Hybrid AWD,Toyota,RAV4,2022,,hybrid,"));
    }

    #[test]
    fn empty_export_has_only_the_header() {
        let csv = String::from_utf8(listings_to_csv(std::iter::empty()).unwrap()).unwrap();
        assert_eq!(csv.trim_end(), HEADER.join(","));
    }
}
