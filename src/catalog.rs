// Listing data sources for the search service.
// The search pipeline only needs "give me every listing"; where they come
// from (built-in sample set, JSON file, remote endpoint) is decided at startup.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;

use crate::models::{
    Currency, FuelType, Listing, ListingImage, ListingStatus, Transmission,
};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog {origin} is not a valid listing array: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to fetch catalog from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Synchronous access to the full listing collection.
pub trait ListingSource: Send + Sync {
    fn listings(&self) -> &[Listing];

    fn listing(&self, id: &str) -> Option<&Listing> {
        self.listings().iter().find(|l| l.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    listings: Vec<Listing>,
}

impl InMemoryCatalog {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings }
    }

    pub fn from_json_str(raw: &str, origin: &str) -> Result<Self, CatalogError> {
        let listings: Vec<Listing> =
            serde_json::from_str(raw).map_err(|source| CatalogError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        Ok(Self::new(listings))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw, &path.display().to_string())
    }

    /// Downloads the whole catalog once; searches then run against the copy.
    pub async fn fetch_remote(client: &Client, url: &str) -> Result<Self, CatalogError> {
        let fetch_err = |source| CatalogError::Fetch {
            url: url.to_string(),
            source,
        };
        let body = client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?
            .text()
            .await
            .map_err(fetch_err)?;
        tracing::debug!(url, bytes = body.len(), "Fetched remote catalog");
        Self::from_json_str(&body, url)
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Distinct brands, sorted case-insensitively.
    pub fn brands(&self) -> Vec<String> {
        let unique: BTreeSet<(String, &str)> = self
            .listings
            .iter()
            .map(|l| (l.brand.to_lowercase(), l.brand.as_str()))
            .collect();
        let mut seen = BTreeSet::new();
        unique
            .into_iter()
            .filter(|(lower, _)| seen.insert(lower.clone()))
            .map(|(_, brand)| brand.to_string())
            .collect()
    }

    /// Distinct models for a brand (brand matched case-insensitively).
    pub fn models_for(&self, brand: &str) -> Vec<String> {
        let wanted = brand.to_lowercase();
        let models: BTreeSet<&str> = self
            .listings
            .iter()
            .filter(|l| l.brand.to_lowercase() == wanted)
            .map(|l| l.model.as_str())
            .collect();
        models.into_iter().map(str::to_string).collect()
    }
}

impl ListingSource for InMemoryCatalog {
    fn listings(&self) -> &[Listing] {
        &self.listings
    }
}

/// Picks the catalog configured in settings: a local file wins over a remote
/// URL, and the built-in sample set is the fallback.
pub async fn load_configured(
    client: &Client,
    path: Option<&str>,
    url: Option<&str>,
) -> anyhow::Result<InMemoryCatalog> {
    if let Some(path) = path.filter(|p| !p.is_empty()) {
        tracing::info!("Loading catalog from file {}", path);
        return InMemoryCatalog::from_json_file(Path::new(path))
            .with_context(|| format!("Failed to load catalog file '{}'", path));
    }
    if let Some(url) = url.filter(|u| !u.is_empty()) {
        tracing::info!("Fetching catalog from {}", url);
        return InMemoryCatalog::fetch_remote(client, url)
            .await
            .with_context(|| format!("Failed to fetch catalog from '{}'", url));
    }
    tracing::info!("No catalog configured, using the built-in sample listings.");
    Ok(sample_catalog())
}

// --- Built-in sample data ---

struct Seed {
    brand: &'static str,
    model: &'static str,
    title: &'static str,
    year: u16,
    mileage: Option<u32>,
    fuel: FuelType,
    transmission: Transmission,
    price: u64,
    location: &'static str,
    tags: &'static [&'static str],
    description: &'static str,
}

const SEEDS: &[Seed] = &[
    Seed {
        brand: "BMW",
        model: "Seria 3",
        title: "BMW Seria 3 2.0 Diesel",
        year: 2019,
        mileage: Some(86_000),
        fuel: FuelType::Diesel,
        transmission: Transmission::Automatic,
        price: 23_500,
        location: "Bucuresti",
        tags: &["diesel", "sedan", "navigation"],
        description: "Full service history, one owner.",
    },
    Seed {
        brand: "BMW",
        model: "X5",
        title: "BMW X5 xDrive30d M Sport",
        year: 2021,
        mileage: Some(54_000),
        fuel: FuelType::Diesel,
        transmission: Transmission::Automatic,
        price: 61_900,
        location: "Cluj-Napoca",
        tags: &["suv", "diesel", "m sport"],
        description: "Panoramic roof, head-up display.",
    },
    Seed {
        brand: "Audi",
        model: "A4",
        title: "Audi A4 Avant 35 TFSI",
        year: 2020,
        mileage: Some(72_000),
        fuel: FuelType::Petrol,
        transmission: Transmission::Automatic,
        price: 27_800,
        location: "Timisoara",
        tags: &["estate", "s line"],
        description: "Virtual cockpit, LED headlights.",
    },
    Seed {
        brand: "Audi",
        model: "Q5",
        title: "Audi Q5 40 TDI quattro",
        year: 2018,
        mileage: Some(121_000),
        fuel: FuelType::Diesel,
        transmission: Transmission::Automatic,
        price: 29_900,
        location: "Brasov",
        tags: &["suv", "quattro", "diesel"],
        description: "Towbar, winter tyres included.",
    },
    Seed {
        brand: "Volkswagen",
        model: "Golf",
        title: "Volkswagen Golf 8 1.5 eTSI",
        year: 2022,
        mileage: Some(31_000),
        fuel: FuelType::Hybrid,
        transmission: Transmission::Automatic,
        price: 24_300,
        location: "Bucuresti",
        tags: &["hatchback", "mild hybrid"],
        description: "Still under manufacturer warranty.",
    },
    Seed {
        brand: "Volkswagen",
        model: "Passat",
        title: "Volkswagen Passat B8 2.0 TDI",
        year: 2017,
        mileage: Some(189_000),
        fuel: FuelType::Diesel,
        transmission: Transmission::Manual,
        price: 14_200,
        location: "Iasi",
        tags: &["estate", "diesel"],
        description: "Adaptive cruise control.",
    },
    Seed {
        brand: "Dacia",
        model: "Duster",
        title: "Dacia Duster 1.3 TCe 4x4",
        year: 2023,
        mileage: Some(12_000),
        fuel: FuelType::Petrol,
        transmission: Transmission::Manual,
        price: 19_900,
        location: "Pitesti",
        tags: &["suv", "4x4"],
        description: "Like new, garage kept.",
    },
    Seed {
        brand: "Dacia",
        model: "Logan",
        title: "Dacia Logan 1.0 SCe GPL",
        year: 2020,
        mileage: Some(64_000),
        fuel: FuelType::Lpg,
        transmission: Transmission::Manual,
        price: 8_900,
        location: "Constanta",
        tags: &["sedan", "gpl", "economical"],
        description: "Factory LPG installation.",
    },
    Seed {
        brand: "Toyota",
        model: "Corolla",
        title: "Toyota Corolla 1.8 Hybrid",
        year: 2021,
        mileage: Some(45_000),
        fuel: FuelType::Hybrid,
        transmission: Transmission::Automatic,
        price: 21_500,
        location: "Cluj-Napoca",
        tags: &["hybrid", "sedan"],
        description: "Low consumption, city friendly.",
    },
    Seed {
        brand: "Toyota",
        model: "RAV4",
        title: "Toyota RAV4 2.5 Hybrid AWD",
        year: 2022,
        mileage: None,
        fuel: FuelType::Hybrid,
        transmission: Transmission::Automatic,
        price: 36_400,
        location: "Oradea",
        tags: &["suv", "awd", "hybrid"],
        description: "Mileage not declared by the seller.",
    },
    Seed {
        brand: "Ford",
        model: "Focus",
        title: "Ford Focus 1.0 EcoBoost",
        year: 2019,
        mileage: Some(98_000),
        fuel: FuelType::Petrol,
        transmission: Transmission::Manual,
        price: 11_700,
        location: "Sibiu",
        tags: &["hatchback"],
        description: "New clutch at 90,000 km.",
    },
    Seed {
        brand: "Ford",
        model: "Kuga",
        title: "Ford Kuga 2.5 PHEV",
        year: 2021,
        mileage: Some(58_000),
        fuel: FuelType::Hybrid,
        transmission: Transmission::Automatic,
        price: 26_900,
        location: "Bucuresti",
        tags: &["suv", "plug-in"],
        description: "Charging cable included.",
    },
    Seed {
        brand: "Mercedes-Benz",
        model: "C-Class",
        title: "Mercedes-Benz C 220 d AMG Line",
        year: 2020,
        mileage: Some(88_000),
        fuel: FuelType::Diesel,
        transmission: Transmission::Automatic,
        price: 32_500,
        location: "Timisoara",
        tags: &["sedan", "amg line", "diesel"],
        description: "Burmester sound system.",
    },
    Seed {
        brand: "Mercedes-Benz",
        model: "GLC",
        title: "Mercedes-Benz GLC 300e 4MATIC",
        year: 2022,
        mileage: Some(27_000),
        fuel: FuelType::Hybrid,
        transmission: Transmission::Automatic,
        price: 48_700,
        location: "Bucuresti",
        tags: &["suv", "plug-in", "4matic"],
        description: "Air suspension, 360 camera.",
    },
    Seed {
        brand: "Skoda",
        model: "Octavia",
        title: "Skoda Octavia 2.0 TDI Style",
        year: 2020,
        mileage: Some(110_000),
        fuel: FuelType::Diesel,
        transmission: Transmission::Manual,
        price: 16_800,
        location: "Craiova",
        tags: &["estate", "diesel"],
        description: "Spacious family car.",
    },
    Seed {
        brand: "Renault",
        model: "Clio",
        title: "Renault Clio 1.0 TCe",
        year: 2021,
        mileage: Some(39_000),
        fuel: FuelType::Petrol,
        transmission: Transmission::Manual,
        price: 12_400,
        location: "Iasi",
        tags: &["hatchback", "city car"],
        description: "Ideal first car.",
    },
    Seed {
        brand: "Tesla",
        model: "Model 3",
        title: "Tesla Model 3 Long Range",
        year: 2021,
        mileage: Some(61_000),
        fuel: FuelType::Electric,
        transmission: Transmission::Automatic,
        price: 34_900,
        location: "Cluj-Napoca",
        tags: &["electric", "autopilot"],
        description: "Battery health 94%.",
    },
    Seed {
        brand: "Hyundai",
        model: "Tucson",
        title: "Hyundai Tucson 1.6 T-GDi",
        year: 2022,
        mileage: Some(22_000),
        fuel: FuelType::Petrol,
        transmission: Transmission::Automatic,
        price: 27_300,
        location: "Brasov",
        tags: &["suv"],
        description: "Heated seats and steering wheel.",
    },
    Seed {
        brand: "Kia",
        model: "Ceed",
        title: "Kia Ceed 1.4 T-GDi",
        year: 2019,
        mileage: Some(77_000),
        fuel: FuelType::Petrol,
        transmission: Transmission::Manual,
        price: 13_200,
        location: "Sibiu",
        tags: &["hatchback"],
        description: "Remaining factory warranty.",
    },
    Seed {
        brand: "Opel",
        model: "Astra",
        title: "Opel Astra K 1.6 CDTI",
        year: 2016,
        mileage: Some(205_000),
        fuel: FuelType::Diesel,
        transmission: Transmission::Manual,
        price: 7_900,
        location: "Constanta",
        tags: &["hatchback", "diesel"],
        description: "Sold as is.",
    },
];

/// Twenty listings covering every fuel type and both transmissions.
pub fn sample_catalog() -> InMemoryCatalog {
    // 2024-03-01 00:00:00 UTC; each listing is one day older than the previous.
    let base = DateTime::<Utc>::from_timestamp(1_709_251_200, 0).unwrap_or_default();
    let listings = SEEDS
        .iter()
        .enumerate()
        .map(|(i, seed)| {
            let created_at = base - Duration::days(i as i64);
            let id = format!("car-{:03}", i + 1);
            Listing {
                images: vec![
                    ListingImage {
                        url: format!("/static/cars/{}/front.jpg", id),
                        is_primary: true,
                    },
                    ListingImage {
                        url: format!("/static/cars/{}/interior.jpg", id),
                        is_primary: false,
                    },
                ],
                id,
                seller_id: format!("seller-{}", i % 5 + 1),
                title: seed.title.to_string(),
                brand: seed.brand.to_string(),
                model: seed.model.to_string(),
                year: seed.year,
                mileage: seed.mileage,
                fuel_type: seed.fuel,
                transmission: seed.transmission,
                price: seed.price,
                currency: Currency::Eur,
                location: seed.location.to_string(),
                description: seed.description.to_string(),
                tags: seed.tags.iter().map(|t| t.to_string()).collect(),
                status: ListingStatus::Active,
                created_at,
                updated_at: created_at + Duration::hours(6),
                published_at: (i % 4 != 3).then_some(created_at + Duration::hours(1)),
            }
        })
        .collect();
    InMemoryCatalog::new(listings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_has_twenty_unique_listings() {
        let catalog = sample_catalog();
        assert_eq!(catalog.len(), 20);
        let ids: BTreeSet<&str> = catalog.listings().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids.len(), 20);
        assert!(catalog.listings().iter().all(|l| l.primary_image().is_some()));
    }

    #[test]
    fn brands_and_models_are_distinct_and_sorted() {
        let catalog = sample_catalog();
        let brands = catalog.brands();
        assert_eq!(brands.first().map(String::as_str), Some("Audi"));
        assert_eq!(brands.iter().filter(|b| *b == "BMW").count(), 1);
        assert_eq!(catalog.models_for("bmw"), vec!["Seria 3", "X5"]);
        assert!(catalog.models_for("Lada").is_empty());
    }

    #[test]
    fn json_catalog_errors_name_their_origin() {
        let err = InMemoryCatalog::from_json_str("{}", "inline").unwrap_err();
        assert!(err.to_string().contains("inline"));
    }

    #[test]
    fn listing_lookup_by_id() {
        let catalog = sample_catalog();
        assert_eq!(
            catalog.listing("car-001").map(|l| l.title.as_str()),
            Some("BMW Seria 3 2.0 Diesel")
        );
        assert!(catalog.listing("nope").is_none());
    }
}
