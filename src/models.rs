// Data structures shared by the search pipeline, the app store and the HTTP API.
// Every wire/persisted type uses camelCase keys to match the browser-side client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Listing ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Petrol,
    Diesel,
    Hybrid,
    Electric,
    Lpg,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Petrol => "petrol",
            FuelType::Diesel => "diesel",
            FuelType::Hybrid => "hybrid",
            FuelType::Electric => "electric",
            FuelType::Lpg => "lpg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transmission {
    Manual,
    Automatic,
}

impl Transmission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transmission::Manual => "manual",
            Transmission::Automatic => "automatic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Ron,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Ron => "RON",
            Currency::Usd => "USD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Draft,
    Sold,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingImage {
    pub url: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// A vehicle listing. The search pipeline only ever reads these; it reorders
/// and slices references to them but never mutates a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub brand: String,
    pub model: String,
    pub year: u16,
    #[serde(default)]
    pub mileage: Option<u32>, // km, absent for listings that never reported it
    pub fuel_type: FuelType,
    pub transmission: Transmission,
    pub price: u64,
    pub currency: Currency,
    pub location: String,
    #[serde(default)]
    pub images: Vec<ListingImage>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// The image flagged as primary, falling back to the first one.
    pub fn primary_image(&self) -> Option<&ListingImage> {
        self.images
            .iter()
            .find(|img| img.is_primary)
            .or_else(|| self.images.first())
    }

    /// Lowercased concatenation of every field free-text queries look at.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(
            self.title.len() + self.brand.len() + self.model.len() + self.description.len() + 32,
        );
        for part in [&self.title, &self.brand, &self.model, &self.description] {
            text.push_str(part);
            text.push(' ');
        }
        for tag in &self.tags {
            text.push_str(tag);
            text.push(' ');
        }
        text.to_lowercase()
    }
}

// --- Filter criteria ---

/// Inclusive numeric bounds used by the price, year and mileage facets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

impl NumericRange {
    pub fn new(min: Option<u64>, max: Option<u64>) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: u64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Price,
    Year,
    Mileage,
    Title,
    CreatedAt,
    UpdatedAt,
    PublishedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDescriptor {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortDescriptor {
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// One filterable dimension of [`FilterCriteria`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Brands,
    Models,
    Price,
    Year,
    Mileage,
    FuelTypes,
    Transmissions,
    Locations,
    Exclusions,
    Query,
    Sort,
}

impl Facet {
    pub const ALL: [Facet; 11] = [
        Facet::Brands,
        Facet::Models,
        Facet::Price,
        Facet::Year,
        Facet::Mileage,
        Facet::FuelTypes,
        Facet::Transmissions,
        Facet::Locations,
        Facet::Exclusions,
        Facet::Query,
        Facet::Sort,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Brands => "brands",
            Facet::Models => "models",
            Facet::Price => "price",
            Facet::Year => "year",
            Facet::Mileage => "mileage",
            Facet::FuelTypes => "fuelTypes",
            Facet::Transmissions => "transmissions",
            Facet::Locations => "locations",
            Facet::Exclusions => "exclusions",
            Facet::Query => "query",
            Facet::Sort => "sort",
        }
    }
}

// Sparse search criteria. Empty lists and missing values mean "no constraint"
// and are skipped on the wire, so a serialized criteria only carries the keys
// that actually restrict the result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub brands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<NumericRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fuel_types: Vec<FuelType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transmissions: Vec<Transmission>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortDescriptor>,
}

fn range_is_active(range: &Option<NumericRange>) -> bool {
    range.as_ref().is_some_and(|r| !r.is_empty())
}

impl FilterCriteria {
    /// Whether a single facet currently constrains anything.
    pub fn is_active(&self, facet: Facet) -> bool {
        match facet {
            Facet::Brands => !self.brands.is_empty(),
            Facet::Models => !self.models.is_empty(),
            Facet::Price => range_is_active(&self.price),
            Facet::Year => range_is_active(&self.year),
            Facet::Mileage => range_is_active(&self.mileage),
            Facet::FuelTypes => !self.fuel_types.is_empty(),
            Facet::Transmissions => !self.transmissions.is_empty(),
            Facet::Locations => !self.locations.is_empty(),
            Facet::Exclusions => !self.exclusions.is_empty(),
            Facet::Query => self.query.as_deref().is_some_and(|q| !q.trim().is_empty()),
            Facet::Sort => self.sort.is_some(),
        }
    }

    pub fn active_facets(&self) -> impl Iterator<Item = Facet> + '_ {
        Facet::ALL.into_iter().filter(|facet| self.is_active(*facet))
    }

    pub fn active_count(&self) -> usize {
        self.active_facets().count()
    }

    pub fn has_active(&self) -> bool {
        self.active_facets().next().is_some()
    }

    /// Drops values that carry no constraint: blank strings inside lists,
    /// blank queries and ranges without bounds.
    pub fn prune(&mut self) {
        for list in [
            &mut self.brands,
            &mut self.models,
            &mut self.locations,
            &mut self.exclusions,
        ] {
            list.retain(|value| !value.trim().is_empty());
        }
        for range in [&mut self.price, &mut self.year, &mut self.mileage] {
            if range.is_some_and(|r| r.is_empty()) {
                *range = None;
            }
        }
        if self.query.as_deref().is_some_and(|q| q.trim().is_empty()) {
            self.query = None;
        }
    }
}

/// A named snapshot of filter criteria the user can re-apply later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: String,
    pub name: String,
    pub filters: FilterCriteria,
    pub created_at: DateTime<Utc>,
}

// --- Notifications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
    PriceDrop,
    NewListing,
    SavedSearchAlert,
    AppointmentReminder,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// Payload for creating a notification; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub priority: NotificationPriority,
}

// --- Preferences & session ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

// Client-side mirror of the signed-in user. Authentication itself happens
// elsewhere; this is only what the UI needs to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

// --- Search output ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionCategory {
    Brand,
    Model,
    Query,
    Recent,
    Popular,
}

impl SuggestionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionCategory::Brand => "brand",
            SuggestionCategory::Model => "model",
            SuggestionCategory::Query => "query",
            SuggestionCategory::Recent => "recent",
            SuggestionCategory::Popular => "popular",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub text: String,
    pub category: SuggestionCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub items: Vec<Listing>,
    pub total: usize,
    pub suggestions: Vec<Suggestion>,
    pub has_more: bool,
}
