//! Listing search: free-text matching, facet filtering, sorting, pagination
//! and query suggestions.
//!
//! Everything here is synchronous and pure over the listing collection handed
//! in by a [`ListingSource`]. The only stateful piece is [`RecentSearches`],
//! which persists the user's last queries and feeds the default suggestions.
//!
//! # Pipeline
//!
//! 1. Split the trimmed, lowercased query on whitespace; every term must be a
//!    substring of the listing's searchable text.
//! 2. Apply each active facet (AND across facets, membership for lists,
//!    inclusive bounds for ranges).
//! 3. Sort by the requested field; listings without a value go last in both
//!    directions.
//! 4. Slice `(page-1)*page_size .. page*page_size`.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::catalog::ListingSource;
use crate::models::{
    FilterCriteria, Listing, SearchResults, SortDescriptor, SortDirection, SortField, Suggestion,
    SuggestionCategory,
};
use crate::storage::{self, SharedStorage, keys};

/// Most recent searches kept per user.
pub const MAX_RECENT_SEARCHES: usize = 10;

/// Suggestion tuning, decoupled from application settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionConfig {
    /// Queries shorter than this (in characters, after trimming) get the default set.
    pub min_query_length: usize,
    pub max_suggestions: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            min_query_length: 2,
            max_suggestions: 8,
        }
    }
}

/// Query in, result page out. Implementations may be backed by anything as
/// long as they honour the filter/sort/paginate contract.
pub trait SearchService: Send + Sync {
    fn search_cars(
        &self,
        query: &str,
        criteria: &FilterCriteria,
        page: usize,
        page_size: usize,
    ) -> SearchResults;

    fn suggestions(&self, query: &str) -> Vec<Suggestion>;
}

// --- Static suggestion data ---

const BRAND_MODELS: &[(&str, &[&str])] = &[
    ("Audi", &["A3", "A4", "A6", "Q3", "Q5", "Q7"]),
    ("BMW", &["Seria 1", "Seria 3", "Seria 5", "X1", "X3", "X5"]),
    ("Dacia", &["Logan", "Sandero", "Duster", "Spring"]),
    ("Ford", &["Fiesta", "Focus", "Kuga", "Mondeo"]),
    ("Hyundai", &["i30", "Tucson", "Kona"]),
    ("Kia", &["Ceed", "Sportage", "Niro"]),
    ("Mercedes-Benz", &["A-Class", "C-Class", "E-Class", "GLC"]),
    ("Opel", &["Astra", "Corsa", "Insignia"]),
    ("Renault", &["Clio", "Megane", "Captur"]),
    ("Skoda", &["Fabia", "Octavia", "Superb", "Kodiaq"]),
    ("Tesla", &["Model 3", "Model Y"]),
    ("Toyota", &["Yaris", "Corolla", "C-HR", "RAV4"]),
    ("Volkswagen", &["Polo", "Golf", "Passat", "Tiguan"]),
];

const POPULAR_QUERIES: &[&str] = &[
    "SUV diesel",
    "BMW Seria 3",
    "electric car",
    "automatic hybrid",
    "family estate",
    "Dacia Duster 4x4",
];

// Appended to the raw query when the matched candidates leave room:
// fuel type, transmission, year, price ceiling, condition.
const QUERY_MODIFIERS: &[&str] = &["diesel", "automatic", "2020", "under 20000", "used"];

struct BrandEntry {
    name: &'static str,
    lower: String,
    models: Vec<(String, String)>, // (display, lowercase)
}

static BRAND_INDEX: Lazy<Vec<BrandEntry>> = Lazy::new(|| {
    BRAND_MODELS
        .iter()
        .map(|(brand, models)| BrandEntry {
            name: *brand,
            lower: brand.to_lowercase(),
            models: models
                .iter()
                .map(|model| {
                    let display = format!("{} {}", brand, model);
                    let lower = display.to_lowercase();
                    (display, lower)
                })
                .collect(),
        })
        .collect()
});

// --- Matching ---

/// Lowercased whitespace-separated terms of a query. Empty for blank input.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// True when every term occurs in the listing's searchable text.
pub fn matches_terms(listing: &Listing, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let text = listing.searchable_text();
    terms.iter().all(|term| text.contains(term.as_str()))
}

fn contains_ignore_case(values: &[String], candidate: &str) -> bool {
    values.iter().any(|v| v.trim().eq_ignore_ascii_case(candidate.trim()))
}

/// True when the listing satisfies every active facet of `criteria`.
/// The free-text `query` and `sort` keys are not facets and are ignored here.
pub fn matches_criteria(listing: &Listing, criteria: &FilterCriteria) -> bool {
    if !criteria.brands.is_empty() && !contains_ignore_case(&criteria.brands, &listing.brand) {
        return false;
    }
    if !criteria.models.is_empty() && !contains_ignore_case(&criteria.models, &listing.model) {
        return false;
    }
    if let Some(range) = criteria.price.filter(|r| !r.is_empty()) {
        if !range.contains(listing.price) {
            return false;
        }
    }
    if let Some(range) = criteria.year.filter(|r| !r.is_empty()) {
        if !range.contains(u64::from(listing.year)) {
            return false;
        }
    }
    if let Some(range) = criteria.mileage.filter(|r| !r.is_empty()) {
        // A listing that never reported mileage cannot satisfy a mileage bound.
        match listing.mileage {
            Some(km) if range.contains(u64::from(km)) => {}
            _ => return false,
        }
    }
    if !criteria.fuel_types.is_empty() && !criteria.fuel_types.contains(&listing.fuel_type) {
        return false;
    }
    if !criteria.transmissions.is_empty()
        && !criteria.transmissions.contains(&listing.transmission)
    {
        return false;
    }
    if !criteria.locations.is_empty() && !contains_ignore_case(&criteria.locations, &listing.location)
    {
        return false;
    }
    if !criteria.exclusions.is_empty() {
        let text = listing.searchable_text();
        if criteria
            .exclusions
            .iter()
            .map(|ex| ex.trim().to_lowercase())
            .any(|ex| !ex.is_empty() && text.contains(&ex))
        {
            return false;
        }
    }
    true
}

// --- Sorting ---

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(u64),
    Timestamp(i64),
    Text(String),
}

fn sort_value(listing: &Listing, field: SortField) -> Option<SortValue> {
    match field {
        SortField::Price => Some(SortValue::Number(listing.price)),
        SortField::Year => Some(SortValue::Number(u64::from(listing.year))),
        SortField::Mileage => listing.mileage.map(|km| SortValue::Number(u64::from(km))),
        SortField::Title => Some(SortValue::Text(listing.title.to_lowercase())),
        SortField::CreatedAt => Some(SortValue::Timestamp(listing.created_at.timestamp_millis())),
        SortField::UpdatedAt => Some(SortValue::Timestamp(listing.updated_at.timestamp_millis())),
        SortField::PublishedAt => listing
            .published_at
            .map(|at| SortValue::Timestamp(at.timestamp_millis())),
    }
}

/// Stable sort; listings lacking the field always end up after the rest.
pub fn sort_listings(listings: &mut [&Listing], sort: &SortDescriptor) {
    listings.sort_by_cached_key(|l| SortKey {
        value: sort_value(l, sort.field),
        direction: sort.direction,
    });
}

#[derive(PartialEq, Eq)]
struct SortKey {
    value: Option<SortValue>,
    direction: SortDirection,
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.value, &other.value) {
            (Some(a), Some(b)) => match self.direction {
                SortDirection::Asc => a.cmp(b),
                SortDirection::Desc => b.cmp(a),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// --- Pagination ---

/// Clamped `[start, end)` slice bounds for a 1-based page, plus `has_more`.
/// Page 0 is read as page 1 and a zero page size as 1.
pub fn page_bounds(page: usize, page_size: usize, total: usize) -> (usize, usize, bool) {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size);
    let end = page.saturating_mul(page_size);
    (start.min(total), end.min(total), end < total)
}

// --- Suggestions ---

struct SuggestionList {
    max: usize,
    seen: HashSet<String>,
    entries: Vec<(String, SuggestionCategory)>,
}

impl SuggestionList {
    fn new(max: usize) -> Self {
        Self {
            max,
            seen: HashSet::new(),
            entries: Vec::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.max
    }

    fn push(&mut self, text: &str, category: SuggestionCategory) {
        if self.is_full() {
            return;
        }
        let text = text.trim();
        if text.is_empty() || !self.seen.insert(text.to_lowercase()) {
            return;
        }
        self.entries.push((text.to_string(), category));
    }

    fn finish(self) -> Vec<Suggestion> {
        self.entries
            .into_iter()
            .enumerate()
            .map(|(i, (text, category))| Suggestion {
                id: format!("{}-{}", category.as_str(), i),
                text,
                category,
            })
            .collect()
    }
}

/// Suggestions for a partially typed query.
///
/// Short queries get the user's recent searches followed by popular ones.
/// Longer queries are matched against brands, brand+model pairs and popular
/// queries; remaining slots are filled by appending fixed modifiers to the
/// raw query, skipping modifiers the query already mentions.
pub fn generate_suggestions(
    query: &str,
    recent: &[String],
    config: &SuggestionConfig,
) -> Vec<Suggestion> {
    let trimmed = query.trim();
    let mut list = SuggestionList::new(config.max_suggestions);

    if trimmed.chars().count() < config.min_query_length {
        for entry in recent {
            list.push(entry, SuggestionCategory::Recent);
        }
        for popular in POPULAR_QUERIES {
            list.push(popular, SuggestionCategory::Popular);
        }
        return list.finish();
    }

    let needle = trimmed.to_lowercase();
    for brand in BRAND_INDEX.iter() {
        if brand.lower.contains(&needle) {
            list.push(brand.name, SuggestionCategory::Brand);
        }
    }
    for brand in BRAND_INDEX.iter() {
        for (display, lower) in &brand.models {
            if lower.contains(&needle) {
                list.push(display, SuggestionCategory::Model);
            }
        }
    }
    for popular in POPULAR_QUERIES {
        if popular.to_lowercase().contains(&needle) {
            list.push(popular, SuggestionCategory::Popular);
        }
    }
    for modifier in QUERY_MODIFIERS {
        if list.is_full() {
            break;
        }
        if needle.contains(&modifier.to_lowercase()) {
            continue;
        }
        list.push(&format!("{} {}", trimmed, modifier), SuggestionCategory::Query);
    }
    list.finish()
}

// --- Recent searches ---

/// Moves `query` to the front of `entries`, dropping an older copy and
/// anything past `cap`. Blank queries are ignored. Returns whether the list
/// changed.
pub fn push_recent(entries: &mut Vec<String>, query: &str, cap: usize) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return false;
    }
    if entries.first().is_some_and(|first| first == query) {
        return false;
    }
    entries.retain(|existing| existing != query);
    entries.insert(0, query.to_string());
    entries.truncate(cap);
    true
}

/// Persisted most-recent-first list of search queries.
pub struct RecentSearches {
    storage: SharedStorage,
    entries: Vec<String>,
}

impl RecentSearches {
    pub fn load(storage: SharedStorage) -> Self {
        let mut entries: Vec<String> =
            storage::load_or_warn(storage.as_ref(), keys::RECENT_SEARCHES).unwrap_or_default();
        entries.truncate(MAX_RECENT_SEARCHES);
        Self { storage, entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn record(&mut self, query: &str) {
        if push_recent(&mut self.entries, query, MAX_RECENT_SEARCHES) {
            self.persist();
        }
    }

    pub fn remove(&mut self, query: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|existing| existing != query);
        let removed = self.entries.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    fn persist(&self) {
        storage::persist_or_warn(self.storage.as_ref(), keys::RECENT_SEARCHES, &self.entries);
    }
}

// --- Catalog-backed service ---

pub struct CatalogSearchService {
    source: Arc<dyn ListingSource>,
    recent: Option<SharedStorage>,
    config: SuggestionConfig,
}

impl CatalogSearchService {
    pub fn new(source: Arc<dyn ListingSource>) -> Self {
        Self {
            source,
            recent: None,
            config: SuggestionConfig::default(),
        }
    }

    /// Read persisted recent searches from this storage for default suggestions.
    pub fn with_recent_searches(mut self, storage: SharedStorage) -> Self {
        self.recent = Some(storage);
        self
    }

    pub fn with_config(mut self, config: SuggestionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn source(&self) -> &Arc<dyn ListingSource> {
        &self.source
    }

    fn recent_entries(&self) -> Vec<String> {
        self.recent
            .as_ref()
            .and_then(|s| storage::load_or_warn::<Vec<String>>(s.as_ref(), keys::RECENT_SEARCHES))
            .unwrap_or_default()
    }
}

impl SearchService for CatalogSearchService {
    fn search_cars(
        &self,
        query: &str,
        criteria: &FilterCriteria,
        page: usize,
        page_size: usize,
    ) -> SearchResults {
        // An explicit query wins over the one stored in the criteria.
        let effective = if query.trim().is_empty() {
            criteria.query.as_deref().unwrap_or("")
        } else {
            query
        };
        let terms = query_terms(effective);

        let mut matched: Vec<&Listing> = self
            .source
            .listings()
            .iter()
            .filter(|l| matches_terms(l, &terms) && matches_criteria(l, criteria))
            .collect();
        if let Some(sort) = &criteria.sort {
            sort_listings(&mut matched, sort);
        }

        let total = matched.len();
        let (start, end, has_more) = page_bounds(page, page_size, total);
        let items: Vec<Listing> = matched[start..end].iter().map(|l| (*l).clone()).collect();
        tracing::debug!(
            query = effective,
            total,
            page,
            returned = items.len(),
            "Search completed"
        );

        SearchResults {
            items,
            total,
            suggestions: self.suggestions(effective),
            has_more,
        }
    }

    fn suggestions(&self, query: &str) -> Vec<Suggestion> {
        generate_suggestions(query, &self.recent_entries(), &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, sample_catalog};
    use crate::models::{FuelType, NumericRange, Transmission};
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    fn service() -> CatalogSearchService {
        CatalogSearchService::new(Arc::new(sample_catalog()))
    }

    fn ids(results: &SearchResults) -> Vec<&str> {
        results.items.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn every_term_must_match() {
        let svc = service();
        let hits = svc.search_cars("bmw diesel", &FilterCriteria::default(), 1, 50);
        assert_eq!(ids(&hits), vec!["car-001", "car-002"]);

        let none = svc.search_cars("bmw electric", &FilterCriteria::default(), 1, 50);
        assert_eq!(none.total, 0);
        assert!(!none.has_more);
    }

    #[test]
    fn criteria_query_is_used_when_explicit_query_is_blank() {
        let svc = service();
        let criteria = FilterCriteria {
            query: Some("tesla".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&svc.search_cars("  ", &criteria, 1, 10)), vec!["car-017"]);
        // explicit query wins
        assert_eq!(svc.search_cars("dacia", &criteria, 1, 10).total, 2);
    }

    #[test]
    fn facets_combine_with_and() {
        let svc = service();
        let criteria = FilterCriteria {
            fuel_types: vec![FuelType::Diesel],
            transmissions: vec![Transmission::Manual],
            price: Some(NumericRange::new(Some(8_000), Some(16_800))),
            ..Default::default()
        };
        let results = svc.search_cars("", &criteria, 1, 50);
        assert_eq!(ids(&results), vec!["car-006", "car-015"]);
    }

    #[test]
    fn mileage_bound_excludes_listings_without_mileage() {
        let svc = service();
        let criteria = FilterCriteria {
            brands: vec!["toyota".to_string()],
            mileage: Some(NumericRange::new(None, Some(500_000))),
            ..Default::default()
        };
        assert_eq!(ids(&svc.search_cars("", &criteria, 1, 50)), vec!["car-009"]);
    }

    #[test]
    fn exclusions_drop_matching_listings() {
        let svc = service();
        let criteria = FilterCriteria {
            brands: vec!["Audi".to_string()],
            exclusions: vec!["quattro".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&svc.search_cars("", &criteria, 1, 50)), vec!["car-003"]);
    }

    #[test]
    fn missing_sort_values_go_last_in_both_directions() {
        let svc = service();
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let criteria = FilterCriteria {
                brands: vec!["Toyota".to_string(), "Opel".to_string()],
                sort: Some(SortDescriptor::new(SortField::Mileage, direction)),
                ..Default::default()
            };
            let results = svc.search_cars("", &criteria, 1, 50);
            assert_eq!(results.items.last().map(|l| l.id.as_str()), Some("car-010"));
        }
    }

    #[test]
    fn sorts_by_price_and_dates() {
        let svc = service();
        let asc = FilterCriteria {
            sort: Some(SortDescriptor::new(SortField::Price, SortDirection::Asc)),
            ..Default::default()
        };
        let results = svc.search_cars("", &asc, 1, 3);
        assert_eq!(ids(&results), vec!["car-020", "car-008", "car-011"]);

        let newest = FilterCriteria {
            sort: Some(SortDescriptor::new(SortField::CreatedAt, SortDirection::Desc)),
            ..Default::default()
        };
        assert_eq!(svc.search_cars("", &newest, 1, 1).items[0].id, "car-001");
    }

    #[test]
    fn second_page_of_twenty_listings() {
        let results = service().search_cars("", &FilterCriteria::default(), 2, 12);
        assert_eq!(results.items.len(), 8);
        assert_eq!(results.total, 20);
        assert!(!results.has_more);

        let first = service().search_cars("", &FilterCriteria::default(), 1, 12);
        assert!(first.has_more);
    }

    #[test]
    fn page_bounds_clamp_out_of_range_pages() {
        assert_eq!(page_bounds(0, 10, 25), (0, 10, true));
        assert_eq!(page_bounds(3, 10, 25), (20, 25, false));
        assert_eq!(page_bounds(9, 10, 25), (25, 25, false));
        assert_eq!(page_bounds(1, 0, 3), (0, 1, true));
    }

    #[test]
    fn short_query_suggests_recent_then_popular() {
        let config = SuggestionConfig::default();
        let recent = vec!["audi a4".to_string(), "golf".to_string()];
        let suggestions = generate_suggestions("a", &recent, &config);
        assert_eq!(suggestions.len(), config.max_suggestions);
        assert_eq!(suggestions[0].text, "audi a4");
        assert_eq!(suggestions[0].category, SuggestionCategory::Recent);
        assert_eq!(suggestions[1].text, "golf");
        assert_eq!(suggestions[2].text, "SUV diesel");
        assert_eq!(suggestions[2].category, SuggestionCategory::Popular);
        assert_eq!(suggestions[2].id, "popular-2");
    }

    #[test]
    fn long_query_matches_brands_models_then_modifiers() {
        let suggestions = generate_suggestions("bmw", &[], &SuggestionConfig::default());
        let texts: Vec<&str> = suggestions.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "BMW",
                "BMW Seria 1",
                "BMW Seria 3",
                "BMW Seria 5",
                "BMW X1",
                "BMW X3",
                "BMW X5",
                "bmw diesel",
            ]
        );
        assert_eq!(suggestions[0].category, SuggestionCategory::Brand);
        assert_eq!(suggestions[7].category, SuggestionCategory::Query);
    }

    #[test]
    fn modifiers_already_in_query_are_skipped() {
        let config = SuggestionConfig {
            min_query_length: 2,
            max_suggestions: 10,
        };
        let suggestions = generate_suggestions("zz Diesel", &[], &config);
        let texts: Vec<&str> = suggestions.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "zz Diesel automatic",
                "zz Diesel 2020",
                "zz Diesel under 20000",
                "zz Diesel used",
            ]
        );
        assert!(suggestions.iter().all(|s| s.category == SuggestionCategory::Query));
    }

    #[test]
    fn recent_searches_dedup_and_cap() {
        let storage = MemoryStorage::shared();
        let mut recent = RecentSearches::load(storage.clone());
        for q in ["audi", "bmw", "audi"] {
            recent.record(q);
        }
        assert_eq!(recent.entries(), ["audi", "bmw"]);

        for i in 0..15 {
            recent.record(&format!("query {}", i));
        }
        assert_eq!(recent.entries().len(), MAX_RECENT_SEARCHES);
        assert_eq!(recent.entries()[0], "query 14");

        let reloaded = RecentSearches::load(storage);
        assert_eq!(reloaded.entries(), recent.entries());
    }

    #[test]
    fn service_suggestions_read_persisted_recent_searches() {
        let storage = MemoryStorage::shared();
        RecentSearches::load(storage.clone()).record("passat");
        let svc = CatalogSearchService::new(Arc::new(InMemoryCatalog::default()))
            .with_recent_searches(storage);
        let suggestions = svc.suggestions("");
        assert_eq!(suggestions[0].text, "passat");
        assert_eq!(suggestions[0].category, SuggestionCategory::Recent);
    }
}
