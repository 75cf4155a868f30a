//! Current filter criteria plus the user's saved searches.
//!
//! [`FilterState`] owns the criteria the results page is filtered by. Every
//! mutation writes through to storage immediately and then invokes the
//! optional change callback, so a page controller can re-run its search.

use serde::{Deserialize, Deserializer};

use crate::clock::{SharedClock, time_based_id};
use crate::models::{
    FilterCriteria, FuelType, NumericRange, SavedSearch, SortDescriptor, Transmission,
};
use crate::storage::{self, SharedStorage, keys};

/// One field of a partial update.
///
/// Deserializes from JSON as: key missing -> `Keep`, `null` -> `Clear`,
/// any value -> `Set`.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

fn patch_list<T>(target: &mut Vec<T>, patch: Patch<Vec<T>>) {
    match patch {
        Patch::Keep => {}
        Patch::Clear => target.clear(),
        Patch::Set(values) => *target = values,
    }
}

fn patch_value<T>(target: &mut Option<T>, patch: Patch<T>) {
    match patch {
        Patch::Keep => {}
        Patch::Clear => *target = None,
        Patch::Set(value) => *target = Some(value),
    }
}

/// Partial criteria merged into the current ones by
/// [`FilterState::update_filters`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterUpdate {
    pub brands: Patch<Vec<String>>,
    pub models: Patch<Vec<String>>,
    pub price: Patch<NumericRange>,
    pub year: Patch<NumericRange>,
    pub mileage: Patch<NumericRange>,
    pub fuel_types: Patch<Vec<FuelType>>,
    pub transmissions: Patch<Vec<Transmission>>,
    pub locations: Patch<Vec<String>>,
    pub exclusions: Patch<Vec<String>>,
    pub query: Patch<String>,
    pub sort: Patch<SortDescriptor>,
}

impl FilterUpdate {
    /// Merges into `criteria`, then prunes whatever no longer constrains
    /// anything (empty lists, unbounded ranges, blank query).
    pub fn apply_to(self, criteria: &mut FilterCriteria) {
        patch_list(&mut criteria.brands, self.brands);
        patch_list(&mut criteria.models, self.models);
        patch_value(&mut criteria.price, self.price);
        patch_value(&mut criteria.year, self.year);
        patch_value(&mut criteria.mileage, self.mileage);
        patch_list(&mut criteria.fuel_types, self.fuel_types);
        patch_list(&mut criteria.transmissions, self.transmissions);
        patch_list(&mut criteria.locations, self.locations);
        patch_list(&mut criteria.exclusions, self.exclusions);
        patch_value(&mut criteria.query, self.query);
        patch_value(&mut criteria.sort, self.sort);
        criteria.prune();
    }
}

pub type FiltersCallback = Box<dyn Fn(&FilterCriteria) + Send + Sync>;

pub struct FilterState {
    storage: SharedStorage,
    clock: SharedClock,
    filters: FilterCriteria,
    saved: Vec<SavedSearch>,
    on_change: Option<FiltersCallback>,
}

impl FilterState {
    /// Restores criteria and saved searches from storage. Unreadable blobs
    /// are logged and replaced by empty state.
    pub fn load(storage: SharedStorage, clock: SharedClock) -> Self {
        let filters = storage::load_or_warn(storage.as_ref(), keys::FILTERS).unwrap_or_default();
        let saved = storage::load_or_warn(storage.as_ref(), keys::SAVED_SEARCHES).unwrap_or_default();
        Self {
            storage,
            clock,
            filters,
            saved,
            on_change: None,
        }
    }

    pub fn on_filters_change(&mut self, callback: FiltersCallback) {
        self.on_change = Some(callback);
    }

    pub fn filters(&self) -> &FilterCriteria {
        &self.filters
    }

    pub fn saved_searches(&self) -> &[SavedSearch] {
        &self.saved
    }

    pub fn has_active_filters(&self) -> bool {
        self.filters.has_active()
    }

    pub fn active_filter_count(&self) -> usize {
        self.filters.active_count()
    }

    /// Replaces the criteria wholesale.
    pub fn set_filters(&mut self, filters: FilterCriteria) {
        self.filters = filters;
        self.commit_filters();
    }

    pub fn update_filters(&mut self, update: FilterUpdate) {
        update.apply_to(&mut self.filters);
        self.commit_filters();
    }

    pub fn reset_filters(&mut self) {
        self.filters = FilterCriteria::default();
        self.commit_filters();
    }

    /// Stores a named snapshot at the front of the saved list.
    pub fn save_search(&mut self, name: &str, filters: FilterCriteria) -> SavedSearch {
        let now = self.clock.now();
        let search = SavedSearch {
            id: time_based_id("search", now),
            name: name.trim().to_string(),
            filters,
            created_at: now,
        };
        self.saved.insert(0, search.clone());
        self.persist_saved();
        tracing::debug!(id = %search.id, name = %search.name, "Saved search created");
        search
    }

    pub fn load_saved_search(&mut self, search: &SavedSearch) {
        self.set_filters(search.filters.clone());
    }

    pub fn delete_saved_search(&mut self, id: &str) -> bool {
        let before = self.saved.len();
        self.saved.retain(|s| s.id != id);
        let removed = self.saved.len() != before;
        if removed {
            self.persist_saved();
        }
        removed
    }

    pub fn saved_search(&self, id: &str) -> Option<&SavedSearch> {
        self.saved.iter().find(|s| s.id == id)
    }

    fn commit_filters(&self) {
        storage::persist_or_warn(self.storage.as_ref(), keys::FILTERS, &self.filters);
        if let Some(callback) = &self.on_change {
            callback(&self.filters);
        }
    }

    fn persist_saved(&self) {
        storage::persist_or_warn(self.storage.as_ref(), keys::SAVED_SEARCHES, &self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Facet, SortDirection, SortField};
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn state(storage: &SharedStorage) -> FilterState {
        FilterState::load(storage.clone(), Arc::new(ManualClock::default()))
    }

    fn criteria() -> FilterCriteria {
        FilterCriteria {
            brands: vec!["BMW".to_string(), "Audi".to_string()],
            price: Some(NumericRange::new(Some(10_000), Some(30_000))),
            fuel_types: vec![FuelType::Diesel],
            sort: Some(SortDescriptor::new(SortField::Price, SortDirection::Asc)),
            ..Default::default()
        }
    }

    #[test]
    fn empty_list_update_removes_the_key() {
        let storage = MemoryStorage::shared();
        let mut filters = state(&storage);
        filters.set_filters(criteria());

        let update: FilterUpdate = serde_json::from_str(r#"{"brands": []}"#).unwrap();
        filters.update_filters(update);

        assert!(filters.filters().brands.is_empty());
        let json = serde_json::to_value(filters.filters()).unwrap();
        assert!(json.get("brands").is_none());
        assert_eq!(filters.active_filter_count(), 3);
    }

    #[test]
    fn null_clears_and_missing_keeps() {
        let mut current = criteria();
        let update: FilterUpdate =
            serde_json::from_str(r#"{"price": null, "models": ["X5"]}"#).unwrap();
        assert_eq!(update.brands, Patch::Keep);
        update.apply_to(&mut current);
        assert_eq!(current.price, None);
        assert_eq!(current.models, vec!["X5".to_string()]);
        assert_eq!(current.brands.len(), 2);
    }

    #[test]
    fn active_count_matches_active_facets() {
        let storage = MemoryStorage::shared();
        let mut filters = state(&storage);
        assert!(!filters.has_active_filters());
        filters.set_filters(criteria());
        assert!(filters.has_active_filters());
        assert_eq!(
            filters.filters().active_facets().collect::<Vec<_>>(),
            vec![Facet::Brands, Facet::Price, Facet::FuelTypes, Facet::Sort]
        );
        assert_eq!(filters.active_filter_count(), 4);
    }

    #[test]
    fn saved_search_round_trip() {
        let storage = MemoryStorage::shared();
        let mut filters = state(&storage);
        let saved = filters.save_search("Diesel under 30k", criteria());
        filters.reset_filters();
        assert_eq!(filters.filters(), &FilterCriteria::default());

        filters.load_saved_search(&saved);
        assert_eq!(filters.filters(), &criteria());
    }

    #[test]
    fn saved_searches_are_prepended_and_persisted() {
        let storage = MemoryStorage::shared();
        let mut filters = state(&storage);
        let first = filters.save_search("first", FilterCriteria::default());
        let second = filters.save_search("second", criteria());
        assert_eq!(filters.saved_searches()[0].id, second.id);

        let reloaded = state(&storage);
        assert_eq!(reloaded.saved_searches(), filters.saved_searches());

        let mut filters = reloaded;
        assert!(filters.delete_saved_search(&first.id));
        assert!(!filters.delete_saved_search(&first.id));
        assert_eq!(state(&storage).saved_searches().len(), 1);
    }

    #[test]
    fn criteria_survive_reload() {
        let storage = MemoryStorage::shared();
        state(&storage).set_filters(criteria());
        assert_eq!(state(&storage).filters(), &criteria());
    }

    #[test]
    fn malformed_storage_loads_empty_state() {
        let storage = MemoryStorage::shared();
        storage.set(keys::FILTERS, "{\"brands\": 42").unwrap();
        storage.set(keys::SAVED_SEARCHES, "not json").unwrap();
        let filters = state(&storage);
        assert_eq!(filters.filters(), &FilterCriteria::default());
        assert!(filters.saved_searches().is_empty());
    }

    #[test]
    fn change_callback_sees_committed_criteria() {
        let storage = MemoryStorage::shared();
        let mut filters = state(&storage);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        filters.on_filters_change(Box::new(move |criteria| {
            sink.lock().unwrap().push(criteria.active_count());
        }));

        filters.set_filters(criteria());
        filters.update_filters(FilterUpdate {
            fuel_types: Patch::Clear,
            ..Default::default()
        });
        filters.reset_filters();
        assert_eq!(*seen.lock().unwrap(), vec![4, 3, 0]);
    }
}
