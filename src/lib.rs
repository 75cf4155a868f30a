pub mod catalog;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod filters;
pub mod models;
pub mod routes;
pub mod search;
pub mod sort_view;
pub mod storage;
pub mod store;

use std::sync::Arc;

use axum::extract::FromRef;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::catalog::InMemoryCatalog;
use crate::clock::SharedClock;
use crate::config::Settings;
use crate::controller::SearchPageController;
use crate::filters::{FilterState, FilterUpdate};
use crate::models::{FilterCriteria, SavedSearch};
use crate::search::{CatalogSearchService, RecentSearches, SuggestionConfig};
use crate::sort_view::SortViewState;
use crate::storage::SharedStorage;
use crate::store::{Store, TracingMiddleware};

/// The browsing session served by this process: one results page plus the
/// shared store. The page owns filters, saved and recent searches; the store
/// holds a mirror, refreshed on open and on every change, so `/api/state`
/// and the page never disagree.
pub struct Session {
    pub store: Store,
    pub page: SearchPageController,
}

impl Session {
    /// Restores everything from `storage`, initializes the store and loads
    /// the first results page.
    pub fn open(
        catalog: Arc<InMemoryCatalog>,
        storage: SharedStorage,
        clock: SharedClock,
        suggestions: SuggestionConfig,
        seed_notifications: bool,
    ) -> Self {
        let service = CatalogSearchService::new(catalog)
            .with_recent_searches(storage.clone())
            .with_config(suggestions);
        let page = SearchPageController::new(
            Arc::new(service),
            FilterState::load(storage.clone(), clock.clone()),
            SortViewState::load(storage.clone()),
            RecentSearches::load(storage.clone()),
        );
        let store = Store::builder(storage)
            .clock(clock)
            .middleware(Arc::new(TracingMiddleware))
            .seed_notifications(seed_notifications)
            .build();
        store.initialize();

        let mut session = Self { store, page };
        session.page.refresh();
        session.sync_filters();
        session.sync_search_history();
        session
    }

    // The store blob may be older than the page's own keys, or lost.
    fn sync_search_history(&self) {
        self.store.replace_search_history(
            self.page.filters().saved_searches().to_vec(),
            self.page.recent_searches().to_vec(),
        );
    }

    fn sync_filters(&self) {
        self.store.set_filters(self.page.filters().filters().clone());
    }

    pub fn search(&mut self, query: &str) {
        self.page.search(query);
        self.store.add_recent_search(query);
    }

    pub fn set_filters(&mut self, criteria: FilterCriteria) {
        self.page.set_filters(criteria);
        self.sync_filters();
    }

    pub fn update_filters(&mut self, update: FilterUpdate) {
        self.page.update_filters(update);
        self.sync_filters();
    }

    pub fn reset_filters(&mut self) {
        self.page.reset_filters();
        self.sync_filters();
    }

    pub fn save_current_search(&mut self, name: &str) -> SavedSearch {
        let saved = self.page.save_current_search(name);
        self.store.add_saved_search(saved.clone());
        saved
    }

    pub fn load_saved_search(&mut self, id: &str) -> Option<SavedSearch> {
        let saved = self.page.load_saved_search(id)?;
        self.sync_filters();
        Some(saved)
    }

    pub fn delete_saved_search(&mut self, id: &str) -> bool {
        let removed = self.page.delete_saved_search(id);
        self.store.remove_saved_search(id);
        removed
    }

    pub fn remove_recent_search(&mut self, query: &str) -> bool {
        let removed = self.page.remove_recent_search(query);
        self.store.remove_recent_search(query);
        removed
    }

    pub fn clear_recent_searches(&mut self) {
        self.page.clear_recent_searches();
        self.store.clear_recent_searches();
    }
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub http_client: Arc<Client>,
    pub catalog: Arc<InMemoryCatalog>,
    pub session: Arc<Mutex<Session>>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        http_client: Arc<Client>,
        catalog: Arc<InMemoryCatalog>,
        storage: SharedStorage,
        clock: SharedClock,
    ) -> Self {
        let session = Session::open(
            catalog.clone(),
            storage,
            clock,
            settings.suggestion_config(),
            settings.seed_notifications,
        );
        Self {
            settings,
            http_client,
            catalog,
            session: Arc::new(Mutex::new(session)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    fn session(storage: &SharedStorage) -> Session {
        Session::open(
            Arc::new(sample_catalog()),
            storage.clone(),
            Arc::new(ManualClock::default()),
            SuggestionConfig::default(),
            false,
        )
    }

    #[test]
    fn store_mirrors_page_changes() {
        let storage = MemoryStorage::shared();
        let mut session = session(&storage);
        assert_eq!(session.page.snapshot().total, 20);

        session.search("dacia");
        session.update_filters(FilterUpdate {
            brands: crate::filters::Patch::Set(vec!["Dacia".to_string()]),
            ..Default::default()
        });
        let saved = session.save_current_search("Dacias");

        let state = session.store.state();
        assert_eq!(state.recent_searches, vec!["dacia"]);
        assert_eq!(state.filters.brands, vec!["Dacia"]);
        assert_eq!(state.saved_searches[0].id, saved.id);

        assert!(session.delete_saved_search(&saved.id));
        session.clear_recent_searches();
        let state = session.store.state();
        assert!(state.saved_searches.is_empty());
        assert!(state.recent_searches.is_empty());
    }

    #[test]
    fn reopening_restores_filters_into_the_store() {
        let storage = MemoryStorage::shared();
        session(&storage).set_filters(FilterCriteria {
            brands: vec!["Tesla".to_string()],
            ..Default::default()
        });

        let reopened = session(&storage);
        assert_eq!(reopened.store.state().filters.brands, vec!["Tesla"]);
        assert_eq!(reopened.page.snapshot().total, 1);
    }
}
