//! The search results page: filters, sort/view preferences and the search
//! service composed into one paginated listing with "load more".

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::filters::{FilterState, FilterUpdate};
use crate::models::{FilterCriteria, Listing, SavedSearch, SearchResults, Suggestion, ViewMode};
use crate::search::{RecentSearches, SearchService};
use crate::sort_view::{PreferenceError, SortViewState};

/// What the results page renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub query: String,
    pub page: usize,
    pub page_size: usize,
    pub items: Vec<Listing>,
    pub total: usize,
    pub has_more: bool,
    pub suggestions: Vec<Suggestion>,
    pub filters: FilterCriteria,
    pub active_filter_count: usize,
    pub active_sort: String,
    pub view_mode: ViewMode,
}

pub struct SearchPageController {
    service: Arc<dyn SearchService>,
    filters: FilterState,
    sort_view: SortViewState,
    recent: RecentSearches,
    // Set by the state callbacks whenever a committed change invalidates the
    // current result set.
    stale: Arc<AtomicBool>,
    query: String,
    page: usize,
    items: Vec<Listing>,
    total: usize,
    has_more: bool,
    suggestions: Vec<Suggestion>,
}

impl SearchPageController {
    pub fn new(
        service: Arc<dyn SearchService>,
        mut filters: FilterState,
        mut sort_view: SortViewState,
        recent: RecentSearches,
    ) -> Self {
        let stale = Arc::new(AtomicBool::new(false));

        let flag = stale.clone();
        filters.on_filters_change(Box::new(move |_| flag.store(true, Ordering::SeqCst)));
        let flag = stale.clone();
        sort_view.on_sort_change(Box::new(move |_| flag.store(true, Ordering::SeqCst)));
        let flag = stale.clone();
        sort_view.on_results_per_page_change(Box::new(move |_| flag.store(true, Ordering::SeqCst)));

        Self {
            service,
            filters,
            sort_view,
            recent,
            stale,
            query: String::new(),
            page: 1,
            items: Vec::new(),
            total: 0,
            has_more: false,
            suggestions: Vec::new(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort_view(&self) -> &SortViewState {
        &self.sort_view
    }

    pub fn recent_searches(&self) -> &[String] {
        self.recent.entries()
    }

    pub fn items(&self) -> &[Listing] {
        &self.items
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Criteria actually sent to the search service. An explicit sort in the
    /// filters wins over the page's sort preference.
    pub fn effective_criteria(&self) -> FilterCriteria {
        let mut criteria = self.filters.filters().clone();
        if criteria.sort.is_none() {
            criteria.sort = Some(self.sort_view.active_sort_descriptor());
        }
        criteria
    }

    /// Filter count shown next to the filter panel. The sort is not a filter
    /// from the user's point of view.
    pub fn active_filter_count(&self) -> usize {
        let criteria = self.filters.filters();
        criteria.active_count() - usize::from(criteria.sort.is_some())
    }

    pub fn snapshot(&self) -> SearchPage {
        SearchPage {
            query: self.query.clone(),
            page: self.page,
            page_size: self.sort_view.results_per_page(),
            items: self.items.clone(),
            total: self.total,
            has_more: self.has_more,
            suggestions: self.suggestions.clone(),
            filters: self.filters.filters().clone(),
            active_filter_count: self.active_filter_count(),
            active_sort: self.sort_view.active_sort().to_string(),
            view_mode: self.sort_view.view_mode(),
        }
    }

    fn fetch(&self, page: usize) -> SearchResults {
        self.service.search_cars(
            &self.query,
            &self.effective_criteria(),
            page,
            self.sort_view.results_per_page(),
        )
    }

    fn run_first_page(&mut self) {
        self.stale.store(false, Ordering::SeqCst);
        let results = self.fetch(1);
        self.page = 1;
        self.items = results.items;
        self.total = results.total;
        self.has_more = results.has_more;
        self.suggestions = results.suggestions;
    }

    fn refresh_if_stale(&mut self) {
        if self.stale.load(Ordering::SeqCst) {
            self.run_first_page();
        }
    }

    /// New query, back to page 1. Non-blank queries are remembered.
    pub fn search(&mut self, query: &str) -> SearchPage {
        self.query = query.trim().to_string();
        self.recent.record(&self.query);
        self.run_first_page();
        tracing::debug!(query = %self.query, total = self.total, "Search page loaded");
        self.snapshot()
    }

    /// Re-runs the current query from page 1.
    pub fn refresh(&mut self) -> SearchPage {
        self.run_first_page();
        self.snapshot()
    }

    /// Appends the next page. Returns `false` when there was nothing left.
    pub fn load_more(&mut self) -> bool {
        if !self.has_more {
            return false;
        }
        let results = self.fetch(self.page + 1);
        self.page += 1;
        self.items.extend(results.items);
        self.total = results.total;
        self.has_more = results.has_more;
        true
    }

    /// Replaces the shown items with one specific page.
    pub fn go_to_page(&mut self, page: usize) -> SearchPage {
        let page = page.max(1);
        let results = self.fetch(page);
        self.page = page;
        self.items = results.items;
        self.total = results.total;
        self.has_more = results.has_more;
        self.snapshot()
    }

    pub fn suggestions(&self, query: &str) -> Vec<Suggestion> {
        self.service.suggestions(query)
    }

    // --- Filters ---

    pub fn set_filters(&mut self, criteria: FilterCriteria) {
        self.filters.set_filters(criteria);
        self.refresh_if_stale();
    }

    pub fn update_filters(&mut self, update: FilterUpdate) {
        self.filters.update_filters(update);
        self.refresh_if_stale();
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset_filters();
        self.refresh_if_stale();
    }

    pub fn save_current_search(&mut self, name: &str) -> SavedSearch {
        let criteria = self.filters.filters().clone();
        self.filters.save_search(name, criteria)
    }

    pub fn load_saved_search(&mut self, id: &str) -> Option<SavedSearch> {
        let search = self.filters.saved_search(id)?.clone();
        self.filters.load_saved_search(&search);
        self.refresh_if_stale();
        Some(search)
    }

    pub fn delete_saved_search(&mut self, id: &str) -> bool {
        self.filters.delete_saved_search(id)
    }

    // --- Sort & view ---

    pub fn set_sort(&mut self, key: &str) -> Result<(), PreferenceError> {
        self.sort_view.set_sort(key)?;
        self.refresh_if_stale();
        Ok(())
    }

    /// Presentation only; the result set stays as it is.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.sort_view.set_view_mode(mode);
    }

    pub fn set_results_per_page(&mut self, size: usize) -> Result<(), PreferenceError> {
        self.sort_view.set_results_per_page(size)?;
        self.refresh_if_stale();
        Ok(())
    }

    pub fn reset_preferences(&mut self) {
        self.sort_view.reset_to_defaults();
        self.refresh_if_stale();
    }

    // --- Recent searches ---

    pub fn remove_recent_search(&mut self, query: &str) -> bool {
        self.recent.remove(query)
    }

    pub fn clear_recent_searches(&mut self) {
        self.recent.clear();
    }
}
