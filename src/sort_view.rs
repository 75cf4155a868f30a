//! Sort key, grid/list view mode and page size, persisted as one preferences
//! record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{SortDescriptor, SortDirection, SortField, ViewMode};
use crate::storage::{self, SharedStorage, keys};

pub struct SortOption {
    pub key: &'static str,
    pub label: &'static str,
    pub descriptor: SortDescriptor,
}

pub static SORT_OPTIONS: &[SortOption] = &[
    SortOption {
        key: "newest",
        label: "Newest first",
        descriptor: SortDescriptor::new(SortField::CreatedAt, SortDirection::Desc),
    },
    SortOption {
        key: "oldest",
        label: "Oldest first",
        descriptor: SortDescriptor::new(SortField::CreatedAt, SortDirection::Asc),
    },
    SortOption {
        key: "price_asc",
        label: "Price: low to high",
        descriptor: SortDescriptor::new(SortField::Price, SortDirection::Asc),
    },
    SortOption {
        key: "price_desc",
        label: "Price: high to low",
        descriptor: SortDescriptor::new(SortField::Price, SortDirection::Desc),
    },
    SortOption {
        key: "year_desc",
        label: "Year: newest",
        descriptor: SortDescriptor::new(SortField::Year, SortDirection::Desc),
    },
    SortOption {
        key: "year_asc",
        label: "Year: oldest",
        descriptor: SortDescriptor::new(SortField::Year, SortDirection::Asc),
    },
    SortOption {
        key: "mileage_asc",
        label: "Mileage: lowest",
        descriptor: SortDescriptor::new(SortField::Mileage, SortDirection::Asc),
    },
    SortOption {
        key: "mileage_desc",
        label: "Mileage: highest",
        descriptor: SortDescriptor::new(SortField::Mileage, SortDirection::Desc),
    },
];

pub const DEFAULT_SORT: &str = "newest";
pub const DEFAULT_VIEW_MODE: ViewMode = ViewMode::Grid;
pub const DEFAULT_RESULTS_PER_PAGE: usize = 12;
/// Page sizes offered in the UI. Other values within `1..=MAX_RESULTS_PER_PAGE` are accepted.
pub const RESULTS_PER_PAGE_OPTIONS: [usize; 3] = [12, 24, 48];
pub const MAX_RESULTS_PER_PAGE: usize = 100;

pub fn sort_option(key: &str) -> Option<&'static SortOption> {
    SORT_OPTIONS.iter().find(|o| o.key == key)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PreferenceError {
    #[error("unknown sort option '{0}'")]
    UnknownSort(String),

    #[error("results per page must be between 1 and 100, got {0}")]
    InvalidPageSize(usize),
}

/// The three owned preferences, as written into the shared preferences record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortViewPreferences {
    pub active_sort: String,
    pub view_mode: ViewMode,
    pub results_per_page: usize,
}

impl Default for SortViewPreferences {
    fn default() -> Self {
        Self {
            active_sort: DEFAULT_SORT.to_string(),
            view_mode: DEFAULT_VIEW_MODE,
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
        }
    }
}

// Each field is restored independently; a bad value only loses that field.
fn restore(record: &Map<String, Value>) -> SortViewPreferences {
    let mut prefs = SortViewPreferences::default();
    if let Some(sort) = record.get("activeSort").and_then(Value::as_str) {
        if sort_option(sort).is_some() {
            prefs.active_sort = sort.to_string();
        }
    }
    if let Some(mode) = record
        .get("viewMode")
        .and_then(|v| serde_json::from_value::<ViewMode>(v.clone()).ok())
    {
        prefs.view_mode = mode;
    }
    if let Some(size) = record.get("resultsPerPage").and_then(Value::as_u64) {
        let size = size as usize;
        if (1..=MAX_RESULTS_PER_PAGE).contains(&size) {
            prefs.results_per_page = size;
        }
    }
    prefs
}

type Callback<T> = Box<dyn Fn(T) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    sort: Option<Callback<&'static SortOption>>,
    view_mode: Option<Callback<ViewMode>>,
    results_per_page: Option<Callback<usize>>,
}

pub struct SortViewState {
    storage: SharedStorage,
    prefs: SortViewPreferences,
    callbacks: Callbacks,
}

impl SortViewState {
    pub fn load(storage: SharedStorage) -> Self {
        let record: Map<String, Value> =
            storage::load_or_warn(storage.as_ref(), keys::PREFERENCES).unwrap_or_default();
        Self {
            storage,
            prefs: restore(&record),
            callbacks: Callbacks::default(),
        }
    }

    pub fn on_sort_change(&mut self, callback: Callback<&'static SortOption>) {
        self.callbacks.sort = Some(callback);
    }

    pub fn on_view_mode_change(&mut self, callback: Callback<ViewMode>) {
        self.callbacks.view_mode = Some(callback);
    }

    pub fn on_results_per_page_change(&mut self, callback: Callback<usize>) {
        self.callbacks.results_per_page = Some(callback);
    }

    pub fn preferences(&self) -> &SortViewPreferences {
        &self.prefs
    }

    pub fn active_sort(&self) -> &str {
        &self.prefs.active_sort
    }

    pub fn active_sort_option(&self) -> &'static SortOption {
        sort_option(&self.prefs.active_sort).unwrap_or(&SORT_OPTIONS[0])
    }

    pub fn active_sort_descriptor(&self) -> SortDescriptor {
        self.active_sort_option().descriptor
    }

    pub fn view_mode(&self) -> ViewMode {
        self.prefs.view_mode
    }

    pub fn results_per_page(&self) -> usize {
        self.prefs.results_per_page
    }

    pub fn set_sort(&mut self, key: &str) -> Result<(), PreferenceError> {
        let option = sort_option(key).ok_or_else(|| PreferenceError::UnknownSort(key.to_string()))?;
        self.prefs.active_sort = option.key.to_string();
        self.persist();
        if let Some(callback) = &self.callbacks.sort {
            callback(option);
        }
        Ok(())
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.prefs.view_mode = mode;
        self.persist();
        if let Some(callback) = &self.callbacks.view_mode {
            callback(mode);
        }
    }

    pub fn set_results_per_page(&mut self, size: usize) -> Result<(), PreferenceError> {
        if !(1..=MAX_RESULTS_PER_PAGE).contains(&size) {
            return Err(PreferenceError::InvalidPageSize(size));
        }
        self.prefs.results_per_page = size;
        self.persist();
        if let Some(callback) = &self.callbacks.results_per_page {
            callback(size);
        }
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.prefs = SortViewPreferences::default();
        self.persist();
        let callbacks = &self.callbacks;
        if let Some(callback) = &callbacks.sort {
            callback(self.active_sort_option());
        }
        if let Some(callback) = &callbacks.view_mode {
            callback(self.prefs.view_mode);
        }
        if let Some(callback) = &callbacks.results_per_page {
            callback(self.prefs.results_per_page);
        }
    }

    /// Merges the owned fields into whatever record is already stored, so
    /// keys written by other features are left alone.
    fn persist(&self) {
        let mut record: Map<String, Value> =
            storage::load_or_warn(self.storage.as_ref(), keys::PREFERENCES).unwrap_or_default();
        if let Ok(Value::Object(own)) = serde_json::to_value(&self.prefs) {
            record.extend(own);
        }
        storage::persist_or_warn(self.storage.as_ref(), keys::PREFERENCES, &record);
    }
}
