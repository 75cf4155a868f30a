// End-to-end runs of the search page and store against on-disk storage,
// reopening the session the way a restarted server would.

use std::fs;
use std::sync::Arc;

use automarket::{
    Session,
    catalog::sample_catalog,
    clock::ManualClock,
    filters::{FilterUpdate, Patch},
    models::{FilterCriteria, FuelType, NumericRange, Theme, ViewMode},
    search::SuggestionConfig,
    storage::{FileStorage, SharedStorage, keys},
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn open_storage(dir: &TempDir) -> SharedStorage {
    Arc::new(FileStorage::open(dir.path()).unwrap())
}

fn open_session(storage: &SharedStorage, seed: bool) -> Session {
    Session::open(
        Arc::new(sample_catalog()),
        storage.clone(),
        Arc::new(ManualClock::default()),
        SuggestionConfig::default(),
        seed,
    )
}

#[test]
fn first_page_uses_default_preferences() {
    let dir = TempDir::new().unwrap();
    let session = open_session(&open_storage(&dir), false);

    let page = session.page.snapshot();
    assert_eq!(page.total, 20);
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 12);
    assert_eq!(page.items.len(), 12);
    assert!(page.has_more);
    assert_eq!(page.items[0].id, "car-001");
    assert_eq!(page.active_sort, "newest");
    assert_eq!(page.view_mode, ViewMode::Grid);
}

#[test]
fn load_more_walks_to_the_end_of_the_results() {
    let dir = TempDir::new().unwrap();
    let mut session = open_session(&open_storage(&dir), false);

    assert!(session.page.load_more());
    let page = session.page.snapshot();
    assert_eq!(page.items.len(), 20);
    assert!(!page.has_more);
    assert!(!session.page.load_more());
}

#[test]
fn page_state_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let storage = open_storage(&dir);
    {
        let mut session = open_session(&storage, false);
        session.update_filters(FilterUpdate {
            brands: Patch::Set(vec!["Dacia".to_string()]),
            price: Patch::Set(NumericRange {
                min: None,
                max: Some(50_000),
            }),
            ..Default::default()
        });
        session.page.set_sort("price_asc").unwrap();
        session.page.set_view_mode(ViewMode::List);
        session.search("dacia");
        session.save_current_search("Cheap Dacias");
    }

    let reopened = open_session(&storage, false);
    let filters = reopened.page.filters().filters();
    assert_eq!(filters.brands, vec!["Dacia"]);
    assert_eq!(filters.price.as_ref().and_then(|p| p.max), Some(50_000));
    assert_eq!(reopened.page.sort_view().active_sort(), "price_asc");
    assert_eq!(reopened.page.sort_view().view_mode(), ViewMode::List);
    assert_eq!(reopened.page.recent_searches(), ["dacia".to_string()]);

    let saved = reopened.page.filters().saved_searches();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "Cheap Dacias");
    assert_eq!(reopened.store.state().saved_searches.len(), 1);
}

#[test]
fn loading_a_saved_search_replaces_the_filters() {
    let dir = TempDir::new().unwrap();
    let mut session = open_session(&open_storage(&dir), false);

    session.set_filters(FilterCriteria {
        fuel_types: vec![FuelType::Electric],
        ..Default::default()
    });
    let electric = session.save_current_search("Electric");
    assert_eq!(session.page.snapshot().total, 1);

    session.reset_filters();
    assert_eq!(session.page.snapshot().total, 20);
    assert!(!session.page.filters().has_active_filters());

    let loaded = session.load_saved_search(&electric.id).unwrap();
    assert_eq!(loaded.id, electric.id);
    let page = session.page.snapshot();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, "car-017");
    assert_eq!(session.store.state().filters.fuel_types, vec![FuelType::Electric]);

    assert!(session.load_saved_search("search-missing").is_none());
}

#[test]
fn store_slices_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let storage = open_storage(&dir);
    {
        let session = open_session(&storage, false);
        session.store.add_to_favorites("car-003");
        session.store.add_to_favorites("car-007");
        session.store.add_to_comparison("car-001");
        session.store.add_to_comparison("car-002");
        session.store.set_theme(Theme::Dark);
    }

    let reopened = open_session(&storage, false);
    let state = reopened.store.state();
    assert!(state.initialized);
    assert!(state.is_favorite("car-003"));
    assert!(state.is_favorite("car-007"));
    assert_eq!(state.comparison, vec!["car-001", "car-002"]);
    assert_eq!(state.theme, Theme::Dark);
}

#[test]
fn comparison_is_capped_at_three() {
    let dir = TempDir::new().unwrap();
    let session = open_session(&open_storage(&dir), false);

    for id in ["car-001", "car-002", "car-003"] {
        assert!(session.store.add_to_comparison(id));
    }
    assert!(!session.store.can_add_to_comparison("car-004"));
    assert!(session.store.try_add_to_comparison("car-004").is_err());
    assert_eq!(session.store.state().comparison.len(), 3);

    // Re-adding a listing already in the comparison is not an overflow.
    assert!(session.store.add_to_comparison("car-002"));
    assert_eq!(session.store.state().comparison.len(), 3);
}

#[test]
fn seeded_notifications_are_read_and_persisted() {
    let dir = TempDir::new().unwrap();
    let storage = open_storage(&dir);
    {
        let session = open_session(&storage, true);
        assert_eq!(session.store.state().notifications.len(), 3);
        assert_eq!(session.store.unread_count(), 3);
        session.store.mark_all_notifications_read();
        assert_eq!(session.store.unread_count(), 0);
    }

    // Existing notifications suppress the seed on the next start.
    let reopened = open_session(&storage, true);
    let state = reopened.store.state();
    assert_eq!(state.notifications.len(), 3);
    assert_eq!(state.unread_count, 0);
    assert!(state.notifications.iter().all(|n| n.read_at.is_some()));
}

#[test]
fn corrupt_store_blob_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(format!("{}.json", keys::APP_STORE)), "{not json").unwrap();

    let storage = open_storage(&dir);
    {
        let session = open_session(&storage, false);
        let state = session.store.state();
        assert!(state.initialized);
        assert!(state.favorites.is_empty());
        session.store.add_to_favorites("car-010");
    }

    let raw = fs::read_to_string(dir.path().join(format!("{}.json", keys::APP_STORE))).unwrap();
    let blob: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(blob["favorites"], serde_json::json!(["car-010"]));

    let reopened = open_session(&storage, false);
    assert!(reopened.store.is_favorite("car-010"));
}

#[test]
fn corrupt_filters_blob_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(format!("{}.json", keys::FILTERS)), "[1, 2").unwrap();

    let session = open_session(&open_storage(&dir), false);
    assert!(!session.page.filters().has_active_filters());
    assert_eq!(session.page.snapshot().total, 20);
}

#[test]
fn search_history_is_restored_into_the_store_when_its_blob_is_lost() {
    let dir = TempDir::new().unwrap();
    let storage = open_storage(&dir);
    let saved = {
        let mut session = open_session(&storage, false);
        session.search("dacia");
        session.save_current_search("Mine")
    };
    let blob_path = dir.path().join(format!("{}.json", keys::APP_STORE));
    fs::write(&blob_path, "{\"savedSearches\": [").unwrap();

    let reopened = open_session(&storage, false);
    let state = reopened.store.state();
    assert_eq!(reopened.page.filters().saved_searches().len(), 1);
    assert_eq!(state.saved_searches, vec![saved]);
    assert_eq!(state.recent_searches, reopened.page.recent_searches().to_vec());
    assert_eq!(state.recent_searches, vec!["dacia"]);

    // The repaired mirror is written back for the next start.
    let raw = fs::read_to_string(&blob_path).unwrap();
    let blob: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(blob["recentSearches"], serde_json::json!(["dacia"]));
}
