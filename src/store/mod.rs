//! Cross-page application state: auth mirror, favorites, comparison,
//! notifications and friends.
//!
//! [`Store`] wraps a pure [`reduce`] function. Every mutation is an
//! [`Action`]; middleware observes it, the persistence adapter writes the
//! allow-listed slice, and subscribers receive the new snapshot once the lock
//! is released. Hydration from storage is an explicit step ([`Store::hydrate`]
//! or the one-shot [`Store::initialize`]).

mod middleware;
mod persist;
mod state;

pub use middleware::{Middleware, TracingMiddleware};
pub use persist::PersistedSlice;
pub use state::{Action, MAX_COMPARISON, MAX_NOTIFICATIONS, MarketState, reduce};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Duration;

use crate::clock::{SharedClock, SystemClock, time_based_id};
use crate::models::{
    AuthUser, FilterCriteria, NewNotification, Notification, NotificationKind,
    NotificationPriority, SavedSearch, Theme,
};
use crate::storage::{MemoryStorage, SharedStorage, StorageError};
use persist::Persistence;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("comparison already holds the maximum of 3 listings")]
    ComparisonFull,

    #[error("notification '{0}' not found")]
    UnknownNotification(String),
}

pub type Subscriber = Arc<dyn Fn(&MarketState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    state: MarketState,
    persistence: Persistence,
}

pub struct Store {
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
    middleware: Vec<Arc<dyn Middleware>>,
    clock: SharedClock,
    seed_notifications: bool,
    init_started: AtomicBool,
}

pub struct StoreBuilder {
    storage: SharedStorage,
    session_storage: Option<SharedStorage>,
    clock: Option<SharedClock>,
    middleware: Vec<Arc<dyn Middleware>>,
    seed_notifications: bool,
}

impl StoreBuilder {
    /// Session-scoped storage for the auth mirror. Defaults to a fresh
    /// in-memory map, which dies with the process.
    pub fn session_storage(mut self, storage: SharedStorage) -> Self {
        self.session_storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn seed_notifications(mut self, seed: bool) -> Self {
        self.seed_notifications = seed;
        self
    }

    pub fn build(self) -> Store {
        let session = self.session_storage.unwrap_or_else(MemoryStorage::shared);
        Store {
            inner: Mutex::new(Inner {
                state: MarketState::default(),
                persistence: Persistence::new(self.storage, session),
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            middleware: self.middleware,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            seed_notifications: self.seed_notifications,
            init_started: AtomicBool::new(false),
        }
    }
}

// Returns the value of a best-effort read, treating corrupt data as absent.
fn recover<T>(what: &str, result: Result<Option<T>, StorageError>) -> Result<Option<T>, StorageError> {
    match result {
        Err(e) if e.is_corrupt() => {
            tracing::warn!(what, error = %e, "Discarding corrupt persisted state");
            Ok(None)
        }
        other => other,
    }
}

impl Store {
    pub fn builder(storage: SharedStorage) -> StoreBuilder {
        StoreBuilder {
            storage,
            session_storage: None,
            clock: None,
            middleware: Vec::new(),
            seed_notifications: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, inner: &mut Inner, action: &Action) {
        for m in &self.middleware {
            m.before_dispatch(action, &inner.state);
        }
        let current = std::mem::take(&mut inner.state);
        inner.state = reduce(current, action);
        for m in &self.middleware {
            m.after_dispatch(action, &inner.state);
        }
        inner.persistence.sync(&inner.state);
    }

    fn notify(&self, snapshot: Option<MarketState>) {
        let Some(snapshot) = snapshot else {
            return;
        };
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }

    fn has_subscribers(&self) -> bool {
        !self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }

    /// Applies `action` and lets `inspect` look at the resulting state
    /// before anyone else can change it.
    fn dispatch_inspect<R>(&self, action: Action, inspect: impl FnOnce(&MarketState) -> R) -> R {
        let wants_snapshot = self.has_subscribers();
        let (result, snapshot) = {
            let mut inner = self.lock();
            self.apply(&mut inner, &action);
            let result = inspect(&inner.state);
            (result, wants_snapshot.then(|| inner.state.clone()))
        };
        self.notify(snapshot);
        result
    }

    pub fn dispatch(&self, action: Action) {
        self.dispatch_inspect(action, |_| ());
    }

    pub fn subscribe(&self, subscriber: impl Fn(&MarketState) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn state(&self) -> MarketState {
        self.lock().state.clone()
    }

    pub fn with_state<R>(&self, read: impl FnOnce(&MarketState) -> R) -> R {
        read(&self.lock().state)
    }

    // --- Hydration & startup ---

    /// Loads the persisted slice and notifications into the store and
    /// enables write-through. Corrupt blobs are discarded; an unreachable
    /// backend is an error and leaves write-through disabled, so stored data
    /// is never clobbered by an empty in-memory state.
    pub fn hydrate(&self) -> Result<(), StorageError> {
        let snapshot = {
            let mut inner = self.lock();
            let slice = recover("store slice", inner.persistence.read_slice())?;
            let notifications = recover("notifications", inner.persistence.read_notifications())?;

            if let Some(slice) = slice {
                self.apply(&mut inner, &Action::Hydrate(slice));
            }
            if let Some(list) = notifications {
                self.apply(&mut inner, &Action::ReplaceNotifications(list));
            }
            let state = inner.state.clone();
            inner.persistence.mark_hydrated(&state);
            tracing::debug!(
                favorites = state.favorites.len(),
                notifications = state.notifications.len(),
                "Store hydrated"
            );
            self.has_subscribers().then_some(state)
        };
        self.notify(snapshot);
        Ok(())
    }

    pub fn is_hydrated(&self) -> bool {
        self.lock().persistence.is_hydrated()
    }

    /// One-shot startup: hydrate, restore the session user, seed default
    /// notifications when there are none. Returns `false` when another call
    /// already ran (or is running) the sequence. Failures end up in the
    /// state's `error` field instead of being returned.
    pub fn initialize(&self) -> bool {
        if self.init_started.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.dispatch(Action::SetLoading(true));
        match self.hydrate().and_then(|()| self.restore_session_user()) {
            Ok(()) => {
                if self.seed_notifications && self.with_state(|s| s.notifications.is_empty()) {
                    self.seed_default_notifications();
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Store initialization failed, continuing without persisted state");
                self.dispatch(Action::SetError(Some(format!("Failed to restore saved data: {}", e))));
            }
        }
        self.dispatch(Action::SetLoading(false));
        self.dispatch(Action::MarkInitialized);
        tracing::info!("Store initialized");
        true
    }

    fn restore_session_user(&self) -> Result<(), StorageError> {
        let user = recover("session user", self.lock().persistence.read_session_user())?;
        if let Some(user) = user {
            self.dispatch(Action::SetUser(Some(user)));
        }
        Ok(())
    }

    fn seed_default_notifications(&self) {
        let now = self.clock.now();
        let defaults = [
            (
                "Welcome to AutoMarket",
                "Save searches to get alerts when matching cars are listed.",
                NotificationKind::System,
                NotificationPriority::Low,
                Duration::hours(2),
            ),
            (
                "Price drop",
                "A car you viewed recently is now cheaper.",
                NotificationKind::PriceDrop,
                NotificationPriority::High,
                Duration::hours(1),
            ),
            (
                "New listings",
                "New cars match one of your saved searches.",
                NotificationKind::SavedSearchAlert,
                NotificationPriority::Medium,
                Duration::minutes(10),
            ),
        ];
        for (title, message, kind, priority, age) in defaults {
            let created_at = now - age;
            self.dispatch(Action::AddNotification(Notification {
                id: time_based_id("notification", created_at),
                title: title.to_string(),
                message: message.to_string(),
                kind,
                priority,
                read: false,
                read_at: None,
                created_at,
            }));
        }
    }

    // --- Auth mirror & theme ---

    pub fn set_user(&self, user: Option<AuthUser>) {
        self.dispatch(Action::SetUser(user));
    }

    pub fn set_theme(&self, theme: Theme) {
        self.dispatch(Action::SetTheme(theme));
    }

    // --- Favorites ---

    pub fn add_to_favorites(&self, id: &str) {
        self.dispatch(Action::AddFavorite(id.to_string()));
    }

    pub fn remove_from_favorites(&self, id: &str) {
        self.dispatch(Action::RemoveFavorite(id.to_string()));
    }

    pub fn clear_favorites(&self) {
        self.dispatch(Action::ClearFavorites);
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.with_state(|s| s.is_favorite(id))
    }

    // --- Comparison ---

    /// Adds `id` unless the comparison is full. Returns whether `id` is in
    /// the comparison afterwards; adding an id twice is not an error.
    pub fn add_to_comparison(&self, id: &str) -> bool {
        self.dispatch_inspect(Action::AddToComparison(id.to_string()), |s| s.is_in_comparison(id))
    }

    pub fn try_add_to_comparison(&self, id: &str) -> Result<(), StoreError> {
        if self.add_to_comparison(id) {
            Ok(())
        } else {
            Err(StoreError::ComparisonFull)
        }
    }

    pub fn can_add_to_comparison(&self, id: &str) -> bool {
        self.with_state(|s| s.can_add_to_comparison(id))
    }

    pub fn remove_from_comparison(&self, id: &str) {
        self.dispatch(Action::RemoveFromComparison(id.to_string()));
    }

    pub fn clear_comparison(&self) {
        self.dispatch(Action::ClearComparison);
    }

    // --- Saved & recent searches ---

    pub fn add_saved_search(&self, search: SavedSearch) {
        self.dispatch(Action::AddSavedSearch(search));
    }

    pub fn remove_saved_search(&self, id: &str) {
        self.dispatch(Action::RemoveSavedSearch(id.to_string()));
    }

    pub fn add_recent_search(&self, query: &str) {
        self.dispatch(Action::AddRecentSearch(query.to_string()));
    }

    pub fn remove_recent_search(&self, query: &str) {
        self.dispatch(Action::RemoveRecentSearch(query.to_string()));
    }

    pub fn clear_recent_searches(&self) {
        self.dispatch(Action::ClearRecentSearches);
    }

    /// Overwrites both search lists, e.g. from the page's own copies.
    /// `recent` is most-recent-first, as stored.
    pub fn replace_search_history(&self, saved: Vec<SavedSearch>, recent: Vec<String>) {
        self.dispatch(Action::ReplaceSearchHistory { saved, recent });
    }

    // --- Notifications ---

    pub fn add_notification(&self, new: NewNotification) -> Notification {
        let now = self.clock.now();
        let notification = Notification {
            id: time_based_id("notification", now),
            title: new.title,
            message: new.message,
            kind: new.kind,
            priority: new.priority,
            read: false,
            read_at: None,
            created_at: now,
        };
        self.dispatch(Action::AddNotification(notification.clone()));
        notification
    }

    pub fn mark_notification_read(&self, id: &str) -> Result<(), StoreError> {
        let action = Action::MarkNotificationRead {
            id: id.to_string(),
            at: self.clock.now(),
        };
        let found = self.dispatch_inspect(action, |s| s.notifications.iter().any(|n| n.id == id));
        if found {
            Ok(())
        } else {
            Err(StoreError::UnknownNotification(id.to_string()))
        }
    }

    pub fn mark_all_notifications_read(&self) {
        self.dispatch(Action::MarkAllNotificationsRead { at: self.clock.now() });
    }

    pub fn remove_notification(&self, id: &str) -> Result<(), StoreError> {
        if !self.with_state(|s| s.notifications.iter().any(|n| n.id == id)) {
            return Err(StoreError::UnknownNotification(id.to_string()));
        }
        self.dispatch(Action::RemoveNotification(id.to_string()));
        Ok(())
    }

    pub fn clear_notifications(&self) {
        self.dispatch(Action::ClearNotifications);
    }

    pub fn unread_notifications(&self) -> Vec<Notification> {
        self.with_state(|s| s.unread_notifications().cloned().collect())
    }

    pub fn unread_count(&self) -> usize {
        self.with_state(|s| s.unread_count)
    }

    // --- Session-only flags ---

    pub fn set_filters(&self, filters: FilterCriteria) {
        self.dispatch(Action::SetFilters(filters));
    }

    pub fn set_loading(&self, loading: bool) {
        self.dispatch(Action::SetLoading(loading));
    }

    pub fn set_error(&self, error: Option<String>) {
        self.dispatch(Action::SetError(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{MemoryStorage, keys};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;

    fn new_notification(title: &str) -> NewNotification {
        NewNotification {
            title: title.to_string(),
            message: "body".to_string(),
            kind: NotificationKind::Message,
            priority: NotificationPriority::Medium,
        }
    }

    fn store(storage: &SharedStorage) -> Store {
        Store::builder(storage.clone())
            .clock(Arc::new(ManualClock::default()))
            .seed_notifications(false)
            .build()
    }

    #[test]
    fn initialize_runs_once() {
        let storage = MemoryStorage::shared();
        let store = Store::builder(storage.clone())
            .clock(Arc::new(ManualClock::default()))
            .build();

        assert!(store.initialize());
        assert!(!store.initialize());

        let state = store.state();
        assert!(state.initialized);
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert_eq!(state.notifications.len(), 3);
        assert_eq!(state.unread_count, 3);
    }

    #[test]
    fn seeding_is_skipped_when_notifications_exist() {
        let storage = MemoryStorage::shared();
        {
            let first = Store::builder(storage.clone()).build();
            first.initialize();
            first.add_notification(new_notification("kept"));
            assert_eq!(first.state().notifications.len(), 4);
        }

        let second = Store::builder(storage.clone()).build();
        second.initialize();
        let state = second.state();
        assert_eq!(state.notifications.len(), 4);
        assert_eq!(state.notifications[0].title, "kept");
    }

    #[test]
    fn favorites_and_comparison_survive_a_restart() {
        let storage = MemoryStorage::shared();
        let first = store(&storage);
        first.initialize();
        first.add_to_favorites("car-001");
        first.add_to_favorites("car-001");
        assert!(first.add_to_comparison("car-002"));
        first.set_theme(Theme::Dark);

        let second = store(&storage);
        assert!(!second.is_favorite("car-001"));
        second.hydrate().unwrap();
        let state = second.state();
        assert_eq!(state.favorites.len(), 1);
        assert_eq!(state.comparison, vec!["car-002"]);
        assert_eq!(state.theme, Theme::Dark);
    }

    #[test]
    fn dispatch_before_hydration_does_not_overwrite_storage() {
        let storage = MemoryStorage::shared();
        let first = store(&storage);
        first.initialize();
        first.add_to_favorites("car-001");

        let second = store(&storage);
        second.add_to_favorites("car-009");
        second.hydrate().unwrap();
        assert!(second.is_favorite("car-001"));
        assert!(!second.is_favorite("car-009"));
    }

    #[test]
    fn comparison_rejects_a_fourth_listing() {
        let store = store(&MemoryStorage::shared());
        store.initialize();
        for id in ["a", "b", "c"] {
            assert!(store.add_to_comparison(id));
        }
        assert!(store.add_to_comparison("b"));
        assert!(!store.can_add_to_comparison("d"));
        assert_eq!(store.try_add_to_comparison("d"), Err(StoreError::ComparisonFull));
        assert_eq!(store.state().comparison, vec!["a", "b", "c"]);

        store.remove_from_comparison("a");
        assert!(store.add_to_comparison("d"));
    }

    #[test]
    fn corrupt_storage_is_recovered_during_initialize() {
        let storage = MemoryStorage::shared();
        storage.set(keys::APP_STORE, "{\"favorites\": [1,").unwrap();
        storage.set(keys::NOTIFICATIONS, "oops").unwrap();

        let store = Store::builder(storage.clone()).build();
        assert!(store.initialize());
        let state = store.state();
        assert_eq!(state.error, None);
        assert!(state.favorites.is_empty());
        assert_eq!(state.notifications.len(), 3);

        store.add_to_favorites("car-003");
        let reloaded = Store::builder(storage).build();
        reloaded.hydrate().unwrap();
        assert!(reloaded.is_favorite("car-003"));
    }

    #[test]
    fn unavailable_storage_sets_the_error_flag() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set_available(false);
        let store = Store::builder(backend.clone()).build();

        assert!(store.initialize());
        let state = store.state();
        assert!(state.initialized);
        assert!(!state.is_loading);
        assert!(state.error.is_some());
        assert!(!store.is_hydrated());

        store.add_to_favorites("car-001");
        assert!(store.is_favorite("car-001"));
    }

    #[test]
    fn session_user_is_restored_on_initialize() {
        let session = MemoryStorage::shared();
        let user = AuthUser {
            id: "u1".to_string(),
            email: "ana@example.com".to_string(),
            display_name: None,
        };
        let first = Store::builder(MemoryStorage::shared())
            .session_storage(session.clone())
            .build();
        first.initialize();
        first.set_user(Some(user.clone()));

        let second = Store::builder(MemoryStorage::shared())
            .session_storage(session)
            .build();
        second.initialize();
        let state = second.state();
        assert_eq!(state.user, Some(user));
        assert!(state.is_authenticated);
    }

    #[test]
    fn notification_helpers_track_unread() {
        let clock = ManualClock::default();
        let store = Store::builder(MemoryStorage::shared())
            .clock(Arc::new(clock.clone()))
            .seed_notifications(false)
            .build();
        store.initialize();

        let first = store.add_notification(new_notification("one"));
        let second = store.add_notification(new_notification("two"));
        assert_ne!(first.id, second.id);
        assert_eq!(store.unread_count(), 2);

        clock.advance(Duration::minutes(5));
        store.mark_notification_read(&first.id).unwrap();
        store.mark_notification_read(&first.id).unwrap();
        assert_eq!(store.unread_count(), 1);
        assert_eq!(
            store.unread_notifications().into_iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![second.id.clone()]
        );

        assert_eq!(
            store.mark_notification_read("nope"),
            Err(StoreError::UnknownNotification("nope".to_string()))
        );
        store.remove_notification(&second.id).unwrap();
        assert_eq!(store.unread_count(), 0);
        store.clear_notifications();
        assert!(store.state().notifications.is_empty());
    }

    #[test]
    fn subscribers_see_each_transition_until_unsubscribed() {
        let store = store(&MemoryStorage::shared());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let id = store.subscribe(move |state| sink.lock().unwrap().push(state.favorites.len()));

        store.add_to_favorites("a");
        store.add_to_favorites("b");
        assert!(store.unsubscribe(id));
        store.add_to_favorites("c");
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn middleware_wraps_every_dispatch() {
        #[derive(Default)]
        struct Recorder(StdMutex<Vec<String>>);
        impl Middleware for Recorder {
            fn before_dispatch(&self, action: &Action, _state: &MarketState) {
                self.0.lock().unwrap().push(format!("before {}", action.name()));
            }
            fn after_dispatch(&self, action: &Action, _state: &MarketState) {
                self.0.lock().unwrap().push(format!("after {}", action.name()));
            }
        }

        let recorder = Arc::new(Recorder::default());
        let store = Store::builder(MemoryStorage::shared())
            .middleware(recorder.clone())
            .middleware(Arc::new(TracingMiddleware))
            .build();
        store.set_theme(Theme::Light);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["before set_theme", "after set_theme"]
        );
    }
}
