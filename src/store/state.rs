use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::persist::PersistedSlice;
use crate::models::{AuthUser, FilterCriteria, Notification, SavedSearch, Theme};
use crate::search::{MAX_RECENT_SEARCHES, push_recent};

pub const MAX_COMPARISON: usize = 3;
pub const MAX_NOTIFICATIONS: usize = 50;

/// Everything shared across pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketState {
    pub user: Option<AuthUser>,
    pub is_authenticated: bool,
    pub favorites: BTreeSet<String>,
    pub comparison: Vec<String>,
    pub saved_searches: Vec<SavedSearch>,
    pub recent_searches: Vec<String>,
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub filters: FilterCriteria,
    pub theme: Theme,
    pub is_loading: bool,
    pub error: Option<String>,
    pub initialized: bool,
}

impl MarketState {
    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.contains(id)
    }

    pub fn is_in_comparison(&self, id: &str) -> bool {
        self.comparison.iter().any(|c| c == id)
    }

    /// True when `id` is already compared or there is still room for it.
    pub fn can_add_to_comparison(&self, id: &str) -> bool {
        self.is_in_comparison(id) || self.comparison.len() < MAX_COMPARISON
    }

    pub fn unread_notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().filter(|n| !n.read)
    }

    fn recount_unread(&mut self) {
        self.unread_count = self.notifications.iter().filter(|n| !n.read).count();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetUser(Option<AuthUser>),
    SetTheme(Theme),
    AddFavorite(String),
    RemoveFavorite(String),
    ClearFavorites,
    AddToComparison(String),
    RemoveFromComparison(String),
    ClearComparison,
    AddSavedSearch(SavedSearch),
    RemoveSavedSearch(String),
    AddRecentSearch(String),
    RemoveRecentSearch(String),
    ClearRecentSearches,
    ReplaceSearchHistory {
        saved: Vec<SavedSearch>,
        recent: Vec<String>,
    },
    AddNotification(Notification),
    MarkNotificationRead { id: String, at: DateTime<Utc> },
    MarkAllNotificationsRead { at: DateTime<Utc> },
    RemoveNotification(String),
    ClearNotifications,
    ReplaceNotifications(Vec<Notification>),
    SetFilters(FilterCriteria),
    SetLoading(bool),
    SetError(Option<String>),
    Hydrate(PersistedSlice),
    MarkInitialized,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetUser(_) => "set_user",
            Action::SetTheme(_) => "set_theme",
            Action::AddFavorite(_) => "add_favorite",
            Action::RemoveFavorite(_) => "remove_favorite",
            Action::ClearFavorites => "clear_favorites",
            Action::AddToComparison(_) => "add_to_comparison",
            Action::RemoveFromComparison(_) => "remove_from_comparison",
            Action::ClearComparison => "clear_comparison",
            Action::AddSavedSearch(_) => "add_saved_search",
            Action::RemoveSavedSearch(_) => "remove_saved_search",
            Action::AddRecentSearch(_) => "add_recent_search",
            Action::RemoveRecentSearch(_) => "remove_recent_search",
            Action::ClearRecentSearches => "clear_recent_searches",
            Action::ReplaceSearchHistory { .. } => "replace_search_history",
            Action::AddNotification(_) => "add_notification",
            Action::MarkNotificationRead { .. } => "mark_notification_read",
            Action::MarkAllNotificationsRead { .. } => "mark_all_notifications_read",
            Action::RemoveNotification(_) => "remove_notification",
            Action::ClearNotifications => "clear_notifications",
            Action::ReplaceNotifications(_) => "replace_notifications",
            Action::SetFilters(_) => "set_filters",
            Action::SetLoading(_) => "set_loading",
            Action::SetError(_) => "set_error",
            Action::Hydrate(_) => "hydrate",
            Action::MarkInitialized => "mark_initialized",
        }
    }
}

/// Pure transition function. Never touches storage or the clock; anything
/// time-dependent arrives inside the action.
pub fn reduce(mut state: MarketState, action: &Action) -> MarketState {
    match action {
        Action::SetUser(user) => {
            state.is_authenticated = user.is_some();
            state.user = user.clone();
        }
        Action::SetTheme(theme) => state.theme = *theme,

        Action::AddFavorite(id) => {
            state.favorites.insert(id.clone());
        }
        Action::RemoveFavorite(id) => {
            state.favorites.remove(id);
        }
        Action::ClearFavorites => state.favorites.clear(),

        Action::AddToComparison(id) => {
            if !state.is_in_comparison(id) && state.comparison.len() < MAX_COMPARISON {
                state.comparison.push(id.clone());
            }
        }
        Action::RemoveFromComparison(id) => state.comparison.retain(|c| c != id),
        Action::ClearComparison => state.comparison.clear(),

        Action::AddSavedSearch(search) => {
            state.saved_searches.retain(|s| s.id != search.id);
            state.saved_searches.insert(0, search.clone());
        }
        Action::RemoveSavedSearch(id) => state.saved_searches.retain(|s| &s.id != id),

        Action::AddRecentSearch(query) => {
            push_recent(&mut state.recent_searches, query, MAX_RECENT_SEARCHES);
        }
        Action::RemoveRecentSearch(query) => state.recent_searches.retain(|q| q != query),
        Action::ClearRecentSearches => state.recent_searches.clear(),
        Action::ReplaceSearchHistory { saved, recent } => {
            state.saved_searches = saved.clone();
            state.recent_searches.clear();
            for query in recent.iter().rev() {
                push_recent(&mut state.recent_searches, query, MAX_RECENT_SEARCHES);
            }
        }

        Action::AddNotification(notification) => {
            state.notifications.insert(0, notification.clone());
            state.notifications.truncate(MAX_NOTIFICATIONS);
            state.recount_unread();
        }
        Action::MarkNotificationRead { id, at } => {
            if let Some(n) = state.notifications.iter_mut().find(|n| &n.id == id) {
                if !n.read {
                    n.read = true;
                    n.read_at = Some(*at);
                    state.unread_count = state.unread_count.saturating_sub(1);
                }
            }
        }
        Action::MarkAllNotificationsRead { at } => {
            for n in state.notifications.iter_mut().filter(|n| !n.read) {
                n.read = true;
                n.read_at = Some(*at);
            }
            state.unread_count = 0;
        }
        Action::RemoveNotification(id) => {
            if let Some(pos) = state.notifications.iter().position(|n| &n.id == id) {
                let removed = state.notifications.remove(pos);
                if !removed.read {
                    state.unread_count = state.unread_count.saturating_sub(1);
                }
            }
        }
        Action::ClearNotifications => {
            state.notifications.clear();
            state.unread_count = 0;
        }
        Action::ReplaceNotifications(list) => {
            state.notifications = list.clone();
            state.notifications.truncate(MAX_NOTIFICATIONS);
            state.recount_unread();
        }

        Action::SetFilters(filters) => state.filters = filters.clone(),
        Action::SetLoading(loading) => state.is_loading = *loading,
        Action::SetError(error) => state.error = error.clone(),

        Action::Hydrate(slice) => {
            state.is_authenticated = slice.user.is_some();
            state.user = slice.user.clone();
            state.theme = slice.theme;
            state.favorites = slice.favorites.clone();
            state.comparison.clear();
            for id in &slice.comparison {
                if !state.is_in_comparison(id) && state.comparison.len() < MAX_COMPARISON {
                    state.comparison.push(id.clone());
                }
            }
            state.saved_searches = slice.saved_searches.clone();
            state.recent_searches = slice.recent_searches.clone();
            state.recent_searches.truncate(MAX_RECENT_SEARCHES);
        }
        Action::MarkInitialized => state.initialized = true,
    }
    state
}
