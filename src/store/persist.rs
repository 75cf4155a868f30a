//! Which parts of [`MarketState`] outlive the process, and where they go.
//!
//! The durable slice is an explicit allow-list ([`PersistedSlice`]).
//! Notifications are kept under their own key, and the auth mirror is also
//! copied into session storage. Writes happen only after hydration has
//! completed, and only when the written value actually changed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::state::MarketState;
use crate::models::{AuthUser, Notification, SavedSearch, Theme};
use crate::storage::{self, SharedStorage, StorageError, keys};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSlice {
    pub user: Option<AuthUser>,
    pub theme: Theme,
    pub favorites: BTreeSet<String>,
    pub comparison: Vec<String>,
    pub saved_searches: Vec<SavedSearch>,
    pub recent_searches: Vec<String>,
}

impl PersistedSlice {
    pub fn from_state(state: &MarketState) -> Self {
        Self {
            user: state.user.clone(),
            theme: state.theme,
            favorites: state.favorites.clone(),
            comparison: state.comparison.clone(),
            saved_searches: state.saved_searches.clone(),
            recent_searches: state.recent_searches.clone(),
        }
    }
}

pub(crate) struct Persistence {
    storage: SharedStorage,
    session: SharedStorage,
    hydrated: bool,
    last_slice: Option<PersistedSlice>,
    last_notifications: Option<Vec<Notification>>,
    last_session_user: Option<Option<AuthUser>>,
}

impl Persistence {
    pub(crate) fn new(storage: SharedStorage, session: SharedStorage) -> Self {
        Self {
            storage,
            session,
            hydrated: false,
            last_slice: None,
            last_notifications: None,
            last_session_user: None,
        }
    }

    pub(crate) fn read_slice(&self) -> Result<Option<PersistedSlice>, StorageError> {
        storage::read_json(self.storage.as_ref(), keys::APP_STORE)
    }

    pub(crate) fn read_notifications(&self) -> Result<Option<Vec<Notification>>, StorageError> {
        storage::read_json(self.storage.as_ref(), keys::NOTIFICATIONS)
    }

    pub(crate) fn read_session_user(&self) -> Result<Option<AuthUser>, StorageError> {
        storage::read_json(self.session.as_ref(), keys::SESSION_USER)
    }

    /// Hydration is done: from now on every change is written through. The
    /// current state becomes the baseline so nothing is rewritten needlessly.
    pub(crate) fn mark_hydrated(&mut self, state: &MarketState) {
        self.hydrated = true;
        self.last_slice = Some(PersistedSlice::from_state(state));
        self.last_notifications = Some(state.notifications.clone());
        self.last_session_user = None;
    }

    pub(crate) fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub(crate) fn sync(&mut self, state: &MarketState) {
        if !self.hydrated {
            return;
        }

        let slice = PersistedSlice::from_state(state);
        if self.last_slice.as_ref() != Some(&slice)
            && storage::persist_or_warn(self.storage.as_ref(), keys::APP_STORE, &slice)
        {
            self.last_slice = Some(slice);
        }

        if self.last_notifications.as_ref() != Some(&state.notifications)
            && storage::persist_or_warn(
                self.storage.as_ref(),
                keys::NOTIFICATIONS,
                &state.notifications,
            )
        {
            self.last_notifications = Some(state.notifications.clone());
        }

        if self.last_session_user.as_ref() != Some(&state.user) {
            let written = match &state.user {
                Some(user) => storage::persist_or_warn(self.session.as_ref(), keys::SESSION_USER, user),
                None => match self.session.remove(keys::SESSION_USER) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to clear session user");
                        false
                    }
                },
            };
            if written {
                self.last_session_user = Some(state.user.clone());
            }
        }
    }
}
