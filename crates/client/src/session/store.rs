//! Session store
//!
//! Owns the persisted access token and the mirrored refresh cookie. Writers
//! are serialised behind one lock together with a generation counter: login
//! and logout start a new generation, and a token refresh only lands if the
//! generation it started in is still current. A logout also marks the
//! session as ended until the next login.

use crate::error::StorageError;
use crate::storage::{ACCESS_TOKEN_KEY, REFRESH_COOKIE_KEY, Storage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

/// Generation of the session observed at some point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionStamp(u64);

#[derive(Debug, Default)]
struct Generation {
    current: u64,
    ended: bool,
}

pub struct SessionStore {
    storage: Arc<dyn Storage>,
    generation: Mutex<Generation>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            generation: Mutex::new(Generation::default()),
        }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Current access token, `None` when absent or unreadable
    pub fn access_token(&self) -> Option<String> {
        match self.storage.get_item(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                error!(error = %e, "Failed to read access token");
                None
            }
        }
    }

    fn generation(&self) -> MutexGuard<'_, Generation> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stamp(&self) -> SessionStamp {
        SessionStamp(self.generation().current)
    }

    /// Whether the session was ended by a logout and no login followed
    pub fn is_ended(&self) -> bool {
        self.generation().ended
    }

    /// Store the token of a freshly established session
    pub fn begin(&self, access_token: &str) -> Result<SessionStamp, StorageError> {
        let mut generation = self.generation();
        self.storage.set_item(ACCESS_TOKEN_KEY, access_token)?;
        generation.current += 1;
        generation.ended = false;
        debug!(generation = generation.current, "Session started");
        Ok(SessionStamp(generation.current))
    }

    /// Replace the token if no login or logout happened since `stamp` was taken
    pub fn update_if_current(
        &self,
        stamp: SessionStamp,
        access_token: &str,
    ) -> Result<bool, StorageError> {
        let generation = self.generation();
        if generation.current != stamp.0 {
            debug!(
                stamp = stamp.0,
                generation = generation.current,
                "Rejecting token from a previous session generation"
            );
            return Ok(false);
        }
        self.storage.set_item(ACCESS_TOKEN_KEY, access_token)?;
        Ok(true)
    }

    /// Forget the session; any refresh started before this call is discarded
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut generation = self.generation();
        generation.current += 1;
        generation.ended = true;
        self.storage.remove_item(ACCESS_TOKEN_KEY)?;
        self.storage.remove_item(REFRESH_COOKIE_KEY)?;
        debug!(generation = generation.current, "Session cleared");
        Ok(())
    }

    /// Mirrored refresh cookie string, if any
    pub fn refresh_cookie(&self) -> Option<String> {
        match self.storage.get_item(REFRESH_COOKIE_KEY) {
            Ok(cookie) => cookie,
            Err(e) => {
                error!(error = %e, "Failed to read refresh cookie");
                None
            }
        }
    }

    pub fn save_refresh_cookie(&self, cookie: &str) -> Result<(), StorageError> {
        self.storage.set_item(REFRESH_COOKIE_KEY, cookie)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("stamp", &self.stamp())
            .field("ended", &self.is_ended())
            .field("has_token", &self.access_token().is_some())
            .finish_non_exhaustive()
    }
}
