//! Route table and navigation

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Application routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Root,
    Login,
    Register,
    Settings,
}

impl Route {
    pub const ALL: [Self; 4] = [Self::Root, Self::Login, Self::Register, Self::Settings];

    pub const fn path(self) -> &'static str {
        match self {
            Self::Root => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Settings => "/settings",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Follow redirects to the route that is actually displayed
    pub const fn resolve(self) -> Self {
        match self {
            Self::Root => Self::Login,
            other => other,
        }
    }
}

/// Something that can move the application to another route
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Number of visits [`History`] remembers
pub const HISTORY_LIMIT: usize = 64;

/// Navigator that records the most recent places the application has been
#[derive(Debug)]
pub struct History {
    visits: Mutex<VecDeque<Route>>,
}

impl History {
    /// Start at the root route, which shows the login view
    pub fn new() -> Self {
        Self {
            visits: Mutex::new(VecDeque::from([Route::Root.resolve()])),
        }
    }

    pub fn current(&self) -> Route {
        let visits = self.visits.lock().unwrap_or_else(PoisonError::into_inner);
        visits.back().copied().unwrap_or(Route::Login)
    }

    pub fn visits(&self) -> Vec<Route> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for History {
    fn navigate(&self, route: Route) {
        let resolved = route.resolve();
        debug!(requested = route.path(), resolved = resolved.path(), "Navigating");
        let mut visits = self.visits.lock().unwrap_or_else(PoisonError::into_inner);
        if visits.len() == HISTORY_LIMIT {
            visits.pop_front();
        }
        visits.push_back(resolved);
    }
}
