//! Session lifecycle: login, token refresh and logout

pub mod logout;
pub mod refresh;
pub mod store;

pub use logout::LogoutOutcome;
pub use refresh::{RefreshHandle, RefreshOutcome, TokenRefresher};
pub use store::{SessionStamp, SessionStore};

use crate::client::ApiClient;
use crate::cookie::{REFRESH_COOKIE, set_cookie};
use crate::error::ClientError;
use crate::router::{Navigator, Route};
use crate::types::{ChangePasswordRequest, LoginRequest, RegisterRequest, UserProfile};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Default lifetime of the mirrored refresh cookie
pub const DEFAULT_REFRESH_COOKIE_DAYS: i64 = 1;

/// Ties the API client, the session store and navigation together
#[derive(Clone)]
pub struct SessionManager {
    client: ApiClient,
    store: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
    refresh_cookie_days: i64,
}

impl SessionManager {
    /// Create a manager, seeding the client's cookie jar from storage
    pub fn new(client: ApiClient, store: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        if let Some(cookie) = store.refresh_cookie() {
            client.restore_cookie(&cookie);
        }

        Self {
            client,
            store,
            navigator,
            refresh_cookie_days: DEFAULT_REFRESH_COOKIE_DAYS,
        }
    }

    /// Set how long the mirrored refresh cookie stays valid
    #[must_use]
    pub fn with_refresh_cookie_days(mut self, days: i64) -> Self {
        self.refresh_cookie_days = days;
        self
    }

    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.access_token().is_some()
    }

    /// Log in and start a new session
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self.client.login(&request).await.inspect_err(|e| {
            warn!(error = %e, "Login failed");
        })?;

        self.store.begin(&response.access_token)?;
        self.mirror_refresh_cookie();
        info!("Logged in");

        self.navigator.navigate(Route::Settings);
        Ok(())
    }

    /// Register a new account, then send the user to the login view
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ClientError> {
        let profile = self.client.register(request).await.inspect_err(|e| {
            warn!(error = %e, "Registration failed");
        })?;

        info!("Registered account");
        self.navigator.navigate(Route::Login);
        Ok(profile)
    }

    /// Change the password of the current session's user
    pub async fn change_password(&self, password: &str) -> Result<(), ClientError> {
        let token = self.store.access_token().ok_or(ClientError::NotLoggedIn)?;
        let request = ChangePasswordRequest {
            password: password.to_string(),
        };

        self.client
            .change_password(&token, &request)
            .await
            .inspect_err(|e| warn!(error = %e, "Password change failed"))?;

        info!("Password changed");
        Ok(())
    }

    /// Copy the jar's refresh cookie into storage so it survives restarts
    fn mirror_refresh_cookie(&self) {
        let Some(value) = self.client.refresh_cookie() else {
            warn!("Server did not set a refresh cookie");
            return;
        };

        let cookie = set_cookie(REFRESH_COOKIE, &value, self.refresh_cookie_days);
        if let Err(e) = self.store.save_refresh_cookie(&cookie) {
            error!(error = %e, "Failed to persist refresh cookie");
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.client.base_url())
            .field("store", &self.store)
            .field("refresh_cookie_days", &self.refresh_cookie_days)
            .finish_non_exhaustive()
    }
}
