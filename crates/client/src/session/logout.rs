//! Session termination

use super::SessionManager;
use crate::router::Route;
use tracing::{error, info};

/// What a logout attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Server accepted the logout and local state was cleared
    LoggedOut,
    /// No access token was stored, nothing was sent
    NotLoggedIn,
    /// The server refused or could not be reached; still logged in
    Failed { status: Option<u16> },
}

impl SessionManager {
    /// Terminate the session.
    ///
    /// Local state is only cleared after the server answers 204.
    pub async fn logout(&self) -> LogoutOutcome {
        let Some(token) = self.store.access_token() else {
            error!("Cannot log out: no access token stored");
            return LogoutOutcome::NotLoggedIn;
        };

        if let Err(e) = self.client.logout(&token).await {
            let status = e.status();
            error!(error = %e, ?status, "Logout failed");
            return LogoutOutcome::Failed { status };
        }

        if let Err(e) = self.store.clear() {
            // The server session is gone either way
            error!(error = %e, "Failed to clear stored session");
        }
        self.client.expire_refresh_cookie();

        info!("Logged out");
        self.navigator.navigate(Route::Root);
        LogoutOutcome::LoggedOut
    }
}
