//! Access token refresh and the background refresh loop

use super::SessionManager;
use crate::error::ClientError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default period between two refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// What a single refresh attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new token was stored
    Refreshed,
    /// A token arrived after logout or a new login and was thrown away
    Discarded,
    /// The request failed; the previous token is kept
    Failed,
    /// The session was ended by logout, nothing was sent
    Skipped,
}

impl SessionManager {
    /// Exchange the refresh cookie for a new access token.
    ///
    /// Failures are logged and leave the stored token untouched. Nothing is
    /// sent after a logout until the next login.
    pub async fn refresh_token(&self) -> RefreshOutcome {
        if self.store.is_ended() {
            debug!("Session ended by logout, skipping refresh");
            return RefreshOutcome::Skipped;
        }
        let stamp = self.store.stamp();

        let response = match self.client.refresh_token().await {
            Ok(response) => response,
            Err(e @ ClientError::AuthenticationFailed(_)) => {
                warn!(error = %e, "Failed to refresh token: refresh cookie rejected");
                return RefreshOutcome::Failed;
            }
            Err(e) => {
                error!(error = %e, status = ?e.status(), "Failed to refresh token");
                return RefreshOutcome::Failed;
            }
        };

        match self.store.update_if_current(stamp, &response.access_token) {
            Ok(true) => {
                self.mirror_refresh_cookie();
                debug!("Access token refreshed");
                RefreshOutcome::Refreshed
            }
            Ok(false) => {
                // The late response may have rotated the jar's cookie too
                self.reset_refresh_cookie();
                warn!("Session changed while refreshing, discarding new token");
                RefreshOutcome::Discarded
            }
            Err(e) => {
                error!(error = %e, "Failed to store refreshed token");
                RefreshOutcome::Failed
            }
        }
    }

    /// Put the jar back in line with the current session's mirrored cookie
    fn reset_refresh_cookie(&self) {
        match self.store.refresh_cookie() {
            Some(cookie) => self.client.restore_cookie(&cookie),
            None => self.client.expire_refresh_cookie(),
        }
    }
}

/// Spawns the periodic refresh loop
pub struct TokenRefresher;

impl TokenRefresher {
    /// Refresh now and then every `interval` until the handle is shut down
    pub fn spawn(manager: SessionManager, interval: Duration) -> RefreshHandle {
        let shutdown_token = CancellationToken::new();
        let task_token = shutdown_token.clone();

        info!(interval_secs = interval.as_secs(), "Starting token refresh loop");
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = task_token.cancelled() => {
                        info!("Token refresh loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let outcome = manager.refresh_token().await;
                        debug!(?outcome, "Refresh tick completed");
                    }
                }
            }
        });

        RefreshHandle {
            shutdown_token,
            task: Some(task),
        }
    }
}

/// Owner of a running refresh loop; dropping it stops the loop
#[derive(Debug)]
pub struct RefreshHandle {
    shutdown_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(mut self) {
        self.shutdown_token.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "Token refresh task ended abnormally");
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
