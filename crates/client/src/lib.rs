//! Smart Scheduler session client
//!
//! Talks to the users API and keeps a session alive: the access token lives
//! in a [`SessionStore`], a [`TokenRefresher`] trades the refresh cookie for
//! a new token on a fixed period, and [`SessionManager::logout`] ends it.

pub mod client;
pub mod config;
pub mod cookie;
pub mod device;
pub mod error;
pub mod router;
pub mod session;
pub mod storage;
pub mod types;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use device::{DeviceId, get_device_id};
pub use error::{ClientError, ConfigError, StorageError};
pub use router::{History, Navigator, Route};
pub use session::{
    LogoutOutcome, RefreshHandle, RefreshOutcome, SessionManager, SessionStamp, SessionStore,
    TokenRefresher,
};
pub use storage::{FileStorage, MemoryStorage, Storage};
