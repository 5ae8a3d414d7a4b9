//! Per-install device identity

use crate::error::StorageError;
use crate::storage::{DEVICE_ID_KEY, Storage};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Exclusive upper bound of generated identifiers
const DEVICE_ID_BOUND: u64 = 10_000_000_000_000_000;

/// Pseudo-random identifier of one app installation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    fn generate() -> Self {
        let value = rand::thread_rng().gen_range(0..DEVICE_ID_BOUND);
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Return the cached device id, generating and caching one on first use
pub fn get_device_id(storage: &dyn Storage) -> Result<DeviceId, StorageError> {
    if let Some(existing) = storage.get_item(DEVICE_ID_KEY)?
        && !existing.is_empty()
    {
        return Ok(DeviceId(existing));
    }

    let device_id = DeviceId::generate();
    storage.set_item(DEVICE_ID_KEY, device_id.as_str())?;
    info!(device_id = %device_id, "Generated new device id");
    Ok(device_id)
}
