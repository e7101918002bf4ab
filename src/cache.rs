// Each list lives under its key, with the fetch time in epoch milliseconds
// under `<key>_timestamp`. Expiry never deletes anything.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::db::{CacheStore, StoreError};
use crate::models::Concert;

pub const UPCOMING_CACHE_KEY: &str = "concerts_cache";
pub const PAST_CACHE_KEY: &str = "past_concerts_cache";

const TIMESTAMP_SUFFIX: &str = "_timestamp";

pub fn cache_expiry() -> Duration {
    Duration::hours(24)
}

fn timestamp_key(key: &str) -> String {
    format!("{key}{TIMESTAMP_SUFFIX}")
}

#[derive(Clone)]
pub struct ConcertCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    expiry: Duration,
}

impl ConcertCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            expiry: cache_expiry(),
        }
    }

    /// Stores the list and the current time. Storage failures are logged and
    /// otherwise ignored.
    pub fn write(&self, key: &str, concerts: &[Concert]) {
        if let Err(err) = self.try_write(key, concerts) {
            log::warn!("cache write for {key} failed: {err}");
        }
    }

    fn try_write(&self, key: &str, concerts: &[Concert]) -> Result<(), StoreError> {
        let payload = serde_json::to_string(concerts)?;
        self.store.set(key, &payload)?;
        let stamp = self.clock.now().timestamp_millis().to_string();
        self.store.set(&timestamp_key(key), &stamp)?;
        Ok(())
    }

    /// Cached list regardless of age. Missing or malformed data reads as absent.
    pub fn read(&self, key: &str) -> Option<Vec<Concert>> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("cache read for {key} failed: {err}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(concerts) => Some(concerts),
            Err(err) => {
                log::warn!("discarding malformed cache entry {key}: {err}");
                None
            }
        }
    }

    pub fn cached_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = match self.store.get(&timestamp_key(key)) {
            Ok(raw) => raw?,
            Err(err) => {
                log::warn!("cache timestamp read for {key} failed: {err}");
                return None;
            }
        };
        let millis = match raw.trim().parse::<i64>() {
            Ok(millis) => millis,
            Err(_) => {
                log::debug!("unparseable cache timestamp {raw:?} for {key}");
                return None;
            }
        };
        DateTime::<Utc>::from_timestamp_millis(millis)
    }

    pub fn is_valid(&self, key: &str) -> bool {
        match self.cached_at(key) {
            Some(at) => self.clock.now().signed_duration_since(at) < self.expiry,
            None => false,
        }
    }

    pub fn force_invalidate(&self, key: &str) {
        for entry in [key.to_string(), timestamp_key(key)] {
            if let Err(err) = self.store.remove(&entry) {
                log::warn!("cache invalidate for {entry} failed: {err}");
            }
        }
    }
}
