use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::{CacheStore, StoreError};
use crate::models::{ArchiveRecord, Concert};

pub const ARCHIVE_KEY: &str = "concerts_archive";

pub trait ArchiveStore: Send + Sync {
    /// All records, newest first.
    fn records(&self) -> Result<Vec<ArchiveRecord>, StoreError>;
    /// Prepends records for concerts not archived yet and returns how many
    /// were added.
    fn archive(&self, concerts: &[Concert], at: DateTime<Utc>) -> Result<usize, StoreError>;
}

pub struct StoredArchive {
    store: Arc<dyn CacheStore>,
}

impl StoredArchive {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

impl ArchiveStore for StoredArchive {
    fn records(&self) -> Result<Vec<ArchiveRecord>, StoreError> {
        match self.store.get(ARCHIVE_KEY)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(records) => Ok(records),
                Err(err) => {
                    log::warn!("archive payload unreadable, starting fresh: {err}");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    fn archive(&self, concerts: &[Concert], at: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut records = self.records()?;
        let mut added = 0;
        for concert in concerts {
            if records.iter().any(|record| record.id == concert.id) {
                log::debug!("concert {} already archived", concert.id);
                continue;
            }
            records.insert(0, ArchiveRecord::from_concert(concert, at));
            added += 1;
        }
        if added > 0 {
            let payload = serde_json::to_string(&records)?;
            self.store.set(ARCHIVE_KEY, &payload)?;
        }
        Ok(added)
    }
}
