use std::sync::Arc;

use tokio::sync::Mutex;

use crate::archive::{ArchiveStore, StoredArchive};
use crate::cache::{ConcertCache, UPCOMING_CACHE_KEY};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db::{CacheStore, SqliteStore, StoreError};
use crate::models::{ArchiveRecord, Concert, FetchTier, SweepSummary, SyncStatus};
use crate::sweeper::{ConcertBoard, ExpirationSweeper};
use crate::sync::{CalendarSync, FetchOutcome};

#[derive(Default)]
struct ManagerState {
    board: ConcertBoard,
    past_loaded: bool,
    last_upcoming_tier: Option<FetchTier>,
    last_past_tier: Option<FetchTier>,
}

pub struct ConcertManager {
    sync: CalendarSync,
    sweeper: ExpirationSweeper,
    archive: Arc<dyn ArchiveStore>,
    clock: Arc<dyn Clock>,
    past_limit: usize,
    state: Mutex<ManagerState>,
}

impl ConcertManager {
    pub fn new(
        sync: CalendarSync,
        archive: Arc<dyn ArchiveStore>,
        clock: Arc<dyn Clock>,
        past_limit: usize,
    ) -> Self {
        let sweeper = ExpirationSweeper::new(
            sync.cache().clone(),
            archive.clone(),
            sync.classifier().timezone(),
        );
        Self {
            sync,
            sweeper,
            archive,
            clock,
            past_limit,
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn from_config(config: &AppConfig, store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        let cache = ConcertCache::new(store.clone(), clock.clone());
        let sync = CalendarSync::from_config(config, cache, clock.clone());
        let archive: Arc<dyn ArchiveStore> = Arc::new(StoredArchive::new(store));
        Self::new(sync, archive, clock, config.past_concerts_limit)
    }

    /// Production wiring: SQLite in the data directory and the system clock.
    pub fn open_default(config: &AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn CacheStore> = Arc::new(SqliteStore::open_default()?);
        Ok(Self::from_config(config, store, Arc::new(SystemClock)))
    }

    pub fn past_limit(&self) -> usize {
        self.past_limit
    }

    /// Loads both lists, past first so expired upcoming concerts land in
    /// front of it.
    pub async fn load(&self) -> ConcertBoard {
        self.fetch_past_concerts(self.past_limit).await;
        self.fetch_upcoming_concerts().await;
        self.state.lock().await.board.clone()
    }

    pub async fn fetch_upcoming_concerts(&self) -> Vec<Concert> {
        self.ensure_past_loaded().await;
        let outcome = self.sync.fetch_upcoming().await;
        self.apply_upcoming(outcome).await
    }

    pub async fn fetch_past_concerts(&self, limit: usize) -> Vec<Concert> {
        let outcome = self.sync.fetch_past(limit).await;
        self.apply_past(outcome).await
    }

    /// Manual refresh of the upcoming list. Never called on a timer.
    pub async fn force_refresh(&self) -> Vec<Concert> {
        self.ensure_past_loaded().await;
        let outcome = self.sync.force_refresh().await;
        self.apply_upcoming(outcome).await
    }

    pub async fn force_refresh_past(&self, limit: usize) -> Vec<Concert> {
        let outcome = self.sync.force_refresh_past(limit).await;
        self.apply_past(outcome).await
    }

    pub async fn check_and_move_expired_concerts(&self) -> SweepSummary {
        self.ensure_past_loaded().await;
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        self.sweeper.sweep(&mut state.board, now)
    }

    pub async fn status(&self) -> SyncStatus {
        let state = self.state.lock().await;
        let cache = self.sync.cache();
        SyncStatus {
            configured: self.sync.is_configured(),
            cache_valid: cache.is_valid(UPCOMING_CACHE_KEY),
            last_cached_at: cache.cached_at(UPCOMING_CACHE_KEY),
            upcoming_count: state.board.upcoming.len(),
            past_count: state.board.past.len(),
            last_upcoming_tier: state.last_upcoming_tier,
            last_past_tier: state.last_past_tier,
            archive_count: self.archived_concerts().len(),
        }
    }

    pub fn archived_concerts(&self) -> Vec<ArchiveRecord> {
        match self.archive.records() {
            Ok(records) => records,
            Err(err) => {
                log::warn!("failed to read concert archive: {err}");
                Vec::new()
            }
        }
    }

    pub async fn upcoming(&self) -> Vec<Concert> {
        self.state.lock().await.board.upcoming.clone()
    }

    pub async fn past(&self) -> Vec<Concert> {
        self.state.lock().await.board.past.clone()
    }

    /// A sweep persists the whole past list, so the stored one has to be in
    /// memory before the first sweep.
    async fn ensure_past_loaded(&self) {
        if !self.state.lock().await.past_loaded {
            self.fetch_past_concerts(self.past_limit).await;
        }
    }

    async fn apply_upcoming(&self, outcome: FetchOutcome) -> Vec<Concert> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.last_upcoming_tier = Some(outcome.tier);
        state.board.upcoming = outcome.concerts;
        let summary = self.sweeper.sweep(&mut state.board, now);
        if summary.moved_count > 0 {
            log::debug!("sweep after fetch moved {} concerts", summary.moved_count);
        }
        state.board.upcoming.clone()
    }

    async fn apply_past(&self, outcome: FetchOutcome) -> Vec<Concert> {
        let mut state = self.state.lock().await;
        state.last_past_tier = Some(outcome.tier);
        state.past_loaded = true;
        state.board.past = outcome.concerts;
        state.board.past.clone()
    }
}
