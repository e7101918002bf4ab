pub mod archive;
pub mod cache;
pub mod calendar;
pub mod classify;
pub mod clock;
pub mod config;
pub mod dates;
pub mod db;
pub mod drive;
pub mod extract;
pub mod fallback;
pub mod manager;
pub mod models;
pub mod scheduler;
pub mod sweeper;
pub mod sync;
mod utils;

pub use config::{AppConfig, ConfigStore};
pub use manager::ConcertManager;
pub use models::{ArchiveRecord, Concert, FetchTier, SweepSummary, SyncStatus};
pub use scheduler::{Scheduler, SchedulerHandle};

/// Info for this crate and warnings from everything else, unless `RUST_LOG`
/// says otherwise.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("concert_sync_lib=info,warn"),
    )
    .format_timestamp_secs()
    .try_init();
}
