use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::AppConfig;
use crate::manager::ConcertManager;

const MIN_PERIOD: Duration = Duration::from_secs(1);

pub struct Scheduler;

impl Scheduler {
    /// Starts both timers. The first run of each happens one full period
    /// after start; callers load the lists themselves at startup.
    pub fn start(manager: Arc<ConcertManager>, refresh_every: Duration, sweep_every: Duration) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let refresh_manager = manager.clone();
        let refresh = spawn_periodic("auto-refresh", refresh_every, shutdown_rx.clone(), move || {
            let manager = refresh_manager.clone();
            async move {
                let upcoming = manager.fetch_upcoming_concerts().await;
                log::info!("auto-refresh loaded {} upcoming concerts", upcoming.len());
            }
        });

        let sweep = spawn_periodic("expiry-check", sweep_every, shutdown_rx, move || {
            let manager = manager.clone();
            async move {
                let summary = manager.check_and_move_expired_concerts().await;
                if summary.moved_count > 0 {
                    log::info!("expiry check moved {} concerts", summary.moved_count);
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            tasks: vec![refresh, sweep],
        }
    }

    pub fn from_config(manager: Arc<ConcertManager>, config: &AppConfig) -> SchedulerHandle {
        Self::start(
            manager,
            Duration::from_secs(config.refresh_interval_minutes.saturating_mul(60)),
            Duration::from_secs(config.expiry_check_interval_minutes.saturating_mul(60)),
        )
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::debug!("{name} timer every {:?}", period);
        loop {
            tokio::select! {
                _ = ticker.tick() => job().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::debug!("{name} timer stopped");
    })
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stops both timers and waits for any in-flight run to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                log::warn!("scheduler task ended abnormally: {err}");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use chrono::Duration as ChronoDuration;

    use crate::archive::{ArchiveStore, StoredArchive};
    use crate::cache::ConcertCache;
    use crate::calendar::CalendarSource;
    use crate::classify::ConcertClassifier;
    use crate::clock::ManualClock;
    use crate::db::{CacheStore, MemoryStore};
    use crate::sync::tests::{concert_event, now, FakeCalendar};
    use crate::sync::CalendarSync;

    fn manager(calendar: Arc<FakeCalendar>, clock: Arc<ManualClock>) -> Arc<ConcertManager> {
        let source: Arc<dyn CalendarSource> = calendar;
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let config = AppConfig::default();
        let sync = CalendarSync::new(
            Some(source),
            None,
            ConcertClassifier::from_config(&config),
            ConcertCache::new(store.clone(), clock.clone()),
            clock.clone(),
            config.max_results_display,
        );
        let archive: Arc<dyn ArchiveStore> = Arc::new(StoredArchive::new(store));
        Arc::new(ConcertManager::new(sync, archive, clock, config.past_concerts_limit))
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn refresh_skips_first_tick_and_stops_on_shutdown() {
        let calendar = Arc::new(FakeCalendar::failing());
        let clock = Arc::new(ManualClock::new(now()));
        let manager = manager(calendar.clone(), clock);
        manager.fetch_past_concerts(9).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);
        let handle = Scheduler::start(manager, 60 * MINUTE, 24 * 60 * MINUTE);

        tokio::time::sleep(30 * MINUTE).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(95 * MINUTE).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
        tokio::time::sleep(180 * MINUTE).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_timer_moves_expired_concerts() {
        let calendar = Arc::new(FakeCalendar::with_events(vec![concert_event(
            "tonight",
            "Tonight",
            "2025-10-20T19:00:00+02:00",
        )]));
        let clock = Arc::new(ManualClock::new(now()));
        let manager = manager(calendar, clock.clone());
        assert_eq!(manager.fetch_upcoming_concerts().await.len(), 1);

        let handle = Scheduler::start(manager.clone(), 24 * 60 * MINUTE, 60 * MINUTE);
        clock.advance(ChronoDuration::hours(14));
        tokio::time::sleep(61 * MINUTE).await;

        assert!(manager.upcoming().await.is_empty());
        assert_eq!(manager.past().await[0].id, "calendar-tonight");
        drop(handle);
    }
}
