use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::{ConcertCache, PAST_CACHE_KEY, UPCOMING_CACHE_KEY};
use crate::calendar::{CalendarSource, EventQuery, GoogleCalendarClient, RawCalendarEvent, TimeWindow};
use crate::classify::ConcertClassifier;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::dates;
use crate::drive::{DriveClient, ImageSearch};
use crate::fallback;
use crate::models::{Concert, FetchTier};

/// Requested events per displayed concert. Qualification happens client-side,
/// so most calendars need headroom.
const OVERFETCH_FACTOR: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipeline {
    Upcoming,
    Past { limit: usize },
}

impl Pipeline {
    fn cache_key(self) -> &'static str {
        match self {
            Pipeline::Upcoming => UPCOMING_CACHE_KEY,
            Pipeline::Past { .. } => PAST_CACHE_KEY,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Pipeline::Upcoming => "upcoming",
            Pipeline::Past { .. } => "past",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub concerts: Vec<Concert>,
    pub tier: FetchTier,
}

impl FetchOutcome {
    fn new(concerts: Vec<Concert>, tier: FetchTier) -> Self {
        Self { concerts, tier }
    }
}

pub struct CalendarSync {
    source: Option<Arc<dyn CalendarSource>>,
    images: Option<Arc<dyn ImageSearch>>,
    classifier: ConcertClassifier,
    cache: ConcertCache,
    clock: Arc<dyn Clock>,
    max_results_display: usize,
}

impl CalendarSync {
    pub fn new(
        source: Option<Arc<dyn CalendarSource>>,
        images: Option<Arc<dyn ImageSearch>>,
        classifier: ConcertClassifier,
        cache: ConcertCache,
        clock: Arc<dyn Clock>,
        max_results_display: usize,
    ) -> Self {
        Self {
            source,
            images,
            classifier,
            cache,
            clock,
            max_results_display,
        }
    }

    pub fn from_config(config: &AppConfig, cache: ConcertCache, clock: Arc<dyn Clock>) -> Self {
        let source: Option<Arc<dyn CalendarSource>> = match config.credentials() {
            Some((api_key, calendar_id)) => {
                match GoogleCalendarClient::new(config.calendar_base_url.as_str(), api_key, calendar_id) {
                    Ok(client) => Some(Arc::new(client)),
                    Err(err) => {
                        log::error!("calendar client setup failed: {err}");
                        None
                    }
                }
            }
            None => None,
        };

        let images: Option<Arc<dyn ImageSearch>> = match config.drive_credentials() {
            Some((api_key, folder_id)) => match DriveClient::new(api_key, folder_id) {
                Ok(client) => Some(Arc::new(client)),
                Err(err) => {
                    log::warn!("drive client setup failed, folder images disabled: {err}");
                    None
                }
            },
            None => None,
        };

        Self::new(
            source,
            images,
            ConcertClassifier::from_config(config),
            cache,
            clock,
            config.max_results_display,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.source.is_some()
    }

    pub fn cache(&self) -> &ConcertCache {
        &self.cache
    }

    pub fn classifier(&self) -> &ConcertClassifier {
        &self.classifier
    }

    pub async fn fetch_upcoming(&self) -> FetchOutcome {
        self.run(Pipeline::Upcoming, true).await
    }

    pub async fn fetch_past(&self, limit: usize) -> FetchOutcome {
        self.run(Pipeline::Past { limit }, true).await
    }

    pub async fn force_refresh(&self) -> FetchOutcome {
        self.cache.force_invalidate(UPCOMING_CACHE_KEY);
        self.run(Pipeline::Upcoming, false).await
    }

    pub async fn force_refresh_past(&self, limit: usize) -> FetchOutcome {
        self.cache.force_invalidate(PAST_CACHE_KEY);
        self.run(Pipeline::Past { limit }, false).await
    }

    async fn run(&self, pipeline: Pipeline, use_cache: bool) -> FetchOutcome {
        let key = pipeline.cache_key();

        if use_cache && self.cache.is_valid(key) {
            if let Some(cached) = self.cache.read(key) {
                log::debug!("{} concerts served from cache", pipeline.label());
                return FetchOutcome::new(limit_for(pipeline, cached), FetchTier::CachedHit);
            }
        }

        let source = match &self.source {
            Some(source) => source,
            None => {
                log::warn!(
                    "calendar credentials missing, serving bundled {} concerts",
                    pipeline.label()
                );
                return FetchOutcome::new(static_for(pipeline), FetchTier::UnconfiguredFallback);
            }
        };

        let query = self.query_for(pipeline);
        match source.list_events(&query).await {
            Ok(events) => {
                let concerts = self.build(pipeline, events).await;
                log::info!(
                    "fetched {} {} concerts from calendar",
                    concerts.len(),
                    pipeline.label()
                );
                self.cache.write(key, &concerts);
                FetchOutcome::new(concerts, FetchTier::LiveFetchSuccess)
            }
            Err(err) => {
                log::error!("calendar fetch for {} concerts failed: {err}", pipeline.label());
                match self.cache.read(key) {
                    Some(stale) => {
                        log::info!("using expired cache for {} concerts", pipeline.label());
                        FetchOutcome::new(limit_for(pipeline, stale), FetchTier::StaleCacheFallback)
                    }
                    None => {
                        log::info!("no cached {} concerts, serving bundled data", pipeline.label());
                        FetchOutcome::new(static_for(pipeline), FetchTier::StaticFallback)
                    }
                }
            }
        }
    }

    fn query_for(&self, pipeline: Pipeline) -> EventQuery {
        let now = self.clock.now();
        match pipeline {
            Pipeline::Upcoming => EventQuery {
                window: TimeWindow::From(self.start_of_today(now)),
                max_results: self.max_results_display.max(1) * OVERFETCH_FACTOR,
            },
            Pipeline::Past { limit } => EventQuery {
                window: TimeWindow::Until(now),
                max_results: limit.max(1) * OVERFETCH_FACTOR,
            },
        }
    }

    fn start_of_today(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let tz = self.classifier.timezone();
        dates::start_of_day(now.with_timezone(&tz).date_naive(), tz).unwrap_or(now)
    }

    async fn build(&self, pipeline: Pipeline, mut events: Vec<RawCalendarEvent>) -> Vec<Concert> {
        let limit = match pipeline {
            Pipeline::Upcoming => self.max_results_display,
            Pipeline::Past { limit } => {
                events.sort_by(|a, b| b.start_instant().cmp(&a.start_instant()));
                limit
            }
        };

        let concerts: Vec<Concert> = events
            .iter()
            .filter_map(|event| self.classifier.classify(event))
            .take(limit)
            .collect();

        let mut enriched = Vec::with_capacity(concerts.len());
        for concert in concerts {
            enriched.push(self.with_folder_images(concert).await);
        }
        enriched
    }

    async fn with_folder_images(&self, concert: Concert) -> Concert {
        let search = match &self.images {
            Some(search) if !concert.has_images => search,
            _ => return concert,
        };
        match search.find_images(&concert.title).await {
            Ok(found) if !found.is_empty() => {
                log::debug!("found {} folder images for {}", found.len(), concert.id);
                concert.with_images(found)
            }
            Ok(_) => concert,
            Err(err) => {
                log::warn!("folder image search for {} failed: {err}", concert.id);
                concert
            }
        }
    }
}

fn limit_for(pipeline: Pipeline, mut concerts: Vec<Concert>) -> Vec<Concert> {
    if let Pipeline::Past { limit } = pipeline {
        concerts.truncate(limit);
    }
    concerts
}

fn static_for(pipeline: Pipeline) -> Vec<Concert> {
    match pipeline {
        Pipeline::Upcoming => fallback::upcoming(),
        Pipeline::Past { .. } => limit_for(pipeline, fallback::past()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    use crate::calendar::{CalendarError, EventTime};
    use crate::clock::ManualClock;
    use crate::db::tests::FailingStore;
    use crate::db::{CacheStore, MemoryStore};
    use crate::drive::DriveError;
    use crate::models::{ConcertImage, ConcertSource};

    /// Calendar double that records queries and either returns its events or
    /// fails with a 503.
    pub(crate) struct FakeCalendar {
        events: Mutex<Vec<RawCalendarEvent>>,
        failing: Mutex<bool>,
        pub(crate) calls: AtomicUsize,
        pub(crate) queries: Mutex<Vec<EventQuery>>,
    }

    impl FakeCalendar {
        pub(crate) fn with_events(events: Vec<RawCalendarEvent>) -> Self {
            Self {
                events: Mutex::new(events),
                failing: Mutex::new(false),
                calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            let fake = Self::with_events(Vec::new());
            fake.set_failing(true);
            fake
        }

        pub(crate) fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }

        pub(crate) fn set_events(&self, events: Vec<RawCalendarEvent>) {
            *self.events.lock().unwrap() = events;
        }
    }

    #[async_trait]
    impl CalendarSource for FakeCalendar {
        async fn list_events(&self, query: &EventQuery) -> Result<Vec<RawCalendarEvent>, CalendarError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.clone());
            if *self.failing.lock().unwrap() {
                return Err(CalendarError::Status {
                    status: 503,
                    body: "backend unavailable".to_string(),
                });
            }
            let events = self.events.lock().unwrap();
            Ok(events
                .iter()
                .filter(|event| match (event.start_instant(), &query.window) {
                    (Some(start), TimeWindow::From(min)) => start >= *min,
                    (Some(start), TimeWindow::Until(max)) => start < *max,
                    (None, _) => true,
                })
                .cloned()
                .collect())
        }
    }

    struct FakeFolder;

    #[async_trait]
    impl ImageSearch for FakeFolder {
        async fn find_images(&self, concert_title: &str) -> Result<Vec<ConcertImage>, DriveError> {
            if concert_title.contains("Broken") {
                return Err(DriveError::Http("status 500".to_string()));
            }
            Ok(vec![ConcertImage {
                url: format!("https://drive.google.com/thumbnail?id={}&sz=w800", concert_title.len()),
                title: concert_title.to_string(),
                mime_type: "image/jpeg".to_string(),
                original_url: None,
            }])
        }
    }

    pub(crate) fn concert_event(id: &str, title: &str, start: &str) -> RawCalendarEvent {
        RawCalendarEvent {
            id: id.to_string(),
            summary: Some(format!("[CONCERT] {title}")),
            start: Some(EventTime::timed(start)),
            ..RawCalendarEvent::default()
        }
    }

    pub(crate) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 20, 10, 0, 0).unwrap()
    }

    struct Harness {
        sync: CalendarSync,
        calendar: Arc<FakeCalendar>,
        clock: Arc<ManualClock>,
    }

    fn harness(calendar: FakeCalendar, folder: bool) -> Harness {
        harness_on(calendar, folder, Arc::new(MemoryStore::new()))
    }

    fn harness_on(calendar: FakeCalendar, folder: bool, store: Arc<dyn CacheStore>) -> Harness {
        let calendar = Arc::new(calendar);
        let source: Arc<dyn CalendarSource> = calendar.clone();
        let clock = Arc::new(ManualClock::new(now()));
        let cache = ConcertCache::new(store, clock.clone());
        let config = AppConfig::default();
        let images: Option<Arc<dyn ImageSearch>> = if folder { Some(Arc::new(FakeFolder)) } else { None };
        let sync = CalendarSync::new(
            Some(source),
            images,
            ConcertClassifier::from_config(&config),
            cache,
            clock.clone(),
            config.max_results_display,
        );
        Harness { sync, calendar, clock }
    }

    #[tokio::test]
    async fn live_fetch_then_cache_hit() {
        let h = harness(
            FakeCalendar::with_events(vec![
                concert_event("a", "First", "2025-10-21T19:00:00+02:00"),
                RawCalendarEvent {
                    summary: Some("Dentist".to_string()),
                    ..concert_event("b", "", "2025-10-22T09:00:00+02:00")
                },
                concert_event("c", "Second", "2025-10-23T19:00:00+02:00"),
            ]),
            false,
        );

        let first = h.sync.fetch_upcoming().await;
        assert_eq!(first.tier, FetchTier::LiveFetchSuccess);
        let ids: Vec<&str> = first.concerts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["calendar-a", "calendar-c"]);

        let second = h.sync.fetch_upcoming().await;
        assert_eq!(second.tier, FetchTier::CachedHit);
        assert_eq!(second.concerts, first.concerts);
        assert_eq!(h.calendar.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upcoming_is_cut_to_display_count() {
        let events = (1..=8)
            .map(|day| {
                concert_event(
                    &format!("e{day}"),
                    &format!("Show {day}"),
                    &format!("2025-11-{day:02}T19:00:00+01:00"),
                )
            })
            .collect();
        let h = harness(FakeCalendar::with_events(events), false);

        let outcome = h.sync.fetch_upcoming().await;
        assert_eq!(outcome.tier, FetchTier::LiveFetchSuccess);
        assert_eq!(outcome.concerts.len(), 5);
        assert_eq!(outcome.concerts[4].id, "calendar-e5");

        let cached = h.sync.cache().read(UPCOMING_CACHE_KEY).expect("cached");
        assert_eq!(cached.len(), 5);
    }

    #[tokio::test]
    async fn broken_storage_acts_as_a_cache_miss() {
        let h = harness_on(
            FakeCalendar::with_events(vec![concert_event("a", "First", "2025-10-21T19:00:00+02:00")]),
            false,
            Arc::new(FailingStore),
        );

        let first = h.sync.fetch_upcoming().await;
        assert_eq!(first.tier, FetchTier::LiveFetchSuccess);
        assert_eq!(first.concerts[0].id, "calendar-a");

        let second = h.sync.fetch_upcoming().await;
        assert_eq!(second.tier, FetchTier::LiveFetchSuccess);
        assert_eq!(h.calendar.calls.load(Ordering::SeqCst), 2);

        h.calendar.set_failing(true);
        let failed = h.sync.fetch_upcoming().await;
        assert_eq!(failed.tier, FetchTier::StaticFallback);
        assert_eq!(failed.concerts, fallback::upcoming());
    }

    #[tokio::test]
    async fn upcoming_query_starts_today_and_overfetches() {
        let h = harness(FakeCalendar::with_events(Vec::new()), false);
        h.sync.fetch_upcoming().await;
        let query = h.calendar.queries.lock().unwrap()[0].clone();
        assert_eq!(query.max_results, 15);
        // Midnight in Stockholm during summer time.
        assert_eq!(
            query.window,
            TimeWindow::From(Utc.with_ymd_and_hms(2025, 10, 19, 22, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn failing_network_prefers_stale_cache_over_static_data() {
        let h = harness(
            FakeCalendar::with_events(vec![concert_event("a", "Cached", "2025-10-21T19:00:00+02:00")]),
            false,
        );
        h.sync.fetch_upcoming().await;

        h.clock.advance(Duration::hours(25));
        h.calendar.set_failing(true);
        let outcome = h.sync.fetch_upcoming().await;
        assert_eq!(outcome.tier, FetchTier::StaleCacheFallback);
        assert_eq!(outcome.concerts[0].id, "calendar-a");
        assert!(outcome.tier.is_degraded());
    }

    #[tokio::test]
    async fn failing_network_without_cache_serves_static_data() {
        let h = harness(FakeCalendar::failing(), false);
        let outcome = h.sync.fetch_upcoming().await;
        assert_eq!(outcome.tier, FetchTier::StaticFallback);
        assert_eq!(outcome.concerts, fallback::upcoming());

        let past = h.sync.fetch_past(4).await;
        assert_eq!(past.tier, FetchTier::StaticFallback);
        assert_eq!(past.concerts.len(), 4);
        assert!(past.concerts.iter().all(|c| c.source == ConcertSource::StaticFallback));
    }

    #[tokio::test]
    async fn unconfigured_never_touches_network_or_cache() {
        let clock = Arc::new(ManualClock::new(now()));
        let store = Arc::new(MemoryStore::new());
        let cache = ConcertCache::new(store, clock.clone());
        let sync = CalendarSync::from_config(&AppConfig::default(), cache.clone(), clock);
        assert!(!sync.is_configured());

        let outcome = sync.fetch_upcoming().await;
        assert_eq!(outcome.tier, FetchTier::UnconfiguredFallback);
        assert_eq!(outcome.concerts.len(), 1);
        assert!(cache.read(UPCOMING_CACHE_KEY).is_none());
    }

    #[tokio::test]
    async fn past_is_sorted_newest_first_and_limited() {
        let h = harness(
            FakeCalendar::with_events(vec![
                concert_event("old", "Old", "2025-01-10T19:00:00+01:00"),
                concert_event("new", "New", "2025-09-10T19:00:00+02:00"),
                concert_event("mid", "Mid", "2025-05-10T19:00:00+02:00"),
            ]),
            false,
        );
        let outcome = h.sync.fetch_past(2).await;
        assert_eq!(outcome.tier, FetchTier::LiveFetchSuccess);
        let ids: Vec<&str> = outcome.concerts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["calendar-new", "calendar-mid"]);

        let query = h.calendar.queries.lock().unwrap()[0].clone();
        assert_eq!(query.window, TimeWindow::Until(now()));
        assert_eq!(query.max_results, 6);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_valid_cache() {
        let h = harness(
            FakeCalendar::with_events(vec![concert_event("a", "First", "2025-10-21T19:00:00+02:00")]),
            false,
        );
        h.sync.fetch_upcoming().await;
        h.calendar
            .set_events(vec![concert_event("b", "Replacement", "2025-10-22T19:00:00+02:00")]);

        let refreshed = h.sync.force_refresh().await;
        assert_eq!(refreshed.tier, FetchTier::LiveFetchSuccess);
        assert_eq!(refreshed.concerts[0].id, "calendar-b");
        assert_eq!(h.calendar.calls.load(Ordering::SeqCst), 2);

        h.calendar.set_failing(true);
        let failed = h.sync.force_refresh_past(3).await;
        assert_eq!(failed.tier, FetchTier::StaticFallback);
    }

    #[tokio::test]
    async fn folder_images_fill_imageless_concerts() {
        let h = harness(
            FakeCalendar::with_events(vec![
                concert_event("a", "Autumn Show", "2025-10-21T19:00:00+02:00"),
                concert_event("b", "Broken Show", "2025-10-22T19:00:00+02:00"),
            ]),
            true,
        );
        let outcome = h.sync.fetch_upcoming().await;
        assert!(outcome.concerts[0].has_images);
        assert_eq!(outcome.concerts[0].images[0].title, "Autumn Show");
        assert!(!outcome.concerts[1].has_images);
        assert!(outcome.concerts[1].image.starts_with("https://via.placeholder.com/"));
    }
}
