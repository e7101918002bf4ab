use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::archive::ArchiveStore;
use crate::cache::{ConcertCache, PAST_CACHE_KEY};
use crate::dates;
use crate::models::{Concert, MovedConcert, SweepSummary};

pub const MAX_PAST_CONCERTS: usize = 9;

/// How long a concert is assumed to last after its start.
pub fn expiry_buffer() -> Duration {
    Duration::hours(6)
}

/// In-memory concert lists shared by the sync pipeline and the sweeper.
#[derive(Debug, Clone, Default)]
pub struct ConcertBoard {
    pub upcoming: Vec<Concert>,
    pub past: Vec<Concert>,
}

fn precise_start(concert: &Concert) -> Option<DateTime<Utc>> {
    let original = concert.original_event.as_ref()?;
    if original.all_day {
        return None;
    }
    let raw = original.start_date.as_deref()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Local midnight of an all-day concert's date.
fn all_day_start(concert: &Concert, tz: Tz) -> Option<DateTime<Utc>> {
    let original = concert.original_event.as_ref()?;
    if !original.all_day {
        return None;
    }
    let day = NaiveDate::parse_from_str(original.start_date.as_deref()?, "%Y-%m-%d").ok()?;
    dates::start_of_day(day, tz)
}

/// Concerts with a calendar start expire six hours after it; all-day ones
/// start at local midnight. Anything else falls back to its display date,
/// with no buffer.
pub fn is_expired(concert: &Concert, now: DateTime<Utc>, tz: Tz) -> bool {
    if let Some(start) = precise_start(concert).or_else(|| all_day_start(concert, tz)) {
        return start + expiry_buffer() < now;
    }
    dates::parse_display_date(&concert.date, now, tz) < now
}

pub struct ExpirationSweeper {
    cache: ConcertCache,
    archive: Arc<dyn ArchiveStore>,
    timezone: Tz,
}

impl ExpirationSweeper {
    pub fn new(cache: ConcertCache, archive: Arc<dyn ArchiveStore>, timezone: Tz) -> Self {
        Self {
            cache,
            archive,
            timezone,
        }
    }

    /// One sweep pass. Re-running it with nothing newly expired changes
    /// nothing and reports zero moves.
    pub fn sweep(&self, board: &mut ConcertBoard, now: DateTime<Utc>) -> SweepSummary {
        if board.upcoming.is_empty() {
            return SweepSummary::default();
        }

        let (expired, still_upcoming): (Vec<Concert>, Vec<Concert>) = std::mem::take(&mut board.upcoming)
            .into_iter()
            .partition(|concert| is_expired(concert, now, self.timezone));
        board.upcoming = still_upcoming;

        if expired.is_empty() {
            return SweepSummary::default();
        }

        let moved_concerts: Vec<MovedConcert> = expired
            .iter()
            .map(|concert| MovedConcert {
                title: concert.title.clone(),
                date: concert.date.clone(),
            })
            .collect();

        let mut past = expired.clone();
        board.past.retain(|old| !expired.iter().any(|new| new.id == old.id));
        past.append(&mut board.past);
        past.truncate(MAX_PAST_CONCERTS);
        board.past = past;

        self.cache.write(PAST_CACHE_KEY, &board.past);
        match self.archive.archive(&expired, now) {
            Ok(added) => log::debug!("archived {added} of {} expired concerts", expired.len()),
            Err(err) => log::warn!("archiving expired concerts failed: {err}"),
        }

        log::info!("moved {} concerts to past", moved_concerts.len());
        SweepSummary {
            moved_count: moved_concerts.len(),
            moved_concerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::StoredArchive;
    use crate::clock::ManualClock;
    use crate::db::MemoryStore;
    use crate::fallback;
    use crate::models::{ConcertSource, OriginalEvent};
    use chrono::TimeZone;

    const TZ: Tz = chrono_tz::Europe::Stockholm;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 20, 22, 0, 0).unwrap()
    }

    fn live(id: &str, start: &str, all_day: bool) -> Concert {
        let mut concert = fallback::upcoming().remove(0);
        concert.id = id.to_string();
        concert.title = format!("Show {id}");
        concert.source = ConcertSource::LiveSync;
        concert.is_placeholder = false;
        concert.original_event = Some(OriginalEvent {
            id: id.to_string(),
            html_link: None,
            start_date: Some(start.to_string()),
            end_date: None,
            all_day,
            location: None,
            attachments: Vec::new(),
        });
        concert
    }

    fn timed(id: &str, start: DateTime<Utc>) -> Concert {
        live(id, &start.to_rfc3339(), false)
    }

    struct Fixture {
        sweeper: ExpirationSweeper,
        cache: ConcertCache,
        archive: Arc<StoredArchive>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(now()));
        let cache = ConcertCache::new(store.clone(), clock);
        let archive = Arc::new(StoredArchive::new(store));
        let sweeper = ExpirationSweeper::new(cache.clone(), archive.clone(), TZ);
        Fixture {
            sweeper,
            cache,
            archive,
        }
    }

    #[test]
    fn six_hour_buffer_guards_running_concerts() {
        assert!(!is_expired(&timed("a", now() - Duration::hours(5)), now(), TZ));
        assert!(is_expired(&timed("b", now() - Duration::hours(7)), now(), TZ));
        assert!(!is_expired(&timed("c", now() + Duration::hours(1)), now(), TZ));
    }

    #[test]
    fn all_day_concerts_get_the_buffer_from_local_midnight() {
        let tomorrow = live("d", "2025-10-21", true);
        // Midnight in Stockholm is 22:00 UTC the day before.
        let midnight = now();
        assert!(!is_expired(&tomorrow, midnight, TZ));
        assert!(!is_expired(&tomorrow, midnight + Duration::hours(5), TZ));
        assert!(is_expired(&tomorrow, midnight + Duration::hours(7), TZ));
    }

    #[test]
    fn legacy_dates_use_display_string() {
        let mut tba = fallback::upcoming().remove(0);
        tba.date = "Date TBA".to_string();
        assert!(!is_expired(&tba, now(), TZ));

        let june = fallback::upcoming().remove(0);
        assert!(is_expired(&june, now(), TZ));

        let mut garbage = fallback::upcoming().remove(0);
        garbage.date = "soon".to_string();
        assert!(is_expired(&garbage, now(), TZ));
    }

    #[test]
    fn second_sweep_moves_nothing() {
        let f = fixture();
        let mut board = ConcertBoard {
            upcoming: vec![
                timed("gone", now() - Duration::hours(8)),
                timed("later", now() + Duration::hours(48)),
            ],
            past: Vec::new(),
        };

        let first = f.sweeper.sweep(&mut board, now());
        assert_eq!(first.moved_count, 1);
        assert_eq!(first.moved_concerts[0].title, "Show gone");
        assert_eq!(board.upcoming.len(), 1);
        assert_eq!(board.past[0].id, "gone");

        let second = f.sweeper.sweep(&mut board, now());
        assert_eq!(second.moved_count, 0);
        assert!(second.moved_concerts.is_empty());
        assert_eq!(board.past.len(), 1);
    }

    #[test]
    fn empty_upcoming_is_a_noop() {
        let f = fixture();
        let mut board = ConcertBoard::default();
        assert_eq!(f.sweeper.sweep(&mut board, now()), SweepSummary::default());
        assert!(f.cache.read(PAST_CACHE_KEY).is_none());
    }

    #[test]
    fn past_list_is_capped_with_new_entries_first() {
        let f = fixture();
        let prior: Vec<Concert> = (1..=9)
            .map(|n| timed(&format!("prior-{n}"), now() - Duration::days(30 * n)))
            .collect();
        let mut board = ConcertBoard {
            upcoming: vec![
                timed("new-1", now() - Duration::hours(10)),
                timed("new-2", now() - Duration::hours(9)),
                timed("new-3", now() - Duration::hours(8)),
            ],
            past: prior,
        };

        let summary = f.sweeper.sweep(&mut board, now());
        assert_eq!(summary.moved_count, 3);
        assert_eq!(board.past.len(), MAX_PAST_CONCERTS);

        let ids: Vec<&str> = board.past.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["new-1", "new-2", "new-3", "prior-1", "prior-2", "prior-3", "prior-4", "prior-5", "prior-6"]
        );

        let cached = f.cache.read(PAST_CACHE_KEY).expect("past cache written");
        assert_eq!(cached, board.past);
    }

    #[test]
    fn swept_concerts_are_archived_once() {
        let f = fixture();
        let gone = timed("gone", now() - Duration::hours(8));
        let mut board = ConcertBoard {
            upcoming: vec![gone.clone()],
            past: Vec::new(),
        };
        f.sweeper.sweep(&mut board, now());

        board.upcoming.push(gone);
        f.sweeper.sweep(&mut board, now());

        assert_eq!(board.past.len(), 1);
        let records = f.archive.records().expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "gone");
        assert_eq!(records[0].source, ConcertSource::AutoArchived);
    }
}
