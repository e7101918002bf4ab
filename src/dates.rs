use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::calendar::EventTime;
use crate::models::{ALL_DAY, DATE_TBA, TIME_TBA};

pub const SWEDISH_MONTHS: [&str; 12] = [
    "januari",
    "februari",
    "mars",
    "april",
    "maj",
    "juni",
    "juli",
    "augusti",
    "september",
    "oktober",
    "november",
    "december",
];

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").expect("valid year regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DisplayLocale {
    #[default]
    #[serde(rename = "sv-SE")]
    Swedish,
    #[serde(rename = "en-US")]
    English,
}

pub fn format_day(date: NaiveDate, locale: DisplayLocale) -> String {
    let month_index = date.month0() as usize;
    match locale {
        DisplayLocale::Swedish => {
            format!("{} {} {}", date.day(), SWEDISH_MONTHS[month_index], date.year())
        }
        DisplayLocale::English => {
            format!("{} {}, {}", ENGLISH_MONTHS[month_index], date.day(), date.year())
        }
    }
}

pub fn format_clock(time: NaiveTime, locale: DisplayLocale) -> String {
    match locale {
        DisplayLocale::Swedish => format!("{:02}:{:02}", time.hour(), time.minute()),
        DisplayLocale::English => {
            let (is_pm, hour) = time.hour12();
            format!("{}:{:02} {}", hour, time.minute(), if is_pm { "PM" } else { "AM" })
        }
    }
}

/// Display date for an event start, `Date TBA` when there is none. Values
/// that fail to parse fall back to their `YYYY-MM-DD` prefix.
pub fn format_date(start: Option<&EventTime>, locale: DisplayLocale, tz: Tz) -> String {
    let start = match start {
        Some(start) => start,
        None => return DATE_TBA.to_string(),
    };
    if let Some(precise) = start.precise() {
        return format_day(precise.with_timezone(&tz).date_naive(), locale);
    }
    if let Some(day) = start.day() {
        return format_day(day, locale);
    }
    match start.raw() {
        Some(raw) => {
            log::debug!("unparseable event start {raw}, using raw date prefix");
            raw.split('T').next().unwrap_or(raw).to_string()
        }
        None => DATE_TBA.to_string(),
    }
}

pub fn format_time(start: Option<&EventTime>, locale: DisplayLocale, tz: Tz) -> String {
    let start = match start {
        Some(start) => start,
        None => return TIME_TBA.to_string(),
    };
    if let Some(precise) = start.precise() {
        return format_clock(precise.with_timezone(&tz).time(), locale);
    }
    if start.is_all_day() {
        return ALL_DAY.to_string();
    }
    TIME_TBA.to_string()
}

pub fn format_duration(start: Option<&EventTime>, end: Option<&EventTime>) -> Option<String> {
    let start = start?.precise()?;
    let end = end?.precise()?;
    let minutes = end.signed_duration_since(start).num_minutes();
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        if minutes > 0 {
            Some(format!("{hours}h {minutes}m"))
        } else {
            Some(format!("{hours}h"))
        }
    } else if minutes > 0 {
        Some(format!("{minutes}m"))
    } else {
        None
    }
}

pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

pub fn start_of_day(day: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    local_to_utc(day.and_hms_opt(0, 0, 0)?, tz)
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 12, 31, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn normalize_months(input: &str) -> String {
    input
        .split_whitespace()
        .map(|token| {
            let bare = token.trim_end_matches(',').to_lowercase();
            match SWEDISH_MONTHS.iter().position(|name| *name == bare) {
                Some(index) => token.to_lowercase().replacen(&bare, ENGLISH_MONTHS[index], 1),
                None => token.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_full_date(input: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 6] = ["%d %B %Y", "%B %d, %Y", "%B %d %Y", "%d %B, %Y", "%Y-%m-%d", "%d/%m/%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
}

/// Best-effort instant for strings like `"9 Februari 2024"` or `"Valborg 2023"`.
/// A lone year maps to Dec 31 if past and Jan 1 if future; garbage maps to
/// the epoch and TBA to the far future.
pub fn parse_display_date(input: &str, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return epoch();
    }
    if trimmed.contains("TBA") || trimmed.to_lowercase().contains("to be announced") {
        return far_future();
    }

    let normalized = normalize_months(trimmed);
    if let Some(date) = parse_full_date(&normalized) {
        return start_of_day(date, tz).unwrap_or_else(epoch);
    }

    if let Some(year) = YEAR_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
    {
        let current_year = now.with_timezone(&tz).year();
        if year < current_year {
            if let Some(dt) = NaiveDate::from_ymd_opt(year, 12, 31).and_then(|d| start_of_day(d, tz)) {
                return dt;
            }
        } else if year > current_year {
            if let Some(dt) = NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| start_of_day(d, tz)) {
                return dt;
            }
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(&Utc);
    }

    log::debug!("unparseable concert date {trimmed:?}, treating as past");
    epoch()
}
