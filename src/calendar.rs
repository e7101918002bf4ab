use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3/calendars";

const EVENT_FIELDS: &str = "items(id,summary,description,start,end,location,attachments,htmlLink,status)";
const REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("invalid calendar url: {0}")]
    InvalidUrl(String),
    #[error("calendar request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("calendar api error: status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("calendar payload parse failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Start or end of a calendar event. Timed events carry `date_time`,
/// all-day events only `date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn timed(value: impl Into<String>) -> Self {
        Self {
            date_time: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn all_day(value: impl Into<String>) -> Self {
        Self {
            date: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn raw(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }

    pub fn is_all_day(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }

    pub fn precise(&self) -> Option<DateTime<Utc>> {
        self.date_time
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|mime| mime.starts_with("image/"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RawCalendarEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Sort key for "most recent first" ordering. All-day events count from
    /// midnight UTC of their date.
    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        let start = self.start.as_ref()?;
        start.precise().or_else(|| {
            start
                .day()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
    }
}

#[derive(Debug, Deserialize)]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<RawCalendarEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Events starting at or after the instant (`timeMin`).
    From(DateTime<Utc>),
    /// Events ending before the instant (`timeMax`).
    Until(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub window: TimeWindow,
    pub max_results: usize,
}

#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<RawCalendarEvent>, CalendarError>;
}

pub struct GoogleCalendarClient {
    base_url: String,
    api_key: String,
    calendar_id: String,
    client: Client,
}

impl GoogleCalendarClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        calendar_id: impl Into<String>,
    ) -> Result<Self, CalendarError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("concert-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            calendar_id: calendar_id.into(),
            client,
        })
    }

    pub(crate) fn events_url(&self, query: &EventQuery) -> Result<Url, CalendarError> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|err| CalendarError::InvalidUrl(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::InvalidUrl(self.base_url.clone()))?
            .push(&self.calendar_id)
            .push("events");

        let (bound_name, bound) = match query.window {
            TimeWindow::From(at) => ("timeMin", at),
            TimeWindow::Until(at) => ("timeMax", at),
        };
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair(bound_name, &bound.to_rfc3339_opts(SecondsFormat::Millis, true))
            .append_pair("maxResults", &query.max_results.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime")
            .append_pair("fields", EVENT_FIELDS);
        Ok(url)
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarClient {
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<RawCalendarEvent>, CalendarError> {
        let url = self.events_url(query)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CalendarError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: EventsListResponse = serde_json::from_str(&body)?;
        Ok(payload.items)
    }
}
