use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

use crate::calendar::RawCalendarEvent;
use crate::config::AppConfig;
use crate::dates::{self, DisplayLocale};
use crate::drive;
use crate::extract;
use crate::models::{Concert, ConcertSource, OriginalEvent, DESCRIPTION_PENDING, VENUE_TBA};

const PLACEHOLDER_BASE: &str = "https://via.placeholder.com/400x300/f0f0f0/666";
const DESCRIPTION_LIMIT: usize = 200;

static PREFIX_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*[\[(]\s*(?:concert|konsert)\s*[\])]\s*").expect("valid prefix tag regex")
});
static TIME_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}\s*-?\s*").expect("valid time prefix regex"));
static TITLE_AT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*?)\s+at\s+([^,\-]+)").expect("valid venue regex"));

pub fn placeholder_image(title: &str) -> String {
    let label = if title.trim().is_empty() { "Concert" } else { title.trim() };
    match Url::parse(PLACEHOLDER_BASE) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("text", label);
            url.into()
        }
        Err(_) => PLACEHOLDER_BASE.to_string(),
    }
}

pub fn clean_description(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return DESCRIPTION_PENDING.to_string(),
    };
    let decoded = extract::strip_tags(raw)
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let cleaned = extract::clean_text(&decoded);
    if cleaned.is_empty() {
        return DESCRIPTION_PENDING.to_string();
    }
    if cleaned.chars().count() > DESCRIPTION_LIMIT {
        let truncated: String = cleaned.chars().take(DESCRIPTION_LIMIT - 3).collect();
        return format!("{truncated}...");
    }
    cleaned
}

/// Venue from the first segment of the location, else from an
/// `"<title> at <venue>"` title. Returns the display title alongside, with
/// the venue part split off when it came from the title.
pub fn extract_venue(location: Option<&str>, title: &str) -> (String, String) {
    if let Some(venue) = location
        .and_then(|loc| loc.split(',').next())
        .map(str::trim)
        .filter(|venue| !venue.is_empty())
    {
        return (title.to_string(), venue.to_string());
    }

    if let Some(caps) = TITLE_AT_RE.captures(title) {
        let venue = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        let head = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if !venue.is_empty() {
            let display = if head.is_empty() { title } else { head };
            return (display.to_string(), venue.to_string());
        }
    }

    (title.to_string(), VENUE_TBA.to_string())
}

pub struct ConcertClassifier {
    tag_filter: String,
    keywords: Vec<String>,
    locale: DisplayLocale,
    timezone: Tz,
    images_enabled: bool,
}

impl ConcertClassifier {
    pub fn new(
        tag_filter: &str,
        keywords: &[String],
        locale: DisplayLocale,
        timezone: Tz,
        images_enabled: bool,
    ) -> Self {
        Self {
            tag_filter: tag_filter.trim().to_lowercase(),
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            locale,
            timezone,
            images_enabled,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.concert_tag_filter,
            &config.concert_keywords,
            config.locale,
            config.timezone(),
            config.images_enabled,
        )
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// An event qualifies when it has a title and any of: the tag marker in
    /// title or description, a keyword in title or description, or a
    /// bracketed concert prefix on the title.
    pub fn is_concert(&self, event: &RawCalendarEvent) -> bool {
        let title = match event.summary.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title,
            _ => return false,
        };
        let title_lower = title.to_lowercase();
        let description_lower = event.description.as_deref().unwrap_or_default().to_lowercase();
        let mentions = |needle: &str| title_lower.contains(needle) || description_lower.contains(needle);

        (!self.tag_filter.is_empty() && mentions(&self.tag_filter))
            || self.keywords.iter().any(|keyword| mentions(keyword))
            || PREFIX_TAG_RE.is_match(title)
    }

    pub fn clean_title(&self, title: &str) -> String {
        let mut rest = title.trim();
        if !self.tag_filter.is_empty() {
            if let Some(head) = rest.get(..self.tag_filter.len()) {
                if head.to_lowercase() == self.tag_filter {
                    rest = rest[self.tag_filter.len()..].trim_start();
                }
            }
        }
        let rest = PREFIX_TAG_RE.replace(rest, "");
        let rest = TIME_PREFIX_RE.replace(rest.trim_start(), "");
        let cleaned = rest.trim();
        if cleaned.is_empty() {
            title.trim().to_string()
        } else {
            cleaned.to_string()
        }
    }

    /// Attachments first, then description images, else the placeholder.
    pub fn transform(&self, event: &RawCalendarEvent) -> Concert {
        let raw_title = event.summary.as_deref().unwrap_or_default();
        let cleaned = self.clean_title(raw_title);
        let (title, venue) = extract_venue(event.location.as_deref(), &cleaned);

        let start = event.start.as_ref();
        let end = event.end.as_ref();
        let description = event.description.as_deref();

        let links = extract::extract_links(description.unwrap_or_default());
        let ticket_url = extract::pick_ticket_url(&links);

        let mut images = Vec::new();
        if self.images_enabled {
            images = drive::images_from_attachments(&event.attachments);
            if images.is_empty() {
                images = extract::extract_images(description.unwrap_or_default());
            }
        }
        if images.is_empty() {
            log::debug!("no images for event {}, using placeholder", event.id);
        }

        let concert = Concert {
            id: format!("calendar-{}", event.id),
            image: placeholder_image(&title),
            title,
            venue,
            date: dates::format_date(start, self.locale, self.timezone),
            time: dates::format_time(start, self.locale, self.timezone),
            duration: dates::format_duration(start, end),
            description: clean_description(description),
            images: Vec::new(),
            has_images: false,
            links,
            ticket_url,
            is_placeholder: false,
            source: ConcertSource::LiveSync,
            original_event: Some(OriginalEvent {
                id: event.id.clone(),
                html_link: event.html_link.clone(),
                start_date: start.and_then(|s| s.raw()).map(str::to_string),
                end_date: end.and_then(|e| e.raw()).map(str::to_string),
                all_day: start.map(|s| s.is_all_day()).unwrap_or(false),
                location: event.location.clone(),
                attachments: event.attachments.clone(),
            }),
        };
        concert.with_images(images)
    }

    pub fn classify(&self, event: &RawCalendarEvent) -> Option<Concert> {
        if event.is_cancelled() {
            log::debug!("skipping cancelled event {}", event.id);
            return None;
        }
        if !self.is_concert(event) {
            return None;
        }
        Some(self.transform(event))
    }
}
