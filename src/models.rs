use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::Attachment;

pub const VENUE_TBA: &str = "Venue TBA";
pub const DATE_TBA: &str = "Date TBA";
pub const TIME_TBA: &str = "Time TBA";
pub const ALL_DAY: &str = "All Day";
pub const DESCRIPTION_PENDING: &str = "Concert details to be announced.";
pub const DEFAULT_IMAGE_TITLE: &str = "Concert Image";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConcertSource {
    LiveSync,
    StaticFallback,
    Test,
    AutoArchived,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Tickets,
    Social,
    Venue,
    Website,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConcertLink {
    pub url: String,
    pub text: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConcertImage {
    pub url: String,
    pub title: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

/// Provenance of a live-synced concert. Never mutated after construction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OriginalEvent {
    pub id: String,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Concert {
    pub id: String,
    pub title: String,
    pub venue: String,
    pub date: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub description: String,
    #[serde(default)]
    pub images: Vec<ConcertImage>,
    pub image: String,
    #[serde(default)]
    pub has_images: bool,
    #[serde(default)]
    pub links: Vec<ConcertLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<String>,
    #[serde(default)]
    pub is_placeholder: bool,
    pub source: ConcertSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_event: Option<OriginalEvent>,
}

impl Concert {
    /// Returns a new concert carrying `images`, keeping `image` and
    /// `has_images` consistent with them. An empty list keeps the current
    /// primary image.
    pub fn with_images(self, images: Vec<ConcertImage>) -> Concert {
        let image = images
            .first()
            .map(|img| img.url.clone())
            .unwrap_or(self.image);
        Concert {
            has_images: !images.is_empty(),
            images,
            image,
            ..self
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub id: String,
    pub title: String,
    pub venue: String,
    pub date: String,
    pub image: String,
    pub archived_at: DateTime<Utc>,
    pub source: ConcertSource,
}

impl ArchiveRecord {
    pub fn from_concert(concert: &Concert, archived_at: DateTime<Utc>) -> Self {
        Self {
            id: concert.id.clone(),
            title: concert.title.clone(),
            venue: concert.venue.clone(),
            date: concert.date.clone(),
            image: concert.image.clone(),
            archived_at,
            source: ConcertSource::AutoArchived,
        }
    }
}

/// Terminal state of one sync pipeline invocation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FetchTier {
    CachedHit,
    UnconfiguredFallback,
    LiveFetchSuccess,
    StaleCacheFallback,
    StaticFallback,
}

impl FetchTier {
    /// True when the data may be older than the cache window.
    pub fn is_degraded(self) -> bool {
        matches!(
            self,
            FetchTier::StaleCacheFallback | FetchTier::StaticFallback | FetchTier::UnconfiguredFallback
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MovedConcert {
    pub title: String,
    pub date: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub moved_count: usize,
    #[serde(default)]
    pub moved_concerts: Vec<MovedConcert>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub configured: bool,
    pub cache_valid: bool,
    pub last_cached_at: Option<DateTime<Utc>>,
    pub upcoming_count: usize,
    pub past_count: usize,
    pub last_upcoming_tier: Option<FetchTier>,
    pub last_past_tier: Option<FetchTier>,
    pub archive_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(id: &str) -> Concert {
        Concert {
            id: id.to_string(),
            title: "Summer Show".to_string(),
            venue: VENUE_TBA.to_string(),
            date: DATE_TBA.to_string(),
            time: TIME_TBA.to_string(),
            duration: None,
            description: DESCRIPTION_PENDING.to_string(),
            images: Vec::new(),
            image: "https://via.placeholder.com/400x300/f0f0f0/666?text=Summer+Show".to_string(),
            has_images: false,
            links: Vec::new(),
            ticket_url: None,
            is_placeholder: false,
            source: ConcertSource::Test,
            original_event: None,
        }
    }

    #[test]
    fn with_images_keeps_primary_consistent() {
        let concert = bare("test-1").with_images(vec![ConcertImage {
            url: "https://img.example.com/a.jpg".to_string(),
            title: DEFAULT_IMAGE_TITLE.to_string(),
            mime_type: "image/jpeg".to_string(),
            original_url: None,
        }]);
        assert!(concert.has_images);
        assert_eq!(concert.image, "https://img.example.com/a.jpg");

        let unchanged = bare("test-2").with_images(Vec::new());
        assert!(!unchanged.has_images);
        assert!(unchanged.image.contains("placeholder"));
    }

    #[test]
    fn serializes_with_presentation_field_names() {
        let value = serde_json::to_value(bare("test-3")).expect("serialize");
        assert_eq!(value["source"], "test");
        assert_eq!(value["hasImages"], false);
        assert_eq!(value["isPlaceholder"], false);
        assert!(value.get("originalEvent").is_none());

        let link = ConcertLink {
            url: "https://eventbrite.com/e/123".to_string(),
            text: "eventbrite.com".to_string(),
            link_type: LinkType::Tickets,
        };
        let value = serde_json::to_value(link).expect("serialize link");
        assert_eq!(value["type"], "tickets");
    }
}
