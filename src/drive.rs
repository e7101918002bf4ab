// URL rewriting only. Drive images are accepted without checking that they
// exist; the renderer swaps in a placeholder when one fails to load.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::calendar::Attachment;
use crate::models::{ConcertImage, DEFAULT_IMAGE_TITLE};

const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const DEFAULT_THUMBNAIL_WIDTH: u32 = 800;
const MAX_FOLDER_IMAGES: usize = 5;

static FILE_PATH_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").expect("valid drive path regex"));
static QUERY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]id=([a-zA-Z0-9_-]+)").expect("valid drive query regex"));
static PAREN_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\[(][^\])]*[\])]").expect("valid tag regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub primary: String,
    /// Other URL shapes for the same file. Recorded, not retried.
    pub alternates: Vec<String>,
}

pub fn extract_file_id(url: &str) -> Option<String> {
    FILE_PATH_ID_RE
        .captures(url)
        .or_else(|| QUERY_ID_RE.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn thumbnail_url(file_id: &str, width: u32) -> String {
    format!("https://drive.google.com/thumbnail?id={file_id}&sz=w{width}")
}

pub fn urls_for_file_id(file_id: &str, width: u32) -> ResolvedImage {
    ResolvedImage {
        primary: thumbnail_url(file_id, width),
        alternates: vec![
            format!("https://drive.google.com/uc?export=view&id={file_id}"),
            format!("https://lh3.googleusercontent.com/d/{file_id}=w{width}"),
        ],
    }
}

/// Rewrites a shareable Drive link into an embeddable one. Inputs without a
/// recognisable file id are returned unchanged.
pub fn resolve(url: &str, width: u32) -> ResolvedImage {
    match extract_file_id(url) {
        Some(file_id) => urls_for_file_id(&file_id, width),
        None => ResolvedImage {
            primary: url.to_string(),
            alternates: Vec::new(),
        },
    }
}

/// Image attachments become image descriptors, all accepted without probing.
pub fn images_from_attachments(attachments: &[Attachment]) -> Vec<ConcertImage> {
    attachments
        .iter()
        .filter(|attachment| attachment.is_image())
        .filter_map(|attachment| {
            let source = attachment
                .file_url
                .clone()
                .or_else(|| attachment.file_id.as_deref().map(|id| thumbnail_url(id, DEFAULT_THUMBNAIL_WIDTH)))?;
            let resolved = resolve(&source, DEFAULT_THUMBNAIL_WIDTH);
            log::debug!(
                "drive image resolved primary={} alternates={}",
                resolved.primary,
                resolved.alternates.len()
            );
            Some(ConcertImage {
                url: resolved.primary,
                title: attachment
                    .title
                    .clone()
                    .filter(|title| !title.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_IMAGE_TITLE.to_string()),
                mime_type: attachment.mime_type.clone().unwrap_or_default(),
                original_url: Some(source),
            })
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn find_images(&self, concert_title: &str) -> Result<Vec<ConcertImage>, DriveError>;
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

pub struct DriveClient {
    api_key: String,
    parent_folder_id: String,
    client: Client,
}

impl DriveClient {
    pub fn new(api_key: impl Into<String>, parent_folder_id: impl Into<String>) -> Result<Self, DriveError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|err| DriveError::Http(err.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            parent_folder_id: parent_folder_id.into(),
            client,
        })
    }

    fn search_url(&self, name_fragment: &str) -> Result<Url, DriveError> {
        let query = format!(
            "'{}' in parents and mimeType contains 'image/' and name contains '{}' and trashed = false",
            escape_query(&self.parent_folder_id),
            escape_query(name_fragment)
        );
        let mut url = Url::parse(DRIVE_FILES_API).map_err(|err| DriveError::Http(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("fields", "files(id,name,mimeType)")
            .append_pair("pageSize", &MAX_FOLDER_IMAGES.to_string())
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn search(&self, name_fragment: &str) -> Result<Vec<DriveFile>, DriveError> {
        let url = self.search_url(name_fragment)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DriveError::Http(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| DriveError::Http(err.to_string()))?;
        if !status.is_success() {
            return Err(DriveError::Http(format!("status {}: {}", status, text)));
        }
        let payload: FileListResponse =
            serde_json::from_str(&text).map_err(|err| DriveError::Parse(err.to_string()))?;
        Ok(payload.files)
    }
}

#[async_trait]
impl ImageSearch for DriveClient {
    async fn find_images(&self, concert_title: &str) -> Result<Vec<ConcertImage>, DriveError> {
        let title = search_title(concert_title);
        if title.is_empty() {
            return Ok(Vec::new());
        }

        let mut files = self.search(&title).await?;
        if files.is_empty() {
            if let Some(first_word) = title.split_whitespace().next().filter(|w| w.chars().count() > 2) {
                if first_word != title {
                    files = self.search(first_word).await?;
                }
            }
        }

        Ok(files
            .into_iter()
            .take(MAX_FOLDER_IMAGES)
            .map(drive_file_image)
            .collect())
    }
}

fn drive_file_image(file: DriveFile) -> ConcertImage {
    let resolved = urls_for_file_id(&file.id, DEFAULT_THUMBNAIL_WIDTH);
    ConcertImage {
        url: resolved.primary,
        title: file.name.unwrap_or_else(|| DEFAULT_IMAGE_TITLE.to_string()),
        mime_type: file.mime_type.unwrap_or_else(|| "image/unknown".to_string()),
        original_url: resolved.alternates.into_iter().next(),
    }
}

/// Folder file names never contain the calendar tag markers.
fn search_title(title: &str) -> String {
    crate::extract::clean_text(&PAREN_TAG_RE.replace_all(title, " "))
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
