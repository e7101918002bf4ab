use std::{fs, path::PathBuf, sync::Mutex};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::DEFAULT_CALENDAR_BASE_URL;
use crate::dates::DisplayLocale;
use crate::utils;

pub const DEFAULT_TAG_FILTER: &str = "[CONCERT]";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Stockholm;
const DEFAULT_KEYWORDS: [&str; 5] = ["concert", "konsert", "performance", "recital", "event"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub calendar_id: Option<String>,
    pub concert_tag_filter: String,
    pub concert_keywords: Vec<String>,
    pub max_results_display: usize,
    pub past_concerts_limit: usize,
    pub refresh_interval_minutes: u64,
    pub expiry_check_interval_minutes: u64,
    pub images_enabled: bool,
    pub timezone: String,
    pub locale: DisplayLocale,
    pub calendar_base_url: String,
    pub drive_api_key: Option<String>,
    pub drive_parent_folder_id: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            calendar_id: None,
            concert_tag_filter: DEFAULT_TAG_FILTER.to_string(),
            concert_keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            max_results_display: 5,
            past_concerts_limit: 9,
            refresh_interval_minutes: 1440,
            expiry_check_interval_minutes: 1440,
            images_enabled: true,
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            locale: DisplayLocale::Swedish,
            calendar_base_url: DEFAULT_CALENDAR_BASE_URL.to_string(),
            drive_api_key: None,
            drive_parent_folder_id: None,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Environment variables win over the config file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("GOOGLE_CALENDAR_API_KEY") {
            self.api_key = Some(value);
        }
        if let Some(value) = lookup("GOOGLE_CALENDAR_ID") {
            self.calendar_id = Some(value);
        }
        if let Some(value) = lookup("CONCERT_TAG_FILTER") {
            self.concert_tag_filter = value;
        }
        if let Some(value) = lookup("MAX_CONCERTS_DISPLAY") {
            match value.trim().parse() {
                Ok(parsed) => self.max_results_display = parsed,
                Err(_) => log::warn!("ignoring MAX_CONCERTS_DISPLAY={value:?}"),
            }
        }
        if let Some(value) = lookup("API_REFRESH_INTERVAL") {
            match value.trim().parse() {
                Ok(parsed) => self.refresh_interval_minutes = parsed,
                Err(_) => log::warn!("ignoring API_REFRESH_INTERVAL={value:?}"),
            }
        }
        if let Some(value) = lookup("ENABLE_CONCERT_IMAGES") {
            self.images_enabled = !matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off");
        }
        if let Some(value) = lookup("GOOGLE_DRIVE_API_KEY") {
            self.drive_api_key = Some(value);
        }
        if let Some(value) = lookup("GOOGLE_DRIVE_PARENT_FOLDER_ID") {
            self.drive_parent_folder_id = Some(value);
        }
    }

    pub fn with_env(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()));
        self
    }

    pub fn is_configured(&self) -> bool {
        non_blank(&self.api_key).is_some() && non_blank(&self.calendar_id).is_some()
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((non_blank(&self.api_key)?, non_blank(&self.calendar_id)?))
    }

    /// Drive search needs a folder and a key; the calendar key is reused when
    /// no dedicated drive key is set.
    pub fn drive_credentials(&self) -> Option<(&str, &str)> {
        if !self.images_enabled {
            return None;
        }
        let folder = non_blank(&self.drive_parent_folder_id)?;
        let key = non_blank(&self.drive_api_key).or_else(|| non_blank(&self.api_key))?;
        Some((key, folder))
    }

    pub fn timezone(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                log::warn!("unknown timezone {:?}, using {}", self.timezone, DEFAULT_TIMEZONE.name());
                DEFAULT_TIMEZONE
            }
        }
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("failed to read config {:?}: {err}", path);
                AppConfig::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn read(&self) -> AppConfig {
        match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F>(&self, transform: F) -> Result<AppConfig, String>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| "config mutex poisoned".to_string())?;
        transform(&mut guard);
        write_config(&self.path, &guard)?;
        Ok(guard.clone())
    }
}

fn read_config(path: &PathBuf) -> Result<AppConfig, String> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| err.to_string())
}

fn write_config(path: &PathBuf, config: &AppConfig) -> Result<(), String> {
    utils::ensure_parent(path);
    let contents = serde_json::to_string_pretty(config).map_err(|err| err.to_string())?;
    fs::write(path, contents).map_err(|err| err.to_string())
}
