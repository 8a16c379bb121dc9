//! Preset data model
//!
//! Serialized field names are camelCase so the on-disk `presets.json` keeps
//! the same schema the presentation layer reads.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::constants::apps::KNOWN_BROWSERS;
use crate::resolver::canonical_name;

/// Rejected preset or website contents
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("preset name must not be empty")]
    EmptyPresetName,
    #[error("preset '{0}' has no applications")]
    NoApps(String),
    #[error("application at position {0} has an empty name")]
    EmptyAppName(usize),
    #[error("'{0}' is not an absolute http(s) URL")]
    InvalidUrl(String),
}

/// A browser tab opened alongside a browser app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub id: Uuid,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Website {
    /// Build a website after checking the URL is absolute http/https
    pub fn new(url: &str, title: Option<String>) -> Result<Self, ValidationError> {
        let url = url.trim();
        parse_web_url(url)?;
        Ok(Self {
            id: Uuid::new_v4(),
            url: url.to_string(),
            title: title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        })
    }

    pub fn is_valid(&self) -> bool {
        parse_web_url(&self.url).is_ok()
    }

    /// Explicit title, else the URL host without a leading "www."
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| self.url.clone())
    }
}

fn parse_web_url(raw: &str) -> Result<Url, ValidationError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(ValidationError::InvalidUrl(raw.to_string())),
    }
}

/// Window rectangle and the display it was on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub screen_index: u32,
}

impl WindowPosition {
    pub fn new(x: i32, y: i32, width: u32, height: u32, screen_index: u32) -> Self {
        Self { x, y, width, height, screen_index }
    }
}

/// One application inside a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEntry {
    pub name: String,
    #[serde(default)]
    pub window_positions: Vec<WindowPosition>,
    #[serde(default)]
    pub websites: Vec<Website>,
}

impl AppEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            window_positions: Vec::new(),
            websites: Vec::new(),
        }
    }

    pub fn is_browser(&self) -> bool {
        let canonical = canonical_name(&self.name);
        KNOWN_BROWSERS
            .iter()
            .any(|b| b.eq_ignore_ascii_case(&canonical))
    }

    /// Add a website unless one with the same URL is already present.
    /// Returns whether the list changed.
    pub fn add_website(&mut self, website: Website) -> bool {
        if self.websites.iter().any(|w| w.url == website.url) {
            return false;
        }
        self.websites.push(website);
        true
    }

    /// Remove the website with the given URL. Returns whether one was removed.
    pub fn remove_website(&mut self, url: &str) -> bool {
        let before = self.websites.len();
        self.websites.retain(|w| w.url != url.trim());
        self.websites.len() != before
    }

    /// URLs to hand to the app at launch (browsers only)
    pub fn launch_urls(&self) -> Vec<String> {
        if !self.is_browser() {
            return Vec::new();
        }
        self.websites
            .iter()
            .filter(|w| w.is_valid())
            .map(|w| w.url.clone())
            .collect()
    }
}

/// A named workspace: the apps to open when switching to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub apps: Vec<AppEntry>,
    #[serde(default = "default_close_previous")]
    pub close_previous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

fn default_close_previous() -> bool {
    true
}

impl Preset {
    /// Create a preset with a freshly generated id
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        apps: Vec<AppEntry>,
        close_previous: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            description: description.into(),
            apps,
            close_previous,
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyPresetName);
        }
        if self.apps.is_empty() {
            return Err(ValidationError::NoApps(self.name.clone()));
        }
        if let Some(idx) = self.apps.iter().position(|a| a.name.trim().is_empty()) {
            return Err(ValidationError::EmptyAppName(idx));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn app_names(&self) -> Vec<&str> {
        self.apps.iter().map(|a| a.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_title_defaults_to_host_without_www() {
        let site = Website::new("https://www.github.com/rust-lang", None).unwrap();
        assert_eq!(site.title, None);
        assert_eq!(site.display_title(), "github.com");
    }

    #[test]
    fn test_website_explicit_title_wins() {
        let site = Website::new("https://docs.rs", Some("Docs".to_string())).unwrap();
        assert_eq!(site.display_title(), "Docs");
    }

    #[test]
    fn test_website_rejects_non_http_urls() {
        assert!(Website::new("ftp://example.com", None).is_err());
        assert!(Website::new("example.com", None).is_err());
        assert!(Website::new("file:///etc/hosts", None).is_err());
        assert!(Website::new("http://example.com", None).is_ok());
    }

    #[test]
    fn test_duplicate_website_url_is_noop() {
        let mut app = AppEntry::new("Safari");
        assert!(app.add_website(Website::new("https://example.com", None).unwrap()));
        assert!(!app.add_website(Website::new("https://example.com", Some("Again".into())).unwrap()));
        assert_eq!(app.websites.len(), 1);
        assert_eq!(app.websites[0].title, None);
    }

    #[test]
    fn test_remove_website() {
        let mut app = AppEntry::new("Firefox");
        app.add_website(Website::new("https://a.example", None).unwrap());
        assert!(app.remove_website("https://a.example"));
        assert!(!app.remove_website("https://a.example"));
    }

    #[test]
    fn test_is_browser_uses_aliases() {
        assert!(AppEntry::new("Safari").is_browser());
        assert!(AppEntry::new("chrome").is_browser());
        assert!(!AppEntry::new("Terminal").is_browser());
    }

    #[test]
    fn test_launch_urls_only_for_browsers() {
        let mut notes = AppEntry::new("Notes");
        notes.websites.push(Website::new("https://example.com", None).unwrap());
        assert!(notes.launch_urls().is_empty());

        let mut safari = AppEntry::new("Safari");
        safari.websites.push(Website::new("https://example.com", None).unwrap());
        assert_eq!(safari.launch_urls(), vec!["https://example.com".to_string()]);
    }

    #[test]
    fn test_preset_validation() {
        let ok = Preset::new("Work", "", vec![AppEntry::new("Terminal")], true);
        assert!(ok.is_valid());

        let blank = Preset::new("   ", "", vec![AppEntry::new("Terminal")], true);
        assert_eq!(blank.validate(), Err(ValidationError::EmptyPresetName));

        let empty = Preset::new("Empty", "", vec![], true);
        assert_eq!(empty.validate(), Err(ValidationError::NoApps("Empty".into())));

        let bad_app = Preset::new("Bad", "", vec![AppEntry::new("Mail"), AppEntry::new(" ")], true);
        assert_eq!(bad_app.validate(), Err(ValidationError::EmptyAppName(1)));
    }

    #[test]
    fn test_preset_json_field_names() {
        let mut app = AppEntry::new("Safari");
        app.window_positions.push(WindowPosition::new(0, 0, 800, 600, 1));
        let preset = Preset::new("Work", "desc", vec![app], false).with_icon("briefcase");

        let json = serde_json::to_value(&preset).unwrap();
        assert_eq!(json["closePrevious"], false);
        assert_eq!(json["icon"], "briefcase");
        assert_eq!(json["apps"][0]["windowPositions"][0]["screenIndex"], 1);
        assert!(json["apps"][0]["websites"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let json = r#"{"id":"6f1c2f55-3f4e-4b8e-9a0e-6c1f1f4f2b11","name":"Bare"}"#;
        let preset: Preset = serde_json::from_str(json).unwrap();
        assert!(preset.close_previous);
        assert!(preset.icon.is_none());
        assert!(preset.apps.is_empty());
    }
}
