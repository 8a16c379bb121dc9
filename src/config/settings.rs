//! User settings (`settings.json`)
//!
//! Every field has a default, so a missing or partial file is fine.
//! Environment variables override the file, then values are clamped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::{apps, paths, persist};

/// Longest debounce accepted before clamping
const MAX_DEBOUNCE_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Quiet period before a debounced write (milliseconds)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Suggestions returned by app search
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// Override for where presets.json lives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,

    /// Replaces the built-in install directories when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub app_dirs: Vec<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_debounce_ms() -> u64 {
    persist::DEBOUNCE_MS
}

fn default_suggestion_limit() -> usize {
    apps::SUGGESTION_LIMIT
}

fn known_log_level(level: &str) -> Option<String> {
    let level = level.trim().to_lowercase();
    matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error").then_some(level)
}

fn file_log_level(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str::<Settings>(&contents).ok().map(|s| s.log_level)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debounce_ms: default_debounce_ms(),
            suggestion_limit: default_suggestion_limit(),
            data_file: None,
            app_dirs: Vec::new(),
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::SETTINGS_FILE);
        path
    }

    /// Level to start logging at, before [`load_from`](Self::load_from) has
    /// anything to report. `LOG_LEVEL` wins over the file; anything unreadable
    /// or unknown means "info". Logs nothing itself.
    pub fn startup_log_level(path: &Path) -> String {
        env::var("LOG_LEVEL")
            .ok()
            .or_else(|| file_log_level(path))
            .and_then(|level| known_log_level(&level))
            .unwrap_or_else(default_log_level)
    }

    /// Never fails: problems fall back to defaults, with a warning.
    pub fn load_from(path: &Path) -> Self {
        let mut settings = match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    info!(path = %path.display(), "Loaded settings");
                    settings
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid settings file, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        };
        settings.apply_env_overrides();
        settings.validate_and_clamp();
        settings
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(raw) = env::var("PRESET_DEBOUNCE_MS") {
            match raw.trim().parse() {
                Ok(ms) => self.debounce_ms = ms,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring PRESET_DEBOUNCE_MS"),
            }
        }
        if let Ok(file) = env::var("PRESET_DATA_FILE") {
            self.data_file = Some(PathBuf::from(file));
        }
    }

    fn validate_and_clamp(&mut self) {
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            warn!(debounce_ms = self.debounce_ms, max = MAX_DEBOUNCE_MS, "debounce_ms exceeds maximum, clamping");
            self.debounce_ms = MAX_DEBOUNCE_MS;
        }
        if self.suggestion_limit == 0 {
            warn!(using = default_suggestion_limit(), "suggestion_limit of 0, using default");
            self.suggestion_limit = default_suggestion_limit();
        }
        match known_log_level(&self.log_level) {
            Some(level) => self.log_level = level,
            None => {
                warn!(log_level = %self.log_level, "Unknown log_level, using info");
                self.log_level = default_log_level();
            }
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
