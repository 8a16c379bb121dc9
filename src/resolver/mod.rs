//! Application name resolution
//!
//! Turns whatever the user typed ("chrome", " TEAMS ") into a canonical
//! display name and a way to start it: an installed bundle found on disk,
//! else a known bundle identifier.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::platform::{AppPlatform, LaunchTarget};

mod tables;
use tables::{ALIASES, FLATPAK_IDS, MACOS_BUNDLE_IDS};

/// Per-application failure during a switch. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AppError {
    #[error("application '{0}' could not be found")]
    Unresolvable(String),
    #[error("application '{name}' failed to start: {reason}")]
    Launch { name: String, reason: String },
}

/// Outcome of resolving a user-entered name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedApp {
    pub canonical: String,
    pub target: LaunchTarget,
}

/// Canonical display name for user input.
///
/// Case-insensitive substring match against the alias table in either
/// direction; first match wins. Unmatched input keeps its own casing.
pub fn canonical_name(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let needle = trimmed.to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| alias.contains(needle.as_str()) || needle.contains(*alias))
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Bundle/package identifier for a canonical name on this OS
pub fn bundle_identifier(canonical: &str) -> Option<&'static str> {
    let table = if cfg!(target_os = "macos") {
        MACOS_BUNDLE_IDS
    } else {
        FLATPAK_IDS
    };
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(canonical))
        .map(|(_, id)| *id)
}

pub struct AppResolver {
    platform: Arc<dyn AppPlatform>,
    suggestion_limit: usize,
}

impl AppResolver {
    pub fn new(platform: Arc<dyn AppPlatform>, suggestion_limit: usize) -> Self {
        Self { platform, suggestion_limit }
    }

    /// Installed bundle first, then the identifier table
    pub fn resolve(&self, name: &str) -> Result<ResolvedApp, AppError> {
        let typed = name.trim();
        let canonical = canonical_name(typed);
        if canonical.is_empty() {
            return Err(AppError::Unresolvable(name.to_string()));
        }

        let located = self.platform.locate(&canonical).or_else(|| {
            (canonical != typed)
                .then(|| self.platform.locate(typed))
                .flatten()
        });
        if let Some(path) = located {
            debug!(name = %typed, canonical = %canonical, path = %path.display(), "Resolved by install path");
            return Ok(ResolvedApp { canonical, target: LaunchTarget::Path(path) });
        }

        if let Some(id) = bundle_identifier(&canonical) {
            debug!(name = %typed, canonical = %canonical, id, "Resolved by bundle identifier");
            return Ok(ResolvedApp {
                canonical,
                target: LaunchTarget::Identifier(id.to_string()),
            });
        }

        Err(AppError::Unresolvable(typed.to_string()))
    }

    /// Installed apps whose name contains `query` (case-insensitive), sorted
    pub fn search(&self, query: &str) -> Vec<String> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut matches: Vec<String> = self
            .platform
            .installed_apps()
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by_key(|name| name.to_lowercase());
        matches.dedup();
        matches
    }

    /// [`search`](Self::search) capped for interactive completion
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        let mut found = self.search(query);
        found.truncate(self.suggestion_limit);
        found
    }
}
