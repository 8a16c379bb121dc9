//! IPC message types for CLI ↔ daemon communication
//!
//! Presets are addressed by a reference string: a uuid, or a preset name
//! (first case-insensitive match).

use serde::{Deserialize, Serialize};

use crate::manager::CollectionEvent;
use crate::resolver::ResolvedApp;
use crate::switcher::SwitchReport;
use crate::types::{AppEntry, Preset};

/// Requests sent from a front end to the daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum PresetRequest {
    /// Health check
    Ping,

    ListPresets,
    GetPreset(String),

    /// Current preset and loading flag
    Status,

    AddPreset(Preset),
    UpdatePreset(Preset),
    DeletePreset(String),

    AddApp { preset: String, app: AppEntry },
    RemoveApp { preset: String, app: String },

    AddWebsite {
        preset: String,
        app: String,
        url: String,
        title: Option<String>,
    },
    RemoveWebsite { preset: String, app: String, url: String },

    /// Close the current preset's apps and launch this one's
    Switch(String),

    /// Installed apps matching a query; `all` skips the suggestion cap
    Search { query: String, all: bool },

    /// Show how an app name would be launched
    Resolve(String),

    /// Write presets to disk now
    Flush,

    /// Stream change events on this connection: `Ready`, then one `Event`
    /// frame per change until the client hangs up
    Watch,

    /// Request graceful shutdown
    Shutdown,
}

/// Responses sent from the daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum PresetResponse {
    Pong,
    Presets(Vec<Preset>),
    Preset(Preset),
    Status {
        current: Option<Preset>,
        loading: bool,
        preset_count: usize,
    },
    /// Whether a mutation changed anything
    Changed(bool),
    Switched(SwitchReport),
    Suggestions(Vec<String>),
    Resolved(ResolvedApp),
    Event(CollectionEvent),

    /// Acknowledgment that request was processed
    Ready,

    /// Error occurred
    Error(String),
}

impl PresetRequest {
    /// Whether handling this request changes the stored collection.
    /// `Flush` writes by itself and is not counted.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            PresetRequest::AddPreset(_)
                | PresetRequest::UpdatePreset(_)
                | PresetRequest::DeletePreset(_)
                | PresetRequest::AddApp { .. }
                | PresetRequest::RemoveApp { .. }
                | PresetRequest::AddWebsite { .. }
                | PresetRequest::RemoveWebsite { .. }
        )
    }
}
