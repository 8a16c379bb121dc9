//! Operating system collaborator
//!
//! Everything that touches installed or running applications goes through
//! [`AppPlatform`], so the resolver and switch orchestrator can be driven by
//! a fake in tests.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::WindowPosition;

mod desktop;
pub use desktop::DesktopPlatform;

/// How an application gets started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchTarget {
    /// Installed bundle or desktop entry found on disk
    Path(PathBuf),
    /// Platform bundle/package identifier
    Identifier(String),
}

/// A process currently running on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApp {
    pub pid: u32,
    pub name: String,
    pub path: Option<PathBuf>,
}

impl RunningApp {
    /// Whether this process belongs to the application with the given display name
    pub fn matches(&self, display_name: &str) -> bool {
        let wanted = normalize_app_name(display_name);
        if wanted.is_empty() {
            return false;
        }
        if normalize_app_name(&self.name) == wanted {
            return true;
        }
        let Some(path) = &self.path else {
            return false;
        };
        if path
            .file_name()
            .is_some_and(|f| normalize_app_name(&f.to_string_lossy()) == wanted)
        {
            return true;
        }
        bundle_name(path).is_some_and(|b| normalize_app_name(&b) == wanted)
    }
}

/// Lowercase and drop everything but letters and digits
/// ("Google Chrome", "google-chrome" and "GoogleChrome" all compare equal)
pub fn normalize_app_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Name of the enclosing `.app` bundle, if the path is inside one
fn bundle_name(path: &Path) -> Option<String> {
    path.ancestors().find_map(|p| {
        let ext = p.extension()?;
        if ext == crate::constants::apps::MACOS_BUNDLE_EXT {
            p.file_stem().map(|s| s.to_string_lossy().into_owned())
        } else {
            None
        }
    })
}

pub trait AppPlatform: Send + Sync {
    /// Probe the well-known install directories for an app with this name
    fn locate(&self, name: &str) -> Option<PathBuf>;

    /// Display names of every app found in the install directories
    fn installed_apps(&self) -> Vec<String>;

    /// Start an application, passing `urls` as documents to open
    fn launch(&self, target: &LaunchTarget, urls: &[String]) -> Result<()>;

    fn running_apps(&self) -> Result<Vec<RunningApp>>;

    /// Ask a running application to quit
    fn terminate(&self, app: &RunningApp) -> Result<()>;

    /// Move/resize the `index`-th window of an application
    fn place_window(&self, app_name: &str, index: usize, position: &WindowPosition) -> Result<()>;
}
