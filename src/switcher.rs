//! Close-then-launch sequencing for a preset switch
//!
//! Apps are handled one at a time in preset order. Individual failures are
//! collected into the [`SwitchReport`]; nothing here aborts a switch.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::platform::{AppPlatform, LaunchTarget, RunningApp};
use crate::resolver::{canonical_name, AppError, AppResolver};
use crate::types::{AppEntry, Preset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchPhase {
    Idle,
    Closing,
    Launching,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchReport {
    pub target: Uuid,
    /// Display names of apps that were asked to quit
    pub closed: Vec<String>,
    /// Canonical names of apps that started
    pub launched: Vec<String>,
    pub failures: Vec<AppError>,
}

impl SwitchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SwitchOrchestrator {
    platform: Arc<dyn AppPlatform>,
    resolver: Arc<AppResolver>,
}

impl SwitchOrchestrator {
    pub fn new(platform: Arc<dyn AppPlatform>, resolver: Arc<AppResolver>) -> Self {
        Self { platform, resolver }
    }

    /// Close `current`'s apps (if it asks for that), then launch `target`'s.
    ///
    /// `on_phase` observes Closing/Launching/Idle transitions.
    pub async fn switch(
        &self,
        current: Option<&Preset>,
        target: &Preset,
        on_phase: &(dyn Fn(SwitchPhase) + Send + Sync),
    ) -> SwitchReport {
        info!(target = %target.name, id = %target.id, from = ?current.map(|p| &p.name), "Switching preset");
        let mut report = SwitchReport {
            target: target.id,
            closed: Vec::new(),
            launched: Vec::new(),
            failures: Vec::new(),
        };

        if let Some(current) = current.filter(|p| p.close_previous) {
            on_phase(SwitchPhase::Closing);
            report.closed = self.close_all(current).await;
        }

        on_phase(SwitchPhase::Launching);
        for app in &target.apps {
            match self.launch_one(app).await {
                Ok(name) => report.launched.push(name),
                Err(e) => {
                    warn!(app = %app.name, error = %e, "App failed during switch");
                    report.failures.push(e);
                }
            }
        }

        on_phase(SwitchPhase::Idle);
        info!(
            target = %target.name,
            closed = report.closed.len(),
            launched = report.launched.len(),
            failed = report.failures.len(),
            "Switch finished"
        );
        report
    }

    async fn close_all(&self, preset: &Preset) -> Vec<String> {
        let platform = self.platform.clone();
        let running = match tokio::task::spawn_blocking(move || platform.running_apps()).await {
            Ok(Ok(running)) => running,
            Ok(Err(e)) => {
                warn!(error = ?e, "Could not list running apps, skipping close step");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Running-app query panicked, skipping close step");
                return Vec::new();
            }
        };

        let mut closed = Vec::new();
        for app in &preset.apps {
            let canonical = canonical_name(&app.name);
            let targets: Vec<RunningApp> = running
                .iter()
                .filter(|r| r.matches(&canonical) || r.matches(&app.name))
                .cloned()
                .collect();
            if targets.is_empty() {
                debug!(app = %canonical, "Not running, nothing to close");
                continue;
            }
            for target in targets {
                let platform = self.platform.clone();
                let pid = target.pid;
                match tokio::task::spawn_blocking(move || platform.terminate(&target)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(app = %canonical, pid, error = ?e, "Failed to close app"),
                    Err(e) => warn!(app = %canonical, pid, error = %e, "Close task panicked"),
                }
            }
            closed.push(canonical);
        }
        closed
    }

    async fn launch_one(&self, app: &AppEntry) -> Result<String, AppError> {
        let resolved = self.resolver.resolve(&app.name)?;
        let name = resolved.canonical.clone();
        let urls = app.launch_urls();

        let platform = self.platform.clone();
        let target: LaunchTarget = resolved.target;
        let launched = tokio::task::spawn_blocking(move || platform.launch(&target, &urls)).await;
        match launched {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(AppError::Launch { name, reason: format!("{e:#}") });
            }
            Err(e) => {
                return Err(AppError::Launch { name, reason: e.to_string() });
            }
        }

        for (index, position) in app.window_positions.iter().enumerate() {
            let platform = self.platform.clone();
            let window_app = name.clone();
            let position = *position;
            let placed =
                tokio::task::spawn_blocking(move || platform.place_window(&window_app, index, &position)).await;
            match placed {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(app = %name, index, error = ?e, "Window placement skipped"),
                Err(e) => debug!(app = %name, index, error = %e, "Window placement task panicked"),
            }
        }

        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{Call, FakePlatform};
    use crate::types::WindowPosition;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn orchestrator(platform: Arc<FakePlatform>) -> SwitchOrchestrator {
        let resolver = Arc::new(AppResolver::new(platform.clone(), 5));
        SwitchOrchestrator::new(platform, resolver)
    }

    fn preset(name: &str, apps: &[&str], close_previous: bool) -> Preset {
        Preset::new(name, "", apps.iter().map(|a| AppEntry::new(*a)).collect(), close_previous)
    }

    fn no_phase(_: SwitchPhase) {}

    #[tokio::test]
    async fn test_closes_before_launching_in_order() {
        let platform = Arc::new(FakePlatform::with_installed(&["Steam", "Discord"]));
        platform.set_running(&["Slack", "Terminal", "Finder"]);
        let o = orchestrator(platform.clone());

        let work = preset("Work", &["Terminal", "Slack"], true);
        let gaming = preset("Gaming", &["Steam", "Discord"], false);
        let report = o.switch(Some(&work), &gaming, &no_phase).await;

        assert_eq!(
            platform.calls(),
            vec![
                Call::Terminate("Terminal".into()),
                Call::Terminate("Slack".into()),
                Call::Launch(LaunchTarget::Path(PathBuf::from("/Applications/Steam.app")), vec![]),
                Call::Launch(LaunchTarget::Path(PathBuf::from("/Applications/Discord.app")), vec![]),
            ]
        );
        assert_eq!(report.closed, vec!["Terminal", "Slack"]);
        assert_eq!(report.launched, vec!["Steam", "Discord"]);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_close_previous_false_issues_no_closes() {
        let platform = Arc::new(FakePlatform::with_installed(&["Notes"]));
        platform.set_running(&["Steam"]);
        let o = orchestrator(platform.clone());

        let gaming = preset("Gaming", &["Steam"], false);
        let notes = preset("Notes", &["Notes"], true);
        o.switch(Some(&gaming), &notes, &no_phase).await;

        assert!(platform.terminations().is_empty());
        assert_eq!(platform.launches().len(), 1);
    }

    #[tokio::test]
    async fn test_not_running_apps_are_silently_skipped() {
        let platform = Arc::new(FakePlatform::with_installed(&["Mail"]));
        let o = orchestrator(platform.clone());

        let work = preset("Work", &["Xcode"], true);
        let report = o.switch(Some(&work), &preset("School", &["Mail"], true), &no_phase).await;

        assert!(report.closed.is_empty());
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_remaining_launches() {
        let mut fake = FakePlatform::with_installed(&["Broken", "Notes"]);
        fake.failing_launches.push("Broken".into());
        let platform = Arc::new(fake);
        let o = orchestrator(platform.clone());

        let target = preset("Mixed", &["Nonexistent Thing", "Broken", "Notes"], true);
        let report = o.switch(None, &target, &no_phase).await;

        assert_eq!(report.launched, vec!["Notes"]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0], AppError::Unresolvable("Nonexistent Thing".into()));
        assert!(matches!(&report.failures[1], AppError::Launch { name, .. } if name == "Broken"));
        assert_eq!(platform.launches().len(), 2);
    }

    #[tokio::test]
    async fn test_browser_gets_urls_and_windows_are_placed() {
        let platform = Arc::new(FakePlatform::with_installed(&["Safari"]));
        let o = orchestrator(platform.clone());

        let mut safari = AppEntry::new("Safari");
        safari.add_website(crate::types::Website::new("https://example.com", None).unwrap());
        safari.window_positions.push(WindowPosition::new(0, 0, 800, 600, 0));
        let target = Preset::new("Browse", "", vec![safari], false);
        o.switch(None, &target, &no_phase).await;

        assert_eq!(
            platform.calls(),
            vec![
                Call::Launch(
                    LaunchTarget::Path(PathBuf::from("/Applications/Safari.app")),
                    vec!["https://example.com".to_string()]
                ),
                Call::Place("Safari".into(), 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_phases_reported() {
        let platform = Arc::new(FakePlatform::with_installed(&["Notes"]));
        let o = orchestrator(platform);
        let seen = Mutex::new(Vec::new());
        let record = |phase: SwitchPhase| seen.lock().unwrap().push(phase);

        let work = preset("Work", &["Notes"], true);
        o.switch(Some(&work), &work, &record).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SwitchPhase::Closing, SwitchPhase::Launching, SwitchPhase::Idle]
        );
    }
}
