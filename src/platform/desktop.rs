//! Real platform backend
//!
//! macOS: `.app` bundles, `open -a`/`open -b`, System Events for windows.
//! Other Unix: XDG desktop entries, `gio launch`, flatpak ids, `wmctrl`.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use super::{normalize_app_name, AppPlatform, LaunchTarget, RunningApp};
use crate::constants::{apps, commands, install_dirs};
use crate::types::WindowPosition;

pub struct DesktopPlatform {
    search_dirs: Vec<PathBuf>,
}

impl DesktopPlatform {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        debug!(dirs = ?search_dirs, "Desktop platform search directories");
        Self { search_dirs }
    }

    /// Well-known install directories for this OS, user folder first
    pub fn default_search_dirs() -> Vec<PathBuf> {
        let mut dirs_out = Vec::new();
        if cfg!(target_os = "macos") {
            if let Some(home) = dirs::home_dir() {
                dirs_out.push(home.join("Applications"));
            }
            dirs_out.extend(install_dirs::MACOS.iter().map(PathBuf::from));
        } else {
            if let Some(data) = dirs::data_dir() {
                dirs_out.push(data.join("applications"));
                dirs_out.push(data.join("flatpak/exports/share/applications"));
            }
            dirs_out.extend(install_dirs::XDG.iter().map(PathBuf::from));
        }
        dirs_out
    }

    fn bundle_ext() -> &'static str {
        if cfg!(target_os = "macos") {
            apps::MACOS_BUNDLE_EXT
        } else {
            apps::DESKTOP_ENTRY_EXT
        }
    }

    /// Every bundle/desktop entry in the search directories as (display name, path)
    fn scan(&self) -> Vec<(String, PathBuf)> {
        let ext = Self::bundle_ext();
        let mut found = Vec::new();
        for dir in &self.search_dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_none_or(|e| e != ext) {
                    continue;
                }
                if let Some(name) = display_name(&path) {
                    found.push((name, path));
                }
            }
        }
        found
    }
}

/// Name shown for an installed app; hidden desktop entries yield None
fn display_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    if path.extension().is_some_and(|e| e == apps::MACOS_BUNDLE_EXT) {
        return Some(stem);
    }

    let Ok(contents) = fs::read_to_string(path) else {
        return Some(stem);
    };
    let mut name = None;
    let mut in_main_section = false;
    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_main_section = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_section {
            continue;
        }
        if line == "NoDisplay=true" || line == "Hidden=true" {
            return None;
        }
        if name.is_none() {
            if let Some(value) = line.strip_prefix("Name=") {
                name = Some(value.trim().to_string());
            }
        }
    }
    Some(name.unwrap_or(stem))
}

impl AppPlatform for DesktopPlatform {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let ext = Self::bundle_ext();
        let slug = name.to_lowercase().replace(' ', "-");

        // Direct probe first: "<dir>/<name>.<ext>"
        for dir in &self.search_dirs {
            for candidate in [format!("{name}.{ext}"), format!("{slug}.{ext}")] {
                let path = dir.join(candidate);
                if path.exists() {
                    return Some(path);
                }
            }
        }

        let wanted = normalize_app_name(name);
        self.scan()
            .into_iter()
            .find(|(display, path)| {
                normalize_app_name(display) == wanted
                    || path
                        .file_stem()
                        .is_some_and(|s| normalize_app_name(&s.to_string_lossy()) == wanted)
            })
            .map(|(_, path)| path)
    }

    fn installed_apps(&self) -> Vec<String> {
        self.scan().into_iter().map(|(name, _)| name).collect()
    }

    fn launch(&self, target: &LaunchTarget, urls: &[String]) -> Result<()> {
        info!(target = ?target, urls = urls.len(), "Launching application");
        if cfg!(target_os = "macos") {
            let (flag, arg) = match target {
                LaunchTarget::Path(path) => ("-a", path.to_string_lossy().into_owned()),
                LaunchTarget::Identifier(id) => ("-b", id.clone()),
            };
            let mut args = vec![flag.to_string(), arg];
            args.extend(urls.iter().cloned());
            return run_to_completion(commands::MACOS_OPEN, &args);
        }

        match target {
            LaunchTarget::Path(path) => {
                let mut args = vec!["launch".to_string(), path.to_string_lossy().into_owned()];
                args.extend(urls.iter().cloned());
                run_to_completion(commands::GIO, &args)
            }
            LaunchTarget::Identifier(id) => {
                // `flatpak run` stays attached to the app, so don't wait on it
                let mut args = vec!["run".to_string(), id.clone()];
                args.extend(urls.iter().cloned());
                Command::new(commands::FLATPAK)
                    .args(&args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .with_context(|| format!("Failed to spawn {} for {id}", commands::FLATPAK))?;
                Ok(())
            }
        }
    }

    fn running_apps(&self) -> Result<Vec<RunningApp>> {
        if Path::new("/proc/self/comm").exists() {
            running_from_procfs()
        } else {
            running_from_ps()
        }
    }

    fn terminate(&self, app: &RunningApp) -> Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = i32::try_from(app.pid).context("pid out of range")?;
        info!(pid = app.pid, name = %app.name, "Terminating application");
        kill(Pid::from_raw(pid), Signal::SIGTERM)
            .with_context(|| format!("Failed to signal {} (pid {})", app.name, app.pid))
    }

    fn place_window(&self, app_name: &str, index: usize, position: &WindowPosition) -> Result<()> {
        if cfg!(target_os = "macos") {
            let process = app_name.replace('\\', "\\\\").replace('"', "\\\"");
            let window = index + 1;
            let script = format!(
                "tell application \"System Events\" to tell process \"{process}\"\n\
                 set position of window {window} to {{{x}, {y}}}\n\
                 set size of window {window} to {{{w}, {h}}}\n\
                 end tell",
                x = position.x,
                y = position.y,
                w = position.width,
                h = position.height,
            );
            return run_to_completion(commands::OSASCRIPT, &["-e".to_string(), script]);
        }

        // wmctrl addresses windows by title substring, so only the first one is reachable
        if index > 0 {
            debug!(app = %app_name, index, "Skipping extra window placement");
            return Ok(());
        }
        let geometry = format!(
            "0,{},{},{},{}",
            position.x, position.y, position.width, position.height
        );
        run_to_completion(
            commands::WMCTRL,
            &["-r".to_string(), app_name.to_string(), "-e".to_string(), geometry],
        )
    }
}

fn run_to_completion(program: &str, args: &[String]) -> Result<()> {
    debug!(program, args = ?args, "Running command");
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("Failed to run {program}"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

fn running_from_procfs() -> Result<Vec<RunningApp>> {
    let mut running = Vec::new();
    for entry in fs::read_dir("/proc").context("Failed to read /proc")?.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
            continue;
        };
        let path = fs::read_link(entry.path().join("exe")).ok();
        running.push(RunningApp {
            pid,
            name: comm.trim().to_string(),
            path,
        });
    }
    Ok(running)
}

fn running_from_ps() -> Result<Vec<RunningApp>> {
    let output = Command::new(commands::PS)
        .args(["-axo", "pid=,comm="])
        .output()
        .with_context(|| format!("Failed to run {}", commands::PS))?;
    if !output.status.success() {
        warn!(status = %output.status, "ps exited unsuccessfully");
    }
    Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_ps_output(stdout: &str) -> Vec<RunningApp> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, command) = line.split_once(char::is_whitespace)?;
            let pid = pid.parse().ok()?;
            let path = PathBuf::from(command.trim());
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some(RunningApp { pid, name, path: Some(path) })
        })
        .collect()
}
