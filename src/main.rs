#![forbid(unsafe_code)]

mod config;
mod constants;
mod daemon;
mod ipc;
mod manager;
mod persistence;
mod platform;
mod resolver;
mod store;
mod switcher;
mod types;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use ipc::{PresetClient, PresetRequest, PresetResponse};
use manager::{CollectionEvent, CollectionManager};
use persistence::JsonFileStorage;
use platform::{DesktopPlatform, LaunchTarget};
use types::{AppEntry, Preset, WindowPosition};

#[derive(Parser, Debug)]
#[command(name = "preset-handler", version, about = "Switch between workspace presets")]
struct Cli {
    /// Preset file to use instead of the default data location
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Daemon socket path
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Don't contact a running daemon; operate on the preset file directly
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon that owns the presets
    Serve,
    /// Stop a running daemon after flushing presets
    Stop,
    /// List presets
    List,
    /// Show one preset (by id or name)
    Show { preset: String },
    /// Current preset and whether a switch is running
    Status,
    /// Switch to a preset
    Switch { preset: String },
    /// Create a preset
    New {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Application to include (repeatable)
        #[arg(short, long = "app", required = true)]
        apps: Vec<String>,
        /// Leave the previous preset's apps running when switching away from this one
        #[arg(long)]
        keep_previous: bool,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Edit a preset's name, description, icon or close behaviour
    Edit {
        preset: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        close_previous: Option<bool>,
    },
    /// Delete a preset
    Delete { preset: String },
    /// Add an application to a preset
    AddApp {
        preset: String,
        app: String,
        /// Window rectangle as X,Y,WIDTH,HEIGHT[,SCREEN] (repeatable)
        #[arg(long = "window", value_parser = parse_window)]
        windows: Vec<WindowPosition>,
    },
    /// Remove an application from a preset
    RemoveApp { preset: String, app: String },
    /// Open a website with a browser app in a preset
    AddSite {
        preset: String,
        app: String,
        url: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Remove a website from a browser app
    RemoveSite { preset: String, app: String, url: String },
    /// Find installed applications
    Search {
        query: String,
        /// Return every match instead of the first few
        #[arg(long)]
        all: bool,
    },
    /// Show how an application name would be launched
    Resolve { name: String },
    /// Write presets to disk immediately
    Flush,
    /// Print preset, current-preset and switch events from the daemon as they happen
    Watch,
    /// Print effective settings
    Settings {
        /// Save them to the settings file
        #[arg(long)]
        write: bool,
    },
}

fn parse_window(raw: &str) -> Result<WindowPosition, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if !(4..=5).contains(&parts.len()) {
        return Err("expected X,Y,WIDTH,HEIGHT[,SCREEN]".to_string());
    }
    let int = |s: &str| s.parse::<i32>().map_err(|e| format!("'{s}': {e}"));
    let uint = |s: &str| s.parse::<u32>().map_err(|e| format!("'{s}': {e}"));
    Ok(WindowPosition::new(
        int(parts[0])?,
        int(parts[1])?,
        uint(parts[2])?,
        uint(parts[3])?,
        parts.get(4).map(|s| uint(*s)).transpose()?.unwrap_or(0),
    ))
}

fn init_logging(level: &str) -> Result<()> {
    let log_level = match level {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_manager(settings: &Settings, data_file: PathBuf) -> CollectionManager {
    let search_dirs = if settings.app_dirs.is_empty() {
        DesktopPlatform::default_search_dirs()
    } else {
        settings.app_dirs.clone()
    };
    let storage = Arc::new(JsonFileStorage::new(data_file));
    debug!(path = %storage.path().display(), "Using preset file");
    let platform = Arc::new(DesktopPlatform::new(search_dirs));
    CollectionManager::start(storage, platform, settings.debounce(), settings.suggestion_limit)
}

/// Turn a front-end command into a request. Edit needs the current preset,
/// so it is built by the caller.
fn into_request(command: Command) -> Result<PresetRequest> {
    Ok(match command {
        Command::List => PresetRequest::ListPresets,
        Command::Show { preset } => PresetRequest::GetPreset(preset),
        Command::Status => PresetRequest::Status,
        Command::Switch { preset } => PresetRequest::Switch(preset),
        Command::New { name, description, apps, keep_previous, icon } => {
            let mut preset = Preset::new(
                name,
                description,
                apps.into_iter().map(AppEntry::new).collect(),
                !keep_previous,
            );
            preset.icon = icon;
            PresetRequest::AddPreset(preset)
        }
        Command::Delete { preset } => PresetRequest::DeletePreset(preset),
        Command::AddApp { preset, app, windows } => {
            let mut app = AppEntry::new(app);
            app.window_positions = windows;
            PresetRequest::AddApp { preset, app }
        }
        Command::RemoveApp { preset, app } => PresetRequest::RemoveApp { preset, app },
        Command::AddSite { preset, app, url, title } => PresetRequest::AddWebsite { preset, app, url, title },
        Command::RemoveSite { preset, app, url } => PresetRequest::RemoveWebsite { preset, app, url },
        Command::Search { query, all } => PresetRequest::Search { query, all },
        Command::Resolve { name } => PresetRequest::Resolve(name),
        Command::Flush => PresetRequest::Flush,
        Command::Serve
        | Command::Stop
        | Command::Watch
        | Command::Settings { .. }
        | Command::Edit { .. } => {
            bail!("command is not a daemon request")
        }
    })
}

/// Sends requests to the daemon when one is reachable, otherwise runs them
/// against an in-process manager. A local session that changed anything is
/// flushed by [`Session::close`].
struct Session {
    client: Option<PresetClient>,
    local: Option<(tokio::runtime::Runtime, CollectionManager)>,
    dirty: bool,
}

impl Session {
    fn open(cli_local: bool, socket: &std::path::Path, settings: &Settings, data_file: PathBuf) -> Result<Self> {
        if !cli_local {
            match PresetClient::connect_to(socket) {
                Ok(client) => {
                    debug!(socket = %socket.display(), "Using running daemon");
                    return Ok(Self { client: Some(client), local: None, dirty: false });
                }
                Err(e) => debug!(error = %e, "No daemon reachable, running locally"),
            }
        }
        let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
        let manager = {
            let _guard = runtime.enter();
            build_manager(settings, data_file)
        };
        Ok(Self { client: None, local: Some((runtime, manager)), dirty: false })
    }

    fn request(&mut self, request: PresetRequest) -> Result<PresetResponse> {
        if let Some(client) = self.client.as_mut() {
            return client.request(request);
        }
        self.dirty |= request.is_mutating();
        match &self.local {
            Some((runtime, manager)) => Ok(runtime.block_on(daemon::handle_request(manager, request))),
            None => bail!("session has neither a daemon connection nor a local manager"),
        }
    }

    /// Local edits must be written before exiting; the debounce timer won't get to
    fn close(self) -> Result<()> {
        if let (true, Some((runtime, manager))) = (self.dirty, self.local) {
            runtime.block_on(manager.flush_now()).context("Failed to save presets")?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings_path = Settings::path();
    init_logging(&Settings::startup_log_level(&settings_path))?;
    let settings = Settings::load_from(&settings_path);

    let data_file = cli
        .data_file
        .clone()
        .or_else(|| settings.data_file.clone())
        .unwrap_or_else(JsonFileStorage::default_path);
    let socket = match cli.socket.clone() {
        Some(path) => path,
        None => ipc::default_socket_path()?,
    };

    match cli.command {
        Command::Serve => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            let manager = {
                let _guard = runtime.enter();
                Arc::new(build_manager(&settings, data_file))
            };
            daemon::run(manager, runtime.handle().clone(), socket)
        }
        Command::Settings { write } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if write {
                settings.save_to(&settings_path)?;
                println!("Saved to {}", settings_path.display());
            }
            Ok(())
        }
        Command::Edit { preset, name, description, icon, close_previous } => {
            let mut session = Session::open(cli.local, &socket, &settings, data_file)?;
            let mut existing = match session.request(PresetRequest::GetPreset(preset))? {
                PresetResponse::Preset(p) => p,
                other => return print_response(other),
            };
            if let Some(name) = name {
                existing.name = name.trim().to_string();
            }
            if let Some(description) = description {
                existing.description = description;
            }
            if let Some(icon) = icon {
                existing.icon = Some(icon).filter(|i| !i.is_empty());
            }
            if let Some(close_previous) = close_previous {
                existing.close_previous = close_previous;
            }
            let response = session.request(PresetRequest::UpdatePreset(existing))?;
            session.close()?;
            print_response(response)
        }
        Command::Watch => {
            let mut client = PresetClient::connect_to(&socket).context("Watching needs a running daemon")?;
            match client.request(PresetRequest::Watch)? {
                PresetResponse::Ready => {}
                other => return print_response(other),
            }
            loop {
                print_response(client.recv_response()?)?;
            }
        }
        Command::Stop => match PresetClient::connect_to(&socket) {
            Ok(mut client) => print_response(client.request(PresetRequest::Shutdown)?),
            Err(_) => {
                warn!(socket = %socket.display(), "No daemon is running");
                Ok(())
            }
        },
        command => {
            let request = into_request(command)?;
            let mut session = Session::open(cli.local, &socket, &settings, data_file)?;
            let response = session.request(request)?;
            session.close()?;
            print_response(response)
        }
    }
}

fn print_response(response: PresetResponse) -> Result<()> {
    match response {
        PresetResponse::Pong | PresetResponse::Ready => println!("ok"),
        PresetResponse::Presets(presets) => {
            for preset in presets {
                println!("{}", summary_line(&preset));
            }
        }
        PresetResponse::Preset(preset) => print_preset(&preset),
        PresetResponse::Status { current, loading, preset_count } => {
            match current {
                Some(p) => println!("current: {} ({})", p.name, p.id),
                None => println!("current: none"),
            }
            println!("switching: {loading}");
            println!("presets: {preset_count}");
        }
        PresetResponse::Changed(changed) => println!("{}", if changed { "changed" } else { "unchanged" }),
        PresetResponse::Switched(report) => {
            if !report.closed.is_empty() {
                println!("closed: {}", report.closed.join(", "));
            }
            println!("launched: {}", report.launched.join(", "));
            if !report.is_complete() {
                for failure in &report.failures {
                    println!("failed: {failure}");
                }
            }
        }
        PresetResponse::Suggestions(names) => {
            for name in names {
                println!("{name}");
            }
        }
        PresetResponse::Resolved(resolved) => match resolved.target {
            LaunchTarget::Path(path) => println!("{} -> {}", resolved.canonical, path.display()),
            LaunchTarget::Identifier(id) => println!("{} -> {id}", resolved.canonical),
        },
        PresetResponse::Event(event) => print_event(&event),
        PresetResponse::Error(message) => bail!(message),
    }
    Ok(())
}

fn print_event(event: &CollectionEvent) {
    match event {
        CollectionEvent::PresetsChanged(presets) => println!("presets changed ({} total)", presets.len()),
        CollectionEvent::CurrentPresetChanged(Some(id)) => println!("current: {id}"),
        CollectionEvent::CurrentPresetChanged(None) => println!("current: none"),
        CollectionEvent::LoadingChanged(loading) => println!("switching: {loading}"),
        CollectionEvent::SwitchPhase(phase) => println!("phase: {phase:?}"),
    }
}

fn summary_line(preset: &Preset) -> String {
    let marker = if preset.is_valid() { " " } else { "!" };
    format!(
        "{marker} {}  {}  [{}]",
        preset.id,
        preset.name,
        preset.app_names().join(", ")
    )
}

fn print_preset(preset: &Preset) {
    println!("{} ({})", preset.name, preset.id);
    if !preset.description.is_empty() {
        println!("  {}", preset.description);
    }
    if let Some(icon) = &preset.icon {
        println!("  icon: {icon}");
    }
    println!("  close previous: {}", preset.close_previous);
    for app in &preset.apps {
        let kind = if app.is_browser() { " (browser)" } else { "" };
        println!("  - {}{kind}", app.name);
        for window in &app.window_positions {
            println!(
                "      window {}x{} at {},{} on screen {}",
                window.width, window.height, window.x, window.y, window.screen_index
            );
        }
        for site in &app.websites {
            println!("      {} <{}>", site.display_title(), site.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window() {
        assert_eq!(parse_window("10, 20, 800, 600").unwrap(), WindowPosition::new(10, 20, 800, 600, 0));
        assert_eq!(parse_window("-5,0,1,1,2").unwrap(), WindowPosition::new(-5, 0, 1, 1, 2));
        assert!(parse_window("1,2,3").is_err());
        assert!(parse_window("1,2,-3,4").is_err());
    }

    #[test]
    fn test_new_command_builds_preset() {
        let request = into_request(Command::New {
            name: " Focus ".into(),
            description: "deep work".into(),
            apps: vec!["Notes".into(), "chrome".into()],
            keep_previous: true,
            icon: None,
        })
        .unwrap();
        match request {
            PresetRequest::AddPreset(p) => {
                assert_eq!(p.name, "Focus");
                assert!(!p.close_previous);
                assert_eq!(p.app_names(), vec!["Notes", "chrome"]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["preset-handler", "--local", "add-app", "Work", "Safari", "--window", "0,0,800,600"]).unwrap();
        assert!(cli.local);
        assert!(matches!(cli.command, Command::AddApp { ref windows, .. } if windows.len() == 1));
    }

    fn local_session(storage: Arc<persistence::memory::MemoryStorage>) -> Session {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = {
            let _guard = runtime.enter();
            let platform = Arc::new(platform::fake::FakePlatform::with_installed(&["Notes"]));
            CollectionManager::start(storage, platform, std::time::Duration::from_secs(1), 5)
        };
        Session { client: None, local: Some((runtime, manager)), dirty: false }
    }

    #[test]
    fn test_local_reads_do_not_rewrite_presets() {
        let work = Preset::new("Work", "", vec![AppEntry::new("Notes")], true);
        let storage = Arc::new(persistence::memory::MemoryStorage::with(vec![work]));

        let mut session = local_session(storage.clone());
        session.request(PresetRequest::ListPresets).unwrap();
        session.request(PresetRequest::GetPreset("work".into())).unwrap();
        session.request(PresetRequest::Status).unwrap();
        session.close().unwrap();
        assert_eq!(storage.write_count(), 0);

        let mut session = local_session(storage.clone());
        let response = session.request(PresetRequest::DeletePreset("Work".into())).unwrap();
        assert_eq!(response, PresetResponse::Changed(true));
        session.close().unwrap();
        assert_eq!(storage.write_count(), 1);
        assert_eq!(storage.stored(), Some(vec![]));
    }
}
