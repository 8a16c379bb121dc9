//! Long-running preset daemon
//!
//! Owns the [`CollectionManager`], serves IPC clients (one thread per
//! connection) and flushes presets before the process goes away.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::ipc::{PresetClient, PresetRequest, PresetResponse, PresetServer};
use crate::manager::CollectionManager;
use crate::types::{Preset, Website};

/// Apply one request to the manager. Shared by the daemon and the CLI's
/// in-process fallback, so both behave identically.
pub async fn handle_request(manager: &CollectionManager, request: PresetRequest) -> PresetResponse {
    match request {
        PresetRequest::Ping => PresetResponse::Pong,
        PresetRequest::ListPresets => PresetResponse::Presets(manager.presets().await),
        PresetRequest::GetPreset(reference) => with_preset(manager, &reference, |p| async move {
            PresetResponse::Preset(p)
        })
        .await,
        PresetRequest::Status => PresetResponse::Status {
            current: manager.current_preset().await,
            loading: manager.is_loading(),
            preset_count: manager.preset_count().await,
        },
        PresetRequest::AddPreset(preset) => match manager.add_preset(preset).await {
            Ok(id) => match manager.preset(id).await {
                Some(p) => PresetResponse::Preset(p),
                None => PresetResponse::Ready,
            },
            Err(e) => PresetResponse::Error(e.to_string()),
        },
        PresetRequest::UpdatePreset(preset) => changed(manager.update_preset(preset).await),
        PresetRequest::DeletePreset(reference) => with_preset(manager, &reference, |p| async move {
            PresetResponse::Changed(manager.delete_preset(p.id).await)
        })
        .await,
        PresetRequest::AddApp { preset, app } => with_preset(manager, &preset, |p| async move {
            match manager.add_app(p.id, app).await {
                Ok(()) => PresetResponse::Changed(true),
                Err(e) => PresetResponse::Error(e.to_string()),
            }
        })
        .await,
        PresetRequest::RemoveApp { preset, app } => with_preset(manager, &preset, |p| async move {
            changed(manager.remove_app(p.id, &app).await)
        })
        .await,
        PresetRequest::AddWebsite { preset, app, url, title } => {
            let website = match Website::new(&url, title) {
                Ok(w) => w,
                Err(e) => return PresetResponse::Error(e.to_string()),
            };
            with_preset(manager, &preset, |p| async move {
                changed(manager.add_website(p.id, &app, website).await)
            })
            .await
        }
        PresetRequest::RemoveWebsite { preset, app, url } => with_preset(manager, &preset, |p| async move {
            changed(manager.remove_website(p.id, &app, &url).await)
        })
        .await,
        PresetRequest::Switch(reference) => with_preset(manager, &reference, |p| async move {
            match manager.request_switch(p.id).await {
                Ok(report) => PresetResponse::Switched(report),
                Err(e) => PresetResponse::Error(e.to_string()),
            }
        })
        .await,
        PresetRequest::Search { query, all } => PresetResponse::Suggestions(if all {
            manager.search(&query)
        } else {
            manager.suggestions(&query)
        }),
        PresetRequest::Resolve(name) => match manager.resolve(&name) {
            Ok(resolved) => PresetResponse::Resolved(resolved),
            Err(e) => PresetResponse::Error(e.to_string()),
        },
        // Streaming is handled per connection by the daemon
        PresetRequest::Watch => PresetResponse::Error("watching needs a running daemon".to_string()),
        PresetRequest::Flush | PresetRequest::Shutdown => match manager.flush_now().await {
            Ok(()) => PresetResponse::Ready,
            Err(e) => PresetResponse::Error(format!("{e:#}")),
        },
    }
}

async fn with_preset<F, Fut>(manager: &CollectionManager, reference: &str, f: F) -> PresetResponse
where
    F: FnOnce(Preset) -> Fut,
    Fut: std::future::Future<Output = PresetResponse>,
{
    match manager.find_preset(reference).await {
        Some(preset) => f(preset).await,
        None => PresetResponse::Error(format!("no preset matches '{reference}'")),
    }
}

fn changed<E: std::fmt::Display>(result: Result<bool, E>) -> PresetResponse {
    match result {
        Ok(changed) => PresetResponse::Changed(changed),
        Err(e) => PresetResponse::Error(e.to_string()),
    }
}

/// Serve clients until a shutdown request or termination signal.
/// Never returns normally; the process exits after the final flush.
pub fn run(manager: Arc<CollectionManager>, handle: Handle, socket_path: PathBuf) -> Result<()> {
    let server = PresetServer::bind_to(socket_path)?;
    info!(socket = %server.path().display(), "Daemon listening");

    spawn_signal_listener(manager.clone(), handle.clone(), server.path().to_path_buf())?;

    loop {
        let client = match server.accept() {
            Ok(client) => client,
            Err(e) => {
                error!(error = ?e, "Accept failed");
                continue;
            }
        };
        let manager = manager.clone();
        let handle = handle.clone();
        let socket_path = server.path().to_path_buf();
        std::thread::spawn(move || serve_client(client, &manager, &handle, &socket_path));
    }
}

fn serve_client(mut client: PresetClient, manager: &CollectionManager, handle: &Handle, socket_path: &Path) {
    debug!("Client connected");
    loop {
        let request = match client.recv_request() {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Client disconnected");
                return;
            }
        };
        debug!(request = ?request, "Received request");

        if matches!(request, PresetRequest::Watch) {
            stream_events(client, manager, handle);
            return;
        }

        let shutting_down = matches!(request, PresetRequest::Shutdown);
        let response = handle.block_on(handle_request(manager, request));
        if let Err(e) = client.send_response(&response) {
            warn!(error = ?e, "Failed to send response");
            if !shutting_down {
                return;
            }
        }
        if shutting_down {
            // handle_request already flushed
            info!("Shutdown requested by client");
            exit_after_cleanup(socket_path);
        }
    }
}

/// Forward collection events to a watching client until it goes away
fn stream_events(mut client: PresetClient, manager: &CollectionManager, handle: &Handle) {
    let mut events = manager.subscribe();
    if client.send_response(&PresetResponse::Ready).is_err() {
        return;
    }
    info!("Client watching events");
    loop {
        match handle.block_on(events.recv()) {
            Ok(event) => {
                if let Err(e) = client.send_response(&PresetResponse::Event(event)) {
                    debug!(error = %e, "Watcher disconnected");
                    return;
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Watcher fell behind, events dropped"),
            Err(RecvError::Closed) => return,
        }
    }
}

fn spawn_signal_listener(manager: Arc<CollectionManager>, handle: Handle, socket_path: PathBuf) -> Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP]).context("Failed to register signal handlers")?;
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "Termination signal received, flushing presets");
            if let Err(e) = handle.block_on(manager.flush_now()) {
                error!(error = ?e, "Final flush failed");
            }
            exit_after_cleanup(&socket_path);
        }
    });
    Ok(())
}

fn exit_after_cleanup(socket_path: &Path) -> ! {
    let _ = std::fs::remove_file(socket_path);
    info!("Daemon stopped");
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::CollectionEvent;
    use crate::persistence::memory::MemoryStorage;
    use crate::platform::fake::FakePlatform;
    use crate::types::AppEntry;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager(presets: Vec<Preset>) -> (CollectionManager, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::with(presets));
        let platform = Arc::new(FakePlatform::with_installed(&["Safari", "Notes", "Slack"]));
        (
            CollectionManager::start(storage.clone(), platform, Duration::from_secs(1), 2),
            storage,
        )
    }

    fn work() -> Preset {
        Preset::new("Work", "", vec![AppEntry::new("Safari"), AppEntry::new("Notes")], true)
    }

    #[tokio::test]
    async fn test_switch_by_name() {
        let work = work();
        let (m, _) = manager(vec![work.clone()]);

        match handle_request(&m, PresetRequest::Switch("work".into())).await {
            PresetResponse::Switched(report) => {
                assert_eq!(report.target, work.id);
                assert_eq!(report.launched, vec!["Safari", "Notes"]);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        match handle_request(&m, PresetRequest::Status).await {
            PresetResponse::Status { current, loading, preset_count } => {
                assert_eq!(current.map(|p| p.id), Some(work.id));
                assert!(!loading);
                assert_eq!(preset_count, 1);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let (m, _) = manager(vec![]);
        assert!(matches!(
            handle_request(&m, PresetRequest::DeletePreset("nope".into())).await,
            PresetResponse::Error(_)
        ));
    }

    #[tokio::test]
    async fn test_add_website_validates_url() {
        let (m, _) = manager(vec![work()]);
        let bad = PresetRequest::AddWebsite {
            preset: "Work".into(),
            app: "Safari".into(),
            url: "not a url".into(),
            title: None,
        };
        assert!(matches!(handle_request(&m, bad).await, PresetResponse::Error(_)));

        let good = PresetRequest::AddWebsite {
            preset: "Work".into(),
            app: "Safari".into(),
            url: "https://news.ycombinator.com".into(),
            title: None,
        };
        assert_eq!(handle_request(&m, good.clone()).await, PresetResponse::Changed(true));
        assert_eq!(handle_request(&m, good).await, PresetResponse::Changed(false));
    }

    #[tokio::test]
    async fn test_search_respects_cap() {
        let (m, _) = manager(vec![]);
        let capped = PresetRequest::Search { query: "s".into(), all: false };
        let all = PresetRequest::Search { query: "s".into(), all: true };
        assert_eq!(
            handle_request(&m, capped).await,
            PresetResponse::Suggestions(vec!["Notes".into(), "Safari".into()])
        );
        assert_eq!(
            handle_request(&m, all).await,
            PresetResponse::Suggestions(vec!["Notes".into(), "Safari".into(), "Slack".into()])
        );
    }

    #[test]
    fn test_watch_streams_events() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let m = {
            let _guard = runtime.enter();
            Arc::new(manager(vec![]).0)
        };
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daemon.sock");
        let server = PresetServer::bind_to(path.clone()).unwrap();

        let served = m.clone();
        let handle = runtime.handle().clone();
        let socket_path = path.clone();
        std::thread::spawn(move || {
            let conn = server.accept().unwrap();
            serve_client(conn, &served, &handle, &socket_path);
        });

        let mut client = PresetClient::connect_to(&path).unwrap();
        assert_eq!(client.request(PresetRequest::Watch).unwrap(), PresetResponse::Ready);

        let focus = Preset::new("Focus", "", vec![AppEntry::new("Notes")], false);
        let id = runtime.block_on(m.add_preset(focus)).unwrap();
        match client.recv_response().unwrap() {
            PresetResponse::Event(CollectionEvent::PresetsChanged(presets)) => {
                assert_eq!(presets.len(), 1);
                assert_eq!(presets[0].id, id);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        runtime.block_on(m.request_switch(id)).unwrap();
        let events: Vec<PresetResponse> = (0..5).map(|_| client.recv_response().unwrap()).collect();
        assert_eq!(events.first(), Some(&PresetResponse::Event(CollectionEvent::LoadingChanged(true))));
        assert!(events.contains(&PresetResponse::Event(CollectionEvent::CurrentPresetChanged(Some(id)))));
        assert_eq!(events.last(), Some(&PresetResponse::Event(CollectionEvent::LoadingChanged(false))));
    }

    #[tokio::test]
    async fn test_watch_needs_daemon() {
        let (m, _) = manager(vec![]);
        assert!(matches!(handle_request(&m, PresetRequest::Watch).await, PresetResponse::Error(_)));
    }

    #[tokio::test]
    async fn test_flush_writes() {
        let (m, storage) = manager(vec![work()]);
        assert_eq!(handle_request(&m, PresetRequest::Flush).await, PresetResponse::Ready);
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_add_and_remove_app() {
        let (m, _) = manager(vec![work()]);
        let add = PresetRequest::AddApp { preset: "Work".into(), app: AppEntry::new("Slack") };
        assert_eq!(handle_request(&m, add).await, PresetResponse::Changed(true));

        let remove = PresetRequest::RemoveApp { preset: "Work".into(), app: "slack".into() };
        assert_eq!(handle_request(&m, remove).await, PresetResponse::Changed(true));
    }
}
