//! Collection manager: the single owner of preset state
//!
//! All mutations go through one async mutex, are applied in memory, then
//! schedule a debounced write. Observers subscribe to [`CollectionEvent`]s
//! instead of polling.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::default_catalog;
use crate::persistence::{PersistenceCoordinator, PresetStorage};
use crate::platform::AppPlatform;
use crate::resolver::{AppError, AppResolver, ResolvedApp};
use crate::store::PresetStore;
use crate::switcher::{SwitchOrchestrator, SwitchPhase, SwitchReport};
use crate::types::{AppEntry, Preset, ValidationError, Website};

const EVENT_CAPACITY: usize = 64;

/// Change notifications, also streamed to `Watch` clients over IPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollectionEvent {
    PresetsChanged(Vec<Preset>),
    CurrentPresetChanged(Option<Uuid>),
    LoadingChanged(bool),
    SwitchPhase(SwitchPhase),
}

#[derive(Debug, Error, PartialEq)]
pub enum ManagerError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("no preset with id {0}")]
    UnknownPreset(Uuid),
    #[error("preset {preset} has no app named '{app}'")]
    UnknownApp { preset: Uuid, app: String },
    #[error("a preset switch is already in progress")]
    SwitchInProgress,
}

pub struct CollectionManager {
    store: Mutex<PresetStore>,
    persistence: PersistenceCoordinator,
    resolver: Arc<AppResolver>,
    orchestrator: SwitchOrchestrator,
    switching: AtomicBool,
    events: broadcast::Sender<CollectionEvent>,
}

/// Clears the in-progress flag however the switch ends
struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
    events: &'a broadcast::Sender<CollectionEvent>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        let _ = self.events.send(CollectionEvent::LoadingChanged(false));
    }
}

impl CollectionManager {
    /// Load the collection, seeding (and immediately writing) the default
    /// catalog when storage has nothing usable.
    pub fn start(
        storage: Arc<dyn PresetStorage>,
        platform: Arc<dyn AppPlatform>,
        debounce: Duration,
        suggestion_limit: usize,
    ) -> Self {
        let presets = match storage.load() {
            Some(presets) => presets,
            None => {
                let seed = default_catalog();
                info!(count = seed.len(), "Seeding default presets");
                if let Err(e) = storage.save(&seed) {
                    warn!(error = ?e, "Failed to write default presets");
                }
                seed
            }
        };

        let resolver = Arc::new(AppResolver::new(platform.clone(), suggestion_limit));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: Mutex::new(PresetStore::new(presets)),
            persistence: PersistenceCoordinator::spawn(storage, debounce),
            orchestrator: SwitchOrchestrator::new(platform, resolver.clone()),
            resolver,
            switching: AtomicBool::new(false),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: CollectionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Called with the store still locked so writes are scheduled in mutation order
    fn after_mutation(&self, store: &PresetStore) {
        let snapshot = store.list();
        self.persistence.schedule(snapshot.clone());
        self.emit(CollectionEvent::PresetsChanged(snapshot));
    }

    pub async fn presets(&self) -> Vec<Preset> {
        self.store.lock().await.list()
    }

    pub async fn preset(&self, id: Uuid) -> Option<Preset> {
        self.store.lock().await.find(id).cloned()
    }

    /// Look up by id, or by name when `reference` isn't a uuid
    pub async fn find_preset(&self, reference: &str) -> Option<Preset> {
        let store = self.store.lock().await;
        match Uuid::parse_str(reference.trim()) {
            Ok(id) => store.find(id).cloned(),
            Err(_) => store.find_by_name(reference).cloned(),
        }
    }

    pub async fn current_preset(&self) -> Option<Preset> {
        self.store.lock().await.current().cloned()
    }

    pub async fn preset_count(&self) -> usize {
        self.store.lock().await.len()
    }

    pub fn is_loading(&self) -> bool {
        self.switching.load(Ordering::SeqCst)
    }

    pub async fn add_preset(&self, preset: Preset) -> Result<Uuid, ManagerError> {
        preset.validate()?;
        let id = preset.id;
        let mut store = self.store.lock().await;
        info!(name = %preset.name, %id, "Adding preset");
        store.add(preset);
        self.after_mutation(&store);
        Ok(id)
    }

    /// Replace a preset by id. Unknown ids are ignored (`Ok(false)`).
    pub async fn update_preset(&self, preset: Preset) -> Result<bool, ManagerError> {
        preset.validate()?;
        let mut store = self.store.lock().await;
        let id = preset.id;
        if !store.update(preset) {
            return Ok(false);
        }
        info!(%id, "Updated preset");
        self.after_mutation(&store);
        Ok(true)
    }

    /// Remove a preset; clears the current preset if it was the one removed
    pub async fn delete_preset(&self, id: Uuid) -> bool {
        let mut store = self.store.lock().await;
        let was_current = store.current_id() == Some(id);
        let Some(removed) = store.remove(id) else {
            return false;
        };
        info!(name = %removed.name, %id, "Deleted preset");
        self.after_mutation(&store);
        if was_current {
            self.emit(CollectionEvent::CurrentPresetChanged(None));
        }
        true
    }

    pub async fn add_app(&self, preset_id: Uuid, app: AppEntry) -> Result<(), ManagerError> {
        let mut store = self.store.lock().await;
        let preset = store
            .find_mut(preset_id)
            .ok_or(ManagerError::UnknownPreset(preset_id))?;
        if app.name.trim().is_empty() {
            return Err(ValidationError::EmptyAppName(preset.apps.len()).into());
        }
        info!(preset = %preset.name, app = %app.name, "Adding app");
        preset.apps.push(app);
        self.after_mutation(&store);
        Ok(())
    }

    /// Remove the first app with this name (case-insensitive)
    pub async fn remove_app(&self, preset_id: Uuid, app_name: &str) -> Result<bool, ManagerError> {
        let mut store = self.store.lock().await;
        let preset = store
            .find_mut(preset_id)
            .ok_or(ManagerError::UnknownPreset(preset_id))?;
        let Some(idx) = app_index(preset, app_name) else {
            return Ok(false);
        };
        let removed = preset.apps.remove(idx);
        info!(preset = %preset.name, app = %removed.name, "Removed app");
        self.after_mutation(&store);
        Ok(true)
    }

    /// Attach a website to an app. Duplicate URLs leave the preset unchanged (`Ok(false)`).
    pub async fn add_website(
        &self,
        preset_id: Uuid,
        app_name: &str,
        website: Website,
    ) -> Result<bool, ManagerError> {
        let mut store = self.store.lock().await;
        let app = app_mut(&mut store, preset_id, app_name)?;
        if !app.add_website(website) {
            return Ok(false);
        }
        self.after_mutation(&store);
        Ok(true)
    }

    pub async fn remove_website(
        &self,
        preset_id: Uuid,
        app_name: &str,
        url: &str,
    ) -> Result<bool, ManagerError> {
        let mut store = self.store.lock().await;
        let app = app_mut(&mut store, preset_id, app_name)?;
        if !app.remove_website(url) {
            return Ok(false);
        }
        self.after_mutation(&store);
        Ok(true)
    }

    /// Close the current preset's apps (if it asks for that) and launch the
    /// target's. Rejected while another switch runs. Always ends with the
    /// target as current, whatever individual apps did.
    pub async fn request_switch(&self, id: Uuid) -> Result<SwitchReport, ManagerError> {
        // Held before `current` is read
        if self
            .switching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(%id, "Switch requested while another is running");
            return Err(ManagerError::SwitchInProgress);
        }
        let _guard = LoadingGuard { flag: &self.switching, events: &self.events };
        self.emit(CollectionEvent::LoadingChanged(true));

        let (current, target) = {
            let store = self.store.lock().await;
            let target = store.find(id).cloned().ok_or(ManagerError::UnknownPreset(id))?;
            (store.current().cloned(), target)
        };

        let on_phase = |phase: SwitchPhase| self.emit(CollectionEvent::SwitchPhase(phase));
        let report = self.orchestrator.switch(current.as_ref(), &target, &on_phase).await;

        let now_current = {
            let mut store = self.store.lock().await;
            if !store.set_current(target.id) {
                warn!(target = %target.name, "Preset was deleted during the switch");
            }
            store.current_id()
        };
        self.emit(CollectionEvent::CurrentPresetChanged(now_current));
        Ok(report)
    }

    /// Write the collection right away (shutdown, sleep, power-off)
    pub async fn flush_now(&self) -> Result<()> {
        let snapshot = self.store.lock().await.list();
        self.persistence.flush_now(snapshot).await
    }

    pub fn resolve(&self, name: &str) -> Result<ResolvedApp, AppError> {
        self.resolver.resolve(name)
    }

    pub fn search(&self, query: &str) -> Vec<String> {
        self.resolver.search(query)
    }

    pub fn suggestions(&self, query: &str) -> Vec<String> {
        self.resolver.suggestions(query)
    }
}

fn app_index(preset: &Preset, app_name: &str) -> Option<usize> {
    let app_name = app_name.trim();
    preset.apps.iter().position(|a| a.name.eq_ignore_ascii_case(app_name))
}

fn app_mut<'a>(
    store: &'a mut PresetStore,
    preset_id: Uuid,
    app_name: &str,
) -> Result<&'a mut AppEntry, ManagerError> {
    let preset = store
        .find_mut(preset_id)
        .ok_or(ManagerError::UnknownPreset(preset_id))?;
    let idx = app_index(preset, app_name).ok_or_else(|| ManagerError::UnknownApp {
        preset: preset_id,
        app: app_name.to_string(),
    })?;
    Ok(&mut preset.apps[idx])
}
