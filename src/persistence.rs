use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::constants::paths;
use crate::types::Preset;

/// Durable home of the preset collection
pub trait PresetStorage: Send + Sync {
    /// Stored collection, or None when missing or unreadable
    fn load(&self) -> Option<Vec<Preset>>;

    /// Replace the stored collection
    fn save(&self, presets: &[Preset]) -> Result<()>;
}

/// `presets.json` written via temp file + rename
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<data dir>/preset-handler/presets.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::PRESETS_FILE);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(paths::TEMP_SUFFIX);
        self.path.with_file_name(name)
    }
}

impl PresetStorage for JsonFileStorage {
    fn load(&self) -> Option<Vec<Preset>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                info!(path = %self.path.display(), error = %e, "No readable preset file");
                return None;
            }
        };
        match serde_json::from_str::<Vec<Preset>>(&contents) {
            Ok(presets) => {
                info!(path = %self.path.display(), count = presets.len(), "Loaded presets");
                Some(presets)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Preset file is corrupt, ignoring it");
                None
            }
        }
    }

    fn save(&self, presets: &[Preset]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(presets).context("Failed to serialize presets")?;
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("Failed to create {:?}", tmp))?;
            file.write_all(json.as_bytes())
                .with_context(|| format!("Failed to write {:?}", tmp))?;
            file.sync_all()
                .with_context(|| format!("Failed to sync {:?}", tmp))?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move {:?} into place at {:?}", tmp, self.path))?;

        debug!(path = %self.path.display(), count = presets.len(), "Saved presets");
        Ok(())
    }
}

enum PersistCommand {
    Schedule(Vec<Preset>),
    Flush(Vec<Preset>, oneshot::Sender<Result<()>>),
}

/// Coalesces bursts of mutations into one write.
///
/// Each [`schedule`](Self::schedule) restarts the quiet-period timer; the
/// latest snapshot is written when it expires. [`flush_now`](Self::flush_now)
/// writes immediately and drops whatever was pending.
pub struct PersistenceCoordinator {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistenceCoordinator {
    /// Spawn the writer task on the current tokio runtime
    pub fn spawn(storage: Arc<dyn PresetStorage>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(storage, debounce, rx));
        Self { tx }
    }

    pub fn schedule(&self, presets: Vec<Preset>) {
        if self.tx.send(PersistCommand::Schedule(presets)).is_err() {
            error!("Persistence task is gone, dropping scheduled write");
        }
    }

    pub async fn flush_now(&self, presets: Vec<Preset>) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(PersistCommand::Flush(presets, ack_tx))
            .map_err(|_| anyhow::anyhow!("Persistence task is not running"))?;
        ack_rx.await.context("Persistence task dropped the flush request")?
    }
}

async fn run_writer(
    storage: Arc<dyn PresetStorage>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    let mut pending: Option<Vec<Preset>> = None;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(PersistCommand::Schedule(presets)) => {
                    pending = Some(presets);
                    deadline = Instant::now() + debounce;
                }
                Some(PersistCommand::Flush(presets, ack)) => {
                    pending = None;
                    let result = storage.save(&presets);
                    if let Err(e) = &result {
                        warn!(error = %e, "Immediate preset flush failed");
                    }
                    let _ = ack.send(result);
                }
                None => {
                    if let Some(presets) = pending.take() {
                        write_logged(storage.as_ref(), &presets);
                    }
                    break;
                }
            },
            _ = sleep_until(deadline), if pending.is_some() => {
                if let Some(presets) = pending.take() {
                    write_logged(storage.as_ref(), &presets);
                }
            }
        }
    }
    debug!("Persistence task stopped");
}

/// Write failures are not retried here; the next mutation schedules another write
fn write_logged(storage: &dyn PresetStorage, presets: &[Preset]) {
    if let Err(e) = storage.save(presets) {
        warn!(error = ?e, "Failed to persist presets");
    }
}

#[cfg(test)]
pub mod memory {
    //! Write-counting storage for tests

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStorage {
        pub stored: Mutex<Option<Vec<Preset>>>,
        pub writes: Mutex<usize>,
    }

    impl MemoryStorage {
        pub fn with(presets: Vec<Preset>) -> Self {
            Self { stored: Mutex::new(Some(presets)), writes: Mutex::new(0) }
        }

        pub fn write_count(&self) -> usize {
            *self.writes.lock().unwrap()
        }

        pub fn stored(&self) -> Option<Vec<Preset>> {
            self.stored.lock().unwrap().clone()
        }
    }

    impl PresetStorage for MemoryStorage {
        fn load(&self) -> Option<Vec<Preset>> {
            self.stored()
        }

        fn save(&self, presets: &[Preset]) -> Result<()> {
            *self.stored.lock().unwrap() = Some(presets.to_vec());
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStorage;
    use super::*;
    use crate::config::catalog::default_catalog;
    use crate::types::AppEntry;
    use tempfile::TempDir;

    fn named(name: &str) -> Preset {
        Preset::new(name, "", vec![AppEntry::new("Terminal")], true)
    }

    #[test]
    fn test_round_trip_default_catalog() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("presets.json"));
        let catalog = default_catalog();

        storage.save(&catalog).unwrap();
        assert_eq!(storage.load(), Some(catalog));
        assert!(!storage.temp_path().exists());
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested/presets.json"));
        assert_eq!(storage.load(), None);
    }

    #[test]
    fn test_corrupt_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("presets.json");
        fs::write(&path, "{ not json ]").unwrap();
        assert_eq!(JsonFileStorage::new(path).load(), None);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("a/b/presets.json"));
        storage.save(&[named("Work")]).unwrap();
        assert_eq!(storage.load().map(|p| p.len()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_schedules_coalesce_into_one_write() {
        let storage = Arc::new(MemoryStorage::default());
        let coordinator = PersistenceCoordinator::spawn(storage.clone(), Duration::from_secs(1));

        let mut presets = Vec::new();
        for i in 0..10 {
            presets.push(named(&format!("P{i}")));
            coordinator.schedule(presets.clone());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(storage.write_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(storage.write_count(), 1);
        assert_eq!(storage.stored(), Some(presets));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_write_separately() {
        let storage = Arc::new(MemoryStorage::default());
        let coordinator = PersistenceCoordinator::spawn(storage.clone(), Duration::from_secs(1));

        coordinator.schedule(vec![named("A")]);
        tokio::time::sleep(Duration::from_secs(2)).await;
        coordinator.schedule(vec![named("B")]);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(storage.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now_bypasses_timer() {
        let storage = Arc::new(MemoryStorage::default());
        let coordinator = PersistenceCoordinator::spawn(storage.clone(), Duration::from_secs(1));

        coordinator.schedule(vec![named("Stale")]);
        let fresh = vec![named("Fresh")];
        coordinator.flush_now(fresh.clone()).await.unwrap();
        assert_eq!(storage.write_count(), 1);

        // the pending write was superseded by the flush
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(storage.write_count(), 1);
        assert_eq!(storage.stored(), Some(fresh));
    }
}
