//! Hot-reloadable configuration.
//!
//! Readers take an `Arc<ConfigSnapshot>` under a read lock and release the
//! lock immediately; a reload builds a complete new snapshot and swaps the
//! `Arc` under the write lock. A snapshot is never mutated after it is
//! published, so an evaluation that started against one snapshot finishes
//! against it even if a reload lands in the meantime.

use crate::config::Config;
use crate::error::{GardenError, Result};
use crate::shutdown::StopSignal;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Starts at 1 and increases with every applied reload
    pub version: u64,
    pub config: Config,
    pub document: serde_yaml::Value,
    source: String,
}

impl ConfigSnapshot {
    pub fn parse(source: String, version: u64) -> Result<Self> {
        let (config, document) = Config::parse(&source)?;
        Ok(Self {
            version,
            config,
            document,
            source,
        })
    }

    /// Nested lookup, e.g. `get(&["hardware", "relay", "type"])`.
    /// Numeric segments index into sequences.
    pub fn get(&self, path: &[&str]) -> Option<&serde_yaml::Value> {
        let mut node = &self.document;
        for key in path {
            node = match node {
                serde_yaml::Value::Sequence(items) => items.get(key.parse::<usize>().ok()?)?,
                other => other.get(*key)?,
            };
        }
        Some(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// File untouched, or touched with byte-identical content
    Unchanged,
    /// New snapshot published with this version
    Applied(u64),
    /// Read or parse failed; the previous snapshot stays active
    Failed,
}

/// Modification marker for the backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileMarker {
    modified: SystemTime,
    len: u64,
}

impl FileMarker {
    fn read(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }
}

pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<ConfigSnapshot>>,
    marker: Mutex<Option<FileMarker>>,
}

impl ConfigStore {
    /// Initial load. Any failure here is `ConfigUnavailable`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            return Err(GardenError::ConfigUnavailable(format!(
                "Config file not found at {:?}. Copy config/gardenops.yaml.example to get started.",
                path
            )));
        }

        let marker = FileMarker::read(&path).ok();
        let source = std::fs::read_to_string(&path).map_err(|e| {
            GardenError::ConfigUnavailable(format!("Failed to read {:?}: {}", path, e))
        })?;
        let snapshot = ConfigSnapshot::parse(source, 1)
            .map_err(|e| GardenError::ConfigUnavailable(e.to_string()))?;

        info!(
            path = %path.display(),
            zones = snapshot.config.zones.len(),
            simulation = snapshot.config.system.simulation_mode,
            "Configuration loaded"
        );

        Ok(Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
            marker: Mutex::new(marker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The snapshot currently in force
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    pub fn get(&self, path: &[&str]) -> Option<serde_yaml::Value> {
        self.snapshot().get(path).cloned()
    }

    /// Typed nested lookup, falling back to `default` when the key is missing
    /// or holds a value of the wrong shape.
    pub fn get_or<T: DeserializeOwned>(&self, path: &[&str], default: T) -> T {
        self.get(path)
            .and_then(|v| serde_yaml::from_value(v).ok())
            .unwrap_or(default)
    }

    /// Reload the snapshot when the backing file has changed.
    ///
    /// Never fails: errors keep the old snapshot and are logged.
    pub fn reload_if_changed(&self) -> ReloadOutcome {
        let marker = match FileMarker::read(&self.path) {
            Ok(m) => m,
            Err(e) => {
                let mut last = self.marker.lock().unwrap_or_else(PoisonError::into_inner);
                if last.take().is_some() {
                    warn!(path = %self.path.display(), error = %e, "Config file unreadable, keeping current configuration");
                }
                return ReloadOutcome::Failed;
            }
        };

        if *self.marker.lock().unwrap_or_else(PoisonError::into_inner) == Some(marker) {
            return ReloadOutcome::Unchanged;
        }

        // The marker is only recorded once the content was read, so a failed
        // read is retried on the next poll
        let source = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read config, keeping current configuration");
                return ReloadOutcome::Failed;
            }
        };
        *self.marker.lock().unwrap_or_else(PoisonError::into_inner) = Some(marker);

        let current = self.snapshot();
        if current.source == source {
            debug!("Config file touched without changes");
            return ReloadOutcome::Unchanged;
        }

        let next = match ConfigSnapshot::parse(source, current.version + 1) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Config reload failed, keeping current configuration");
                return ReloadOutcome::Failed;
            }
        };

        let version = next.version;
        let simulation = next.config.system.simulation_mode;
        let zones = next.config.zones.len();
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = Arc::new(next);
        }

        info!(version, zones, simulation, "Configuration reloaded");
        ReloadOutcome::Applied(version)
    }

    /// Poll the backing file every `interval` until `stop` fires
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration, mut stop: StopSignal) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            debug!(interval_secs = interval.as_secs_f64(), "Config watcher started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.reload_if_changed();
                    }
                    _ = stop.stopped() => break,
                }
            }
            debug!("Config watcher stopped");
        })
    }
}
