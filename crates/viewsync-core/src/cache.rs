#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use viewsync_model::{DatasetName, DatasetSpec, Table};

use crate::error::{Result, SyncError};
use crate::loader::DatasetLoader;

/// Status of one cached dataset, exposed alongside the table itself so
/// readers can detect staleness without the original reload's return value.
#[derive(Debug, Clone)]
pub struct DatasetStatus {
    /// True once at least one load has succeeded.
    pub loaded: bool,
    /// True when the most recent reload attempt failed while an older
    /// table is still being served.
    pub stale: bool,
    pub last_error: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
    /// Bumped once per completed reload attempt, success or failure.
    pub generation: u64,
}

struct TableState {
    table: Arc<Table>,
    loaded: bool,
    loaded_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

struct DatasetEntry {
    spec: DatasetSpec,
    state: RwLock<TableState>,
    /// Serializes reloads for this dataset; see [`DatasetCache::reload`].
    reload_lock: Mutex<()>,
    generation: AtomicU64,
}

/// Holds the most recently loaded table per dataset name.
///
/// A reload is all-or-nothing: on success the new table is swapped in
/// atomically, on failure the previous table stays visible and the error
/// is recorded. Readers always observe either the prior or the new
/// complete table, never a half-built one.
pub struct DatasetCache {
    loader: DatasetLoader,
    entries: RwLock<BTreeMap<DatasetName, Arc<DatasetEntry>>>,
}

impl DatasetCache {
    pub fn new(loader: DatasetLoader) -> Self {
        Self {
            loader,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a dataset. Each name is registered exactly once; the
    /// entry then lives for the cache's lifetime.
    pub fn register(&self, spec: DatasetSpec) -> Result<()> {
        let mut entries = write(&self.entries);
        if entries.contains_key(&spec.name) {
            return Err(SyncError::DuplicateDataset(spec.name.clone()));
        }
        let empty = Arc::new(Table::empty(spec.columns.clone()));
        let name = spec.name.clone();
        entries.insert(
            name.clone(),
            Arc::new(DatasetEntry {
                spec,
                state: RwLock::new(TableState {
                    table: empty,
                    loaded: false,
                    loaded_at: None,
                    last_error: None,
                }),
                reload_lock: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        );
        debug!(dataset = %name, "dataset registered");
        Ok(())
    }

    pub fn contains(&self, name: &DatasetName) -> bool {
        read(&self.entries).contains_key(name)
    }

    /// Registered dataset names, in sorted order.
    pub fn dataset_names(&self) -> Vec<DatasetName> {
        read(&self.entries).keys().cloned().collect()
    }

    /// The last successfully loaded table, or an empty table if the
    /// dataset has never loaded. Unknown names yield an empty zero-column
    /// table and a warning rather than an error.
    pub fn get(&self, name: &DatasetName) -> Arc<Table> {
        match self.entry(name) {
            Some(entry) => read(&entry.state).table.clone(),
            None => {
                warn!(dataset = %name, "read of unregistered dataset; returning empty table");
                Arc::new(Table::empty(Vec::new()))
            }
        }
    }

    pub fn status(&self, name: &DatasetName) -> Option<DatasetStatus> {
        let entry = self.entry(name)?;
        let state = read(&entry.state);
        Some(DatasetStatus {
            loaded: state.loaded,
            stale: state.last_error.is_some(),
            last_error: state.last_error.clone(),
            loaded_at: state.loaded_at,
            generation: entry.generation.load(Ordering::Acquire),
        })
    }

    pub fn is_loaded(&self, name: &DatasetName) -> bool {
        self.entry(name)
            .is_some_and(|entry| read(&entry.state).loaded)
    }

    /// Reloads the dataset from the backing store.
    ///
    /// At most one reload runs per dataset at a time. A caller that
    /// arrives while a reload is in flight waits on the per-entry lock
    /// and is folded into the reload that completed in the meantime: it
    /// returns that reload's outcome without fetching again.
    pub fn reload(&self, name: &DatasetName) -> Result<()> {
        let entry = self
            .entry(name)
            .ok_or_else(|| SyncError::UnknownDataset(name.clone()))?;

        let seen = entry.generation.load(Ordering::Acquire);
        let _guard = lock(&entry.reload_lock);
        if entry.generation.load(Ordering::Acquire) != seen {
            let state = read(&entry.state);
            debug!(dataset = %name, "folded into a reload that completed while waiting");
            return match &state.last_error {
                None => Ok(()),
                Some(message) => Err(SyncError::LoadFailed {
                    dataset: name.clone(),
                    message: message.clone(),
                }),
            };
        }

        // The fetch runs outside the state lock so readers stay on the
        // previous table until the swap below.
        let outcome = self.loader.load(&entry.spec);
        let mut state = write(&entry.state);
        let result = match outcome {
            Ok(table) => {
                state.table = Arc::new(table);
                state.loaded = true;
                state.loaded_at = Some(Utc::now());
                state.last_error = None;
                Ok(())
            }
            Err(error) => {
                warn!(dataset = %name, %error, "reload failed; previous table retained");
                state.last_error = Some(error.to_string());
                Err(error)
            }
        };
        entry.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// Loads the dataset if it has never successfully loaded; otherwise a
    /// no-op. Safe to call repeatedly.
    pub fn ensure_loaded(&self, name: &DatasetName) -> Result<()> {
        let entry = self
            .entry(name)
            .ok_or_else(|| SyncError::UnknownDataset(name.clone()))?;
        if read(&entry.state).loaded {
            return Ok(());
        }
        self.reload(name)
    }

    fn entry(&self, name: &DatasetName) -> Option<Arc<DatasetEntry>> {
        read(&self.entries).get(name).cloned()
    }
}

// A poisoned lock means a panic elsewhere mid-update; the stored state is
// still the last consistent one, so keep serving it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
