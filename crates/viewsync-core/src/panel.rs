#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use viewsync_model::{DatasetName, PanelId};

use crate::coordinator::RefreshCoordinator;
use crate::error::{Result, SyncError};
use crate::format::{FormatPolicy, FormattedTable};
use crate::registry::{ViewHandle, ViewNotifier};

/// Lifecycle of one panel binding, derived from the bound dataset's cache
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Bound, but no load has succeeded yet.
    NotLoaded,
    Loaded,
    /// Loaded data is still served, but the most recent reload failed.
    Stale,
}

struct PanelBinding {
    dataset: DatasetName,
    handle: ViewHandle,
    format: Option<FormatPolicy>,
}

/// Binds a named dataset to exactly one presentation context.
///
/// A binding owns its handle's subscription lifecycle and nothing more:
/// unbinding leaves the dataset's cache entry intact for other contexts
/// or future bindings.
pub struct PanelManager {
    coordinator: Arc<RefreshCoordinator>,
    bindings: Mutex<BTreeMap<PanelId, PanelBinding>>,
}

impl PanelManager {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            coordinator,
            bindings: Mutex::new(BTreeMap::new()),
        }
    }

    /// Creates the binding, subscribes its view handle, and guarantees
    /// the dataset has data before first display.
    ///
    /// A failed first load leaves the binding in place (state
    /// [`BindingState::NotLoaded`]) and returns the error. A panel that
    /// was unbound may bind again; that is a new binding.
    pub fn bind(
        &self,
        panel: PanelId,
        dataset: &DatasetName,
        notifier: Arc<dyn ViewNotifier>,
        format: Option<FormatPolicy>,
    ) -> Result<()> {
        if !self.coordinator.cache().contains(dataset) {
            return Err(SyncError::UnknownDataset(dataset.clone()));
        }
        {
            let mut bindings = lock(&self.bindings);
            if bindings.contains_key(&panel) {
                return Err(SyncError::PanelAlreadyBound(panel));
            }
            let handle = ViewHandle::new(dataset.clone(), notifier);
            self.coordinator.registry().subscribe(&handle);
            debug!(panel = %panel, dataset = %dataset, "panel bound");
            bindings.insert(
                panel,
                PanelBinding {
                    dataset: dataset.clone(),
                    handle,
                    format,
                },
            );
        }
        self.coordinator.cache().ensure_loaded(dataset)
    }

    /// Re-runs the first-display guarantee; used when a hidden panel
    /// becomes visible again. Safe to call repeatedly.
    pub fn ensure_loaded(&self, panel: &PanelId) -> Result<()> {
        let dataset = self.binding_dataset(panel)?;
        self.coordinator.cache().ensure_loaded(&dataset)
    }

    /// Refreshes the bound dataset through the coordinator (which
    /// notifies every subscriber, this panel's handle included), then
    /// re-applies the panel's formatting policy to the fresh snapshot.
    ///
    /// On a failed reload the views were still notified; the error is
    /// returned and the panel keeps serving its stale table.
    pub fn refresh(&self, panel: &PanelId) -> Result<FormattedTable> {
        let (dataset, format) = self.binding_parts(panel)?;
        self.coordinator.refresh_dataset(&dataset)?;
        Ok(self.render(&dataset, format.as_ref()))
    }

    /// The panel's current table under its formatting policy, without
    /// touching the backing store.
    pub fn formatted(&self, panel: &PanelId) -> Result<FormattedTable> {
        let (dataset, format) = self.binding_parts(panel)?;
        Ok(self.render(&dataset, format.as_ref()))
    }

    pub fn state(&self, panel: &PanelId) -> Option<BindingState> {
        let dataset = self.bound_dataset(panel)?;
        let status = self.coordinator.cache().status(&dataset)?;
        Some(if !status.loaded {
            BindingState::NotLoaded
        } else if status.stale {
            BindingState::Stale
        } else {
            BindingState::Loaded
        })
    }

    /// Discards the binding and unsubscribes its handle. Unbinding an
    /// unknown panel is a no-op.
    pub fn unbind(&self, panel: &PanelId) {
        let removed = lock(&self.bindings).remove(panel);
        match removed {
            Some(binding) => {
                self.coordinator.registry().unsubscribe(&binding.handle);
                debug!(panel = %panel, dataset = %binding.dataset, "panel unbound");
            }
            None => debug!(panel = %panel, "unbind for unknown panel ignored"),
        }
    }

    pub fn bound_dataset(&self, panel: &PanelId) -> Option<DatasetName> {
        lock(&self.bindings)
            .get(panel)
            .map(|binding| binding.dataset.clone())
    }

    fn binding_dataset(&self, panel: &PanelId) -> Result<DatasetName> {
        self.bound_dataset(panel)
            .ok_or_else(|| SyncError::UnknownPanel(panel.clone()))
    }

    fn binding_parts(&self, panel: &PanelId) -> Result<(DatasetName, Option<FormatPolicy>)> {
        let bindings = lock(&self.bindings);
        let binding = bindings
            .get(panel)
            .ok_or_else(|| SyncError::UnknownPanel(panel.clone()))?;
        Ok((binding.dataset.clone(), binding.format.clone()))
    }

    fn render(&self, dataset: &DatasetName, format: Option<&FormatPolicy>) -> FormattedTable {
        let table = self.coordinator.cache().get(dataset);
        match format {
            Some(policy) => policy.apply(&table),
            None => FormatPolicy::default().apply(&table),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
