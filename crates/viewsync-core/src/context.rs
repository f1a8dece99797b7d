#![deny(unsafe_code)]

use std::sync::Arc;

use viewsync_model::TableSource;

use crate::cache::DatasetCache;
use crate::config::SyncConfig;
use crate::coordinator::RefreshCoordinator;
use crate::error::Result;
use crate::loader::DatasetLoader;
use crate::panel::PanelManager;
use crate::registry::ViewRegistry;

/// Wires one cache, registry, coordinator, and panel manager over a
/// backing store.
///
/// Everything is an explicit instance with this context's lifetime;
/// callers that want a process-wide singleton hold one `SyncContext`,
/// tests construct an isolated one per case.
pub struct SyncContext {
    cache: Arc<DatasetCache>,
    registry: Arc<ViewRegistry>,
    coordinator: Arc<RefreshCoordinator>,
    panels: PanelManager,
}

impl SyncContext {
    pub fn from_config(config: &SyncConfig, source: Arc<dyn TableSource>) -> Result<Self> {
        let cache = Arc::new(DatasetCache::new(DatasetLoader::new(source)));
        for spec in &config.datasets {
            cache.register(spec.clone())?;
        }
        let registry = Arc::new(ViewRegistry::new());
        let coordinator = Arc::new(RefreshCoordinator::new(
            cache.clone(),
            registry.clone(),
            config.relations.clone(),
        ));
        let panels = PanelManager::new(coordinator.clone());
        Ok(Self {
            cache,
            registry,
            coordinator,
            panels,
        })
    }

    pub fn cache(&self) -> &Arc<DatasetCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ViewRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn panels(&self) -> &PanelManager {
        &self.panels
    }
}
