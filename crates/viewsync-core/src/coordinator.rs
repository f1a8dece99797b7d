#![deny(unsafe_code)]

use std::sync::Arc;

use tracing::{debug, warn};
use viewsync_model::{DatasetName, EntityKind};

use crate::cache::DatasetCache;
use crate::error::{Result, SyncError};
use crate::registry::ViewRegistry;
use crate::relations::RelationMap;

/// Summary of one fan-out refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    /// Datasets whose reload succeeded.
    pub refreshed: Vec<DatasetName>,
    /// Datasets whose reload failed, with the error message. Their views
    /// were still notified and are serving stale data.
    pub failures: Vec<(DatasetName, String)>,
}

impl RefreshOutcome {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Executes refresh operations and notifies subscribed views.
///
/// Refresh is pull-based by contract: the backing store emits no change
/// feed, so every write path calls [`Self::refresh_dataset`] or
/// [`Self::refresh_related`] after a successful mutation.
pub struct RefreshCoordinator {
    cache: Arc<DatasetCache>,
    registry: Arc<ViewRegistry>,
    relations: RelationMap,
}

impl RefreshCoordinator {
    pub fn new(
        cache: Arc<DatasetCache>,
        registry: Arc<ViewRegistry>,
        relations: RelationMap,
    ) -> Self {
        Self {
            cache,
            registry,
            relations,
        }
    }

    pub fn cache(&self) -> &Arc<DatasetCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ViewRegistry> {
        &self.registry
    }

    pub fn relations(&self) -> &RelationMap {
        &self.relations
    }

    /// Reloads one dataset, then notifies every subscribed view handle.
    ///
    /// Views are notified even when the reload failed: they re-read
    /// through the cache and decide how to render the stale-with-error
    /// state. A refresh for an unregistered name is a no-op apart from
    /// the warning and the returned error.
    pub fn refresh_dataset(&self, name: &DatasetName) -> Result<()> {
        if !self.cache.contains(name) {
            warn!(dataset = %name, "refresh requested for unregistered dataset");
            return Err(SyncError::UnknownDataset(name.clone()));
        }
        let result = self.cache.reload(name);
        let handles = self.registry.subscribers_of(name);
        debug!(dataset = %name, views = handles.len(), "notifying subscribed views");
        for handle in handles {
            handle.notify();
        }
        result
    }

    /// Refreshes every dataset related to a mutated entity kind.
    ///
    /// Datasets are refreshed sequentially in the order the relation
    /// declares, each one independent and best-effort: one failed reload
    /// never aborts the rest. An unknown entity kind degrades to a full
    /// [`Self::refresh_all`].
    pub fn refresh_related(&self, kind: &EntityKind) -> RefreshOutcome {
        let Some(targets) = self.relations.targets(kind) else {
            warn!(entity = %kind, "no relation entry for entity kind; refreshing every dataset");
            return self.refresh_all();
        };
        debug!(entity = %kind, datasets = targets.len(), "fan-out refresh");
        self.refresh_each(targets.to_vec())
    }

    /// Refreshes every dataset known to the cache.
    pub fn refresh_all(&self) -> RefreshOutcome {
        self.refresh_each(self.cache.dataset_names())
    }

    fn refresh_each(&self, names: Vec<DatasetName>) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::default();
        for name in names {
            match self.refresh_dataset(&name) {
                Ok(()) => outcome.refreshed.push(name),
                Err(error) => outcome.failures.push((name, error.to_string())),
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use viewsync_model::{CellValue, DatasetSpec, FetchSpec, StoreError, Table, TableSource};

    use crate::loader::DatasetLoader;
    use crate::registry::ViewHandle;

    use super::*;

    /// Records which datasets were fetched, in order.
    struct RecordingSource {
        fetched: Mutex<Vec<String>>,
        fail_for: Mutex<Vec<String>>,
    }

    impl RecordingSource {
        fn new() -> Self {
            Self {
                fetched: Mutex::new(Vec::new()),
                fail_for: Mutex::new(Vec::new()),
            }
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    impl TableSource for RecordingSource {
        fn fetch(&self, spec: &DatasetSpec) -> std::result::Result<Table, StoreError> {
            let queried = match &spec.fetch {
                FetchSpec::Query(q) => q.clone(),
                FetchSpec::Callable(_) => "<callable>".to_string(),
            };
            self.fetched.lock().unwrap().push(queried.clone());
            if self.fail_for.lock().unwrap().contains(&queried) {
                return Err(StoreError::Unavailable {
                    message: "down".to_string(),
                });
            }
            Table::from_rows(
                spec.columns.clone(),
                vec![vec![CellValue::Text(queried); spec.columns.len()]],
            )
            .map_err(|e| StoreError::Schema {
                message: e.to_string(),
            })
        }
    }

    fn name(value: &str) -> DatasetName {
        DatasetName::new(value).unwrap()
    }

    fn kind(value: &str) -> EntityKind {
        EntityKind::new(value).unwrap()
    }

    fn coordinator_with(
        source: Arc<RecordingSource>,
        datasets: &[&str],
        relations: &[(&str, &[&str])],
    ) -> (Arc<RefreshCoordinator>, Arc<ViewRegistry>) {
        let cache = Arc::new(DatasetCache::new(DatasetLoader::new(source)));
        for dataset in datasets {
            cache
                .register(DatasetSpec::with_query(
                    name(dataset),
                    vec!["id".to_string()],
                    *dataset,
                ))
                .unwrap();
        }
        let registry = Arc::new(ViewRegistry::new());
        let mut map = RelationMap::new();
        for (entity, affects) in relations {
            map.insert(kind(entity), affects.iter().map(|d| name(d)).collect());
        }
        (
            Arc::new(RefreshCoordinator::new(cache, registry.clone(), map)),
            registry,
        )
    }

    #[test]
    fn test_fan_out_completeness_and_order() {
        let source = Arc::new(RecordingSource::new());
        let (coordinator, _registry) = coordinator_with(
            source.clone(),
            &["complaints", "computers", "labs"],
            &[("computer", &["computers", "complaints"])],
        );

        let outcome = coordinator.refresh_related(&kind("computer"));
        assert!(outcome.ok());
        assert_eq!(outcome.refreshed, vec![name("computers"), name("complaints")]);
        // Exactly one reload per related dataset, in declared order, and
        // no fetch for the unrelated "labs".
        assert_eq!(source.fetched(), vec!["computers", "complaints"]);
    }

    #[test]
    fn test_notification_fan_out_counts_every_handle() {
        let source = Arc::new(RecordingSource::new());
        let (coordinator, registry) =
            coordinator_with(source, &["computers"], &[]);
        let computers = name("computers");

        let notified = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<ViewHandle>>> = Arc::new(Mutex::new(None));
        let self_removing = {
            let registry = registry.clone();
            let slot = slot.clone();
            let notified = notified.clone();
            ViewHandle::new(
                computers.clone(),
                Arc::new(move |_: &DatasetName| {
                    notified.fetch_add(1, Ordering::SeqCst);
                    if let Some(own) = slot.lock().unwrap().as_ref() {
                        registry.unsubscribe(own);
                    }
                }),
            )
        };
        *slot.lock().unwrap() = Some(self_removing.clone());
        registry.subscribe(&self_removing);
        for _ in 0..2 {
            let counter = notified.clone();
            registry.subscribe(&ViewHandle::new(
                computers.clone(),
                Arc::new(move |_: &DatasetName| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            ));
        }

        coordinator.refresh_dataset(&computers).unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 3);

        // The self-removing handle is gone for the next refresh.
        coordinator.refresh_dataset(&computers).unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_views_notified_even_when_reload_fails() {
        let source = Arc::new(RecordingSource::new());
        source
            .fail_for
            .lock()
            .unwrap()
            .push("computers".to_string());
        let (coordinator, registry) =
            coordinator_with(source, &["computers"], &[]);
        let computers = name("computers");

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        registry.subscribe(&ViewHandle::new(
            computers.clone(),
            Arc::new(move |_: &DatasetName| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ));

        let err = coordinator
            .refresh_dataset(&computers)
            .expect_err("reload fails");
        assert!(matches!(err, SyncError::LoadFailed { .. }));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_entity_kind_falls_back_to_refresh_all() {
        let source = Arc::new(RecordingSource::new());
        let (coordinator, _registry) = coordinator_with(
            source.clone(),
            &["computers", "labs"],
            &[("computer", &["computers"])],
        );

        let outcome = coordinator.refresh_related(&kind("gadget"));
        assert!(outcome.ok());
        let mut fetched = source.fetched();
        fetched.sort();
        assert_eq!(fetched, vec!["computers", "labs"]);
    }

    #[test]
    fn test_fan_out_continues_past_failures() {
        let source = Arc::new(RecordingSource::new());
        source
            .fail_for
            .lock()
            .unwrap()
            .push("computers".to_string());
        let (coordinator, _registry) = coordinator_with(
            source.clone(),
            &["complaints", "computers"],
            &[("computer", &["computers", "complaints"])],
        );

        let outcome = coordinator.refresh_related(&kind("computer"));
        assert!(!outcome.ok());
        assert_eq!(outcome.refreshed, vec![name("complaints")]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, name("computers"));
        // Both datasets were attempted despite the first failing.
        assert_eq!(source.fetched(), vec!["computers", "complaints"]);
    }

    #[test]
    fn test_refresh_unknown_dataset_is_noop() {
        let source = Arc::new(RecordingSource::new());
        let (coordinator, _registry) = coordinator_with(source.clone(), &["computers"], &[]);
        let err = coordinator
            .refresh_dataset(&name("gadgets"))
            .expect_err("unknown dataset");
        assert!(matches!(err, SyncError::UnknownDataset(_)));
        assert!(source.fetched().is_empty());
    }
}
