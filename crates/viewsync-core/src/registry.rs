#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use viewsync_model::DatasetName;

/// Receives change notifications for one dataset.
///
/// `dataset_changed` may be invoked from any thread; an implementation
/// backing a presentation surface marshals the call onto its own owning
/// execution context before touching surface state.
pub trait ViewNotifier: Send + Sync {
    fn dataset_changed(&self, dataset: &DatasetName);
}

impl<F> ViewNotifier for F
where
    F: Fn(&DatasetName) + Send + Sync,
{
    fn dataset_changed(&self, dataset: &DatasetName) {
        self(dataset)
    }
}

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one view subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        Self(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// An opaque reference to one presentation surface subscribed to exactly
/// one dataset name. Multiple handles may bind to the same name.
#[derive(Clone)]
pub struct ViewHandle {
    id: ViewId,
    dataset: DatasetName,
    notifier: Arc<dyn ViewNotifier>,
}

impl ViewHandle {
    pub fn new(dataset: DatasetName, notifier: Arc<dyn ViewNotifier>) -> Self {
        Self {
            id: ViewId::next(),
            dataset,
            notifier,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn dataset(&self) -> &DatasetName {
        &self.dataset
    }

    pub fn notify(&self) {
        self.notifier.dataset_changed(&self.dataset);
    }
}

impl fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewHandle")
            .field("id", &self.id)
            .field("dataset", &self.dataset)
            .finish_non_exhaustive()
    }
}

/// Maps dataset names to the set of currently subscribed view handles.
pub struct ViewRegistry {
    subscribers: Mutex<BTreeMap<DatasetName, Vec<ViewHandle>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Adds a handle under its dataset name. Subscribing the same handle
    /// twice is a no-op.
    pub fn subscribe(&self, handle: &ViewHandle) {
        let mut subscribers = lock(&self.subscribers);
        let entries = subscribers.entry(handle.dataset.clone()).or_default();
        if entries.iter().any(|existing| existing.id == handle.id) {
            return;
        }
        debug!(dataset = %handle.dataset, view = %handle.id, "view subscribed");
        entries.push(handle.clone());
    }

    /// Removes the handle from whatever dataset name it was registered
    /// under. No-op if it is not present.
    pub fn unsubscribe(&self, handle: &ViewHandle) {
        let mut subscribers = lock(&self.subscribers);
        if let Some(entries) = subscribers.get_mut(&handle.dataset) {
            let before = entries.len();
            entries.retain(|existing| existing.id != handle.id);
            if entries.len() < before {
                debug!(dataset = %handle.dataset, view = %handle.id, "view unsubscribed");
            }
            if entries.is_empty() {
                subscribers.remove(&handle.dataset);
            }
        }
    }

    /// A snapshot of the handles currently subscribed to a dataset name,
    /// so notification iteration is safe even if a handle unsubscribes
    /// itself mid-notification.
    pub fn subscribers_of(&self, dataset: &DatasetName) -> Vec<ViewHandle> {
        lock(&self.subscribers)
            .get(dataset)
            .cloned()
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, dataset: &DatasetName) -> usize {
        lock(&self.subscribers)
            .get(dataset)
            .map_or(0, Vec::len)
    }
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn name(value: &str) -> DatasetName {
        DatasetName::new(value).unwrap()
    }

    fn silent_handle(dataset: &DatasetName) -> ViewHandle {
        ViewHandle::new(dataset.clone(), Arc::new(|_: &DatasetName| {}))
    }

    #[test]
    fn test_subscribe_is_idempotent_per_handle() {
        let registry = ViewRegistry::new();
        let computers = name("computers");
        let handle = silent_handle(&computers);

        registry.subscribe(&handle);
        registry.subscribe(&handle);
        assert_eq!(registry.subscriber_count(&computers), 1);

        // A distinct handle on the same dataset is a second subscriber.
        registry.subscribe(&silent_handle(&computers));
        assert_eq!(registry.subscriber_count(&computers), 2);
    }

    #[test]
    fn test_double_unsubscribe_is_noop() {
        let registry = ViewRegistry::new();
        let computers = name("computers");
        let handle = silent_handle(&computers);

        registry.subscribe(&handle);
        registry.unsubscribe(&handle);
        registry.unsubscribe(&handle);
        assert_eq!(registry.subscriber_count(&computers), 0);
    }

    #[test]
    fn test_snapshot_survives_mid_notification_unsubscribe() {
        let registry = Arc::new(ViewRegistry::new());
        let computers = name("computers");
        let notified = Arc::new(AtomicUsize::new(0));

        // First handle unsubscribes itself when notified.
        let slot: Arc<Mutex<Option<ViewHandle>>> = Arc::new(Mutex::new(None));
        let self_removing = {
            let registry = registry.clone();
            let slot = slot.clone();
            let notified = notified.clone();
            ViewHandle::new(
                computers.clone(),
                Arc::new(move |_: &DatasetName| {
                    notified.fetch_add(1, Ordering::SeqCst);
                    if let Some(own) = lock(&slot).as_ref() {
                        registry.unsubscribe(own);
                    }
                }),
            )
        };
        *lock(&slot) = Some(self_removing.clone());

        registry.subscribe(&self_removing);
        for _ in 0..2 {
            let counter = notified.clone();
            let handle = ViewHandle::new(
                computers.clone(),
                Arc::new(move |_: &DatasetName| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
            registry.subscribe(&handle);
        }

        for handle in registry.subscribers_of(&computers) {
            handle.notify();
        }
        assert_eq!(notified.load(Ordering::SeqCst), 3);
        assert_eq!(registry.subscriber_count(&computers), 2);
    }
}
