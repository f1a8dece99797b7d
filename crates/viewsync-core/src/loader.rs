#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use viewsync_model::{DatasetSpec, FetchSpec, Table, TableSource};

use crate::error::{Result, SyncError};

/// Executes a dataset's fetch specification against the backing store.
///
/// Stateless per call: every `load` re-executes the fetch; nothing is
/// cached here. Caching is the [`crate::cache::DatasetCache`]'s job.
pub struct DatasetLoader {
    source: Arc<dyn TableSource>,
}

impl DatasetLoader {
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        Self { source }
    }

    /// Retrieves a fresh table for the dataset.
    ///
    /// Returns an error on store failure or when the returned columns do
    /// not match the dataset's declared columns; never a partial table.
    pub fn load(&self, spec: &DatasetSpec) -> Result<Table> {
        let started = Instant::now();
        let fetched = match &spec.fetch {
            FetchSpec::Callable(fetch) => fetch(),
            FetchSpec::Query(_) => self.source.fetch(spec),
        };
        let table = fetched.map_err(|error| SyncError::LoadFailed {
            dataset: spec.name.clone(),
            message: error.to_string(),
        })?;
        if table.columns() != spec.columns.as_slice() {
            return Err(SyncError::SchemaMismatch {
                dataset: spec.name.clone(),
                detail: format!(
                    "expected columns {:?}, store returned {:?}",
                    spec.columns,
                    table.columns()
                ),
            });
        }
        debug!(
            dataset = %spec.name,
            rows = table.row_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dataset loaded"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use viewsync_model::{CellValue, DatasetName, StoreError};

    use super::*;

    struct FixedSource {
        columns: Vec<String>,
        calls: AtomicUsize,
    }

    impl TableSource for FixedSource {
        fn fetch(&self, _spec: &DatasetSpec) -> std::result::Result<Table, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut table = Table::empty(self.columns.clone());
            table
                .push_row(vec![CellValue::Int(1), CellValue::Text("a".into())])
                .unwrap();
            Ok(table)
        }
    }

    fn spec(columns: &[&str]) -> DatasetSpec {
        DatasetSpec::with_query(
            DatasetName::new("computers").unwrap(),
            columns.iter().map(|c| (*c).to_string()).collect(),
            "computers",
        )
    }

    #[test]
    fn test_load_executes_fetch_every_call() {
        let source = Arc::new(FixedSource {
            columns: vec!["id".to_string(), "hostname".to_string()],
            calls: AtomicUsize::new(0),
        });
        let loader = DatasetLoader::new(source.clone());
        let spec = spec(&["id", "hostname"]);
        loader.load(&spec).unwrap();
        loader.load(&spec).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_load_rejects_schema_mismatch() {
        let source = Arc::new(FixedSource {
            columns: vec!["id".to_string(), "hostname".to_string()],
            calls: AtomicUsize::new(0),
        });
        let loader = DatasetLoader::new(source);
        let err = loader
            .load(&spec(&["id", "serial"]))
            .expect_err("column mismatch must fail the load");
        assert!(matches!(err, SyncError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_callable_fetch_bypasses_store() {
        struct PanicSource;
        impl TableSource for PanicSource {
            fn fetch(&self, _spec: &DatasetSpec) -> std::result::Result<Table, StoreError> {
                panic!("store must not be consulted for callable fetch specs");
            }
        }

        let loader = DatasetLoader::new(Arc::new(PanicSource));
        let spec = DatasetSpec::new(
            DatasetName::new("labs").unwrap(),
            vec!["id".to_string()],
            FetchSpec::Callable(Arc::new(|| {
                Table::from_rows(
                    vec!["id".to_string()],
                    vec![vec![CellValue::Int(9)]],
                )
                .map_err(|e| StoreError::Schema {
                    message: e.to_string(),
                })
            })),
        );
        let table = loader.load(&spec).unwrap();
        assert_eq!(table.row_count(), 1);
    }
}
