#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use viewsync_model::{CellValue, DatasetSpec, FetchSpec, StoreError, Table, TableSource};

struct StoreTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

/// In-memory CRUD store.
///
/// Fetch specifications are plain table names: a dataset whose spec is
/// `Query("computers")` reads the "computers" table, projected onto the
/// dataset's declared columns. Mutations never trigger a refresh by
/// themselves; the write path calls the refresh coordinator afterwards.
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, StoreTable>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulates a backing-store outage: while offline, every fetch
    /// returns [`StoreError::Unavailable`]. Mutations still apply.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn create_table(&self, name: &str, columns: Vec<String>) -> Result<(), StoreError> {
        let mut tables = write(&self.tables);
        if tables.contains_key(name) {
            return Err(StoreError::BadFetchSpec {
                message: format!("table already exists: {name}"),
            });
        }
        tables.insert(
            name.to_string(),
            StoreTable {
                columns,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn table_names(&self) -> Vec<String> {
        read(&self.tables).keys().cloned().collect()
    }

    pub fn columns(&self, name: &str) -> Result<Vec<String>, StoreError> {
        let tables = read(&self.tables);
        let table = lookup(&tables, name)?;
        Ok(table.columns.clone())
    }

    pub fn row_count(&self, name: &str) -> Result<usize, StoreError> {
        let tables = read(&self.tables);
        let table = lookup(&tables, name)?;
        Ok(table.rows.len())
    }

    pub fn insert_row(&self, name: &str, row: Vec<CellValue>) -> Result<(), StoreError> {
        let mut tables = write(&self.tables);
        let table = lookup_mut(&mut tables, name)?;
        if row.len() != table.columns.len() {
            return Err(StoreError::Schema {
                message: format!(
                    "row has {} cells but table {name} has {} columns",
                    row.len(),
                    table.columns.len()
                ),
            });
        }
        table.rows.push(row);
        debug!(table = name, rows = table.rows.len(), "row inserted");
        Ok(())
    }

    pub fn update_cell(
        &self,
        name: &str,
        row: usize,
        column: &str,
        value: CellValue,
    ) -> Result<(), StoreError> {
        let mut tables = write(&self.tables);
        let table = lookup_mut(&mut tables, name)?;
        let col = table
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| StoreError::Schema {
                message: format!("table {name} has no column {column}"),
            })?;
        let cell = table
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or_else(|| StoreError::BadFetchSpec {
                message: format!("table {name} has no row {row}"),
            })?;
        *cell = value;
        Ok(())
    }

    pub fn delete_row(&self, name: &str, row: usize) -> Result<(), StoreError> {
        let mut tables = write(&self.tables);
        let table = lookup_mut(&mut tables, name)?;
        if row >= table.rows.len() {
            return Err(StoreError::BadFetchSpec {
                message: format!("table {name} has no row {row}"),
            });
        }
        table.rows.remove(row);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableSource for MemoryStore {
    fn fetch(&self, spec: &DatasetSpec) -> Result<Table, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                message: "store offline".to_string(),
            });
        }
        let query = match &spec.fetch {
            FetchSpec::Query(query) => query.trim(),
            FetchSpec::Callable(_) => {
                return Err(StoreError::BadFetchSpec {
                    message: "memory store cannot execute callable fetch specs".to_string(),
                });
            }
        };

        let tables = read(&self.tables);
        let table = lookup(&tables, query)?;

        // Project the dataset's declared columns by name.
        let mut indices = Vec::with_capacity(spec.columns.len());
        for column in &spec.columns {
            let index = table
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| StoreError::Schema {
                    message: format!("table {query} has no column {column}"),
                })?;
            indices.push(index);
        }

        let rows = table
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Table::from_rows(spec.columns.clone(), rows).map_err(|e| StoreError::Schema {
            message: e.to_string(),
        })
    }
}

fn lookup<'a>(
    tables: &'a BTreeMap<String, StoreTable>,
    name: &str,
) -> Result<&'a StoreTable, StoreError> {
    tables.get(name).ok_or_else(|| StoreError::BadFetchSpec {
        message: format!("unknown table: {name}"),
    })
}

fn lookup_mut<'a>(
    tables: &'a mut BTreeMap<String, StoreTable>,
    name: &str,
) -> Result<&'a mut StoreTable, StoreError> {
    tables.get_mut(name).ok_or_else(|| StoreError::BadFetchSpec {
        message: format!("unknown table: {name}"),
    })
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use viewsync_model::DatasetName;

    use super::*;

    fn store_with_computers() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_table(
                "computers",
                vec!["id".to_string(), "hostname".to_string(), "lab".to_string()],
            )
            .unwrap();
        store
            .insert_row(
                "computers",
                vec![
                    CellValue::Int(1),
                    CellValue::Text("ws-01".into()),
                    CellValue::Text("lab-a".into()),
                ],
            )
            .unwrap();
        store
    }

    fn spec(columns: &[&str]) -> DatasetSpec {
        DatasetSpec::with_query(
            DatasetName::new("computers").unwrap(),
            columns.iter().map(|c| (*c).to_string()).collect(),
            "computers",
        )
    }

    #[test]
    fn test_fetch_projects_requested_columns() {
        let store = store_with_computers();
        let table = store.fetch(&spec(&["hostname", "id"])).unwrap();
        assert_eq!(table.columns(), &["hostname", "id"]);
        assert_eq!(table.cell(0, 0), Some(&CellValue::Text("ws-01".into())));
        assert_eq!(table.cell(0, 1), Some(&CellValue::Int(1)));
    }

    #[test]
    fn test_fetch_unknown_table_and_column() {
        let store = store_with_computers();
        let mut bad = spec(&["id"]);
        bad.fetch = FetchSpec::Query("printers".to_string());
        assert!(matches!(
            store.fetch(&bad),
            Err(StoreError::BadFetchSpec { .. })
        ));
        assert!(matches!(
            store.fetch(&spec(&["serial"])),
            Err(StoreError::Schema { .. })
        ));
    }

    #[test]
    fn test_offline_fails_fetch_but_not_mutation() {
        let store = store_with_computers();
        store.set_offline(true);
        assert!(matches!(
            store.fetch(&spec(&["id"])),
            Err(StoreError::Unavailable { .. })
        ));
        store
            .insert_row(
                "computers",
                vec![
                    CellValue::Int(2),
                    CellValue::Text("ws-02".into()),
                    CellValue::Missing,
                ],
            )
            .unwrap();
        store.set_offline(false);
        assert_eq!(store.fetch(&spec(&["id"])).unwrap().row_count(), 2);
    }

    #[test]
    fn test_crud_round_trip() {
        let store = store_with_computers();
        store
            .update_cell("computers", 0, "hostname", CellValue::Text("ws-99".into()))
            .unwrap();
        let table = store.fetch(&spec(&["hostname"])).unwrap();
        assert_eq!(table.cell(0, 0), Some(&CellValue::Text("ws-99".into())));

        store.delete_row("computers", 0).unwrap();
        assert_eq!(store.row_count("computers").unwrap(), 0);
        assert!(store.delete_row("computers", 0).is_err());
    }

    #[test]
    fn test_insert_row_width_checked() {
        let store = store_with_computers();
        assert!(matches!(
            store.insert_row("computers", vec![CellValue::Int(5)]),
            Err(StoreError::Schema { .. })
        ));
    }
}
