#![deny(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use crate::ids::DatasetName;
use crate::source::StoreError;
use crate::table::Table;

/// Signature of a callable fetch specification.
pub type FetchFn = dyn Fn() -> Result<Table, StoreError> + Send + Sync;

/// How a dataset's rows are retrieved: a query string handed to the backing
/// store, or a callable that produces the table itself.
#[derive(Clone)]
pub enum FetchSpec {
    Query(String),
    Callable(Arc<FetchFn>),
}

impl fmt::Debug for FetchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(q) => f.debug_tuple("Query").field(q).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// A named, queryable source of tabular data.
///
/// Created once per distinct dataset name, lives for the process lifetime,
/// and is only ever reloaded, never destroyed.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub name: DatasetName,
    pub columns: Vec<String>,
    pub fetch: FetchSpec,
}

impl DatasetSpec {
    pub fn new(name: DatasetName, columns: Vec<String>, fetch: FetchSpec) -> Self {
        Self {
            name,
            columns,
            fetch,
        }
    }

    pub fn with_query(
        name: DatasetName,
        columns: Vec<String>,
        query: impl Into<String>,
    ) -> Self {
        Self::new(name, columns, FetchSpec::Query(query.into()))
    }
}
