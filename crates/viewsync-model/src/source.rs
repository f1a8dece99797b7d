#![deny(unsafe_code)]

use thiserror::Error;

use crate::dataset::DatasetSpec;
use crate::table::Table;

/// Error from the backing store while executing a fetch specification.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {message}")]
    Unavailable { message: String },

    #[error("invalid fetch specification: {message}")]
    BadFetchSpec { message: String },

    #[error("schema mismatch: {message}")]
    Schema { message: String },
}

/// The backing-store boundary.
///
/// Executes a dataset's fetch specification and returns a complete table or
/// an error, never a partial result. Any tabular query mechanism qualifies;
/// this subsystem treats the store as opaque and never observes it for
/// changes.
pub trait TableSource: Send + Sync {
    fn fetch(&self, spec: &DatasetSpec) -> Result<Table, StoreError>;
}
