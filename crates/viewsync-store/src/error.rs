#![deny(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;
use viewsync_model::StoreError;

/// Error while populating the store from files.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
