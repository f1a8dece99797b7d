#![deny(unsafe_code)]

use thiserror::Error;

use viewsync_model::{DatasetName, PanelId};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(DatasetName),

    #[error("dataset already registered: {0}")]
    DuplicateDataset(DatasetName),

    #[error("failed to load dataset {dataset}: {message}")]
    LoadFailed {
        dataset: DatasetName,
        message: String,
    },

    #[error("dataset {dataset} schema mismatch: {detail}")]
    SchemaMismatch {
        dataset: DatasetName,
        detail: String,
    },

    #[error("panel is already bound: {0}")]
    PanelAlreadyBound(PanelId),

    #[error("unknown panel: {0}")]
    UnknownPanel(PanelId),
}

pub type Result<T> = std::result::Result<T, SyncError>;
