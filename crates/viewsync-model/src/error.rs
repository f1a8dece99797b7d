#![deny(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid dataset name: {0:?}")]
    InvalidDatasetName(String),
    #[error("invalid entity kind: {0:?}")]
    InvalidEntityKind(String),
    #[error("invalid panel id: {0:?}")]
    InvalidPanelId(String),
    #[error("row has {got} cells but the table has {expected} columns")]
    RowWidthMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, ModelError>;
