#![deny(unsafe_code)]

pub mod csv;
pub mod error;
pub mod memory;

pub use crate::csv::{load_csv_file, load_for_datasets};
pub use crate::error::IngestError;
pub use crate::memory::MemoryStore;
