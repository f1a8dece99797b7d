#![deny(unsafe_code)]

pub mod dataset;
pub mod error;
pub mod ids;
pub mod source;
pub mod table;
pub mod value;

pub use dataset::{DatasetSpec, FetchFn, FetchSpec};
pub use error::{ModelError, Result};
pub use ids::{DatasetName, EntityKind, PanelId};
pub use source::{StoreError, TableSource};
pub use table::Table;
pub use value::CellValue;
