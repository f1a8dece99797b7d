#![deny(unsafe_code)]

//! View synchronization and invalidation registry.
//!
//! Keeps multiple independently-rendered, read-only presentations of
//! backing-store data consistent after mutations. The store emits no
//! change feed; every write path calls the refresh coordinator after a
//! successful mutation, which reloads the affected dataset caches and
//! notifies every subscribed view.

pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod doctor;
pub mod error;
pub mod format;
pub mod loader;
pub mod panel;
pub mod registry;
pub mod relations;

pub use cache::{DatasetCache, DatasetStatus};
pub use config::{CONFIG_SCHEMA, CONFIG_SCHEMA_VERSION, ConfigError, SyncConfig};
pub use context::SyncContext;
pub use coordinator::{RefreshCoordinator, RefreshOutcome};
pub use doctor::{DatasetSummary, DoctorCounts, DoctorReport, RelationSummary};
pub use error::{Result, SyncError};
pub use format::{Align, ColumnFormat, FormatPolicy, FormattedTable};
pub use loader::DatasetLoader;
pub use panel::{BindingState, PanelManager};
pub use registry::{ViewHandle, ViewId, ViewNotifier, ViewRegistry};
pub use relations::RelationMap;
