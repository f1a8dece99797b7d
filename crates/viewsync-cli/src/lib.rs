//! Shared pieces of the viewsync workbench CLI.

pub mod logging;
