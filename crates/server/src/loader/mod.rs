//! Filesystem source loader with hot-reload via `notify` watcher.
//!
//! Reads one [`SourceDefinition`](cmg_core::SourceDefinition) per YAML file
//! and registers it with the [`SourceRegistry`](crate::registry::SourceRegistry).
//! Watches the directory for changes (create, modify, delete) and
//! re-registers or unregisters the affected source.

mod core;
mod report;
mod watcher;


pub use self::core::SourceLoader;
pub use self::report::{LoadResult, LoadStatus};
