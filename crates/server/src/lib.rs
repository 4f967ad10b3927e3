//! Metric store, refresh loop and exposition server for cron-window sources.
//!
//! Data flow: the [`loader`] registers sources with the [`SourceRegistry`],
//! which publishes one record per source into the [`MetricStore`]. The
//! [`RefreshDriver`] re-resolves every source on a fixed tick, and the
//! [`ExpositionServer`] renders a store snapshot on every scrape.

pub mod cli;
pub mod exposition;
pub mod loader;
pub mod refresh;
pub mod registry;
pub mod sanitize;
pub mod store;

pub use exposition::{render, router, ExpositionServer, CONTENT_TYPE};
pub use loader::{LoadResult, LoadStatus, SourceLoader};
pub use refresh::{RefreshDriver, SweepReport};
pub use registry::{RegistryDefaults, SourceRegistry, SourceStatus, SourceView, ORIGIN_LABEL};
pub use store::MetricStore;
