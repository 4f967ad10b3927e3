//! Temporal resolution of recurring cron windows.
//!
//! This crate provides:
//! - The [`CronClock`] capability (previous/next occurrence of an expression)
//!   and its `cron`-crate backed implementation
//! - Five-field expression normalization for the `cron` crate dialect
//! - The [`IntervalResolver`], which turns overlapping windows into a single
//!   current/last/next value triple
//! - Reference-instant computation (timezone + offset)
//!
//! Nothing here performs I/O or holds shared state.

pub mod clock;
pub(crate) mod cron;
pub mod reference;
pub mod resolver;

pub use clock::{ClockError, CronClock, CronCrateClock};
pub use reference::{reference_instant, resolve_timezone};
pub use resolver::IntervalResolver;
