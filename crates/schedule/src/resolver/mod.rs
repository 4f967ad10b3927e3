//! Resolution of overlapping cron windows into a single value triple.
//!
//! Every window contributes its most recent occurrence `[start, start + duration)`.
//! The window that started most recently and is still running is active; its
//! value is the current value. Transition instants look across all windows,
//! because a shadowed window can still end or begin in the middle of the
//! active one.
//!
//! The [`IntervalResolver`] is pure: no I/O, no shared mutable state. Cron
//! evaluation goes through an injected [`CronClock`](crate::CronClock).

mod core;

#[cfg(test)]
mod tests;

pub use self::core::IntervalResolver;
