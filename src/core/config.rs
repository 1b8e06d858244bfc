//! # Work queue configuration.
//!
//! Provides [`QueueConfig`], the settings of one [`WorkQueue`](crate::WorkQueue).
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → treated as `1` (the queue always admits at least one item)
//! - `bus_capacity = 0` → treated as `1`

use std::time::Duration;

/// Configuration for a work queue.
///
/// ## Field semantics
/// - `max_concurrent`: maximum number of items running at once (min 1)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `grace`: how long a graceful shutdown waits for in-flight items
///
/// All fields are public; prefer the helper accessors over sprinkling
/// sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Maximum number of work items running concurrently.
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// skip older items.
    pub bus_capacity: usize,

    /// Maximum time a graceful shutdown waits for in-flight items.
    pub grace: Duration,
}

impl QueueConfig {
    /// Config for a strictly sequential queue (one item at a time).
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Config allowing `n` concurrent items.
    pub fn with_concurrency(n: usize) -> Self {
        Self {
            max_concurrent: n,
            ..Self::default()
        }
    }

    /// Returns the concurrency limit, clamped to a minimum of 1.
    #[inline]
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for QueueConfig {
    /// Default configuration:
    ///
    /// - `max_concurrent = 1` (sequential)
    /// - `bus_capacity = 1024`
    /// - `grace = 60s`
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            bus_capacity: 1024,
            grace: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_clamped() {
        let cfg = QueueConfig {
            max_concurrent: 0,
            bus_capacity: 0,
            grace: Duration::ZERO,
        };
        assert_eq!(cfg.concurrency_limit(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn with_concurrency_keeps_other_defaults() {
        let cfg = QueueConfig::with_concurrency(4);
        assert_eq!(cfg.concurrency_limit(), 4);
        assert_eq!(cfg.bus_capacity, 1024);
    }
}
