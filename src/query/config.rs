use std::time::Duration;

/// Configuration for query behavior.
///
/// This controls when cached data is considered stale and how many cache
/// events may queue up for slow subscribers.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How long data is considered fresh before becoming stale.
    ///
    /// When data is fresh, queries will use cached data without refetching.
    /// Once stale, queries show the cached data and refetch in the background.
    pub stale_time: Duration,

    /// Capacity of the cache event channel.
    ///
    /// Subscribers lagging further behind than this skip the oldest events.
    pub event_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(0), // immediately stale
            event_capacity: 100,
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration with the given stale time.
    #[must_use]
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            ..Self::default()
        }
    }

    /// Sets the capacity of the cache event channel.
    #[must_use]
    pub const fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }
}
