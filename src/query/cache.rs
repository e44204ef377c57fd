use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Type-erased value stored in the query cache.
pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// A cached entry with timestamp and staleness information.
#[derive(Clone)]
pub(crate) struct CacheEntry {
    data: AnyValue,
    timestamp: Instant,
    is_stale: bool,
}

impl CacheEntry {
    /// Creates a new cache entry with the given data.
    pub fn new(data: AnyValue) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
            is_stale: false,
        }
    }

    /// Returns a clone of the data if it holds a `T`.
    pub fn downcast<T: Clone + 'static>(&self) -> Option<T> {
        self.data.downcast_ref::<T>().cloned()
    }

    /// Checks if this entry is stale based on the given stale time.
    pub fn check_staleness(&mut self, stale_time: Duration) -> bool {
        if self.timestamp.elapsed() >= stale_time {
            self.is_stale = true;
        }
        self.is_stale
    }

    /// Marks this entry as stale.
    pub const fn mark_stale(&mut self) {
        self.is_stale = true;
    }

    #[allow(dead_code)]
    pub const fn is_stale(&self) -> bool {
        self.is_stale
    }
}
