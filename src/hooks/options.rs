use std::time::Duration;

/// Common query options shared by [`UseQuery`](super::UseQuery) and
/// [`UseFetchList`](super::UseFetchList).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Fetch as soon as the controller is subscribed, without waiting for
    /// an explicit refetch.
    pub auto_fetch: bool,

    /// Poll on this interval. While set, the query runs even if disabled.
    /// A zero interval means no polling.
    pub refetch_interval: Option<Duration>,
}

impl QueryOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            auto_fetch: false,
            refetch_interval: None,
        }
    }

    #[must_use]
    pub const fn auto_fetch(mut self, auto_fetch: bool) -> Self {
        self.auto_fetch = auto_fetch;
        self
    }

    #[must_use]
    pub const fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = if interval.is_zero() { None } else { Some(interval) };
        self
    }

    /// Returns `true` if polling overrides manual enablement.
    pub const fn polls(&self) -> bool {
        matches!(self.refetch_interval, Some(interval) if !interval.is_zero())
    }
}
