//! Query subscriptions with caching, polling and cache-event handling.
//!
//! A [`Query`] is a **subscription**: while it is part of the application's
//! subscription set, it keeps the cached data for its key in sync and emits a
//! [`QueryResult`] every time the state changes.
//!
//! 1. If cached data exists, it's immediately emitted
//! 2. If data is stale or missing, a fetch is automatically triggered
//! 3. When the key is invalidated or a refetch is requested, it refetches
//! 4. When the key is removed from the cache, it goes back to idle
//! 5. With a refetch interval, it refetches on every tick
//!
//! Removing the subscription from the set stops all of this, which is how
//! fetching is gated.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use futures::stream::{self, BoxStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::subscription::{SubscriptionId, SubscriptionSource};

use super::QueryKey;
use super::client::{CacheEvent, QueryClient};
use super::error::QueryError;

/// A shareable async function producing query data.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync>;

/// The state of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// Query is not running and holds no data.
    Idle,
    /// Query is fetching for the first time.
    Loading,
    /// Query is fetching again while showing previous data.
    Refetching {
        /// The previously fetched data.
        data: T,
    },
    /// Query succeeded with data.
    Success {
        /// The data returned by the query.
        data: T,
        /// Whether the data is stale and should be refetched.
        is_stale: bool,
    },
    /// Query failed with an error.
    Error(QueryError),
}

/// A query result containing the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    /// The current state of the query.
    pub state: QueryState<T>,
}

impl<T> QueryResult<T> {
    pub const fn new(state: QueryState<T>) -> Self {
        Self { state }
    }

    pub const fn idle() -> Self {
        Self::new(QueryState::Idle)
    }

    pub const fn success(data: T) -> Self {
        Self::new(QueryState::Success {
            data,
            is_stale: false,
        })
    }

    pub const fn failed(error: QueryError) -> Self {
        Self::new(QueryState::Error(error))
    }

    /// Returns the data if the query holds any, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            QueryState::Success { data, .. } | QueryState::Refetching { data } => Some(data),
            _ => None,
        }
    }

    /// Returns the error if the query failed.
    pub const fn error(&self) -> Option<&QueryError> {
        match &self.state {
            QueryState::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the query is fetching without any data to show.
    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    /// Returns `true` if any fetch is in flight.
    pub const fn is_fetching(&self) -> bool {
        matches!(self.state, QueryState::Loading | QueryState::Refetching { .. })
    }

    /// Returns `true` if a fetch is in flight while previous data is shown.
    pub const fn is_refetching(&self) -> bool {
        matches!(self.state, QueryState::Refetching { .. })
    }

    /// Returns `true` if the query succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    /// Returns `true` if the query failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error(_))
    }

    /// Returns `true` if the query data is stale.
    pub const fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Success { is_stale: true, .. })
    }

    /// Returns `true` if the query is idle.
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, QueryState::Idle)
    }
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self::idle()
    }
}

/// A query subscription that monitors and fetches data with caching.
///
/// # Example
///
/// ```rust,ignore
/// use tears_query::subscription::Subscription;
/// use tears_query::query::{Query, QueryClient};
/// use std::sync::Arc;
///
/// let client = Arc::new(QueryClient::new());
///
/// let query = Subscription::new(
///     Query::new(["users", "123"], || Box::pin(fetch_user()), client.clone())
///         .refetch_interval(Duration::from_secs(30)),
/// )
/// .map(Message::UserQuery);
/// ```
pub struct Query<V> {
    key: QueryKey,
    fetcher: Fetcher<V>,
    client: Arc<QueryClient>,
    refetch_interval: Option<Duration>,
    placeholder: Option<V>,
}

impl<V: Clone> Clone for Query<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: self.fetcher.clone(),
            client: self.client.clone(),
            refetch_interval: self.refetch_interval,
            placeholder: self.placeholder.clone(),
        }
    }
}

impl<V> Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new query with the given key, fetcher, and client.
    ///
    /// # Arguments
    ///
    /// * `key` - Identifies this query in the cache
    /// * `fetcher` - An async function that fetches the data
    /// * `client` - The query client for cache management
    pub fn new<F>(key: impl Into<QueryKey>, fetcher: F, client: Arc<QueryClient>) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        Self::with_fetcher(key.into(), Arc::new(fetcher), client)
    }

    pub(crate) fn with_fetcher(key: QueryKey, fetcher: Fetcher<V>, client: Arc<QueryClient>) -> Self {
        Self {
            key,
            fetcher,
            client,
            refetch_interval: None,
            placeholder: None,
        }
    }

    /// Refetch on a fixed interval while subscribed.
    #[must_use]
    pub fn refetch_interval(mut self, interval: impl Into<Option<Duration>>) -> Self {
        self.refetch_interval = interval.into().filter(|d| !d.is_zero());
        self
    }

    /// Report failed fetches as success instead of an error state.
    ///
    /// For callers that handle errors inside the fetcher. The cached data is
    /// kept and re-emitted, or `placeholder` when nothing is cached. Failed
    /// fetches never touch the cache.
    #[must_use]
    pub fn keep_data_on_error(mut self, placeholder: V) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    /// The key this query caches under.
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The shared client.
    pub const fn client(&self) -> &Arc<QueryClient> {
        &self.client
    }

    /// Fetches once, outside of any subscription.
    ///
    /// The fetch is shared with any in-flight request for the same key. On
    /// success, active subscriptions for this key are notified and re-emit
    /// the new data.
    pub fn fetch(&self) -> BoxFuture<'static, QueryResult<V>> {
        let key = self.key.clone();
        let fetcher = self.fetcher.clone();
        let client = self.client.clone();
        let placeholder = self.placeholder.clone();

        async move {
            let result = run_fetch(&client, &key, &fetcher, placeholder.as_ref()).await;
            if result.is_success() {
                client.notify(CacheEvent::Updated(key));
            }
            result
        }
        .boxed()
    }
}

async fn run_fetch<V>(
    client: &QueryClient,
    key: &QueryKey,
    fetcher: &Fetcher<V>,
    placeholder: Option<&V>,
) -> QueryResult<V>
where
    V: Clone + Send + Sync + 'static,
{
    let fetcher = fetcher.clone();
    match client.fetch(key, move || fetcher()).await {
        Ok(data) => QueryResult::success(data),
        Err(e) => match placeholder {
            Some(placeholder) => match client.cached::<V>(key) {
                Some((data, is_stale)) => QueryResult::new(QueryState::Success { data, is_stale }),
                None => QueryResult::success(placeholder.clone()),
            },
            None => QueryResult::failed(e),
        },
    }
}

/// The state to show while a refetch is running.
fn pending<V>(client: &QueryClient, key: &QueryKey) -> QueryResult<V>
where
    V: Clone + Send + Sync + 'static,
{
    match client.cached::<V>(key) {
        Some((data, _)) => QueryResult::new(QueryState::Refetching { data }),
        None => QueryResult::new(QueryState::Loading),
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let key = self.key.clone();
        let fetcher = self.fetcher.clone();
        let client = self.client.clone();
        let placeholder = self.placeholder.clone();
        let cursor = Cursor {
            phase: Phase::Initial,
            rx: client.subscribe(),
            ticker: None,
        };
        let refetch_interval = self.refetch_interval;

        stream::unfold(cursor, move |mut cursor| {
            let key = key.clone();
            let fetcher = fetcher.clone();
            let client = client.clone();
            let placeholder = placeholder.clone();

            async move {
                match cursor.phase {
                    Phase::Initial => {
                        cursor.ticker = refetch_interval.map(ticker);

                        match client.cached::<V>(&key) {
                            Some((data, false)) => {
                                let result = QueryResult::new(QueryState::Success {
                                    data,
                                    is_stale: false,
                                });
                                Some((result, cursor.next(Phase::Watching)))
                            }
                            Some((data, true)) => {
                                // Stale data: show it while refetching
                                let result = QueryResult::new(QueryState::Refetching { data });
                                Some((result, cursor.next(Phase::Fetching)))
                            }
                            None => {
                                let result = QueryResult::new(QueryState::Loading);
                                Some((result, cursor.next(Phase::Fetching)))
                            }
                        }
                    }

                    Phase::Fetching => {
                        let result =
                            run_fetch(&client, &key, &fetcher, placeholder.as_ref()).await;
                        Some((result, cursor.next(Phase::Watching)))
                    }

                    Phase::Watching => loop {
                        let wake = match cursor.ticker.as_mut() {
                            Some(ticker) => tokio::select! {
                                _ = ticker.tick() => Wake::Tick,
                                event = cursor.rx.recv() => Wake::Event(event),
                            },
                            None => Wake::Event(cursor.rx.recv().await),
                        };

                        match wake {
                            Wake::Tick => {
                                return Some((pending(&client, &key), cursor.next(Phase::Fetching)));
                            }
                            Wake::Event(Ok(event)) if event.affects(&key) => match event {
                                CacheEvent::Updated(_) => {
                                    if let Some((data, is_stale)) = client.cached::<V>(&key) {
                                        let result =
                                            QueryResult::new(QueryState::Success { data, is_stale });
                                        return Some((result, cursor));
                                    }
                                }
                                CacheEvent::Invalidated(_) | CacheEvent::Refetch(_) => {
                                    return Some((
                                        pending(&client, &key),
                                        cursor.next(Phase::Fetching),
                                    ));
                                }
                                CacheEvent::Removed(_) => {
                                    return Some((QueryResult::idle(), cursor));
                                }
                            },
                            Wake::Event(Ok(_)) => {
                                // Different key, keep waiting
                            }
                            Wake::Event(Err(RecvError::Lagged(skipped))) => {
                                tracing::debug!(%key, skipped, "query lagged behind cache events");
                            }
                            Wake::Event(Err(RecvError::Closed)) => {
                                // Client is gone, subscription ends
                                return None;
                            }
                        }
                    },
                }
            }
        })
        .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

impl<V> Hash for Query<V> {
    fn hash<H>(&self, hasher: &mut H)
    where
        H: Hasher,
    {
        self.key.hash(hasher);
        self.refetch_interval.hash(hasher);
    }
}

fn ticker(period: Duration) -> Interval {
    // Skip the immediate first tick; the initial fetch covers it.
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Internal state machine for the Query subscription.
#[derive(Clone, Copy)]
enum Phase {
    Initial,
    Fetching,
    Watching,
}

struct Cursor {
    phase: Phase,
    rx: broadcast::Receiver<CacheEvent>,
    ticker: Option<Interval>,
}

impl Cursor {
    fn next(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }
}

enum Wake {
    Tick,
    Event(Result<CacheEvent, RecvError>),
}
