use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::broadcast;

use crate::Command;

use super::QueryKey;
use super::cache::{AnyValue, CacheEntry};
use super::config::QueryConfig;
use super::error::QueryError;

/// Commands the controllers issue against the shared query cache.
///
/// [`QueryClient`] is the implementation shipped with this crate; the trait
/// exists so controllers can be driven against any cache.
pub trait QueryCache: Send + Sync {
    /// Marks every entry matching `key` as stale and notifies active queries,
    /// which refetch.
    fn invalidate_queries(&self, key: &QueryKey);

    /// Removes every entry matching `key`.
    fn remove_queries(&self, key: &QueryKey);

    /// Asks active queries matching `key` to refetch.
    fn refetch_queries(&self, key: &QueryKey);
}

/// Notifications broadcast by the [`QueryClient`] to active queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// New data was stored for exactly this key.
    Updated(QueryKey),
    /// Entries under this key prefix were marked stale.
    Invalidated(QueryKey),
    /// Queries under this key prefix should refetch.
    Refetch(QueryKey),
    /// Entries under this key prefix were removed.
    Removed(QueryKey),
}

impl CacheEvent {
    /// The key carried by this event.
    pub const fn key(&self) -> &QueryKey {
        match self {
            Self::Updated(key) | Self::Invalidated(key) | Self::Refetch(key) | Self::Removed(key) => {
                key
            }
        }
    }

    /// Returns `true` if this event concerns the query identified by `key`.
    ///
    /// `Updated` targets one key exactly; the other events match by prefix.
    pub fn affects(&self, key: &QueryKey) -> bool {
        match self {
            Self::Updated(updated) => updated == key,
            Self::Invalidated(prefix) | Self::Refetch(prefix) | Self::Removed(prefix) => {
                key.starts_with(prefix)
            }
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, QueryError>>>;

/// A client for managing the query cache and its notifications.
///
/// The `QueryClient` is the central state manager for queries. It handles:
/// - Caching query results
/// - Deduplicating concurrent fetches of the same key
/// - Broadcasting invalidation, removal and refetch notifications
///
/// # Example
///
/// ```rust
/// use tears_query::query::{QueryClient, QueryConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = QueryConfig::new(Duration::from_secs(30));
/// let client = Arc::new(QueryClient::with_config(config));
/// ```
#[derive(Clone)]
pub struct QueryClient {
    cache: Arc<DashMap<QueryKey, CacheEntry>>,
    in_flight: Arc<DashMap<QueryKey, SharedFetch>>,
    events: broadcast::Sender<CacheEvent>,
    config: QueryConfig,
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query client with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            cache: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            events,
            config,
        }
    }

    /// Gets the query configuration.
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Invalidates the cache for the given key, triggering refetch in active queries.
    ///
    /// This returns a `Command` that performs the invalidation as a side effect
    /// and produces no message.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// fn update(&mut self, msg: Message) -> Command<Message> {
    ///     match msg {
    ///         Message::UserUpdated => self.query_client.invalidate(["users", "123"]),
    ///     }
    /// }
    /// ```
    pub fn invalidate<Msg>(&self, key: impl Into<QueryKey>) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        let key = key.into();
        Command::effect(async move { client.invalidate_queries(&key) })
    }

    /// Removes cached data for the given key as a `Command`.
    pub fn remove<Msg>(&self, key: impl Into<QueryKey>) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        let key = key.into();
        Command::effect(async move { client.remove_queries(&key) })
    }

    /// Returns the cached data for `key`, if any is stored with type `T`.
    pub fn get_query_data<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.cache.get(key).and_then(|entry| entry.downcast::<T>())
    }

    /// Stores `data` for `key` and notifies queries watching that key.
    pub fn set_query_data<T>(&self, key: impl Into<QueryKey>, data: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = key.into();
        self.cache.insert(key.clone(), CacheEntry::new(Arc::new(data)));
        self.notify(CacheEvent::Updated(key));
    }

    /// Returns `true` if anything is cached for exactly `key`.
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Returns `true` if a fetch for `key` is currently in flight.
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Fetches `key` through `fetcher`, sharing the request with concurrent callers.
    ///
    /// If a fetch for the same key is already in flight, `fetcher` is not called
    /// and the caller waits for the running request instead. A successful value
    /// is stored in the cache before any caller observes it.
    pub async fn fetch<V, F>(&self, key: &QueryKey, fetcher: F) -> Result<V, QueryError>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V, QueryError>> + Send,
    {
        let shared = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| self.start_fetch(key.clone(), fetcher()))
            .value()
            .clone();

        let outcome = shared.clone().await;
        self.in_flight
            .remove_if(key, |_, current| current.ptr_eq(&shared));

        let value = outcome?;
        value.downcast_ref::<V>().cloned().ok_or_else(|| {
            QueryError::FetchError(format!("cached value for {key} has an unexpected type"))
        })
    }

    fn start_fetch<V>(
        &self,
        key: QueryKey,
        request: BoxFuture<'static, Result<V, QueryError>>,
    ) -> SharedFetch
    where
        V: Clone + Send + Sync + 'static,
    {
        let cache = self.cache.clone();
        tracing::debug!(%key, "fetch started");

        async move {
            match request.await {
                Ok(data) => {
                    let value: AnyValue = Arc::new(data);
                    cache.insert(key.clone(), CacheEntry::new(value.clone()));
                    tracing::debug!(%key, "fetch finished");
                    Ok(value)
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "fetch failed");
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Reads the cached value for `key` along with its staleness.
    pub(crate) fn cached<T>(&self, key: &QueryKey) -> Option<(T, bool)>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut entry = self.cache.get_mut(key)?;
        let is_stale = entry.check_staleness(self.config.stale_time);
        entry.downcast::<T>().map(|data| (data, is_stale))
    }

    /// Subscribes to cache notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub(crate) fn notify(&self, event: CacheEvent) {
        // No receivers simply means no active queries.
        let _ = self.events.send(event);
    }
}

impl QueryCache for QueryClient {
    fn invalidate_queries(&self, key: &QueryKey) {
        tracing::debug!(%key, "invalidating queries");
        for mut entry in self.cache.iter_mut() {
            if entry.key().starts_with(key) {
                entry.value_mut().mark_stale();
            }
        }
        self.notify(CacheEvent::Invalidated(key.clone()));
    }

    fn remove_queries(&self, key: &QueryKey) {
        tracing::debug!(%key, "removing queries");
        self.cache.retain(|cached, _| !cached.starts_with(key));
        self.notify(CacheEvent::Removed(key.clone()));
    }

    fn refetch_queries(&self, key: &QueryKey) {
        tracing::debug!(%key, "refetching queries");
        self.notify(CacheEvent::Refetch(key.clone()));
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("cached", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    #[test]
    fn test_query_client_new() {
        let client = QueryClient::new();
        assert_eq!(client.cache.len(), 0);
        assert_eq!(client.config.stale_time, Duration::from_secs(0));
    }

    #[test]
    fn test_query_client_with_config() {
        let client = QueryClient::with_config(QueryConfig::new(Duration::from_secs(30)));
        assert_eq!(client.config().stale_time, Duration::from_secs(30));
    }

    #[test]
    fn test_query_data_roundtrip() {
        let client = QueryClient::new();
        let key = QueryKey::from("key1");

        assert!(client.get_query_data::<i32>(&key).is_none());

        client.set_query_data(key.clone(), 42);
        assert_eq!(client.get_query_data::<i32>(&key), Some(42));
        assert_eq!(client.get_query_data::<String>(&key), None);
    }

    #[test]
    fn test_event_matching() {
        let item = QueryKey::from(["items", "1"]);
        let items = QueryKey::from("items");

        assert!(CacheEvent::Invalidated(items.clone()).affects(&item));
        assert!(CacheEvent::Removed(items.clone()).affects(&item));
        assert!(CacheEvent::Refetch(items.clone()).affects(&item));
        assert!(!CacheEvent::Updated(items.clone()).affects(&item));
        assert!(CacheEvent::Updated(item.clone()).affects(&item));
        assert!(!CacheEvent::Invalidated(item).affects(&items));
    }

    #[test]
    fn test_remove_queries_by_prefix() {
        let client = QueryClient::new();
        client.set_query_data(["items", "1"], 1);
        client.set_query_data(["items", "2"], 2);
        client.set_query_data("users", 3);

        client.remove_queries(&QueryKey::from("items"));

        assert!(!client.contains(&QueryKey::from(["items", "1"])));
        assert!(!client.contains(&QueryKey::from(["items", "2"])));
        assert!(client.contains(&QueryKey::from("users")));
    }

    #[test]
    fn test_invalidate_marks_stale() {
        let client = QueryClient::with_config(QueryConfig::new(Duration::from_secs(60)));
        let key = QueryKey::from(["items", "1"]);
        client.set_query_data(key.clone(), 1);

        assert_eq!(client.cached::<i32>(&key), Some((1, false)));
        client.invalidate_queries(&QueryKey::from("items"));
        assert_eq!(client.cached::<i32>(&key), Some((1, true)));
    }

    #[tokio::test]
    async fn test_invalidate_command_execution() {
        let client = QueryClient::new();
        let mut rx = client.subscribe();

        let cmd: Command<()> = client.invalidate("test-key");
        let messages = cmd.collect().await;
        assert!(messages.is_empty(), "invalidate should not produce any messages");

        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Should receive notification within timeout")
            .expect("Channel should not be closed");
        assert_eq!(event, CacheEvent::Invalidated(QueryKey::from("test-key")));
    }

    #[tokio::test]
    async fn test_remove_command_execution() {
        let client = QueryClient::new();
        client.set_query_data("test-key", 1);
        let mut rx = client.subscribe();

        let cmd: Command<()> = client.remove("test-key");
        assert!(cmd.collect().await.is_empty());
        assert!(!client.contains(&QueryKey::from("test-key")));

        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Should receive notification within timeout")
            .expect("Channel should not be closed");
        assert_eq!(event, CacheEvent::Removed(QueryKey::from("test-key")));
    }

    #[tokio::test]
    async fn test_fetch_caches_value() {
        let client = QueryClient::new();
        let key = QueryKey::from("answer");

        let value = client
            .fetch(&key, || Box::pin(async { Ok::<_, QueryError>(42) }))
            .await;

        assert_eq!(value, Ok(42));
        assert_eq!(client.get_query_data::<i32>(&key), Some(42));
        assert!(!client.is_fetching(&key));
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let client = QueryClient::new();
        let key = QueryKey::from("broken");

        let value = client
            .fetch(&key, || {
                Box::pin(async { Err::<i32, _>(QueryError::NetworkError("down".to_string())) })
            })
            .await;

        assert_eq!(value, Err(QueryError::NetworkError("down".to_string())));
        assert!(!client.contains(&key));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_deduplicated() {
        let client = QueryClient::new();
        let key = QueryKey::from("shared");
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let calls = calls.clone();
            client.fetch(&key, move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    let _ = release_rx.await;
                    Ok::<_, QueryError>(7)
                })
            })
        };
        let second = {
            let calls = calls.clone();
            client.fetch(&key, move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok::<_, QueryError>(8) })
            })
        };

        let release = async move {
            tokio::task::yield_now().await;
            let _ = release_tx.send(());
        };

        let (a, b, ()) = tokio::join!(first, second, release);
        assert_eq!(a, Ok(7));
        assert_eq!(b, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
