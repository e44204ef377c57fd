use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::Command;
use crate::query::{
    Fetcher, Query, QueryCache, QueryClient, QueryError, QueryKey, QueryResult, QueryState,
};
use crate::subscription::Subscription;

use super::options::QueryOptions;

/// Called with every successfully fetched value.
pub type OnFetched<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Called with a fetch error. Its presence marks the error as handled.
pub type OnFetchError = Arc<dyn Fn(&QueryError) + Send + Sync>;

/// Construction options for [`UseQuery`].
pub struct UseQueryOptions<T> {
    pub(super) key: QueryKey,
    pub(super) fetch_fn: Fetcher<T>,
    pub(super) on_fetched: Option<OnFetched<T>>,
    pub(super) on_error: Option<OnFetchError>,
    pub(super) options: QueryOptions,
}

impl<T> UseQueryOptions<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(key: impl Into<QueryKey>, fetch_fn: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            fetch_fn: Arc::new(fetch_fn),
            on_fetched: None,
            on_error: None,
            options: QueryOptions::default(),
        }
    }

    /// Runs `f` with each fetched value before the result is reported.
    #[must_use]
    pub fn on_fetched(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_fetched = Some(Arc::new(f));
        self
    }

    /// Handles fetch errors with `f` instead of surfacing them as an error state.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&QueryError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub const fn auto_fetch(mut self, auto_fetch: bool) -> Self {
        self.options.auto_fetch = auto_fetch;
        self
    }

    #[must_use]
    pub const fn refetch_interval(mut self, interval: Duration) -> Self {
        self.options = self.options.refetch_interval(interval);
        self
    }

    #[must_use]
    pub const fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Wraps `fetch_fn` with the callbacks.
///
/// Errors still fail the fetch so nothing is cached for them; the query
/// decides how a handled error is reported.
fn with_callbacks<T>(
    fetch_fn: Fetcher<T>,
    on_fetched: Option<OnFetched<T>>,
    on_error: Option<OnFetchError>,
) -> Fetcher<Option<T>>
where
    T: Send + 'static,
{
    Arc::new(move || {
        let request = fetch_fn();
        let on_fetched = on_fetched.clone();
        let on_error = on_error.clone();

        async move {
            match request.await {
                Ok(data) => {
                    if let Some(on_fetched) = &on_fetched {
                        on_fetched(&data);
                    }
                    Ok(Some(data))
                }
                Err(e) => {
                    if let Some(on_error) = &on_error {
                        on_error(&e);
                    }
                    Err(e)
                }
            }
        }
        .boxed()
    })
}

/// Controller for a single fetched resource.
///
/// Owned by the application model. Fetching is gated: while disabled, the
/// controller contributes no subscription and nothing runs until
/// [`refetch`](Self::refetch) is called, unless a refetch interval is set.
///
/// ```rust,ignore
/// struct App {
///     user: UseQuery<User>,
/// }
///
/// impl App {
///     fn subscriptions(&self) -> Vec<Subscription<Message>> {
///         self.user.subscription().map(|s| s.map(Message::User)).into_iter().collect()
///     }
///
///     fn update(&mut self, msg: Message) -> Command<Message> {
///         match msg {
///             Message::Load => self.user.refetch().map(Message::User),
///             Message::User(result) => {
///                 self.user.update(result);
///                 Command::none()
///             }
///         }
///     }
/// }
/// ```
pub struct UseQuery<T> {
    query: Query<Option<T>>,
    options: QueryOptions,
    enabled: bool,
    result: QueryResult<Option<T>>,
}

impl<T> UseQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(options: UseQueryOptions<T>, client: Arc<QueryClient>) -> Self {
        let UseQueryOptions {
            key,
            fetch_fn,
            on_fetched,
            on_error,
            options,
        } = options;

        let handles_errors = on_error.is_some();
        let fetcher = with_callbacks(fetch_fn, on_fetched, on_error);
        let mut query =
            Query::with_fetcher(key, fetcher, client).refetch_interval(options.refetch_interval);
        if handles_errors {
            query = query.keep_data_on_error(None);
        }

        Self {
            query,
            enabled: options.auto_fetch,
            options,
            result: QueryResult::idle(),
        }
    }

    pub const fn key(&self) -> &QueryKey {
        self.query.key()
    }

    pub const fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Whether fetching has been enabled, automatically or by a refetch.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the query runs now. Polling overrides enablement.
    pub const fn should_run(&self) -> bool {
        self.options.polls() || self.enabled
    }

    /// Updates `auto_fetch`; a changed value resets enablement to match it.
    pub fn set_auto_fetch(&mut self, auto_fetch: bool) {
        if self.options.auto_fetch != auto_fetch {
            self.options.auto_fetch = auto_fetch;
            self.enabled = auto_fetch;
        }
    }

    /// Updates the polling interval.
    pub fn set_refetch_interval(&mut self, interval: Option<Duration>) {
        let interval = interval.filter(|d| !d.is_zero());
        if self.options.refetch_interval != interval {
            self.options.refetch_interval = interval;
            self.query = self.query.clone().refetch_interval(interval);
        }
    }

    /// The subscription driving this query, or `None` while it must not run.
    pub fn subscription(&self) -> Option<Subscription<QueryResult<Option<T>>>> {
        self.should_run().then(|| Subscription::new(self.query.clone()))
    }

    /// Enables the query and fetches it now.
    ///
    /// The returned command resolves to the fetch result, which should be fed
    /// back through [`update`](Self::update).
    pub fn refetch(&mut self) -> Command<QueryResult<Option<T>>> {
        self.enabled = true;
        self.result = match self.result.data().cloned() {
            Some(data) => QueryResult::new(QueryState::Refetching { data }),
            None => QueryResult::new(QueryState::Loading),
        };

        Command::future(self.query.fetch())
    }

    /// Removes the cached data for this key.
    ///
    /// Also disables fetching, unless `auto_fetch` is set.
    pub fn clear(&mut self) {
        if !self.options.auto_fetch {
            self.enabled = false;
        }
        self.query.client().remove_queries(self.query.key());
        self.result = QueryResult::idle();
    }

    /// Records a result produced by the subscription or a refetch.
    pub fn update(&mut self, result: QueryResult<Option<T>>) {
        self.result = result;
    }

    pub const fn result(&self) -> &QueryResult<Option<T>> {
        &self.result
    }

    /// The fetched value. `None` before the first fetch, or after a handled
    /// error when nothing was cached.
    pub fn data(&self) -> Option<&T> {
        self.result.data().and_then(Option::as_ref)
    }

    /// The error of an unhandled fetch failure.
    pub const fn error(&self) -> Option<&QueryError> {
        self.result.error()
    }

    /// `true` during the initial load or any fetch in flight.
    pub const fn loading(&self) -> bool {
        self.result.is_loading() || self.result.is_fetching() || self.result.is_refetching()
    }
}
