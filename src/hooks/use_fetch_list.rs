use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::Command;
use crate::query::{QueryClient, QueryError, QueryKey, QueryResult};
use crate::subscription::Subscription;

use super::options::QueryOptions;
use super::use_query::{UseQuery, UseQueryOptions};

/// Keyword filter: keeps `item` when it matches `keyword`.
pub type FilterFn<T> = Arc<dyn Fn(&T, &str) -> bool + Send + Sync>;

/// Construction options for [`UseFetchList`].
pub struct UseFetchListOptions<T> {
    query: UseQueryOptions<Vec<T>>,
    filter_fn: Option<FilterFn<T>>,
}

impl<T> UseFetchListOptions<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(key: impl Into<QueryKey>, fetch_fn: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Vec<T>, QueryError>> + Send + Sync + 'static,
    {
        Self {
            query: UseQueryOptions::new(key, fetch_fn),
            filter_fn: None,
        }
    }

    #[must_use]
    pub fn on_fetched(mut self, f: impl Fn(&Vec<T>) + Send + Sync + 'static) -> Self {
        self.query = self.query.on_fetched(f);
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&QueryError) + Send + Sync + 'static) -> Self {
        self.query = self.query.on_error(f);
        self
    }

    /// Filter used by [`UseFetchList::filtered`] while a search keyword is set.
    #[must_use]
    pub fn filter_fn(mut self, f: impl Fn(&T, &str) -> bool + Send + Sync + 'static) -> Self {
        self.filter_fn = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn auto_fetch(mut self, auto_fetch: bool) -> Self {
        self.query = self.query.auto_fetch(auto_fetch);
        self
    }

    #[must_use]
    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.query = self.query.refetch_interval(interval);
        self
    }

    #[must_use]
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.query = self.query.options(options);
        self
    }
}

/// Presentation state for a list. The controller stores it but never applies
/// sorting or paging; only `search` feeds [`UseFetchList::filtered`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListState {
    pub sort_by: Option<String>,
    pub asc: bool,
    pub page: u32,
    pub per_page: u32,
    pub total: u32,
    pub search: String,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            sort_by: None,
            asc: true,
            page: 1,
            per_page: 10,
            total: 0,
            search: String::new(),
        }
    }
}

/// Controller for a fetched list with client-side keyword filtering.
pub struct UseFetchList<T> {
    query: UseQuery<Vec<T>>,
    filter_fn: Option<FilterFn<T>>,
    state: ListState,
}

impl<T> UseFetchList<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(options: UseFetchListOptions<T>, client: Arc<QueryClient>) -> Self {
        Self {
            query: UseQuery::new(options.query, client),
            filter_fn: options.filter_fn,
            state: ListState::default(),
        }
    }

    /// The fetched items, empty when nothing has been fetched.
    pub fn data(&self) -> &[T] {
        self.query.data().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Items matching the current search keyword.
    ///
    /// Equals [`data`](Self::data) when the keyword is empty or no filter is set.
    pub fn filtered(&self) -> Vec<&T> {
        let data = self.data();
        match &self.filter_fn {
            Some(filter_fn) if !self.state.search.is_empty() => data
                .iter()
                .filter(|item| filter_fn(item, &self.state.search))
                .collect(),
            _ => data.iter().collect(),
        }
    }

    pub const fn state(&self) -> &ListState {
        &self.state
    }

    pub const fn state_mut(&mut self) -> &mut ListState {
        &mut self.state
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.state.search = search.into();
    }

    pub fn set_sort_by(&mut self, sort_by: Option<String>) {
        self.state.sort_by = sort_by;
    }

    pub const fn set_asc(&mut self, asc: bool) {
        self.state.asc = asc;
    }

    pub const fn set_page(&mut self, page: u32) {
        self.state.page = page;
    }

    pub const fn set_per_page(&mut self, per_page: u32) {
        self.state.per_page = per_page;
    }

    pub const fn set_total(&mut self, total: u32) {
        self.state.total = total;
    }

    /// The underlying single-resource controller.
    pub const fn query(&self) -> &UseQuery<Vec<T>> {
        &self.query
    }

    pub const fn key(&self) -> &QueryKey {
        self.query.key()
    }

    pub const fn is_enabled(&self) -> bool {
        self.query.is_enabled()
    }

    pub const fn should_run(&self) -> bool {
        self.query.should_run()
    }

    pub fn set_auto_fetch(&mut self, auto_fetch: bool) {
        self.query.set_auto_fetch(auto_fetch);
    }

    pub fn set_refetch_interval(&mut self, interval: Option<Duration>) {
        self.query.set_refetch_interval(interval);
    }

    pub fn subscription(&self) -> Option<Subscription<QueryResult<Option<Vec<T>>>>> {
        self.query.subscription()
    }

    pub fn refetch(&mut self) -> Command<QueryResult<Option<Vec<T>>>> {
        self.query.refetch()
    }

    pub fn clear(&mut self) {
        self.query.clear();
    }

    pub fn update(&mut self, result: QueryResult<Option<Vec<T>>>) {
        self.query.update(result);
    }

    pub const fn result(&self) -> &QueryResult<Option<Vec<T>>> {
        self.query.result()
    }

    pub const fn error(&self) -> Option<&QueryError> {
        self.query.error()
    }

    pub const fn loading(&self) -> bool {
        self.query.loading()
    }
}
