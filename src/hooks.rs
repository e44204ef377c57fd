//! Controllers layered on the query layer.
//!
//! - [`UseQuery`]: one fetched resource with gated fetching, a derived
//!   `loading` flag, cache clearing and fetch callbacks
//! - [`UseFetchList`]: a fetched list with inert paging/sorting state and
//!   keyword filtering
//! - [`UseMutation`]: a write operation that can invalidate a related query
//!
//! Each controller is owned by the application model. Results flow back as
//! messages from its [`Subscription`](crate::subscription::Subscription) or
//! from the [`Command`](crate::Command)s it returns, and are recorded with
//! `update`.
//!
//! Errors follow one rule everywhere: with an `on_error` callback the error
//! is handled locally; without one it surfaces as the error state of the
//! result.

pub mod options;
mod use_fetch_list;
mod use_mutation;
mod use_query;

pub use options::QueryOptions;
pub use use_fetch_list::{FilterFn, ListState, UseFetchList, UseFetchListOptions};
pub use use_mutation::{
    MutationFn, OnMutate, OnMutationError, OnSuccess, UseMutation, UseMutationOptions,
};
pub use use_query::{OnFetchError, OnFetched, UseQuery, UseQueryOptions};
