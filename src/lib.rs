//! # tears-query - cached queries and mutations for Elm-architecture apps
//!
//! tears-query provides query, list and mutation controllers on top of a small
//! caching layer, in the spirit of SWR or TanStack Query, for applications
//! built around a message loop (update function, commands, subscriptions).
//!
//! ## Architecture
//!
//! 1. **Query layer** ([`query`]): a shared [`QueryClient`](query::QueryClient)
//!    cache, [`Query`](query::Query) subscriptions that fetch and react to
//!    cache events, and one-shot [`Mutation`](query::Mutation)s
//! 2. **Controllers** ([`hooks`]): [`UseQuery`](hooks::UseQuery),
//!    [`UseFetchList`](hooks::UseFetchList) and [`UseMutation`](hooks::UseMutation)
//!    add fetch gating, derived loading state, keyword filtering, error
//!    defaults and invalidation on successful writes
//! 3. **Plumbing**: [`Command`](command::Command)s for side effects and
//!    [`Subscription`](subscription::Subscription)s for event sources, kept
//!    running by a [`SubscriptionManager`](subscription::SubscriptionManager)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tears_query::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Todo {
//!     id: u32,
//!     title: String,
//! }
//!
//! async fn fetch_todos() -> Result<Vec<Todo>, QueryError> {
//!     Ok(vec![Todo { id: 1, title: "write docs".to_string() }])
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(QueryClient::new());
//!     let mut todos = UseFetchList::new(
//!         UseFetchListOptions::new("todos", || Box::pin(fetch_todos()))
//!             .filter_fn(|todo: &Todo, keyword| todo.title.contains(keyword)),
//!         client,
//!     );
//!
//!     // Nothing runs until the first refetch
//!     assert!(todos.subscription().is_none());
//!
//!     for result in todos.refetch().collect().await {
//!         todos.update(result);
//!     }
//!
//!     todos.set_search("docs");
//!     assert_eq!(todos.filtered().len(), 1);
//! }
//! ```

pub mod command;
pub mod hooks;
pub mod prelude;
pub mod query;
pub mod subscription;

pub use command::Command;
