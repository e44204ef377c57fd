//! Query and mutation support with caching.
//!
//! This module provides subscription-based queries and command-based mutations,
//! similar to SWR or TanStack Query. It is the layer the controllers in
//! [`crate::hooks`] are built on.
//!
//! # Features
//!
//! - **Queries**: Subscription-based data fetching with caching, polling and refetching
//! - **Mutations**: Command-based data modifications
//! - **Cache management**: Invalidation, removal and refetch requests by key prefix
//! - **Deduplication**: Concurrent fetches of one key share a single request
//!
//! # Example
//!
//! ```rust,ignore
//! use tears_query::prelude::*;
//! use tears_query::query::{Query, QueryClient, QueryResult};
//! use std::sync::Arc;
//!
//! struct App {
//!     query_client: Arc<QueryClient>,
//!     user: QueryResult<User>,
//! }
//!
//! impl App {
//!     fn subscriptions(&self) -> Vec<Subscription<Message>> {
//!         vec![
//!             Subscription::new(Query::new(
//!                 ["users", "123"],
//!                 || Box::pin(fetch_user()),
//!                 self.query_client.clone(),
//!             ))
//!             .map(Message::UserQuery),
//!         ]
//!     }
//!
//!     fn update(&mut self, msg: Message) -> Command<Message> {
//!         match msg {
//!             Message::UserQuery(result) => {
//!                 self.user = result;
//!                 Command::none()
//!             }
//!             Message::RefreshUser => self.query_client.invalidate(["users", "123"]),
//!         }
//!     }
//! }
//! ```

mod cache;
mod client;
mod config;
mod error;
mod key;
pub mod mutation;
pub mod observer;

pub use client::{CacheEvent, QueryCache, QueryClient};
pub use config::QueryConfig;
pub use error::QueryError;
pub use key::QueryKey;
pub use mutation::{Mutation, MutationResult, MutationState};
pub use observer::{Fetcher, Query, QueryResult, QueryState};
