//! Prelude module for convenient imports.
//!
//! ```
//! use tears_query::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`Command`] - For performing side effects
//! - [`Subscription`] and [`SubscriptionManager`] - For running queries
//! - [`QueryClient`], [`QueryKey`], [`QueryResult`], [`QueryError`] - The query layer
//! - [`UseQuery`], [`UseFetchList`], [`UseMutation`] and their options - The controllers

pub use crate::command::Command;
pub use crate::hooks::{
    ListState, QueryOptions, UseFetchList, UseFetchListOptions, UseMutation, UseMutationOptions,
    UseQuery, UseQueryOptions,
};
pub use crate::query::{
    MutationResult, QueryCache, QueryClient, QueryError, QueryKey, QueryResult, QueryState,
};
pub use crate::subscription::{Subscription, SubscriptionManager};
