//! One-shot mutations for creating, updating, or deleting resources.
//!
//! Unlike queries, which are subscriptions, mutations are discrete side effects
//! with a clear start and end, so each operation returns a [`Command`]. After a
//! successful mutation you typically invalidate related queries so they refetch.
//!
//! # Example
//!
//! ```rust,ignore
//! use tears_query::prelude::*;
//! use tears_query::query::Mutation;
//!
//! fn update(&mut self, msg: Message) -> Command<Message> {
//!     match msg {
//!         Message::UpdateUser(data) => Mutation::mutate(data, |input| {
//!             Box::pin(async move { update_user_api(input).await })
//!         })
//!         .map(|result| match result {
//!             Ok(user) => Message::UserUpdated(user),
//!             Err(e) => Message::UpdateFailed(e.to_string()),
//!         }),
//!         Message::UserUpdated(_) => self.query_client.invalidate(["users", "123"]),
//!         Message::UpdateFailed(_) => Command::none(),
//!     }
//! }
//! ```

use std::marker::PhantomData;

use futures::future::BoxFuture;

use crate::Command;

use super::error::QueryError;

/// The state of a mutation result.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    /// Mutation is idle (not yet started).
    Idle,
    /// Mutation is in progress.
    Loading,
    /// Mutation succeeded with a result.
    Success(T),
    /// Mutation failed with an error.
    Error(QueryError),
}

/// A mutation result containing the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult<T> {
    /// The current state of the mutation.
    pub state: MutationState<T>,
}

impl<T> MutationResult<T> {
    pub const fn new(state: MutationState<T>) -> Self {
        Self { state }
    }

    /// Returns the result data if the mutation succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            MutationState::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the error if the mutation failed.
    pub const fn error(&self) -> Option<&QueryError> {
        match &self.state {
            MutationState::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the mutation has not started.
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, MutationState::Idle)
    }

    /// Returns `true` if the mutation is currently loading.
    pub const fn is_loading(&self) -> bool {
        matches!(self.state, MutationState::Loading)
    }

    /// Returns `true` if the mutation succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, MutationState::Success(_))
    }

    /// Returns `true` if the mutation failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, MutationState::Error(_))
    }
}

impl<T> Default for MutationResult<T> {
    fn default() -> Self {
        Self::new(MutationState::Idle)
    }
}

impl<T> From<Result<T, QueryError>> for MutationResult<T> {
    fn from(result: Result<T, QueryError>) -> Self {
        match result {
            Ok(data) => Self::new(MutationState::Success(data)),
            Err(e) => Self::new(MutationState::Error(e)),
        }
    }
}

/// A mutation for performing data modifications.
///
/// Mutations don't maintain state or cache results; they run once and report.
pub struct Mutation<I, O> {
    _phantom: PhantomData<(I, O)>,
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Executes a mutation and returns a `Command`.
    ///
    /// The returned command produces `Result<O, QueryError>` which can be mapped
    /// to your application's message type using [`Command::map`].
    ///
    /// # Arguments
    ///
    /// * `input` - The input data for the mutation
    /// * `mutator` - An async function that performs the mutation
    pub fn mutate<F>(input: I, mutator: F) -> Command<Result<O, QueryError>>
    where
        F: FnOnce(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + 'static,
    {
        Command::future(async move { mutator(input).await })
    }
}
