use thiserror::Error;

/// Error type for query and mutation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Fetch failed: {0}")]
    FetchError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Mutation failed: {0}")]
    MutationError(String),
}
