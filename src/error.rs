//! The rejection type surfaced by fetchers and mutators.

use thiserror::Error;

/// An error produced by a fetch or mutation function.
///
/// The engine performs no wrapping, classification, or retry: whatever
/// message the supplied function rejected with is what consumers observe,
/// through [`QueryState::error`](crate::query::QueryState::error) for
/// queries or the `on_error` callback for mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct QueryError(String);

impl QueryError {
    /// Creates an error carrying the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The message this error was created with.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueryError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for QueryError {
    fn from(message: String) -> Self {
        Self(message)
    }
}
