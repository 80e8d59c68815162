//! Prelude module for convenient imports.
//!
//! ```
//! use refetch::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`QueryClient`] - The shared cache store and invalidation broadcaster
//! - [`Query`] / [`QueryState`] / [`QueryOptions`] - Query bindings
//! - [`Mutation`] / [`MutationState`] - Mutation bindings
//! - [`QueryKey`] / [`KeySegment`] / [`query_key!`] - Key construction
//! - [`QueryError`] - The rejection type surfaced by fetchers and mutators

pub use crate::client::{QueryClient, QuerySubscription};
pub use crate::error::QueryError;
pub use crate::key::{KeySegment, QueryKey};
pub use crate::mutation::{Mutation, MutationState};
pub use crate::options::QueryOptions;
pub use crate::query::{Query, QueryState};
pub use crate::query_key;
