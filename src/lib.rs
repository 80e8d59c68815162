//! # Refetch - Reactive Query Cache
//!
//! Refetch is a key-addressed reactive data cache with per-key
//! publish/subscribe and per-consumer fetch-lifecycle orchestration,
//! similar to SWR or TanStack Query. It underlies a UI layer's data
//! fetching: screens construct query bindings, mutations invalidate
//! keys, and every mounted binding of an invalidated key refetches on
//! its own.
//!
//! ## Architecture
//!
//! 1. **Client**: One shared [`QueryClient`](client::QueryClient) holds
//!    the cache entries and the per-key listener sets, and broadcasts
//!    invalidations
//! 2. **Keys**: A [`QueryKey`](key::QueryKey) is an ordered segment
//!    sequence with a deterministic serialization
//! 3. **Queries**: A [`Query`](query::Query) binding fetches on mount,
//!    writes results into the cache, and refetches when its key is
//!    invalidated
//! 4. **Mutations**: A [`Mutation`](mutation::Mutation) binding runs a
//!    write operation; its `on_success` callback typically invalidates
//!    the affected keys
//!
//! ## Core Components
//!
//! - [`QueryClient`](client::QueryClient): The shared cache store and
//!   invalidation broadcaster
//! - [`Query`](query::Query): The per-consumer fetch lifecycle state
//!   machine
//! - [`Mutation`](mutation::Mutation): The per-consumer write-operation
//!   state machine
//! - [`query_key!`]: Builds mixed-type query keys
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use refetch::prelude::*;
//!
//! # async fn fetch_votes() -> Result<u32, QueryError> { Ok(0) }
//! # async fn submit_vote(delta: i32) -> Result<u32, QueryError> { Ok(1) }
//! #[tokio::main]
//! async fn main() {
//!     // Constructed once at application start, passed to every screen.
//!     let client = Arc::new(QueryClient::new());
//!
//!     let votes = Query::new(
//!         query_key!["postVotes", 1],
//!         || Box::pin(fetch_votes()),
//!         client.clone(),
//!     );
//!
//!     let vote = Mutation::new(|delta: i32| Box::pin(submit_vote(delta)))
//!         .on_success({
//!             let client = client.clone();
//!             move |_total, _delta| client.invalidate(&query_key!["postVotes", 1])
//!         });
//!
//!     // The mutation's success invalidates the key; the mounted query
//!     // binding refetches and its observers see the refreshed state.
//!     vote.mutate(1);
//!
//!     let state = votes.state();
//!     if state.is_loading() {
//!         println!("loading");
//!     } else if let Some(count) = state.data {
//!         println!("votes: {count}");
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod key;
pub mod mutation;
pub mod options;
pub mod prelude;
pub mod query;
