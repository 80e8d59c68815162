//! Query bindings: per-consumer fetch lifecycle with caching and
//! automatic refetching.
//!
//! A [`Query`] owns the fetch lifecycle of one mounted consumer of a key:
//! it reads the cache on construction, runs the fetch, writes results back
//! into the shared [`QueryClient`](crate::client::QueryClient), and
//! refetches whenever its key is invalidated.
//!
//! # Design pattern: refetch on notify
//!
//! A notified binding re-runs its own fetch rather than passively
//! re-reading the cache. This keeps visually independent consumers of the
//! same resource in sync after any mutation, without central
//! coordination:
//!
//! 1. If cached data exists, it is visible immediately
//! 2. A fetch runs on every mount, refreshing whatever was cached
//! 3. When the key is invalidated, the binding refetches automatically
//!
//! A binding whose own fetch is in flight drops incoming notifications
//! instead of queueing them; it resumes accepting notifications once the
//! fetch settles.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use refetch::prelude::*;
//!
//! # async fn fetch_votes() -> Result<u32, QueryError> { Ok(0) }
//! # async fn run() {
//! let client = Arc::new(QueryClient::new());
//!
//! let votes = Query::new(
//!     query_key!["postVotes", 1],
//!     || Box::pin(fetch_votes()),
//!     client.clone(),
//! );
//!
//! let state = votes.state();
//! if state.is_loading() {
//!     // first load, nothing cached yet
//! } else if let Some(count) = &state.data {
//!     println!("votes: {count}");
//! }
//!
//! // elsewhere, after a mutation:
//! client.invalidate(&query_key!["postVotes", 1]);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

use crate::client::{QueryClient, QuerySubscription};
use crate::error::QueryError;
use crate::key::QueryKey;
use crate::options::QueryOptions;

type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync>;

/// The observable state of one [`Query`] binding.
#[derive(Debug, Clone)]
pub struct QueryState<V> {
    /// The last successfully fetched (or cached) value. Never cleared by a
    /// failed refetch; only overwritten by the next success.
    pub data: Option<V>,
    /// The rejection of the most recent failed fetch. Cleared at the start
    /// of every fetch attempt.
    pub error: Option<QueryError>,
    /// True until the first successful load, while fetching is enabled.
    pub is_pending: bool,
    /// True while a fetch for this binding is in flight.
    pub is_fetching: bool,
}

impl<V> QueryState<V> {
    /// Alias of [`is_pending`](Self::is_pending): true while no data has
    /// ever loaded and fetching is enabled.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.is_pending
    }

    /// Returns `true` if the most recent settled fetch failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns `true` once a value is available, cached or fetched.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.data.is_some()
    }
}

struct Shared<V> {
    key: QueryKey,
    client: Arc<QueryClient>,
    fetcher: Fetcher<V>,
    enabled: bool,
    fetch_in_progress: AtomicBool,
    state: watch::Sender<QueryState<V>>,
}

impl<V> Shared<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn execute(shared: &Arc<Self>) {
        if !shared.enabled {
            return;
        }
        // One fetch at a time per binding.
        if shared.fetch_in_progress.swap(true, Ordering::AcqRel) {
            return;
        }
        shared.state.send_modify(|state| {
            state.is_fetching = true;
            state.error = None;
        });
        trace!(key = shared.key.serialized(), "fetch started");

        match (shared.fetcher)().await {
            Ok(value) => {
                // The write broadcasts to every binding of this key,
                // including this one; the in-flight flag drops that
                // self-notification.
                shared.client.set_query_data(&shared.key, value.clone());
                shared.state.send_modify(|state| {
                    state.data = Some(value);
                    state.error = None;
                    state.is_pending = false;
                    state.is_fetching = false;
                });
            }
            Err(error) => {
                trace!(key = shared.key.serialized(), %error, "fetch failed");
                shared.state.send_modify(|state| {
                    state.error = Some(error);
                    state.is_pending = false;
                    state.is_fetching = false;
                });
            }
        }
        shared.fetch_in_progress.store(false, Ordering::Release);
    }
}

/// A live query binding for one mounted consumer of a key.
///
/// Constructing a binding subscribes it to invalidations of its key and,
/// when enabled, spawns an initial fetch; dropping it unsubscribes. A
/// fetch that is in flight when the binding is dropped still completes
/// and still writes the cache; only this binding's own state update is
/// discarded.
///
/// Bindings must be constructed and notified inside a tokio runtime.
pub struct Query<V> {
    shared: Arc<Shared<V>>,
    _subscription: QuerySubscription,
}

impl<V> Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a binding with default options and spawns its initial
    /// fetch.
    ///
    /// # Arguments
    ///
    /// * `key` - The key this binding observes
    /// * `fetcher` - An async function that fetches the data
    /// * `client` - The shared cache the binding reads and writes
    pub fn new<F>(key: QueryKey, fetcher: F, client: Arc<QueryClient>) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        Self::with_options(key, fetcher, client, QueryOptions::default())
    }

    /// Creates a binding with the given options.
    ///
    /// The cache is read immediately: a present entry seeds `data` and the
    /// binding starts settled; on a miss the binding starts pending. When
    /// enabled, an initial fetch is spawned regardless of cache presence,
    /// so mounted consumers always revalidate.
    pub fn with_options<F>(
        key: QueryKey,
        fetcher: F,
        client: Arc<QueryClient>,
        options: QueryOptions,
    ) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        let cached = client.get_query_data::<V>(&key);
        let initial = QueryState {
            is_pending: cached.is_none() && options.enabled,
            is_fetching: false,
            error: None,
            data: cached,
        };
        let (state, _) = watch::channel(initial);

        let shared = Arc::new(Shared {
            key,
            client,
            fetcher: Arc::new(fetcher),
            enabled: options.enabled,
            fetch_in_progress: AtomicBool::new(false),
            state,
        });

        let weak = Arc::downgrade(&shared);
        let subscription = shared.client.subscribe(&shared.key, move || {
            let Some(shared) = weak.upgrade() else { return };
            // Checked at notification time: a notification arriving while
            // this binding's own fetch is in flight is dropped, not queued.
            if shared.fetch_in_progress.load(Ordering::Acquire) {
                trace!(
                    key = shared.key.serialized(),
                    "notification dropped, fetch in flight"
                );
                return;
            }
            tokio::spawn(async move { Shared::execute(&shared).await });
        });

        if shared.enabled {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move { Shared::execute(&shared).await });
        }

        Self {
            shared,
            _subscription: subscription,
        }
    }

    /// The key this binding observes.
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        &self.shared.key
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> QueryState<V> {
        self.shared.state.borrow().clone()
    }

    /// Returns a receiver observing every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<QueryState<V>> {
        self.shared.state.subscribe()
    }

    /// Returns the binding's states as a stream; the current state is
    /// yielded first.
    #[must_use]
    pub fn updates(&self) -> WatchStream<QueryState<V>> {
        WatchStream::new(self.watch())
    }

    /// Re-runs the fetch, with the same semantics as an
    /// invalidation-triggered one: a no-op while the binding is disabled
    /// or a fetch is already in flight.
    pub async fn refetch(&self) {
        Shared::execute(&self.shared).await;
    }
}

impl<V> fmt::Debug for Query<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.shared.key)
            .field("enabled", &self.shared.enabled)
            .finish()
    }
}
