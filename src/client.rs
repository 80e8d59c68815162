//! The shared query cache: entry store, listener registry, and
//! invalidation broadcaster.
//!
//! The [`QueryClient`] is the central state manager for queries. It holds
//! the last stored value per key, the listeners currently subscribed to
//! each key, and broadcasts invalidation notifications to them.
//!
//! One client is constructed at application start and handed to every
//! consumer as an `Arc`; tests construct their own independent clients.
//! Entries are never evicted; they live as long as the client does.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use refetch::{client::QueryClient, query_key};
//!
//! let client = Arc::new(QueryClient::new());
//! let key = query_key!["post", 1];
//!
//! client.set_query_data(&key, "hello".to_string());
//! assert_eq!(client.get_query_data::<String>(&key).as_deref(), Some("hello"));
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, trace, warn};

use crate::key::QueryKey;

type Listener = Arc<dyn Fn() + Send + Sync>;

/// The shared cache store and invalidation broadcaster.
///
/// Values are stored type-erased and typed again at the call site, so one
/// client serves every resource type in the application. All operations
/// are in-memory and cannot fail on their own; notification callbacks run
/// synchronously, each inside its own panic boundary.
///
/// Cloning is cheap and every clone shares the same cache and listeners.
#[derive(Clone)]
pub struct QueryClient {
    entries: Arc<DashMap<String, Box<dyn Any + Send + Sync>>>,
    listeners: Arc<DashMap<String, Vec<(u64, Listener)>>>,
    next_listener_id: Arc<AtomicU64>,
}

impl QueryClient {
    /// Creates an empty client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            listeners: Arc::new(DashMap::new()),
            next_listener_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the cached value for `key`, if present.
    ///
    /// Returns `None` when nothing has been stored under the key, or when
    /// the stored entry is of a different type than `V`.
    #[must_use]
    pub fn get_query_data<V>(&self, key: &QueryKey) -> Option<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.entries
            .get(key.serialized())
            .and_then(|entry| entry.downcast_ref::<V>().cloned())
    }

    /// Stores `value` under `key`, then synchronously notifies every
    /// listener of exactly that key, in registration order, before
    /// returning.
    pub fn set_query_data<V>(&self, key: &QueryKey, value: V)
    where
        V: Clone + Send + Sync + 'static,
    {
        trace!(key = key.serialized(), "set_query_data");
        self.entries
            .insert(key.serialized().to_owned(), Box::new(value));
        self.notify(key.serialized());
    }

    /// Updater form of [`set_query_data`](Self::set_query_data): `f`
    /// receives the current entry (if any) and produces the value to
    /// store. Store-and-broadcast semantics are identical.
    pub fn update_query_data<V, F>(&self, key: &QueryKey, f: F)
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce(Option<&V>) -> V,
    {
        let current = self.get_query_data::<V>(key);
        self.set_query_data(key, f(current.as_ref()));
    }

    /// Notifies every listener registered for `key`.
    ///
    /// The cache entry itself is untouched; each notified binding decides
    /// on its own whether to refetch.
    pub fn invalidate(&self, key: &QueryKey) {
        debug!(key = key.serialized(), "invalidate");
        self.notify(key.serialized());
    }

    /// Notifies every listener of every currently subscribed key.
    pub fn invalidate_all(&self) {
        debug!("invalidate_all");
        let mut notified: Vec<(String, Listener)> = Vec::new();
        for registered in self.listeners.iter() {
            notified.extend(
                registered
                    .value()
                    .iter()
                    .map(|(_, listener)| (registered.key().clone(), Arc::clone(listener))),
            );
        }
        for (key, listener) in notified {
            run_listener(&key, &listener);
        }
    }

    /// Registers `listener` for `key`.
    ///
    /// The listener is invoked, with no arguments, on every invalidation
    /// or write of the key. The returned subscription removes exactly this
    /// listener when dropped (or via
    /// [`unsubscribe`](QuerySubscription::unsubscribe)); the key's
    /// listener set is pruned once it becomes empty.
    #[must_use = "dropping the subscription immediately removes the listener"]
    pub fn subscribe<F>(&self, key: &QueryKey, listener: F) -> QuerySubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry(key.serialized().to_owned())
            .or_default()
            .push((id, Arc::new(listener)));
        trace!(key = key.serialized(), id, "subscribe");
        QuerySubscription {
            listeners: Arc::clone(&self.listeners),
            key: key.serialized().to_owned(),
            id,
        }
    }

    fn notify(&self, key: &str) {
        // Snapshot the listeners first: the registry lock is released
        // before any callback runs, so listeners may write to the cache or
        // manage subscriptions reentrantly. Listeners subscribed during the
        // broadcast are not notified by it.
        let listeners: Vec<Listener> = match self.listeners.get(key) {
            Some(registered) => registered
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect(),
            None => return,
        };
        for listener in &listeners {
            run_listener(key, listener);
        }
    }
}

/// Each listener runs inside its own panic boundary so one misbehaving
/// consumer cannot abort notification of the others.
fn run_listener(key: &str, listener: &Listener) {
    if panic::catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
        warn!(key, "listener panicked during invalidation");
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.entries.len())
            .field("subscribed_keys", &self.listeners.len())
            .finish()
    }
}

/// Disposer returned by [`QueryClient::subscribe`].
///
/// Removes exactly the listener it was created for when dropped.
#[must_use = "dropping the subscription immediately removes the listener"]
pub struct QuerySubscription {
    listeners: Arc<DashMap<String, Vec<(u64, Listener)>>>,
    key: String,
    id: u64,
}

impl QuerySubscription {
    /// Removes the listener now. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for QuerySubscription {
    fn drop(&mut self) {
        if let Entry::Occupied(mut registered) = self.listeners.entry(self.key.clone()) {
            registered.get_mut().retain(|(id, _)| *id != self.id);
            if registered.get().is_empty() {
                registered.remove();
            }
        }
        trace!(key = %self.key, id = self.id, "unsubscribe");
    }
}

impl fmt::Debug for QuerySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
