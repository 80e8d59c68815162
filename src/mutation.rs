//! Mutation bindings: fire-and-forget write operations with observable
//! pending state.
//!
//! A [`Mutation`] runs an arbitrary async side-effecting operation and
//! exposes pending/data state plus success/error callbacks. Unlike
//! queries, mutations deliberately have no cache coupling of their own:
//! a caller that wants cache consistency after a write invalidates the
//! affected keys explicitly, typically from inside `on_success`.
//!
//! # Design pattern: fire and forget
//!
//! [`mutate`](Mutation::mutate) returns no future. The pending flag is
//! set before it returns; completion is observed through the callbacks or
//! the state surfaces. This keeps call sites free of await points in
//! render/update paths.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use refetch::prelude::*;
//!
//! # async fn submit_vote(post_id: u32) -> Result<u32, QueryError> { Ok(post_id) }
//! # fn run() {
//! let client = Arc::new(QueryClient::new());
//!
//! let vote = Mutation::new(|post_id: u32| Box::pin(submit_vote(post_id)))
//!     .on_success({
//!         let client = client.clone();
//!         move |_total, post_id| client.invalidate(&query_key!["postVotes", *post_id])
//!     });
//!
//! vote.mutate(1);
//! assert!(vote.state().is_pending);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

use crate::error::QueryError;

type Mutator<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync>;
type SuccessHandler<I, O> = Arc<dyn Fn(&O, &I) + Send + Sync>;
type ErrorHandler<I> = Arc<dyn Fn(&QueryError, &I) + Send + Sync>;

/// The observable state of one [`Mutation`] binding.
#[derive(Debug, Clone)]
pub struct MutationState<O> {
    /// The result of the most recent successful run. A failed run leaves
    /// it untouched.
    pub data: Option<O>,
    /// True from invocation until the operation settles.
    pub is_pending: bool,
}

impl<O> Default for MutationState<O> {
    fn default() -> Self {
        Self {
            data: None,
            is_pending: false,
        }
    }
}

/// A write-operation binding for one mounted consumer.
///
/// Each call site owns its own mutation state; two bindings built from
/// the same operation are fully independent.
///
/// Mutations must be invoked inside a tokio runtime.
pub struct Mutation<I, O> {
    mutator: Mutator<I, O>,
    on_success: Option<SuccessHandler<I, O>>,
    on_error: Option<ErrorHandler<I>>,
    state: watch::Sender<MutationState<O>>,
}

impl<I, O> Mutation<I, O>
where
    I: Clone + Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Creates a binding around the given async operation.
    pub fn new<F>(mutator: F) -> Self
    where
        F: Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync + 'static,
    {
        let (state, _) = watch::channel(MutationState::default());
        Self {
            mutator: Arc::new(mutator),
            on_success: None,
            on_error: None,
            state,
        }
    }

    /// Registers a callback invoked with the result and the variables
    /// after every successful run, before the pending flag clears.
    #[must_use]
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&O, &I) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Registers a callback invoked with the rejection and the variables
    /// after every failed run, before the pending flag clears.
    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&QueryError, &I) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Runs the operation with `variables`, fire-and-forget.
    ///
    /// The pending flag is set before this returns. On success `data` is
    /// set and `on_success` runs; on failure `on_error` runs and `data`
    /// is left untouched. Either way the pending flag clears last.
    pub fn mutate(&self, variables: I) {
        self.state.send_modify(|state| state.is_pending = true);

        let mutator = Arc::clone(&self.mutator);
        let on_success = self.on_success.clone();
        let on_error = self.on_error.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            match mutator(variables.clone()).await {
                Ok(data) => {
                    state.send_modify(|state| state.data = Some(data.clone()));
                    if let Some(on_success) = on_success {
                        on_success(&data, &variables);
                    }
                    state.send_modify(|state| state.is_pending = false);
                }
                Err(error) => {
                    trace!(%error, "mutation failed");
                    if let Some(on_error) = on_error {
                        on_error(&error, &variables);
                    }
                    state.send_modify(|state| state.is_pending = false);
                }
            }
        });
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> MutationState<O> {
        self.state.borrow().clone()
    }

    /// Returns a receiver observing every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<MutationState<O>> {
        self.state.subscribe()
    }

    /// Returns the binding's states as a stream; the current state is
    /// yielded first.
    #[must_use]
    pub fn updates(&self) -> WatchStream<MutationState<O>> {
        WatchStream::new(self.watch())
    }
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
