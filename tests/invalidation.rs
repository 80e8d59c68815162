// Integration tests for invalidation scope: targeted vs. global
// broadcasts, and imperative cache writes propagating to mounted
// bindings.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use refetch::prelude::*;
use tokio::time::{sleep, timeout};

fn counting_fetcher(
    count: Arc<AtomicUsize>,
    value: u32,
) -> impl Fn() -> BoxFuture<'static, Result<u32, QueryError>> + Send + Sync + 'static {
    move || {
        count.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(value) })
    }
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    timeout(Duration::from_secs(1), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting until {what}"));
}

#[tokio::test]
async fn test_targeted_invalidation_refetches_only_that_key() {
    let client = Arc::new(QueryClient::new());
    let key_a = query_key!["posts"];
    let key_b = query_key!["users"];
    let fetches_a = Arc::new(AtomicUsize::new(0));
    let fetches_b = Arc::new(AtomicUsize::new(0));

    let _a = Query::new(
        key_a.clone(),
        counting_fetcher(Arc::clone(&fetches_a), 1),
        client.clone(),
    );
    let _b = Query::new(
        key_b.clone(),
        counting_fetcher(Arc::clone(&fetches_b), 2),
        client.clone(),
    );
    wait_until("both mount fetches ran", || {
        fetches_a.load(Ordering::SeqCst) == 1 && fetches_b.load(Ordering::SeqCst) == 1
    })
    .await;

    client.invalidate(&key_a);
    wait_until("posts binding refetched", || {
        fetches_a.load(Ordering::SeqCst) == 2
    })
    .await;

    sleep(Duration::from_millis(20)).await;
    assert_eq!(fetches_b.load(Ordering::SeqCst), 1, "unrelated key must not refetch");
}

#[tokio::test]
async fn test_global_invalidation_reaches_every_mounted_binding() {
    let client = Arc::new(QueryClient::new());
    let fetches_a = Arc::new(AtomicUsize::new(0));
    let fetches_b = Arc::new(AtomicUsize::new(0));
    let fetches_c = Arc::new(AtomicUsize::new(0));

    let _a = Query::new(
        query_key!["a"],
        counting_fetcher(Arc::clone(&fetches_a), 1),
        client.clone(),
    );
    let _b = Query::new(
        query_key!["b"],
        counting_fetcher(Arc::clone(&fetches_b), 2),
        client.clone(),
    );
    let unmounted = Query::new(
        query_key!["c"],
        counting_fetcher(Arc::clone(&fetches_c), 3),
        client.clone(),
    );
    wait_until("all mount fetches ran", || {
        fetches_a.load(Ordering::SeqCst) == 1
            && fetches_b.load(Ordering::SeqCst) == 1
            && fetches_c.load(Ordering::SeqCst) == 1
    })
    .await;

    drop(unmounted);
    client.invalidate_all();

    wait_until("both mounted bindings refetched", || {
        fetches_a.load(Ordering::SeqCst) == 2 && fetches_b.load(Ordering::SeqCst) == 2
    })
    .await;

    sleep(Duration::from_millis(20)).await;
    assert_eq!(
        fetches_c.load(Ordering::SeqCst),
        1,
        "unmounted binding must not be notified"
    );
}

#[tokio::test]
async fn test_global_invalidation_with_raw_listeners() {
    let client = Arc::new(QueryClient::new());
    let hits_a = Arc::new(AtomicUsize::new(0));
    let hits_b = Arc::new(AtomicUsize::new(0));
    let hits_gone = Arc::new(AtomicUsize::new(0));

    let _sub_a = {
        let hits_a = Arc::clone(&hits_a);
        client.subscribe(&query_key!["a"], move || {
            hits_a.fetch_add(1, Ordering::SeqCst);
        })
    };
    let _sub_b = {
        let hits_b = Arc::clone(&hits_b);
        client.subscribe(&query_key!["b"], move || {
            hits_b.fetch_add(1, Ordering::SeqCst);
        })
    };
    let sub_gone = {
        let hits_gone = Arc::clone(&hits_gone);
        client.subscribe(&query_key!["gone"], move || {
            hits_gone.fetch_add(1, Ordering::SeqCst);
        })
    };
    sub_gone.unsubscribe();

    client.invalidate_all();

    assert_eq!(hits_a.load(Ordering::SeqCst), 1);
    assert_eq!(hits_b.load(Ordering::SeqCst), 1);
    assert_eq!(hits_gone.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_imperative_write_is_visible_and_revalidates() {
    let client = Arc::new(QueryClient::new());
    let key = query_key!["profile"];
    let server = Arc::new(AtomicU32::new(1));
    let fetches = Arc::new(AtomicUsize::new(0));

    let fetcher = {
        let server = Arc::clone(&server);
        let fetches = Arc::clone(&fetches);
        move || {
            fetches.fetch_add(1, Ordering::SeqCst);
            let server = Arc::clone(&server);
            Box::pin(async move { Ok(server.load(Ordering::SeqCst)) })
                as BoxFuture<'static, Result<u32, QueryError>>
        }
    };
    let query = Query::new(key.clone(), fetcher, client.clone());
    wait_until("mount fetch ran", || fetches.load(Ordering::SeqCst) == 1).await;

    // Optimistic local update: visible in the same turn, then the
    // broadcast drives the binding to revalidate against the server.
    server.store(99, Ordering::SeqCst);
    client.set_query_data(&key, 99_u32);
    assert_eq!(client.get_query_data::<u32>(&key), Some(99));

    wait_until("binding revalidated", || fetches.load(Ordering::SeqCst) >= 2).await;

    let mut rx = query.watch();
    let state = timeout(
        Duration::from_secs(1),
        rx.wait_for(|state| state.data == Some(99)),
    )
    .await
    .expect("binding did not observe the refreshed value")
    .expect("state channel closed");
    assert!(!state.is_fetching);
}
