// Integration tests for UseQuery driven through a SubscriptionManager

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use color_eyre::eyre::{Result, eyre};
use tears_query::prelude::*;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep, timeout};

type Message = QueryResult<Option<usize>>;

// Helper: options whose fetcher counts its calls
fn counting(key: &str, calls: Arc<AtomicUsize>) -> UseQueryOptions<usize> {
    UseQueryOptions::new(key, move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move { Ok(n) })
    })
}

// Helper: waits for the next message
async fn recv(rx: &mut mpsc::UnboundedReceiver<Message>) -> Result<Message> {
    timeout(Duration::from_secs(2), rx.recv())
        .await?
        .ok_or_else(|| eyre!("channel closed"))
}

// Helper: feeds messages into the controller until it reports success or error
async fn settle(query: &mut UseQuery<usize>, rx: &mut mpsc::UnboundedReceiver<Message>) -> Result<()> {
    loop {
        let msg = recv(rx).await?;
        let done = msg.is_success() || msg.is_error();
        query.update(msg);
        if done {
            return Ok(());
        }
    }
}

#[tokio::test]
async fn test_disabled_query_never_fetches() {
    let client = Arc::new(QueryClient::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let query = UseQuery::new(counting("idle", calls.clone()), client);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut manager = SubscriptionManager::new(tx);
    manager.update(query.subscription());

    sleep(Duration::from_millis(50)).await;
    assert!(manager.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refetch_enables_subscription() -> Result<()> {
    let client = Arc::new(QueryClient::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = UseQuery::new(counting("manual", calls.clone()), client);

    for result in query.refetch().collect().await {
        query.update(result);
    }
    assert_eq!(query.data(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = SubscriptionManager::new(tx);
    manager.update(query.subscription());
    assert_eq!(manager.len(), 1);

    // Subscription shows the cached value while revalidating it
    let first = recv(&mut rx).await?;
    assert_eq!(first.data(), Some(&Some(1)));
    query.update(first);
    assert!(query.loading());

    settle(&mut query, &mut rx).await?;
    assert_eq!(query.data(), Some(&2));
    assert!(!query.loading());
    Ok(())
}

#[tokio::test]
async fn test_auto_fetch_toggle_starts_fetching() -> Result<()> {
    let client = Arc::new(QueryClient::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = UseQuery::new(counting("toggle", calls.clone()), client);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = SubscriptionManager::new(tx);
    manager.update(query.subscription());
    assert!(manager.is_empty());

    query.set_auto_fetch(true);
    assert!(query.is_enabled());
    manager.update(query.subscription());

    let loading = recv(&mut rx).await?;
    assert!(loading.is_loading());
    query.update(loading);
    assert!(query.loading());

    settle(&mut query, &mut rx).await?;
    assert_eq!(query.data(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    query.set_auto_fetch(false);
    manager.update(query.subscription());
    assert!(manager.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_refetch_interval_runs_while_disabled() -> Result<()> {
    let client = Arc::new(QueryClient::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = UseQuery::new(
        counting("poll", calls.clone()).refetch_interval(Duration::from_millis(20)),
        client,
    );
    assert!(!query.is_enabled());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = SubscriptionManager::new(tx);
    manager.update(query.subscription());

    settle(&mut query, &mut rx).await?;
    settle(&mut query, &mut rx).await?;
    settle(&mut query, &mut rx).await?;

    assert!(calls.load(Ordering::SeqCst) >= 3);
    assert!(query.data().is_some_and(|n| *n >= 3));
    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_on_fetched_once_per_fetch() -> Result<()> {
    let client = Arc::new(QueryClient::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let fetched = Arc::new(Mutex::new(Vec::new()));
    let recorder = fetched.clone();
    let mut query = UseQuery::new(
        counting("observed", calls.clone())
            .auto_fetch(true)
            .on_fetched(move |n| recorder.lock().unwrap().push(*n)),
        client.clone(),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = SubscriptionManager::new(tx);
    manager.update(query.subscription());
    settle(&mut query, &mut rx).await?;
    assert_eq!(*fetched.lock().unwrap(), vec![1]);

    client.invalidate_queries(query.key());
    settle(&mut query, &mut rx).await?;

    assert_eq!(*fetched.lock().unwrap(), vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(query.data(), Some(&2));
    Ok(())
}

#[tokio::test]
async fn test_unhandled_error_reaches_error_state() -> Result<()> {
    let client = Arc::new(QueryClient::new());
    let mut query: UseQuery<usize> = UseQuery::new(
        UseQueryOptions::new("broken", || {
            Box::pin(async { Err(QueryError::NetworkError("offline".to_string())) })
        })
        .auto_fetch(true),
        client,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = SubscriptionManager::new(tx);
    manager.update(query.subscription());
    settle(&mut query, &mut rx).await?;

    assert_eq!(
        query.error(),
        Some(&QueryError::NetworkError("offline".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn test_handled_error_reports_no_data() -> Result<()> {
    let client = Arc::new(QueryClient::new());
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();
    let mut query: UseQuery<usize> = UseQuery::new(
        UseQueryOptions::new("quiet", || {
            Box::pin(async { Err(QueryError::NetworkError("offline".to_string())) })
        })
        .auto_fetch(true)
        .on_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        client,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = SubscriptionManager::new(tx);
    manager.update(query.subscription());
    settle(&mut query, &mut rx).await?;

    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert!(query.result().is_success());
    assert_eq!(query.error(), None);
    assert_eq!(query.data(), None);
    Ok(())
}

#[tokio::test]
async fn test_clear_respects_auto_fetch() {
    let client = Arc::new(QueryClient::new());
    let key = QueryKey::from("cleared");
    client.set_query_data(key.clone(), Some(1_usize));

    let mut manual = UseQuery::new(counting("cleared", Arc::new(AtomicUsize::new(0))), client.clone());
    drop(manual.refetch());
    manual.clear();
    assert!(!manual.is_enabled());
    assert!(manual.subscription().is_none());
    assert!(!client.contains(&key));

    client.set_query_data(key.clone(), Some(1_usize));
    let mut automatic = UseQuery::new(
        counting("cleared", Arc::new(AtomicUsize::new(0))).auto_fetch(true),
        client.clone(),
    );
    automatic.clear();
    assert!(automatic.is_enabled());
    assert!(automatic.subscription().is_some());
    assert!(!client.contains(&key));
}
