use std::{sync::Arc, time::Duration};

use bytesize::ByteSize;
use common::{DESTINATION, call_sizes, create_bulk_indexer, settle};
use serde_json::json;
use sluice_indexer_core::IndexerOptions;
use sluice_store::InMemoryStore;
use tokio::time::Instant;

mod common;

#[tokio::test(start_paused = true)]
async fn test_size_threshold_then_timer() {
    let store = Arc::new(InMemoryStore::new());
    let (task, client, ct) =
        create_bulk_indexer(store.clone(), IndexerOptions::default().with_max_batch_size(3));
    let start = Instant::now();

    for n in 1..=5 {
        client.enqueue(DESTINATION, &json!({ "n": n }));
    }
    settle().await;

    // The third record crossed the threshold. The last two wait for the timer.
    let calls = store.calls().await;
    assert_eq!(call_sizes(&calls), vec![3]);
    assert_eq!(calls[0].started_at, start);

    tokio::time::sleep(Duration::from_secs(1)).await;

    let calls = store.calls().await;
    assert_eq!(call_sizes(&calls), vec![3, 2]);
    assert_eq!(calls[1].started_at - start, Duration::from_secs(1));

    let documents = store.documents(DESTINATION).await;
    let expected = (1..=5)
        .map(|n| serde_json::to_vec(&json!({ "n": n })).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        documents.iter().map(|d| d.to_vec()).collect::<Vec<_>>(),
        expected
    );

    ct.cancel();
    task.await.expect("indexer task");
}

#[tokio::test(start_paused = true)]
async fn test_byte_threshold() {
    let store = Arc::new(InMemoryStore::new());
    let options = IndexerOptions::default().with_max_batch_bytes(ByteSize::kib(2));
    let (task, client, ct) = create_bulk_indexer(store.clone(), options);
    let _ct_guard = ct.drop_guard();

    let message = "x".repeat(1000);
    client.enqueue(DESTINATION, &json!({ "message": message }));
    settle().await;
    assert!(store.calls().await.is_empty());

    client.enqueue(DESTINATION, &json!({ "message": message }));
    settle().await;

    let calls = store.calls().await;
    assert_eq!(call_sizes(&calls), vec![2]);

    drop(client);
    task.await.expect("indexer task");
}

#[tokio::test(start_paused = true)]
async fn test_no_flush_before_interval() {
    let store = Arc::new(InMemoryStore::new());
    let options = IndexerOptions::default().with_flush_interval(Duration::from_millis(500));
    let (task, client, ct) = create_bulk_indexer(store.clone(), options);
    let start = Instant::now();

    for n in 0..10 {
        client.enqueue(DESTINATION, &json!({ "n": n }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The timer was armed by the first record and is not pushed back by later ones.
    tokio::time::sleep_until(start + Duration::from_millis(499)).await;
    assert!(store.calls().await.is_empty());

    tokio::time::sleep(Duration::from_millis(2)).await;
    let calls = store.calls().await;
    assert_eq!(call_sizes(&calls), vec![10]);
    assert_eq!(calls[0].started_at - start, Duration::from_millis(500));

    ct.cancel();
    task.await.expect("indexer task");
}

#[tokio::test(start_paused = true)]
async fn test_timer_rearms_for_new_records() {
    let store = Arc::new(InMemoryStore::new());
    let (task, client, ct) = create_bulk_indexer(store.clone(), IndexerOptions::default());

    client.enqueue(DESTINATION, &json!({ "n": 1 }));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(call_sizes(&store.calls().await), vec![1]);

    let second = Instant::now();
    client.enqueue(DESTINATION, &json!({ "n": 2 }));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let calls = store.calls().await;
    assert_eq!(call_sizes(&calls), vec![1, 1]);
    assert_eq!(calls[1].started_at - second, Duration::from_secs(1));

    ct.cancel();
    task.await.expect("indexer task");
}
