use std::time::Duration;

use bson::doc;
use docmock_core::{error::MockError, scheduler::FlushDelay};
use docmock_memory::Reference;
use futures::{FutureExt, StreamExt};

fn numbers() -> Reference {
    Reference::root(
        "numbers",
        doc! {
            "a": { "n": 1 },
            "b": { "n": 2 },
            "c": { "n": 3 },
        },
    )
}

#[tokio::test]
async fn test_get_stays_pending_until_flush() {
    let items = numbers();
    items.auto_flush(false);

    let mut pending = items.get();
    assert!((&mut pending).now_or_never().is_none());
    assert_eq!(items.flush_queue().len(), 1);

    items.flush(None);
    let snapshot = pending.now_or_never().unwrap().unwrap();
    assert_eq!(snapshot.size(), 3);
}

#[tokio::test]
async fn test_flush_resolves_in_fifo_order() {
    let items = numbers();
    let first = items.limit(1).get();
    let second = items.order_by("n").limit(2).get();
    let third = items.filter("n", "==", 3).get();

    let methods: Vec<String> = items
        .flush_queue()
        .into_iter()
        .map(|operation| operation.method)
        .collect();
    assert_eq!(methods, vec!["get", "get", "get"]);

    items.flush(None);

    assert_eq!(first.await.unwrap().keys(), vec!["a"]);
    assert_eq!(second.await.unwrap().keys(), vec!["a", "b"]);
    assert_eq!(third.await.unwrap().keys(), vec!["c"]);
}

#[tokio::test]
async fn test_queue_is_shared_across_the_tree() {
    let root = Reference::root(
        "root",
        doc! { "users": { "u1": { "n": 1 } }, "posts": { "p1": { "n": 1 } } },
    );
    let users = root.child("users");
    let posts = root.child("posts");

    let mut from_users = users.get();
    let mut from_posts = posts.order_by("n").get();
    assert_eq!(root.flush_queue().len(), 2);

    posts.flush(None);

    assert_eq!((&mut from_users).now_or_never().unwrap().unwrap().keys(), vec!["u1"]);
    assert_eq!((&mut from_posts).now_or_never().unwrap().unwrap().keys(), vec!["p1"]);
}

#[tokio::test]
async fn test_separate_trees_have_separate_queues() {
    let left = numbers();
    let right = numbers();

    let mut pending = left.get();
    right.flush(None);

    assert!((&mut pending).now_or_never().is_none());
    assert!(right.flush_queue().is_empty());
    assert_eq!(left.flush_queue().len(), 1);
}

#[tokio::test]
async fn test_reads_see_data_at_flush_time() {
    let items = numbers();
    let pending = items.get();

    items.set_data(doc! { "z": { "n": 26 } });
    items.flush(None);

    assert_eq!(pending.await.unwrap().keys(), vec!["z"]);
}

#[tokio::test]
async fn test_auto_flush_resolves_immediately() {
    let items = numbers();
    items.auto_flush(true);

    let mut pending = items.order_by("n").get();
    assert!(items.flush_queue().is_empty());
    assert_eq!((&mut pending).now_or_never().unwrap().unwrap().keys(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_auto_flush_propagates_through_the_tree() {
    let root = Reference::root("root", doc! { "users": { "u1": { "n": 1 } } });
    let users = root.child("users");

    users.auto_flush(true);
    assert_eq!(root.flush_delay(), FlushDelay::Immediate);

    root.auto_flush(false);
    assert_eq!(users.flush_delay(), FlushDelay::Disabled);

    let mut pending = users.get();
    assert!((&mut pending).now_or_never().is_none());
}

#[tokio::test]
async fn test_query_nodes_inherit_auto_flush() {
    let items = numbers();
    items.auto_flush(true);

    let query = items.order_by("n").limit(1);
    assert_eq!(query.flush_delay(), FlushDelay::Immediate);

    let mut pending = query.get();
    assert!((&mut pending).now_or_never().is_some());
}

#[tokio::test]
async fn test_auto_flush_reaches_queries_built_earlier() {
    let items = numbers();
    let query = items.order_by("n").limit(1);

    items.auto_flush(true);
    assert_eq!(query.flush_delay(), FlushDelay::Immediate);

    let mut pending = query.get();
    assert_eq!((&mut pending).now_or_never().unwrap().unwrap().keys(), vec!["a"]);
}

#[tokio::test]
async fn test_dropping_every_handle_rejects_pending_reads() {
    let items = numbers();
    let pending = items.get();
    let query = items.filter("n", "==", 2).get();

    drop(items);
    assert!(matches!(pending.await, Err(MockError::Dropped(_))));
    assert!(matches!(query.await, Err(MockError::Dropped(_))));
}

#[tokio::test]
async fn test_pending_reads_survive_while_a_handle_remains() {
    let root = Reference::root("root", doc! { "users": { "u1": { "n": 1 } } });
    let users = root.child("users");
    let mut pending = users.get();

    drop(root);
    assert!((&mut pending).now_or_never().is_none());

    users.flush(None);
    assert_eq!(pending.await.unwrap().keys(), vec!["u1"]);
}

#[tokio::test]
async fn test_delayed_flush_waits_for_the_clock() {
    let items = numbers();

    let mut pending = items.get();
    items.flush(Duration::from_millis(100));
    assert!((&mut pending).now_or_never().is_none());

    items.advance(Duration::from_millis(99));
    assert!((&mut pending).now_or_never().is_none());

    items.advance(Duration::from_millis(1));
    assert_eq!(pending.now_or_never().unwrap().unwrap().size(), 3);
}

#[tokio::test]
async fn test_auto_flush_with_delay() {
    let items = numbers();
    items.auto_flush(Duration::from_millis(10));

    let mut pending = items.get();
    assert!((&mut pending).now_or_never().is_none());

    items.advance(Duration::from_millis(10));
    assert!((&mut pending).now_or_never().is_some());
}

#[tokio::test]
async fn test_injected_error_fires_once() {
    let items = numbers();
    items.fail_next("get", MockError::Injected("boom".to_string()));

    let first = items.get();
    let second = items.get();
    items.flush(None);

    assert_eq!(first.await.unwrap_err(), MockError::Injected("boom".to_string()));
    assert_eq!(second.await.unwrap().size(), 3);
}

#[tokio::test]
async fn test_injected_error_is_taken_when_get_is_called() {
    let items = numbers();
    let before = items.get();

    items.fail_next("get", MockError::Backend("unavailable".to_string()));
    let after = items.get();
    items.flush(None);

    assert!(before.await.is_ok());
    assert!(matches!(after.await, Err(MockError::Backend(_))));
}

#[tokio::test]
async fn test_injected_errors_belong_to_one_node() {
    let items = numbers();
    items.fail_next("get", MockError::Injected("boom".to_string()));

    let query = items.order_by("n");
    let pending = query.get();
    query.flush(None);

    assert!(pending.await.is_ok());
}

#[tokio::test]
async fn test_stream_emits_documents_in_order() {
    let items = numbers();
    let stream = items.order_by_with("n", docmock_core::query::SortDirection::Desc).stream();
    items.flush(None);

    let ids: Vec<String> = stream
        .map(|doc| doc.unwrap().id().to_string())
        .collect()
        .await;
    assert_eq!(ids, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_stream_is_empty_until_flushed() {
    let items = numbers();
    let mut stream = items.stream();

    assert!(stream.next().now_or_never().is_none());

    items.flush(None);
    assert_eq!(stream.collect::<Vec<_>>().await.len(), 3);
}

#[tokio::test]
async fn test_stream_forwards_injected_errors() {
    let items = numbers();
    items.fail_next("get", MockError::Injected("boom".to_string()));

    let stream = items.stream();
    items.flush(None);

    let items: Vec<_> = stream.collect().await;
    assert_eq!(items, vec![Err(MockError::Injected("boom".to_string()))]);
}
