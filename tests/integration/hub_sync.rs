//! Integration tests against an in-process hub over real WebSockets.
//!
//! Exercises the whole stack: coordinator -> `WsRemote` -> wire codec ->
//! hub session handling -> change push back down to other sessions.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use taskflow::cache::LocalCache;
use taskflow::identity::AccountId;
use taskflow::remote::ws::WsRemote;
use taskflow::remote::{RemoteError, RemoteStore};
use taskflow::sync::SyncCoordinator;
use taskflow_proto::task::{Priority, Task, TaskDraft};

/// Start the hub in-process and return a ws:// URL.
async fn start_hub() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = taskflow_hub::hub::start_server("127.0.0.1:0")
        .await
        .expect("failed to start hub");
    (format!("ws://{addr}/ws"), handle)
}

fn coordinator_at(dir: &TempDir) -> SyncCoordinator<WsRemote> {
    let (tx, _rx) = mpsc::channel(64);
    SyncCoordinator::new(LocalCache::open(dir.path()), tx)
}

async fn connect(url: &str, account: &str) -> WsRemote {
    WsRemote::connect(url, AccountId::new(account))
        .await
        .expect("failed to connect to hub")
}

/// Polls `condition` until it holds or two seconds pass.
async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if condition().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within two seconds"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn crud_round_trips_through_the_hub() {
    let (url, _hub) = start_hub().await;
    let remote = connect(&url, "alice").await;

    let mut task = Task::from_draft(
        TaskDraft::new("wire me")
            .with_due_date("2025-04-01".parse().unwrap())
            .with_priority(Priority::High),
    )
    .unwrap();

    remote.insert(&task).await.unwrap();
    assert_eq!(remote.fetch_all().await.unwrap(), vec![task.clone()]);

    task.apply_draft(TaskDraft::new("rewired")).unwrap();
    remote.update(&task).await.unwrap();
    let fetched = remote.fetch_all().await.unwrap();
    assert_eq!(fetched[0].title, "rewired");
    assert_eq!(fetched[0].priority, Priority::Medium);

    remote.delete(&task.id).await.unwrap();
    assert!(remote.fetch_all().await.unwrap().is_empty());

    // Deleting again is not an error.
    remote.delete(&task.id).await.unwrap();
}

#[tokio::test]
async fn list_ids_matches_inserted_rows() {
    let (url, _hub) = start_hub().await;
    let remote = connect(&url, "alice").await;

    let one = Task::from_draft(TaskDraft::new("one")).unwrap();
    let two = Task::from_draft(TaskDraft::new("two")).unwrap();
    remote.insert_many(&[one.clone(), two.clone()]).await.unwrap();

    let mut ids = remote.list_ids().await.unwrap();
    ids.sort();
    let mut expected = vec![one.id.to_string(), two.id.to_string()];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn change_push_reaches_other_sessions_of_the_account() {
    let (url, _hub) = start_hub().await;

    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let writer = coordinator_at(&dir_a);
    let watcher = coordinator_at(&dir_b);

    writer
        .link_account(Arc::new(connect(&url, "alice").await))
        .await;
    watcher
        .link_account(Arc::new(connect(&url, "alice").await))
        .await;

    let task = writer.add(TaskDraft::new("hello, session two")).await.unwrap();

    wait_until(|| async { watcher.tasks().await.len() == 1 }).await;
    assert_eq!(watcher.tasks().await[0].id, task.id);

    writer.delete(&task.id).await.unwrap();
    wait_until(|| async { watcher.tasks().await.is_empty() }).await;
}

#[tokio::test]
async fn accounts_are_isolated() {
    let (url, _hub) = start_hub().await;

    let alice = connect(&url, "alice").await;
    let bob = connect(&url, "bob").await;
    let mut bob_changes = bob.changes();

    let task = Task::from_draft(TaskDraft::new("alice's secret")).unwrap();
    alice.insert(&task).await.unwrap();

    assert!(alice.fetch_all().await.unwrap().len() == 1);
    assert!(bob.fetch_all().await.unwrap().is_empty());
    assert!(bob.list_ids().await.unwrap().is_empty());
    // Alice's mutation must not ping Bob's change feed.
    assert!(bob_changes.try_recv().is_err());
}

#[tokio::test]
async fn migration_through_the_hub_is_idempotent() {
    let (url, _hub) = start_hub().await;
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    coordinator.add(TaskDraft::new("made offline")).await.unwrap();

    coordinator
        .link_account(Arc::new(connect(&url, "carol").await))
        .await;
    coordinator.unlink_account().await;
    coordinator
        .link_account(Arc::new(connect(&url, "carol").await))
        .await;

    assert_eq!(coordinator.tasks().await.len(), 1);
    let probe = connect(&url, "carol").await;
    assert_eq!(probe.list_ids().await.unwrap().len(), 1);
}

#[tokio::test]
async fn connecting_to_a_dead_hub_fails_fast() {
    let (url, hub) = start_hub().await;
    hub.abort();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = WsRemote::connect(&url, AccountId::new("alice")).await;
    assert!(matches!(
        result,
        Err(RemoteError::Unreachable(_) | RemoteError::Timeout | RemoteError::Closed)
    ));
}
