//! Integration tests for account linking against an in-process remote.
//!
//! Uses [`MemoryRemote`] so every scenario — idempotent migration, remote
//! push refetch, offline degradation — runs without a server.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use taskflow::cache::LocalCache;
use taskflow::identity::{AccountId, IdentityProvider, LocalIdentity};
use taskflow::remote::memory::MemoryRemote;
use taskflow::remote::RemoteStore;
use taskflow::sync::{run_identity, SyncCoordinator};
use taskflow_proto::task::TaskDraft;

fn coordinator_at(dir: &TempDir) -> SyncCoordinator<MemoryRemote> {
    let (tx, _rx) = mpsc::channel(64);
    SyncCoordinator::new(LocalCache::open(dir.path()), tx)
}

fn remote() -> Arc<MemoryRemote> {
    Arc::new(MemoryRemote::new(AccountId::new("acct-1")))
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
async fn linking_migrates_local_tasks() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    coordinator.add(TaskDraft::new("pre-link one")).await.unwrap();
    coordinator.add(TaskDraft::new("pre-link two")).await.unwrap();

    let remote = remote();
    coordinator.link_account(Arc::clone(&remote)).await;

    assert_eq!(remote.row_count(), 2);
    assert_eq!(coordinator.tasks().await.len(), 2);
}

#[tokio::test]
async fn migration_is_idempotent_across_relinks() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    coordinator.add(TaskDraft::new("only once")).await.unwrap();

    let remote = remote();
    coordinator.link_account(Arc::clone(&remote)).await;
    coordinator.unlink_account().await;
    coordinator.link_account(Arc::clone(&remote)).await;
    coordinator.link_account(Arc::clone(&remote)).await;

    assert_eq!(remote.row_count(), 1);
    assert_eq!(coordinator.tasks().await.len(), 1);
}

#[tokio::test]
async fn failed_migration_retries_cleanly_on_next_link() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    coordinator.add(TaskDraft::new("stranded")).await.unwrap();

    let remote = remote();
    remote.set_offline(true);
    coordinator.link_account(Arc::clone(&remote)).await;
    assert_eq!(remote.row_count(), 0);
    assert_eq!(coordinator.tasks().await.len(), 1);

    remote.set_offline(false);
    coordinator.link_account(Arc::clone(&remote)).await;
    assert_eq!(remote.row_count(), 1);
}

#[tokio::test]
async fn remote_push_replaces_local_list() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let writer = coordinator_at(&dir_a);
    let watcher = coordinator_at(&dir_b);

    let remote = remote();
    writer.link_account(Arc::clone(&remote)).await;
    watcher.link_account(Arc::clone(&remote)).await;

    let task = writer.add(TaskDraft::new("pushed across")).await.unwrap();

    wait_until(|| async { watcher.tasks().await.len() == 1 }).await;
    assert_eq!(watcher.tasks().await[0].id, task.id);

    // The push-side refetch also lands in the watcher's cache.
    assert_eq!(coordinator_at(&dir_b).tasks().await.len(), 1);

    writer.delete(&task.id).await.unwrap();
    wait_until(|| async { watcher.tasks().await.is_empty() }).await;
}

#[tokio::test]
async fn offline_fetch_keeps_local_snapshot() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    coordinator.add(TaskDraft::new("still here")).await.unwrap();

    let remote = remote();
    remote.seed(&taskflow_proto::task::Task::from_draft(TaskDraft::new("remote-only")).unwrap());
    remote.set_offline(true);
    coordinator.link_account(Arc::clone(&remote)).await;

    let tasks = coordinator.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "still here");
}

#[tokio::test]
async fn writes_survive_remote_outage() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    let remote = remote();
    coordinator.link_account(Arc::clone(&remote)).await;

    remote.set_offline(true);
    let task = coordinator.add(TaskDraft::new("queued nowhere")).await.unwrap();
    coordinator
        .edit(&task.id, TaskDraft::new("still editable"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(remote.row_count(), 0);
    let tasks = coordinator.tasks().await;
    assert_eq!(tasks[0].title, "still editable");
}

#[tokio::test]
async fn undo_restores_the_row_remotely() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    let remote = remote();
    coordinator.link_account(Arc::clone(&remote)).await;

    let task = coordinator.add(TaskDraft::new("resurrect me")).await.unwrap();
    let ticket = coordinator.delete(&task.id).await.unwrap();
    assert_eq!(remote.row_count(), 0);

    assert!(coordinator.undo(ticket).await);
    assert_eq!(remote.row_count(), 1);
    let restored = remote.fetch_all().await.unwrap();
    assert_eq!(restored[0].id, task.id);
    assert_eq!(restored[0].created_at, task.created_at);
}

#[tokio::test]
async fn identity_transitions_drive_link_state() {
    let dir = TempDir::new().unwrap();
    let coordinator = Arc::new(coordinator_at(&dir));
    let identity = Arc::new(LocalIdentity::new());
    let remote = remote();

    let connect = {
        let remote = Arc::clone(&remote);
        move |_account: AccountId| {
            let remote = Arc::clone(&remote);
            async move { Ok(remote) }
        }
    };
    let driver = tokio::spawn(run_identity(
        Arc::clone(&coordinator),
        Arc::clone(&identity),
        connect,
    ));

    // Signing in links the account and pushes local state through.
    identity.sign_in("acct-1", "secret").unwrap();
    wait_until(|| async { coordinator.is_linked().await }).await;
    coordinator.add(TaskDraft::new("while linked")).await.unwrap();
    assert_eq!(remote.row_count(), 1);

    // Signing out unlinks; later writes stay local.
    identity.sign_out().unwrap();
    wait_until(|| async { !coordinator.is_linked().await }).await;
    coordinator.add(TaskDraft::new("after sign-out")).await.unwrap();
    assert_eq!(remote.row_count(), 1);
    assert_eq!(coordinator.tasks().await.len(), 2);

    driver.abort();
}

#[tokio::test]
async fn unlink_is_idempotent_and_restores_local_mode() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    let remote = remote();
    coordinator.link_account(Arc::clone(&remote)).await;

    coordinator.unlink_account().await;
    coordinator.unlink_account().await;
    assert!(!coordinator.is_linked().await);

    // Mutations keep working locally and never reach the old remote.
    coordinator.add(TaskDraft::new("signed out")).await.unwrap();
    assert_eq!(remote.row_count(), 0);
}
