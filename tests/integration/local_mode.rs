//! Integration tests for local-only operation.
//!
//! No remote is ever linked: every mutation must land in the cache, and a
//! fresh coordinator over the same cache directory must see the same
//! state, like an app relaunch.

use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use taskflow::cache::LocalCache;
use taskflow::prefs::SortOrder;
use taskflow::remote::memory::MemoryRemote;
use taskflow::sync::SyncCoordinator;
use taskflow_proto::task::{Priority, Recurrence, TaskDraft};

fn coordinator_at(dir: &TempDir) -> SyncCoordinator<MemoryRemote> {
    let (tx, _rx) = mpsc::channel(64);
    SyncCoordinator::new(LocalCache::open(dir.path()), tx)
}

#[tokio::test]
async fn full_task_lifecycle_survives_restart() {
    let dir = TempDir::new().unwrap();

    let coordinator = coordinator_at(&dir);
    let errand = coordinator
        .add(TaskDraft::new("errand").with_priority(Priority::High))
        .await
        .unwrap();
    let chore = coordinator.add(TaskDraft::new("chore")).await.unwrap();

    coordinator
        .edit(&chore.id, TaskDraft::new("renamed chore"))
        .await
        .unwrap()
        .unwrap();
    coordinator.toggle(&errand.id).await.unwrap();

    // Relaunch: a new coordinator over the same directory.
    let relaunched = coordinator_at(&dir);
    let tasks = relaunched.tasks().await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "renamed chore");
    assert_eq!(tasks[1].title, "errand");
    assert!(tasks[1].completed);
    assert!(tasks[1].completed_at.is_some());
}

#[tokio::test]
async fn deletion_survives_restart_but_undo_still_works_in_window() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);

    let task = coordinator.add(TaskDraft::new("ephemeral")).await.unwrap();
    let ticket = coordinator.delete(&task.id).await.unwrap();

    assert!(coordinator_at(&dir).tasks().await.is_empty());

    assert!(coordinator.undo(ticket).await);
    assert_eq!(coordinator_at(&dir).tasks().await, vec![task]);
}

#[tokio::test]
async fn completing_recurring_task_persists_the_next_occurrence() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);

    let task = coordinator
        .add(
            TaskDraft::new("standup notes")
                .with_due_date("2025-03-14".parse().unwrap())
                .with_recurrence(Recurrence::Daily),
        )
        .await
        .unwrap();
    coordinator.toggle(&task.id).await.unwrap();

    let tasks = coordinator_at(&dir).tasks().await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].due_date, Some("2025-03-15".parse().unwrap()));
    assert!(!tasks[0].completed);
    assert!(tasks[1].completed);
}

#[tokio::test]
async fn sort_preference_survives_restart() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_at(&dir);
    coordinator.set_sort_order(SortOrder::Created);
    coordinator.set_dark_mode(true);

    let relaunched = coordinator_at(&dir);
    assert_eq!(relaunched.sort_order(), SortOrder::Created);
    assert!(relaunched.dark_mode());
}

#[tokio::test]
async fn corrupted_task_cache_degrades_to_empty_list() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("taskflow_tasks.json"), "<<garbage>>").unwrap();

    let coordinator = coordinator_at(&dir);
    assert!(coordinator.tasks().await.is_empty());

    // The next write repairs the cache.
    coordinator.add(TaskDraft::new("fresh start")).await.unwrap();
    assert_eq!(coordinator_at(&dir).tasks().await.len(), 1);
}

#[tokio::test]
async fn expired_undo_ticket_changes_nothing_after_restart() {
    let dir = TempDir::new().unwrap();
    let (tx, _rx) = mpsc::channel(64);
    let coordinator: SyncCoordinator<MemoryRemote> = SyncCoordinator::with_undo_window(
        LocalCache::open(dir.path()),
        tx,
        Duration::from_millis(10),
    );

    let task = coordinator.add(TaskDraft::new("brief")).await.unwrap();
    let ticket = coordinator.delete(&task.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!coordinator.undo(ticket).await);
    assert!(coordinator_at(&dir).tasks().await.is_empty());
}
