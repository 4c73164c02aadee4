//! The sync coordinator: local-first task mutations with best-effort
//! remote replication.
//!
//! Every mutation follows the same shape: validate, update the in-memory
//! list under its lock, persist the whole list to the cache, emit a
//! [`SyncEvent`], then push to the active remote if one is linked. Remote
//! failures are logged and dropped — the local state is already correct,
//! and the hub's change feed will reconcile whatever was missed once
//! connectivity returns.
//!
//! Reads never block on the network: `tasks()` serves the in-memory list,
//! which is the cache snapshot until a remote fetch replaces it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use taskflow_proto::task::{Task, TaskDraft, TaskId, ValidationError};

use crate::cache::{LocalCache, keys};
use crate::prefs::{SortOrder, sort_tasks};
use crate::recur::materialize_next;
use crate::remote::RemoteStore;
use crate::sync::{SyncEvent, ToggleOutcome, UndoTicket};

/// Default window during which a deletion can be undone.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(5);

/// Orchestrates the local cache, in-memory task list, and optional remote.
///
/// Mutations replace the persisted list wholesale, so concurrent readers
/// observe either the pre- or post-state, never a partial write. The
/// remote seam is account-scoped: linking installs an adapter already
/// bound to an account, unlinking drops it and falls back to local-only
/// operation.
pub struct SyncCoordinator<R: RemoteStore> {
    cache: LocalCache,
    tasks: Arc<Mutex<Vec<Task>>>,
    remote: Mutex<Option<Arc<R>>>,
    /// Handle of the spawned change-feed listener, if subscribed.
    subscription: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
    undo_window: Duration,
    events: mpsc::Sender<SyncEvent>,
}

impl<R: RemoteStore + 'static> SyncCoordinator<R> {
    /// Creates a coordinator over the given cache, loading the persisted
    /// task list eagerly.
    #[must_use]
    pub fn new(cache: LocalCache, events: mpsc::Sender<SyncEvent>) -> Self {
        Self::with_undo_window(cache, events, DEFAULT_UNDO_WINDOW)
    }

    /// Like [`SyncCoordinator::new`] with an explicit undo window.
    #[must_use]
    pub fn with_undo_window(
        cache: LocalCache,
        events: mpsc::Sender<SyncEvent>,
        undo_window: Duration,
    ) -> Self {
        let tasks: Vec<Task> = cache.get(keys::TASKS, Vec::new());
        Self {
            cache,
            tasks: Arc::new(Mutex::new(tasks)),
            remote: Mutex::new(None),
            subscription: parking_lot::Mutex::new(None),
            undo_window,
            events,
        }
    }

    /// A snapshot of the current task list, newest first.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    /// A snapshot of the current task list in the active sort order.
    pub async fn tasks_sorted(&self) -> Vec<Task> {
        let mut tasks = self.tasks().await;
        sort_tasks(&mut tasks, self.sort_order());
        tasks
    }

    /// Validates a draft and adds the resulting task to the front of the
    /// list.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the draft is invalid; nothing is
    /// stored in that case.
    pub async fn add(&self, draft: TaskDraft) -> Result<Task, ValidationError> {
        let task = Task::from_draft(draft)?;
        {
            let mut tasks = self.tasks.lock().await;
            tasks.insert(0, task.clone());
            self.persist(&tasks);
        }
        self.emit(SyncEvent::ListChanged);
        if let Some(remote) = self.active_remote().await {
            if let Err(e) = remote.insert(&task).await {
                tracing::warn!(id = %task.id, err = %e, "remote insert failed, keeping local copy");
            }
        }
        Ok(task)
    }

    /// Merges a draft into the task with the given id.
    ///
    /// Returns `Ok(None)` if no task has that id (for instance because a
    /// remote refresh removed it); the edit is then a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the draft is invalid; the stored
    /// record is untouched in that case.
    pub async fn edit(&self, id: &TaskId, draft: TaskDraft) -> Result<Option<Task>, ValidationError> {
        let draft = draft.validate()?;
        let edited = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.iter_mut().find(|t| t.id == *id) else {
                return Ok(None);
            };
            task.apply_draft(draft)?;
            let edited = task.clone();
            self.persist(&tasks);
            edited
        };
        self.emit(SyncEvent::ListChanged);
        if let Some(remote) = self.active_remote().await {
            if let Err(e) = remote.update(&edited).await {
                tracing::warn!(id = %edited.id, err = %e, "remote update failed, keeping local copy");
            }
        }
        Ok(Some(edited))
    }

    /// Flips the completion state of the task with the given id.
    ///
    /// Completing a recurring task with a due date also materializes its
    /// next occurrence and prepends it to the list. Returns `None` if no
    /// task has that id.
    pub async fn toggle(&self, id: &TaskId) -> Option<ToggleOutcome> {
        let outcome = {
            let mut tasks = self.tasks.lock().await;
            let task = tasks.iter_mut().find(|t| t.id == *id)?;
            task.set_completed(!task.completed, chrono::Utc::now());
            let toggled = task.clone();
            let next = if toggled.completed {
                materialize_next(&toggled)
            } else {
                None
            };
            if let Some(sibling) = &next {
                tasks.insert(0, sibling.clone());
            }
            self.persist(&tasks);
            ToggleOutcome {
                task: toggled,
                next,
            }
        };
        self.emit(SyncEvent::ListChanged);
        if let Some(remote) = self.active_remote().await {
            if let Err(e) = remote.update(&outcome.task).await {
                tracing::warn!(id = %outcome.task.id, err = %e, "remote update failed, keeping local copy");
            }
            // The next occurrence is its own record, inserted separately.
            if let Some(sibling) = &outcome.next {
                if let Err(e) = remote.insert(sibling).await {
                    tracing::warn!(id = %sibling.id, err = %e, "remote insert failed, keeping local copy");
                }
            }
        }
        Some(outcome)
    }

    /// Removes the task with the given id.
    ///
    /// Returns an [`UndoTicket`] redeemable until the undo window closes,
    /// or `None` if no task has that id.
    pub async fn delete(&self, id: &TaskId) -> Option<UndoTicket> {
        let removed = {
            let mut tasks = self.tasks.lock().await;
            let position = tasks.iter().position(|t| t.id == *id)?;
            let removed = tasks.remove(position);
            self.persist(&tasks);
            removed
        };
        self.emit(SyncEvent::ListChanged);
        if let Some(remote) = self.active_remote().await {
            if let Err(e) = remote.delete(id).await {
                tracing::warn!(id = %id, err = %e, "remote delete failed, keeping local removal");
            }
        }
        Some(UndoTicket {
            task: removed,
            deadline: tokio::time::Instant::now() + self.undo_window,
        })
    }

    /// Restores a deleted task if its undo window is still open.
    ///
    /// The record comes back exactly as it was removed, original id and
    /// `created_at` included. Returns `false` for an expired ticket.
    pub async fn undo(&self, ticket: UndoTicket) -> bool {
        if ticket.expired() {
            tracing::debug!(id = %ticket.task.id, "undo window closed, ignoring ticket");
            return false;
        }
        let task = ticket.task;
        {
            let mut tasks = self.tasks.lock().await;
            tasks.insert(0, task.clone());
            self.persist(&tasks);
        }
        self.emit(SyncEvent::ListChanged);
        if let Some(remote) = self.active_remote().await {
            if let Err(e) = remote.insert(&task).await {
                tracing::warn!(id = %task.id, err = %e, "remote insert failed, keeping local copy");
            }
        }
        true
    }

    /// Links an account-scoped remote and brings it in sync.
    ///
    /// In order: (1) migrate — insert every local task whose id is not yet
    /// on the remote, recomputed fresh so a retry after a failure is
    /// idempotent; (2) fetch — replace the local list with the remote
    /// snapshot; (3) subscribe — spawn a listener that re-fetches on every
    /// change signal. Migration completes before the subscription starts,
    /// so the migration's own change notifications cannot interleave with
    /// a half-built subscription.
    ///
    /// Any previous link is torn down first. Every remote failure here is
    /// absorbed: the coordinator stays usable on local state.
    pub async fn link_account(&self, remote: Arc<R>) {
        self.unlink_account().await;

        self.migrate(&remote).await;
        self.refresh_from(&remote).await;

        let mut changes = remote.changes();
        let tasks = Arc::clone(&self.tasks);
        let cache = self.cache.clone();
        let events = self.events.clone();
        let feed_remote = Arc::clone(&remote);
        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    // A lagged receiver dropped some signals; the re-fetch
                    // below covers them all anyway.
                    Ok(()) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        match feed_remote.fetch_all().await {
                            Ok(fresh) => {
                                let count = fresh.len();
                                let mut tasks = tasks.lock().await;
                                *tasks = fresh;
                                cache.set(keys::TASKS, &*tasks);
                                drop(tasks);
                                let _ = events.try_send(SyncEvent::Refreshed { count });
                            }
                            Err(e) => {
                                tracing::warn!(err = %e, "change-feed fetch failed, keeping local snapshot");
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *self.subscription.lock() = Some(handle);
        *self.remote.lock().await = Some(remote);
    }

    /// Unlinks the active remote, if any.
    ///
    /// Stops the change-feed listener and drops the adapter. The cache and
    /// in-memory list remain as the local fallback. Idempotent.
    pub async fn unlink_account(&self) {
        if let Some(handle) = self.subscription.lock().take() {
            handle.abort();
        }
        *self.remote.lock().await = None;
    }

    /// Whether a remote is currently linked.
    pub async fn is_linked(&self) -> bool {
        self.remote.lock().await.is_some()
    }

    /// The active sort preference.
    #[must_use]
    pub fn sort_order(&self) -> SortOrder {
        self.cache.get(keys::SORT_BY, SortOrder::default())
    }

    /// Persists a new sort preference.
    pub fn set_sort_order(&self, order: SortOrder) {
        self.cache.set(keys::SORT_BY, &order);
    }

    /// The persisted dark-mode flag.
    #[must_use]
    pub fn dark_mode(&self) -> bool {
        self.cache.get(keys::DARK_MODE, false)
    }

    /// Persists the dark-mode flag.
    pub fn set_dark_mode(&self, enabled: bool) {
        self.cache.set(keys::DARK_MODE, &enabled);
    }

    /// Pushes local tasks the remote does not have yet.
    ///
    /// The missing set is computed fresh from `list_ids` on every call, so
    /// repeating a migration (after a crash, a failure, or a sign-out and
    /// back in) inserts only what is still absent.
    async fn migrate(&self, remote: &Arc<R>) {
        let remote_ids = match remote.list_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(err = %e, "migration id listing failed, skipping migration");
                return;
            }
        };
        let remote_ids: std::collections::HashSet<String> = remote_ids.into_iter().collect();
        let missing: Vec<Task> = {
            let tasks = self.tasks.lock().await;
            tasks
                .iter()
                .filter(|t| !remote_ids.contains(&t.id.to_string()))
                .cloned()
                .collect()
        };
        if missing.is_empty() {
            return;
        }
        match remote.insert_many(&missing).await {
            Ok(()) => {
                tracing::info!(count = missing.len(), "migrated local tasks to remote");
            }
            Err(e) => {
                tracing::warn!(err = %e, "migration insert failed, will retry on next link");
            }
        }
    }

    /// Replaces the local list with the remote snapshot, if reachable.
    async fn refresh_from(&self, remote: &Arc<R>) {
        match remote.fetch_all().await {
            Ok(fresh) => {
                let count = fresh.len();
                let mut tasks = self.tasks.lock().await;
                *tasks = fresh;
                self.persist(&tasks);
                drop(tasks);
                self.emit(SyncEvent::Refreshed { count });
            }
            Err(e) => {
                tracing::warn!(err = %e, "initial fetch failed, serving local snapshot");
            }
        }
    }

    async fn active_remote(&self) -> Option<Arc<R>> {
        self.remote.lock().await.clone()
    }

    /// Writes the whole list to the cache. Faults are absorbed inside the
    /// cache layer.
    fn persist(&self, tasks: &[Task]) {
        self.cache.set(keys::TASKS, tasks);
    }

    fn emit(&self, event: SyncEvent) {
        // A full event buffer means the UI is behind; dropping is fine
        // because events carry no data the list itself doesn't.
        let _ = self.events.try_send(event);
    }
}
