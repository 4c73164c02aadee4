//! Synchronization layer for `TaskFlow`.
//!
//! The [`SyncCoordinator`] orchestrates the local-first pipeline: every
//! mutation lands in memory and the [`crate::cache::LocalCache`] first,
//! then flows to the active [`crate::remote::RemoteStore`] best-effort.
//! Remote pushes come back as change signals answered with a full
//! re-fetch. [`run_identity`] maps identity transitions onto the
//! coordinator's link state for resident callers.

pub mod coordinator;

pub use coordinator::SyncCoordinator;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use taskflow_proto::task::Task;

use crate::identity::{AccountId, IdentityEvent, IdentityProvider};
use crate::remote::{RemoteError, RemoteStore};

/// Events emitted by the [`SyncCoordinator`] for UI notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The task list changed through a local mutation.
    ListChanged,
    /// The task list was replaced by a remote snapshot.
    Refreshed {
        /// Number of tasks in the new snapshot.
        count: usize,
    },
}

/// Proof of a recent deletion, redeemable for its reversal.
///
/// Carries the exact removed record and the deadline until which
/// [`SyncCoordinator::undo`] will restore it. The deadline makes the undo
/// window trivially cancellable: an expired ticket is simply worthless.
#[derive(Debug, Clone)]
pub struct UndoTicket {
    pub(crate) task: Task,
    pub(crate) deadline: tokio::time::Instant,
}

impl UndoTicket {
    /// The deleted record this ticket can restore.
    #[must_use]
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Whether the undo window has already closed.
    #[must_use]
    pub fn expired(&self) -> bool {
        tokio::time::Instant::now() >= self.deadline
    }
}

/// Result of toggling a task's completion state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// The record after the flip.
    pub task: Task,
    /// The next occurrence materialized by completing a recurring task,
    /// if one was produced.
    pub next: Option<Task>,
}

/// Drives the coordinator's link state from identity transitions.
///
/// Links the account already signed in at startup, then follows the
/// provider's event stream: `SignedIn` connects a remote via `connect` and
/// links it, `SignedOut` unlinks. A failed connect leaves the coordinator
/// unlinked (local-only) rather than synced to a stale account. Runs until
/// the provider's event channel closes; resident callers spawn it for
/// their lifetime.
pub async fn run_identity<R, P, C, F>(
    coordinator: Arc<SyncCoordinator<R>>,
    provider: Arc<P>,
    connect: C,
) where
    R: RemoteStore + 'static,
    P: IdentityProvider + ?Sized,
    C: Fn(AccountId) -> F + Send,
    F: Future<Output = Result<Arc<R>, RemoteError>> + Send,
{
    let mut events = provider.events();
    if let Some(account) = provider.current() {
        link(&coordinator, &connect, account).await;
    }
    loop {
        match events.recv().await {
            Ok(IdentityEvent::SignedIn(account)) => {
                link(&coordinator, &connect, account).await;
            }
            Ok(IdentityEvent::SignedOut) => {
                coordinator.unlink_account().await;
            }
            Err(RecvError::Lagged(skipped)) => {
                // Missed transitions; the current identity is the truth.
                tracing::warn!(skipped, "identity events lagged, resyncing");
                match provider.current() {
                    Some(account) => link(&coordinator, &connect, account).await,
                    None => coordinator.unlink_account().await,
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn link<R, C, F>(coordinator: &SyncCoordinator<R>, connect: &C, account: AccountId)
where
    R: RemoteStore + 'static,
    C: Fn(AccountId) -> F,
    F: Future<Output = Result<Arc<R>, RemoteError>>,
{
    match connect(account.clone()).await {
        Ok(remote) => {
            coordinator.link_account(remote).await;
        }
        Err(e) => {
            tracing::warn!(account = %account, err = %e, "connect failed, staying local-only");
            coordinator.unlink_account().await;
        }
    }
}
