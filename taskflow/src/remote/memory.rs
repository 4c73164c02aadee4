//! In-process remote store.
//!
//! Backs the same trait the WebSocket adapter implements, but stores rows
//! in a local map. Used by integration tests and offline development; the
//! store round-trips every task through [`TaskRow`] so the persistence
//! mapping is exercised exactly as it is against a real hub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use taskflow_proto::row::TaskRow;
use taskflow_proto::task::{Task, TaskId};

use crate::identity::AccountId;
use crate::remote::{RemoteError, RemoteStore};

/// Account-scoped in-memory row store with an offline switch.
pub struct MemoryRemote {
    account: AccountId,
    rows: parking_lot::Mutex<HashMap<String, TaskRow>>,
    offline: AtomicBool,
    changes: broadcast::Sender<()>,
}

impl MemoryRemote {
    /// Creates an empty store scoped to `account`.
    #[must_use]
    pub fn new(account: AccountId) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            account,
            rows: parking_lot::Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            changes,
        }
    }

    /// Simulates losing (or regaining) connectivity: while offline, every
    /// operation fails with [`RemoteError::Unreachable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of rows currently stored.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    /// Stores a row directly, bypassing the trait surface. Lets tests
    /// stage state "already on the server" before a client connects.
    pub fn seed(&self, task: &Task) {
        let row = TaskRow::from_task(task, self.account.as_str());
        self.rows.lock().insert(row.id.clone(), row);
    }

    fn ensure_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable(
                "memory remote is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn notify(&self) {
        let _ = self.changes.send(());
    }
}

impl RemoteStore for MemoryRemote {
    async fn fetch_all(&self) -> Result<Vec<Task>, RemoteError> {
        self.ensure_online()?;
        let rows: Vec<TaskRow> = self.rows.lock().values().cloned().collect();
        let mut tasks = rows
            .into_iter()
            .map(TaskRow::into_task)
            .collect::<Result<Vec<_>, _>>()?;
        // Newest-created first, matching the hub's listing order.
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn list_ids(&self) -> Result<Vec<String>, RemoteError> {
        self.ensure_online()?;
        Ok(self.rows.lock().keys().cloned().collect())
    }

    async fn insert(&self, task: &Task) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let row = TaskRow::from_task(task, self.account.as_str());
        self.rows.lock().insert(row.id.clone(), row);
        self.notify();
        Ok(())
    }

    async fn insert_many(&self, tasks: &[Task]) -> Result<(), RemoteError> {
        self.ensure_online()?;
        if tasks.is_empty() {
            return Ok(());
        }
        {
            let mut rows = self.rows.lock();
            for task in tasks {
                let row = TaskRow::from_task(task, self.account.as_str());
                rows.insert(row.id.clone(), row);
            }
        }
        self.notify();
        Ok(())
    }

    async fn update(&self, task: &Task) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let row = TaskRow::from_task(task, self.account.as_str());
        self.rows.lock().insert(row.id.clone(), row);
        self.notify();
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let existed = self.rows.lock().remove(&id.to_string()).is_some();
        if existed {
            self.notify();
        }
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    fn account_id(&self) -> &AccountId {
        &self.account
    }
}
