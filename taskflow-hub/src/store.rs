//! In-memory account-scoped row storage for the hub.
//!
//! The [`RowStore`] holds one map of task rows per account. Accounts are
//! fully isolated: no operation can observe or mutate another account's
//! rows. Updates are whole-record replacements (last writer wins at row
//! granularity), and deleting an absent row is not an error — clients
//! retry blindly and the operations must stay idempotent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use taskflow_proto::row::TaskRow;

/// In-memory task row store, keyed by account and row id.
///
/// Thread-safe via [`RwLock`]. Rows are ephemeral — lost on hub restart —
/// which is acceptable because every client keeps a durable local copy and
/// re-migrates on next sign-in.
#[derive(Default)]
pub struct RowStore {
    accounts: RwLock<HashMap<String, HashMap<String, TaskRow>>>,
}

impl RowStore {
    /// Creates a new, empty row store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all rows of an account, newest-created first.
    ///
    /// Rows with an unparseable `created_at` column sort last; ties break
    /// on the row id so the order is stable.
    pub async fn list(&self, account_id: &str) -> Vec<TaskRow> {
        let accounts = self.accounts.read().await;
        let Some(rows) = accounts.get(account_id) else {
            return Vec::new();
        };
        let mut rows: Vec<TaskRow> = rows.values().cloned().collect();
        rows.sort_by(|a, b| {
            created_key(b)
                .cmp(&created_key(a))
                .then_with(|| a.id.cmp(&b.id))
        });
        rows
    }

    /// Returns the ids of all rows of an account, in no particular order.
    pub async fn ids(&self, account_id: &str) -> Vec<String> {
        let accounts = self.accounts.read().await;
        accounts
            .get(account_id)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Inserts or replaces a single row, returning the account's new row count.
    pub async fn upsert(&self, account_id: &str, row: TaskRow) -> usize {
        let mut accounts = self.accounts.write().await;
        let rows = accounts.entry(account_id.to_string()).or_default();
        rows.insert(row.id.clone(), row);
        rows.len()
    }

    /// Inserts a batch of rows, returning the account's new row count.
    pub async fn upsert_many(&self, account_id: &str, batch: Vec<TaskRow>) -> usize {
        let mut accounts = self.accounts.write().await;
        let rows = accounts.entry(account_id.to_string()).or_default();
        for row in batch {
            rows.insert(row.id.clone(), row);
        }
        rows.len()
    }

    /// Deletes a row by id. Returns true if the row existed.
    pub async fn delete(&self, account_id: &str, id: &str) -> bool {
        let mut accounts = self.accounts.write().await;
        accounts
            .get_mut(account_id)
            .is_some_and(|rows| rows.remove(id).is_some())
    }
}

/// Sort key for newest-first ordering.
fn created_key(row: &TaskRow) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&row.created_at)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
