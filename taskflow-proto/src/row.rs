//! Remote row representation of a task.
//!
//! The hub stores tasks as flat, account-scoped rows with snake_case
//! string columns. Mapping between [`Task`] and [`TaskRow`] is pure field
//! renaming and formatting — no semantic transformation — and is lossless
//! in both directions. Decoding rejects out-of-vocabulary enum values and
//! unparseable dates instead of defaulting them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId, UnknownVariant};

/// Date column format for `due_date`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors produced when decoding a [`TaskRow`] into a [`Task`].
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    /// The `id` column is not a valid UUID.
    #[error("invalid task id {value:?}: {source}")]
    BadId {
        /// The rejected id column value.
        value: String,
        /// Underlying UUID parse error.
        source: uuid::Error,
    },

    /// An enum column holds a value outside its closed vocabulary.
    #[error(transparent)]
    BadVocabulary(#[from] UnknownVariant),

    /// A date or timestamp column failed to parse.
    #[error("invalid {column} value {value:?}")]
    BadDate {
        /// The offending column name.
        column: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// A task as stored in the hub: one row per task, keyed by `id`, scoped
/// by the `user_id` column for row-level isolation between accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    /// Task id (UUID string).
    pub id: String,
    /// Owning account identifier.
    pub user_id: String,
    /// Task title.
    pub title: String,
    /// Task description.
    pub description: String,
    /// Due date as `YYYY-MM-DD`, if any.
    pub due_date: Option<String>,
    /// Priority vocabulary string.
    pub priority: String,
    /// Category vocabulary string.
    pub category: String,
    /// Recurrence vocabulary string.
    pub recurrence: String,
    /// Completion flag.
    pub completed: bool,
    /// Completion timestamp (RFC 3339), `Some` iff `completed`.
    pub completed_at: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

impl TaskRow {
    /// Converts a task into its row shape for the given account.
    #[must_use]
    pub fn from_task(task: &Task, account_id: &str) -> Self {
        Self {
            id: task.id.to_string(),
            user_id: account_id.to_string(),
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
            priority: task.priority.to_string(),
            category: task.category.to_string(),
            recurrence: task.recurrence.to_string(),
            completed: task.completed,
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
            created_at: task.created_at.to_rfc3339(),
        }
    }

    /// Decodes this row back into a [`Task`].
    ///
    /// # Errors
    ///
    /// Returns a [`RowError`] if the id, a date column, or one of the
    /// vocabulary columns cannot be parsed.
    pub fn into_task(self) -> Result<Task, RowError> {
        let id: TaskId = self.id.parse().map_err(|source| RowError::BadId {
            value: self.id.clone(),
            source,
        })?;
        let due_date = self
            .due_date
            .map(|s| {
                NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|_| RowError::BadDate {
                    column: "due_date",
                    value: s,
                })
            })
            .transpose()?;
        let completed_at = self
            .completed_at
            .map(|s| parse_timestamp("completed_at", &s))
            .transpose()?;
        let created_at = parse_timestamp("created_at", &self.created_at)?;

        Ok(Task {
            id,
            title: self.title,
            description: self.description,
            due_date,
            priority: self.priority.parse()?,
            category: self.category.parse()?,
            recurrence: self.recurrence.parse()?,
            completed: self.completed,
            completed_at,
            created_at,
        })
    }
}

/// Parses an RFC 3339 timestamp column into UTC.
fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, RowError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| RowError::BadDate {
            column,
            value: value.to_string(),
        })
}
