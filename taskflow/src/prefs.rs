//! Display preferences: the sort vocabulary and task ordering rules.

use serde::{Deserialize, Serialize};

use taskflow_proto::task::{Task, UnknownVariant};

/// Sort preference for the task list. Closed vocabulary, persisted under
/// the [`crate::cache::keys::SORT_BY`] cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Soonest due date first; tasks without a due date last.
    #[default]
    #[serde(rename = "dueDate")]
    DueDate,
    /// High priority first.
    #[serde(rename = "priority")]
    Priority,
    /// Most recently created first.
    #[serde(rename = "created")]
    Created,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DueDate => write!(f, "dueDate"),
            Self::Priority => write!(f, "priority"),
            Self::Created => write!(f, "created"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dueDate" => Ok(Self::DueDate),
            "priority" => Ok(Self::Priority),
            "created" => Ok(Self::Created),
            other => Err(UnknownVariant {
                kind: "sort order",
                value: other.to_string(),
            }),
        }
    }
}

/// Sorts tasks in place by the given order. The sort is stable, so ties
/// keep their list order (which is newest-prepended).
pub fn sort_tasks(tasks: &mut [Task], order: SortOrder) {
    match order {
        SortOrder::DueDate => {
            // None sorts after every real date.
            tasks.sort_by_key(|t| (t.due_date.is_none(), t.due_date));
        }
        SortOrder::Priority => {
            tasks.sort_by_key(|t| t.priority.rank());
        }
        SortOrder::Created => {
            tasks.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        }
    }
}
