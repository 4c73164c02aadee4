//! Recurrence engine: pure date stepping and next-occurrence
//! materialization.
//!
//! [`next_occurrence`] advances a calendar date by one recurrence step
//! using calendar arithmetic (not fixed durations): stepping a day across
//! a month boundary carries into the next month, and stepping a month
//! from a day the target month doesn't have clamps to the month's last
//! day, chrono's standard normalization. Unparseable dates and unknown
//! rules never reach this module — the typed [`Recurrence`] and
//! `NaiveDate` boundary (draft validation, row decoding) rejects them.
//!
//! [`materialize_next`] is the policy half: completing a recurring task
//! with a due date produces exactly one fresh sibling, due one step after
//! the completed task's *old* due date. The completed task itself is never
//! rescheduled.

use chrono::{DateTime, Days, Months, NaiveDate, Utc};

use taskflow_proto::task::{Recurrence, Task, TaskId};

/// Returns the date one recurrence step after `date`, or `None` for
/// [`Recurrence::None`] (or the far edge of the supported calendar range).
#[must_use]
pub fn next_occurrence(date: NaiveDate, rule: Recurrence) -> Option<NaiveDate> {
    match rule {
        Recurrence::None => None,
        Recurrence::Daily => date.checked_add_days(Days::new(1)),
        Recurrence::Weekly => date.checked_add_days(Days::new(7)),
        Recurrence::Monthly => date.checked_add_months(Months::new(1)),
        Recurrence::Yearly => date.checked_add_months(Months::new(12)),
    }
}

/// Builds the next occurrence of a recurring task being completed.
///
/// Returns `None` unless the task has a non-`None` recurrence rule and a
/// due date. The sibling keeps the title, description, priority, category,
/// and recurrence of the original, gets a fresh id and `created_at`,
/// starts incomplete, and is due one step after the original's due date.
#[must_use]
pub fn materialize_next(task: &Task) -> Option<Task> {
    materialize_next_at(task, Utc::now())
}

/// Like [`materialize_next`] with an explicit creation timestamp.
#[must_use]
pub fn materialize_next_at(task: &Task, now: DateTime<Utc>) -> Option<Task> {
    let next_due = next_occurrence(task.due_date?, task.recurrence)?;
    Some(Task {
        id: TaskId::new(),
        title: task.title.clone(),
        description: task.description.clone(),
        due_date: Some(next_due),
        priority: task.priority,
        category: task.category,
        recurrence: task.recurrence,
        completed: false,
        completed_at: None,
        created_at: now,
    })
}
