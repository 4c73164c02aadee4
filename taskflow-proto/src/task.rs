//! Core task model for `TaskFlow`.
//!
//! Defines the [`Task`] record, its closed vocabularies ([`Priority`],
//! [`Category`], [`Recurrence`]), and the validated [`TaskDraft`] input
//! shape used by add/edit operations. Vocabularies are tagged enums, not
//! open strings, so an out-of-vocabulary value is a parse error at the
//! boundary rather than a silent fallback inside the sync layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed task title length in characters (after trimming).
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum allowed task description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Unique identifier for a task, based on UUID v7 for time-ordering.
///
/// Generated client-side at creation and immutable afterwards; it is the
/// join key between the local cache copy and the remote row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Error returned when a string is outside one of the closed vocabularies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind} value: {value:?}")]
pub struct UnknownVariant {
    /// Which vocabulary was being parsed ("priority", "category", ...).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Task priority. Closed vocabulary; default is `Medium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Highest urgency, sorted first.
    High,
    /// Normal urgency.
    #[default]
    Medium,
    /// Lowest urgency, sorted last.
    Low,
}

impl Priority {
    /// Sort rank: high before medium before low.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(UnknownVariant {
                kind: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// Task category. Closed vocabulary; default is `Personal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Personal errands and life admin.
    #[default]
    Personal,
    /// Work tasks.
    Work,
    /// Health and fitness.
    Health,
    /// Shopping lists.
    Shopping,
    /// Everything else.
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Personal => write!(f, "personal"),
            Self::Work => write!(f, "work"),
            Self::Health => write!(f, "health"),
            Self::Shopping => write!(f, "shopping"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(Self::Personal),
            "work" => Ok(Self::Work),
            "health" => Ok(Self::Health),
            "shopping" => Ok(Self::Shopping),
            "other" => Ok(Self::Other),
            other => Err(UnknownVariant {
                kind: "category",
                value: other.to_string(),
            }),
        }
    }
}

/// Recurrence rule for a task. Closed vocabulary; default is `None`.
///
/// A task with a rule other than `None` and a due date spawns its next
/// occurrence when completed (see the recurrence engine in the client).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    /// Not recurring.
    #[default]
    None,
    /// Repeats every day.
    Daily,
    /// Repeats every 7 days.
    Weekly,
    /// Repeats every calendar month.
    Monthly,
    /// Repeats every calendar year.
    Yearly,
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(UnknownVariant {
                kind: "recurrence",
                value: other.to_string(),
            }),
        }
    }
}

/// Errors produced when validating a [`TaskDraft`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Task title is empty after trimming.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the maximum length.
    #[error("task title too long (max {MAX_TITLE_LENGTH} characters)")]
    TitleTooLong,
    /// Task description exceeds the maximum length.
    #[error("task description too long (max {MAX_DESCRIPTION_LENGTH} characters)")]
    DescriptionTooLong,
}

/// User-supplied fields for creating or editing a task.
///
/// Carries everything except the identity/lifecycle fields (`id`,
/// `created_at`, `completed`, `completed_at`), which are owned by the
/// sync coordinator. Validated via [`TaskDraft::validate`] before it
/// reaches storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    /// Task title; trimmed and required.
    pub title: String,
    /// Free-form description; may be empty.
    pub description: String,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Priority, defaults to medium.
    pub priority: Priority,
    /// Category, defaults to personal.
    pub category: Category,
    /// Recurrence rule, defaults to none.
    pub recurrence: Recurrence,
}

impl TaskDraft {
    /// Creates a draft with the given title and default everything else.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Sets the recurrence rule.
    #[must_use]
    pub const fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Trims the title and checks the length limits.
    ///
    /// Lengths are counted in characters, not bytes, so multi-byte
    /// titles are not penalized.
    ///
    /// # Errors
    ///
    /// [`ValidationError::TitleEmpty`] if the trimmed title is empty,
    /// [`ValidationError::TitleTooLong`] / [`ValidationError::DescriptionTooLong`]
    /// if a field exceeds its limit.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(ValidationError::TitleEmpty);
        }
        if self.title.chars().count() > MAX_TITLE_LENGTH {
            return Err(ValidationError::TitleTooLong);
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(ValidationError::DescriptionTooLong);
        }
        Ok(self)
    }
}

/// A task record — the sole entity of the system.
///
/// # Invariants
///
/// - `id` and `created_at` are set once at creation and never mutated.
/// - `completed_at` is `Some` iff `completed` is true; both are always
///   written together via [`Task::set_completed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID v7, time-ordered).
    pub id: TaskId,
    /// Task title (non-empty, trimmed).
    pub title: String,
    /// Free-form description; may be empty.
    pub description: String,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Priority.
    pub priority: Priority,
    /// Category.
    pub category: Category,
    /// Recurrence rule.
    pub recurrence: Recurrence,
    /// Whether the task has been completed.
    pub completed: bool,
    /// When the task was completed; `Some` iff `completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the task was created. Immutable.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Builds a new task from a draft, assigning a fresh id and creation
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the draft fails validation.
    pub fn from_draft(draft: TaskDraft) -> Result<Self, ValidationError> {
        Self::from_draft_at(draft, Utc::now())
    }

    /// Like [`Task::from_draft`] with an explicit creation timestamp.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the draft fails validation.
    pub fn from_draft_at(draft: TaskDraft, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let draft = draft.validate()?;
        Ok(Self {
            id: TaskId::new(),
            title: draft.title,
            description: draft.description,
            due_date: draft.due_date,
            priority: draft.priority,
            category: draft.category,
            recurrence: draft.recurrence,
            completed: false,
            completed_at: None,
            created_at: now,
        })
    }

    /// Merges an edit draft into this task, leaving the identity and
    /// completion fields untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the draft fails validation; the
    /// task is not modified in that case.
    pub fn apply_draft(&mut self, draft: TaskDraft) -> Result<(), ValidationError> {
        let draft = draft.validate()?;
        self.title = draft.title;
        self.description = draft.description;
        self.due_date = draft.due_date;
        self.priority = draft.priority;
        self.category = draft.category;
        self.recurrence = draft.recurrence;
        Ok(())
    }

    /// Sets the completion state, keeping `completed` and `completed_at`
    /// consistent.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_display_is_uuid() {
        let id = TaskId::new();
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn task_id_round_trips_through_string() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn task_ids_are_time_ordered() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert!(a.as_uuid() <= b.as_uuid());
    }

    #[test]
    fn priority_round_trip() {
        for p in [Priority::High, Priority::Medium, Priority::Low] {
            let parsed: Priority = p.to_string().parse().unwrap();
            assert_eq!(p, parsed);
        }
    }

    #[test]
    fn priority_rejects_unknown() {
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert_eq!(err.kind, "priority");
        assert_eq!(err.value, "urgent");
    }

    #[test]
    fn category_round_trip() {
        for c in [
            Category::Personal,
            Category::Work,
            Category::Health,
            Category::Shopping,
            Category::Other,
        ] {
            let parsed: Category = c.to_string().parse().unwrap();
            assert_eq!(c, parsed);
        }
    }

    #[test]
    fn recurrence_rejects_unknown() {
        assert!("fortnightly".parse::<Recurrence>().is_err());
    }

    #[test]
    fn recurrence_rejects_capitalized() {
        // Vocabulary is exact, not case-insensitive.
        assert!("Daily".parse::<Recurrence>().is_err());
    }

    #[test]
    fn draft_validate_trims_title() {
        let draft = TaskDraft::new("  buy milk  ").validate().unwrap();
        assert_eq!(draft.title, "buy milk");
    }

    #[test]
    fn draft_validate_rejects_whitespace_only_title() {
        let err = TaskDraft::new("   ").validate().unwrap_err();
        assert_eq!(err, ValidationError::TitleEmpty);
    }

    #[test]
    fn draft_validate_title_length_counts_chars() {
        let ok: String = "ñ".repeat(MAX_TITLE_LENGTH);
        assert!(TaskDraft::new(ok).validate().is_ok());

        let too_long: String = "ñ".repeat(MAX_TITLE_LENGTH + 1);
        assert_eq!(
            TaskDraft::new(too_long).validate().unwrap_err(),
            ValidationError::TitleTooLong
        );
    }

    #[test]
    fn draft_validate_description_limit() {
        let draft = TaskDraft::new("ok").with_description("d".repeat(MAX_DESCRIPTION_LENGTH + 1));
        assert_eq!(
            draft.validate().unwrap_err(),
            ValidationError::DescriptionTooLong
        );
    }

    #[test]
    fn from_draft_sets_lifecycle_fields() {
        let task = Task::from_draft(TaskDraft::new("walk dog")).unwrap();
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, Category::Personal);
        assert_eq!(task.recurrence, Recurrence::None);
    }

    #[test]
    fn apply_draft_preserves_identity_and_completion() {
        let mut task = Task::from_draft(TaskDraft::new("original")).unwrap();
        let id = task.id.clone();
        let created = task.created_at;
        task.set_completed(true, Utc::now());

        task.apply_draft(TaskDraft::new("edited").with_priority(Priority::High))
            .unwrap();

        assert_eq!(task.id, id);
        assert_eq!(task.created_at, created);
        assert!(task.completed);
        assert_eq!(task.title, "edited");
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn apply_draft_invalid_leaves_task_unchanged() {
        let mut task = Task::from_draft(TaskDraft::new("keep me")).unwrap();
        assert!(task.apply_draft(TaskDraft::new("  ")).is_err());
        assert_eq!(task.title, "keep me");
    }

    #[test]
    fn set_completed_keeps_invariant() {
        let mut task = Task::from_draft(TaskDraft::new("t")).unwrap();
        let now = Utc::now();
        task.set_completed(true, now);
        assert_eq!(task.completed_at, Some(now));
        task.set_completed(false, Utc::now());
        assert!(task.completed_at.is_none());
    }
}
