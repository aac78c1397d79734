//! Core data types for the taskgraph service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum title length in bytes.
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum tag length in bytes.
pub const MAX_TAG_LEN: usize = 50;

/// A tracked unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Opaque integer identifier, stable for the task's lifetime.
    pub id: i64,

    /// Short description of the work (non-empty, at most 255 bytes)
    pub title: String,

    /// Optional longer description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current state
    pub status: Status,

    /// Scheduling priority
    pub priority: Priority,

    /// Freeform tags for filtering (each at most 50 bytes)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Owning user, if any (managed externally)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    /// When created (immutable)
    pub created_at: DateTime<Utc>,

    /// Last modification
    pub updated_at: DateTime<Utc>,
}

/// Task status states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

/// Task priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A directed dependency between tasks: `task_id` cannot be marked
/// Completed until `depends_on_id` is Completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyEdge {
    /// The task that has the dependency
    pub task_id: i64,

    /// The task being depended on
    pub depends_on_id: i64,

    /// When the edge was created
    pub created_at: DateTime<Utc>,
}

/// Recursive materialization of a task's transitive dependencies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyTree {
    pub task: Task,
    pub dependencies: Vec<DependencyTree>,
}

/// Fields for creating a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub user_id: Option<i64>,
    /// Ids of tasks the new task depends on.
    pub depends_on: Vec<i64>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Validate field constraints before persisting.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.title, &self.tags)
    }
}

/// Partial update: only fields present are applied.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the description, `None` leaves it untouched.
    pub description: Option<Option<String>>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
    }
}

/// Filter for list queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    /// Match tasks carrying any of these tags.
    pub tags: Vec<String>,
    /// Case-insensitive substring search over title and description.
    pub search: Option<String>,
    pub user_id: Option<i64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Sort key for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    Status,
}

impl SortKey {
    /// Stable name used in cache key derivation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
            SortKey::Title => "title",
            SortKey::Priority => "priority",
            SortKey::Status => "status",
        }
    }
}

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One page of a filtered/sorted list query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    /// Total matching tasks across all pages.
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl TaskPage {
    /// Assemble a page from a slice of results plus the same-filter total.
    pub fn assemble(tasks: Vec<Task>, total: u64, offset: u64, limit: u64) -> Self {
        let (page, total_pages) = if limit > 0 {
            (offset / limit + 1, total.div_ceil(limit))
        } else {
            (1, 1)
        };
        Self {
            tasks,
            total,
            page,
            page_size: limit,
            total_pages,
        }
    }
}

/// Validation errors for task fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyTitle,
    TitleTooLong,
    TagTooLong(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "title cannot be empty"),
            ValidationError::TitleTooLong => {
                write!(f, "title exceeds {} characters", MAX_TITLE_LEN)
            }
            ValidationError::TagTooLong(tag) => {
                write!(f, "tag '{}' exceeds {} characters", tag, MAX_TAG_LEN)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl Task {
    /// Validate the task's fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.title, &self.tags)
    }
}

fn validate_fields(title: &str, tags: &[String]) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong);
    }
    for tag in tags {
        if tag.len() > MAX_TAG_LEN {
            return Err(ValidationError::TagTooLong(tag.clone()));
        }
    }
    Ok(())
}
