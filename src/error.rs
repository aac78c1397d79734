//! Typed errors for core operations.

use crate::types::ValidationError;

/// Errors that can occur during task and dependency operations.
///
/// Constructed through `eyre::eyre!(...)` at the failure site so callers can
/// recover the variant with `Report::downcast_ref::<TaskError>()`. Storage
/// failures (an unreachable or corrupt database) are not part of this enum;
/// they propagate as contextualized reports from the store layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Referenced task does not exist.
    TaskNotFound(i64),
    /// No edge exists for the given ordered pair.
    EdgeNotFound { task_id: i64, depends_on_id: i64 },
    /// A task cannot depend on itself.
    SelfDependency,
    /// Adding this edge would create a cycle in the dependency graph.
    CircularDependency { task_id: i64, depends_on_id: i64 },
    /// Task cannot be completed while a dependency is incomplete.
    DependencyNotSatisfied { task_id: i64, depends_on_id: i64 },
    /// Field constraint violation.
    Validation(ValidationError),
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::TaskNotFound(id) => write!(f, "task not found: {}", id),
            TaskError::EdgeNotFound {
                task_id,
                depends_on_id,
            } => write!(f, "no dependency of task {} on task {}", task_id, depends_on_id),
            TaskError::SelfDependency => write!(f, "a task cannot depend on itself"),
            TaskError::CircularDependency {
                task_id,
                depends_on_id,
            } => write!(
                f,
                "making task {} depend on task {} would create a cycle",
                task_id, depends_on_id
            ),
            TaskError::DependencyNotSatisfied {
                task_id,
                depends_on_id,
            } => write!(
                f,
                "cannot complete task {}: dependency task {} is not completed",
                task_id, depends_on_id
            ),
            TaskError::Validation(e) => write!(f, "validation error: {}", e),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::Validation(e) => Some(e),
            _ => None,
        }
    }
}
