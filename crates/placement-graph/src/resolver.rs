//! Dependency resolution
//!
//! Computes the status a task should have given the statuses of its
//! dependencies. Pure: callers supply the dependency statuses.

use crate::ids::TaskId;
use crate::status::TaskStatus;
use crate::task::Task;
use std::collections::HashMap;

/// Resolution failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A listed dependency does not exist
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        /// Task being resolved
        task: TaskId,
        /// Missing dependency
        dependency: TaskId,
    },
}

/// Source of dependency statuses
pub trait StatusLookup {
    /// Current status of `id`, or `None` if no such task exists
    fn status_of(&self, id: &TaskId) -> Option<TaskStatus>;
}

impl StatusLookup for HashMap<TaskId, TaskStatus> {
    fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.get(id).copied()
    }
}

impl StatusLookup for std::collections::BTreeMap<TaskId, TaskStatus> {
    fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.get(id).copied()
    }
}

/// Resolve the status of `task`.
///
/// A completed task stays completed; only an explicit reset reopens it.
///
/// # Errors
/// [`ResolveError::UnknownDependency`] if a dependency is not in `statuses`.
pub fn resolve(task: &Task, statuses: &impl StatusLookup) -> Result<TaskStatus, ResolveError> {
    let gated = resolve_excluding_self(task, statuses)?;
    if task.status.is_completed() {
        return Ok(TaskStatus::Completed);
    }
    Ok(gated)
}

/// Resolve `task` as if it had never been completed.
///
/// # Errors
/// [`ResolveError::UnknownDependency`] if a dependency is not in `statuses`.
pub fn resolve_excluding_self(
    task: &Task,
    statuses: &impl StatusLookup,
) -> Result<TaskStatus, ResolveError> {
    let mut all_completed = true;
    for dep in &task.dependencies {
        let status = statuses
            .status_of(dep)
            .ok_or_else(|| ResolveError::UnknownDependency {
                task: task.id.clone(),
                dependency: dep.clone(),
            })?;
        all_completed &= status.is_completed();
    }

    Ok(if task.dependencies.is_empty() {
        TaskStatus::Available
    } else if all_completed {
        TaskStatus::NeedsAttention
    } else {
        TaskStatus::Upcoming
    })
}
