//! Error types for the placement engine
//!
//! Two layers:
//! - [`StoreError`]: failures reported by a [`TaskStore`](crate::store::TaskStore)
//! - [`EngineError`]: everything the engine reports to callers, fatal or not
//!
//! Non-fatal kinds ([`EngineError::is_warning`]) are collected in reports
//! rather than returned as `Err`.

use placement_artifact::ArtifactId;
use placement_graph::{ResolveError, TaskId, TaskStatus, TransitionError};
use std::path::PathBuf;

/// Store accessor failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached or failed mid-operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A batch write named a task the store does not hold
    #[error("task {0} not found in store")]
    MissingTask(TaskId),

    /// A status write raced with another writer
    #[error("task {task} is {actual}, expected {expected}")]
    Conflict {
        /// Task written
        task: TaskId,
        /// Status the writer based its decision on
        expected: TaskStatus,
        /// Status found in the store
        actual: TaskStatus,
    },

    /// Stored document could not be read
    #[error("decode error: {0}")]
    Decode(String),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid YAML
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Extension is neither TOML nor YAML
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but make no sense
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A dependency names no existing task
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        /// Task being resolved
        task: TaskId,
        /// Missing dependency
        dependency: TaskId,
    },

    /// Task lies on a dependency cycle, or a run exceeded its visit budget
    #[error("dependency cycle at {task} through {members:?}")]
    CycleDetected {
        /// Task where the cycle was hit
        task: TaskId,
        /// Tasks on the cycle
        members: Vec<TaskId>,
    },

    /// Store I/O failed
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Artifact content or numbering is broken (non-fatal)
    #[error("malformed artifact {artifact:?} of task {task}: {reason}")]
    MalformedArtifact {
        /// Producing task
        task: TaskId,
        /// Offending artifact, if one can be named
        artifact: Option<ArtifactId>,
        /// What is wrong
        reason: String,
    },

    /// Two blocks of one dependency name the same recipient (non-fatal)
    #[error("dependency {dependency} names recipient '{recipient}' more than once")]
    AmbiguousRecipientMatch {
        /// Dependency whose output is ambiguous
        dependency: TaskId,
        /// Normalized recipient key
        recipient: String,
    },

    /// No task with this ID
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Status write rejected by the transition table
    #[error("task {task}: {source}")]
    IllegalTransition {
        /// Task written
        task: TaskId,
        /// Rejected transition
        #[source]
        source: TransitionError,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Check if the caller may retry the operation
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(StoreError::Unavailable(_) | StoreError::Conflict { .. })
        )
    }

    /// Check if the error is reported but never aborts anything
    #[inline]
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::MalformedArtifact { .. } | Self::AmbiguousRecipientMatch { .. }
        )
    }

    /// Create a cycle error for a single task
    #[inline]
    pub fn cycle(task: &TaskId, members: impl Into<Vec<TaskId>>) -> Self {
        Self::CycleDetected {
            task: task.clone(),
            members: members.into(),
        }
    }
}

impl From<ResolveError> for EngineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnknownDependency { task, dependency } => {
                Self::UnknownDependency { task, dependency }
            }
        }
    }
}

/// An error attributed to one task
#[derive(Debug, thiserror::Error)]
#[error("{task_id}: {error}")]
pub struct TaskFailure {
    /// Task the error belongs to
    pub task_id: TaskId,
    /// What went wrong
    #[source]
    pub error: EngineError,
}

impl TaskFailure {
    /// Attribute `error` to `task_id`
    #[inline]
    pub fn new(task_id: TaskId, error: impl Into<EngineError>) -> Self {
        Self {
            task_id,
            error: error.into(),
        }
    }
}

/// Result alias for engine operations
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
