//! Task status and the rules for moving between statuses
//!
//! Stored documents spell statuses inconsistently (`"Upcoming"`,
//! `"pending"`, `"needs-attention"`). [`TaskStatus`] is the single closed
//! set, and [`TaskStatus::normalize`] is the only place raw spellings are
//! interpreted. Serde goes through the same function, so any store that
//! deserializes tasks gets normalization for free.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical task status
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "&'static str", try_from = "String")]
pub enum TaskStatus {
    /// Waiting on at least one incomplete dependency
    #[default]
    Upcoming,
    /// No dependencies; actionable from the start
    Available,
    /// All dependencies completed; actionable now
    NeedsAttention,
    /// Done
    Completed,
}

impl TaskStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Upcoming,
        TaskStatus::Available,
        TaskStatus::NeedsAttention,
        TaskStatus::Completed,
    ];

    /// Canonical spelling
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Upcoming => "upcoming",
            TaskStatus::Available => "available",
            TaskStatus::NeedsAttention => "needs_attention",
            TaskStatus::Completed => "completed",
        }
    }

    /// Interpret a raw status spelling from the store
    ///
    /// Case-insensitive; `-` and spaces are read as `_`.
    ///
    /// # Errors
    /// Returns [`StatusParseError`] for spellings outside the known aliases.
    pub fn normalize(raw: &str) -> Result<Self, StatusParseError> {
        let key: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();

        match key.as_str() {
            "upcoming" | "blocked" | "locked" | "waiting" => Ok(TaskStatus::Upcoming),
            "available" | "ready" | "open" | "not_started" => Ok(TaskStatus::Available),
            "needs_attention" | "pending" | "in_progress" | "active" => {
                Ok(TaskStatus::NeedsAttention)
            }
            "completed" | "complete" | "done" => Ok(TaskStatus::Completed),
            _ => Err(StatusParseError(raw.to_string())),
        }
    }

    /// Whether a user can act on the task
    #[inline]
    #[must_use]
    pub const fn is_actionable(self) -> bool {
        matches!(self, TaskStatus::Available | TaskStatus::NeedsAttention)
    }

    /// Whether the task is completed
    #[inline]
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl From<TaskStatus> for &'static str {
    fn from(value: TaskStatus) -> Self {
        value.as_str()
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

/// Unrecognized status spelling
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized task status: '{0}'")]
pub struct StatusParseError(pub String);

/// What is driving a status write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionCause {
    /// Re-evaluation after a dependency completed
    Propagation,
    /// Explicit user "complete" action
    Completion,
    /// Explicit reset of a task back to an open state
    Reset,
}

/// Rejected status write
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal {cause:?} transition: {from} -> {to}")]
pub struct TransitionError {
    /// Current status
    pub from: TaskStatus,
    /// Requested status
    pub to: TaskStatus,
    /// Cause of the write
    pub cause: TransitionCause,
}

/// Statuses reachable from `from` for a given cause.
#[must_use]
pub fn allowed_transitions(from: TaskStatus, cause: TransitionCause) -> Vec<TaskStatus> {
    use TaskStatus::*;
    match (cause, from) {
        // Propagation never completes a task and never demotes a completed one.
        (TransitionCause::Propagation, Completed) => vec![],
        (TransitionCause::Propagation, Upcoming) => vec![Available, NeedsAttention],
        (TransitionCause::Propagation, Available) => vec![Upcoming, NeedsAttention],
        (TransitionCause::Propagation, NeedsAttention) => vec![Upcoming, Available],
        (TransitionCause::Completion, Available | NeedsAttention) => vec![Completed],
        (TransitionCause::Completion, Upcoming | Completed) => vec![],
        (TransitionCause::Reset, _) => vec![Upcoming, Available, NeedsAttention],
    }
}

/// Validates a status write. Writing the current status is always allowed.
///
/// # Errors
/// Returns [`TransitionError`] when `to` is not reachable from `from`.
pub fn validate_transition(
    from: TaskStatus,
    to: TaskStatus,
    cause: TransitionCause,
) -> Result<(), TransitionError> {
    if from == to || allowed_transitions(from, cause).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to, cause })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_tasks_start_upcoming() {
        assert_eq!(TaskStatus::default(), TaskStatus::Upcoming);
    }

    #[test]
    fn normalizes_legacy_spellings() {
        assert_eq!(TaskStatus::normalize("Upcoming").unwrap(), TaskStatus::Upcoming);
        assert_eq!(TaskStatus::normalize("pending").unwrap(), TaskStatus::NeedsAttention);
        assert_eq!(
            TaskStatus::normalize("Needs-Attention").unwrap(),
            TaskStatus::NeedsAttention
        );
        assert_eq!(TaskStatus::normalize(" DONE ").unwrap(), TaskStatus::Completed);
        assert_eq!(TaskStatus::normalize("not started").unwrap(), TaskStatus::Available);
    }

    #[test]
    fn rejects_unknown_spelling() {
        let err = TaskStatus::normalize("archived").unwrap_err();
        assert_eq!(err.to_string(), "unrecognized task status: 'archived'");
    }

    #[test]
    fn serde_uses_canonical_casing() {
        let json = serde_json::to_string(&TaskStatus::NeedsAttention).unwrap();
        assert_eq!(json, "\"needs_attention\"");

        let status: TaskStatus = serde_json::from_str("\"Pending\"").unwrap();
        assert_eq!(status, TaskStatus::NeedsAttention);

        assert!(serde_json::from_str::<TaskStatus>("\"bogus\"").is_err());
    }

    #[test]
    fn propagation_never_demotes_completed() {
        for to in TaskStatus::ALL {
            if to != TaskStatus::Completed {
                assert!(validate_transition(
                    TaskStatus::Completed,
                    to,
                    TransitionCause::Propagation
                )
                .is_err());
            }
        }
    }

    #[test]
    fn completion_requires_actionable_task() {
        assert!(validate_transition(
            TaskStatus::NeedsAttention,
            TaskStatus::Completed,
            TransitionCause::Completion
        )
        .is_ok());
        assert!(validate_transition(
            TaskStatus::Upcoming,
            TaskStatus::Completed,
            TransitionCause::Completion
        )
        .is_err());
    }

    #[test]
    fn reset_reopens_completed() {
        assert!(validate_transition(
            TaskStatus::Completed,
            TaskStatus::NeedsAttention,
            TransitionCause::Reset
        )
        .is_ok());
    }

    fn any_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Upcoming),
            Just(TaskStatus::Available),
            Just(TaskStatus::NeedsAttention),
            Just(TaskStatus::Completed),
        ]
    }

    fn any_cause() -> impl Strategy<Value = TransitionCause> {
        prop_oneof![
            Just(TransitionCause::Propagation),
            Just(TransitionCause::Completion),
            Just(TransitionCause::Reset),
        ]
    }

    proptest! {
        #[test]
        fn prop_validation_matches_table(from in any_status(), to in any_status(), cause in any_cause()) {
            let res = validate_transition(from, to, cause);
            let allowed = allowed_transitions(from, cause);

            if from == to || allowed.contains(&to) {
                prop_assert!(res.is_ok());
            } else {
                prop_assert!(res.is_err());
            }
        }

        #[test]
        fn prop_canonical_spelling_roundtrips(status in any_status()) {
            prop_assert_eq!(TaskStatus::normalize(status.as_str()).unwrap(), status);
        }
    }
}
