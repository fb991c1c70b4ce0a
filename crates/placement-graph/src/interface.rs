//! Interface-type derivation
//!
//! The one place that decides how a task without a stored interface type is
//! presented. Recomputed from persisted fields on every call.

use crate::task::{InterfaceType, Task};
use serde::{Deserialize, Serialize};

/// Allow-list marking tasks as submission (email) tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionRules {
    /// Sort positions that are submission tasks
    pub sort_orders: Vec<i64>,
    /// Case-insensitive name substrings that mark submission tasks
    pub name_patterns: Vec<String>,
}

impl SubmissionRules {
    /// Create empty rules (nothing is a submission task)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With sort position
    #[inline]
    #[must_use]
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_orders.push(sort_order);
        self
    }

    /// With name substring
    #[inline]
    #[must_use]
    pub fn with_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_patterns.push(pattern.into());
        self
    }

    /// Whether `task` is flagged as a submission task
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if self.sort_orders.contains(&task.sort_order) {
            return true;
        }
        let name = task.name.to_lowercase();
        self.name_patterns
            .iter()
            .map(|p| p.trim().to_lowercase())
            .any(|p| !p.is_empty() && name.contains(&p))
    }
}

/// Derive the interface type of `task`, ignoring any stored value.
#[must_use]
pub fn derive_interface_type(task: &Task, rules: &SubmissionRules) -> InterfaceType {
    if rules.matches(task) {
        InterfaceType::Email
    } else if !task.dependencies.is_empty() {
        InterfaceType::Artifact
    } else {
        InterfaceType::Chat
    }
}

/// Stored interface type, or the derived one when absent.
#[inline]
#[must_use]
pub fn effective_interface_type(task: &Task, rules: &SubmissionRules) -> InterfaceType {
    task.interface_type
        .unwrap_or_else(|| derive_interface_type(task, rules))
}
