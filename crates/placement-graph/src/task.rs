//! Task records (nodes of the graph)

use crate::ids::{CompanyId, TaskId};
use crate::status::TaskStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a task is presented and what it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    /// Free-form conversation, no upstream inputs
    Chat,
    /// Produces artifacts from upstream outputs
    Artifact,
    /// Fans out into one submission per recipient
    Email,
}

impl InterfaceType {
    /// Canonical spelling
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            InterfaceType::Chat => "chat",
            InterfaceType::Artifact => "artifact",
            InterfaceType::Email => "email",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a company's task graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task identifier
    pub id: TaskId,
    /// Owning workflow instance
    pub company_id: CompanyId,
    /// Display name
    pub name: String,
    /// Display position
    #[serde(default)]
    pub sort_order: i64,
    /// Tasks that must complete first (dependency -> dependent)
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Dependency supplying submission subject/body; first dependency if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_dependency: Option<TaskId>,
    /// Current status
    #[serde(default)]
    pub status: TaskStatus,
    /// Stored interface type; derived when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<InterfaceType>,
}

impl Task {
    /// Create a new task with no dependencies
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<TaskId>, company_id: CompanyId, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            company_id,
            name: name.into(),
            sort_order: 0,
            dependencies: Vec::new(),
            primary_dependency: None,
            status: TaskStatus::Upcoming,
            interface_type: None,
        }
    }

    /// With sort order
    #[inline]
    #[must_use]
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// With dependency (duplicates are ignored)
    #[inline]
    #[must_use]
    pub fn depends_on(mut self, task_id: impl Into<TaskId>) -> Self {
        let task_id = task_id.into();
        if !self.dependencies.contains(&task_id) {
            self.dependencies.push(task_id);
        }
        self
    }

    /// With primary dependency
    #[inline]
    #[must_use]
    pub fn with_primary(mut self, task_id: impl Into<TaskId>) -> Self {
        self.primary_dependency = Some(task_id.into());
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// With explicit interface type
    #[inline]
    #[must_use]
    pub fn with_interface(mut self, interface_type: InterfaceType) -> Self {
        self.interface_type = Some(interface_type);
        self
    }

    /// Dependency supplying submission subject/body
    #[inline]
    #[must_use]
    pub fn primary(&self) -> Option<&TaskId> {
        self.primary_dependency
            .as_ref()
            .filter(|p| self.dependencies.contains(p))
            .or_else(|| self.dependencies.first())
    }

    /// Dependencies with duplicates removed, first occurrence kept
    #[must_use]
    pub fn unique_dependencies(&self) -> Vec<&TaskId> {
        let mut seen = Vec::with_capacity(self.dependencies.len());
        for dep in &self.dependencies {
            if !seen.contains(&dep) {
                seen.push(dep);
            }
        }
        seen
    }
}
