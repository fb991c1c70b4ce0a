//! Derived submission records

use placement_artifact::ContentHash;
use placement_graph::{CompanyId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic submission identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    /// Wrap an existing identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier for `recipient_key` of the consuming task
    #[must_use]
    pub fn derive(task_id: &TaskId, recipient_key: &str) -> Self {
        let hash = ContentHash::compute_fields(&[task_id.as_str(), recipient_key]);
        Self(format!("sub_{}", hash.short()))
    }

    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Derived, not yet sent
    #[default]
    Draft,
    /// Sent by the delivery layer
    Sent,
}

/// Supporting document attached to a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name
    pub name: String,
    /// Text content
    pub content: String,
}

/// Per-recipient output of a submission task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Identifier, stable across re-derivation
    pub id: SubmissionId,
    /// Owning company
    pub company_id: CompanyId,
    /// Consuming task
    pub task_id: TaskId,
    /// Recipient display name
    pub recipient_name: String,
    /// Recipient email address, when one could be found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
    /// Supporting documents from other dependencies
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Delivery state
    #[serde(default)]
    pub status: SubmissionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_and_scoped() {
        let task = TaskId::from("submit");
        assert_eq!(
            SubmissionId::derive(&task, "acme co"),
            SubmissionId::derive(&task, "acme co")
        );
        assert_ne!(
            SubmissionId::derive(&task, "acme co"),
            SubmissionId::derive(&TaskId::from("other"), "acme co")
        );
        assert!(SubmissionId::derive(&task, "acme co").as_str().starts_with("sub_"));
    }
}
