//! Artifact records
//!
//! An [`Artifact`] is an immutable text output of a completed task, possibly
//! one part of a multi-part output. Re-running the producing task writes a
//! new generation; [`current_parts`] picks the latest generation and checks
//! its part numbering.

use chrono::{DateTime, Utc};
use placement_graph::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use ulid::Ulid;

/// Unique artifact identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Wrap an existing identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh identifier
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text output of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Artifact identifier
    pub id: ArtifactId,
    /// Producing task
    pub task_id: TaskId,
    /// Display name
    pub name: String,
    /// Raw text
    pub content: String,
    /// 0-based position within a multi-part output
    #[serde(default)]
    pub artifact_index: u32,
    /// Number of parts in the output
    #[serde(default = "one")]
    pub total_artifacts: u32,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Completion pass that produced this artifact
    #[serde(default)]
    pub generation: u64,
    /// Write time
    pub created_at: DateTime<Utc>,
}

fn one() -> u32 {
    1
}

impl Artifact {
    /// Create a single-part artifact in generation 0
    #[must_use]
    pub fn new(task_id: TaskId, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: ArtifactId::generate(),
            task_id,
            name: name.into(),
            content: content.into(),
            artifact_index: 0,
            total_artifacts: 1,
            tags: Vec::new(),
            generation: 0,
            created_at: Utc::now(),
        }
    }

    /// With explicit identifier
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = ArtifactId::new(id);
        self
    }

    /// As part `index` of `total`
    #[inline]
    #[must_use]
    pub fn part(mut self, index: u32, total: u32) -> Self {
        self.artifact_index = index;
        self.total_artifacts = total;
        self
    }

    /// With generation
    #[inline]
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

/// Problems with the part numbering of one generation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartIssue {
    /// `totalArtifacts` disagrees with the number of parts present
    #[error("declared {declared} parts but found {found}")]
    TotalMismatch {
        /// Declared part count
        declared: u32,
        /// Parts present
        found: usize,
    },

    /// Two parts share an index
    #[error("part index {0} appears more than once")]
    DuplicateIndex(u32),

    /// An index in `0..total` has no part
    #[error("part index {0} is missing")]
    MissingIndex(u32),

    /// Parts disagree on `totalArtifacts`
    #[error("parts disagree on total: {0:?}")]
    InconsistentTotals(Vec<u32>),
}

/// Latest generation of one task's artifacts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentParts {
    /// Generation selected
    pub generation: u64,
    /// Parts in `(artifact_index, id)` order
    pub parts: Vec<Artifact>,
    /// Numbering problems found
    pub issues: Vec<PartIssue>,
}

/// Select the current (highest) generation and order its parts.
///
/// Numbering problems never drop parts; they are reported in `issues`.
#[must_use]
pub fn current_parts(artifacts: impl IntoIterator<Item = Artifact>) -> CurrentParts {
    let all: Vec<Artifact> = artifacts.into_iter().collect();
    let Some(generation) = all.iter().map(|a| a.generation).max() else {
        return CurrentParts::default();
    };

    let mut parts: Vec<Artifact> = all
        .into_iter()
        .filter(|a| a.generation == generation)
        .collect();
    parts.sort_by(|a, b| {
        a.artifact_index
            .cmp(&b.artifact_index)
            .then_with(|| a.id.cmp(&b.id))
    });

    let issues = check_numbering(&parts);
    CurrentParts {
        generation,
        parts,
        issues,
    }
}

fn check_numbering(parts: &[Artifact]) -> Vec<PartIssue> {
    let mut issues = Vec::new();

    let totals: BTreeSet<u32> = parts.iter().map(|a| a.total_artifacts).collect();
    if totals.len() > 1 {
        issues.push(PartIssue::InconsistentTotals(totals.iter().copied().collect()));
    }
    let declared = totals.iter().next_back().copied().unwrap_or(0);
    if declared as usize != parts.len() {
        issues.push(PartIssue::TotalMismatch {
            declared,
            found: parts.len(),
        });
    }

    let mut seen = BTreeSet::new();
    for part in parts {
        if !seen.insert(part.artifact_index) {
            issues.push(PartIssue::DuplicateIndex(part.artifact_index));
        }
    }
    let expected = u32::try_from(parts.len()).unwrap_or(u32::MAX).max(declared);
    for index in 0..expected {
        if !seen.contains(&index) {
            issues.push(PartIssue::MissingIndex(index));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn part(id: &str, index: u32, total: u32, generation: u64) -> Artifact {
        Artifact::new(TaskId::from("p1"), id, format!("body {id}"))
            .with_id(id)
            .part(index, total)
            .with_generation(generation)
    }

    #[test]
    fn picks_latest_generation_in_index_order() {
        let current = current_parts(vec![
            part("old", 0, 1, 0),
            part("b", 1, 2, 1),
            part("a", 0, 2, 1),
        ]);

        assert_eq!(current.generation, 1);
        let ids: Vec<&str> = current.parts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(current.issues.is_empty());
    }

    #[test]
    fn reports_gap_and_mismatch() {
        let current = current_parts(vec![part("a", 0, 3, 0), part("c", 2, 3, 0)]);
        assert_eq!(
            current.issues,
            vec![
                PartIssue::TotalMismatch {
                    declared: 3,
                    found: 2
                },
                PartIssue::MissingIndex(1),
            ]
        );
        assert_eq!(current.parts.len(), 2);
    }

    #[test]
    fn reports_duplicates() {
        let current = current_parts(vec![part("a", 0, 2, 0), part("b", 0, 2, 0)]);
        assert!(current.issues.contains(&PartIssue::DuplicateIndex(0)));
        assert!(current.issues.contains(&PartIssue::MissingIndex(1)));
    }

    #[test]
    fn empty_input() {
        let current = current_parts(Vec::new());
        assert!(current.parts.is_empty());
        assert!(current.issues.is_empty());
    }

    #[test]
    fn deserializes_store_document() {
        let json = r#"{
            "id": "art-1",
            "taskId": "p1",
            "name": "Carrier emails",
            "content": "<artifact id=\"Acme\">hi</artifact>",
            "artifactIndex": 0,
            "totalArtifacts": 1,
            "createdAt": "2024-05-01T12:00:00Z"
        }"#;
        let artifact: Artifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.task_id, TaskId::from("p1"));
        assert_eq!(artifact.generation, 0);
        assert!(artifact.tags.is_empty());
    }
}
