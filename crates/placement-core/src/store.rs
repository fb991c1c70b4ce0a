//! Store accessor
//!
//! [`TaskStore`] is the engine's only view of persistence. Implementations
//! must make [`TaskStore::commit_statuses`] and
//! [`TaskStore::replace_submissions`] atomic: a reader never sees half of a
//! batch, and never sees an empty submission set mid-replacement.
//!
//! [`InMemoryStore`] keeps everything behind one lock and can be loaded from
//! and saved to a JSON [`Snapshot`].

use crate::error::StoreError;
use crate::submission::Submission;
use async_trait::async_trait;
use parking_lot::RwLock;
use placement_artifact::Artifact;
use placement_graph::{CompanyId, Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One status write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    /// Task written
    pub task_id: TaskId,
    /// Status the decision was based on
    pub from: TaskStatus,
    /// New status
    pub to: TaskStatus,
}

/// Persistence consumed by the engine
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch one task
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// All tasks of a company
    async fn list_tasks(&self, company: &CompanyId) -> Result<Vec<Task>, StoreError>;

    /// Tasks listing `id` as a dependency
    async fn list_dependents(&self, id: &TaskId) -> Result<Vec<Task>, StoreError>;

    /// Write a single status
    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError>;

    /// Apply a batch of status writes atomically.
    ///
    /// Fails without writing anything if any task is missing or no longer
    /// has the `from` status.
    async fn commit_statuses(&self, batch: &[StatusChange]) -> Result<(), StoreError>;

    /// All artifacts produced by a task, every generation
    async fn list_artifacts(&self, task: &TaskId) -> Result<Vec<Artifact>, StoreError>;

    /// Current submissions of a task
    async fn list_submissions(&self, task: &TaskId) -> Result<Vec<Submission>, StoreError>;

    /// Replace the submission set of a task atomically
    async fn replace_submissions(
        &self,
        task: &TaskId,
        submissions: Vec<Submission>,
    ) -> Result<(), StoreError>;
}

/// Serialized store contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Tasks
    pub tasks: Vec<Task>,
    /// Artifacts
    pub artifacts: Vec<Artifact>,
    /// Submissions
    pub submissions: Vec<Submission>,
}

#[derive(Debug, Default)]
struct State {
    tasks: BTreeMap<TaskId, Task>,
    artifacts: BTreeMap<TaskId, Vec<Artifact>>,
    submissions: BTreeMap<TaskId, Vec<Submission>>,
}

/// Store held in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from snapshot contents
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write();
            for task in snapshot.tasks {
                state.tasks.insert(task.id.clone(), task);
            }
            for artifact in snapshot.artifacts {
                state
                    .artifacts
                    .entry(artifact.task_id.clone())
                    .or_default()
                    .push(artifact);
            }
            for submission in snapshot.submissions {
                state
                    .submissions
                    .entry(submission.task_id.clone())
                    .or_default()
                    .push(submission);
            }
        }
        store
    }

    /// Copy out the current contents
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            tasks: state.tasks.values().cloned().collect(),
            artifacts: state.artifacts.values().flatten().cloned().collect(),
            submissions: state.submissions.values().flatten().cloned().collect(),
        }
    }

    /// Load a JSON snapshot file
    ///
    /// # Errors
    /// [`StoreError::Unavailable`] if the file cannot be read,
    /// [`StoreError::Decode`] if it is not a valid snapshot.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        let snapshot: Snapshot =
            serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))?;
        tracing::debug!(
            path = %path.display(),
            tasks = snapshot.tasks.len(),
            artifacts = snapshot.artifacts.len(),
            "loaded snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents as a JSON snapshot file
    ///
    /// # Errors
    /// [`StoreError::Unavailable`] if the file cannot be written.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        tokio::fs::write(path, text)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))
    }

    /// Insert or replace a task
    pub fn insert_task(&self, task: Task) {
        self.state.write().tasks.insert(task.id.clone(), task);
    }

    /// Append an artifact
    pub fn insert_artifact(&self, artifact: Artifact) {
        self.state
            .write()
            .artifacts
            .entry(artifact.task_id.clone())
            .or_default()
            .push(artifact);
    }

    /// Status of every task, for assertions and inspection
    #[must_use]
    pub fn statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.state
            .read()
            .tasks
            .iter()
            .map(|(id, task)| (id.clone(), task.status))
            .collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.state.read().tasks.get(id).cloned())
    }

    async fn list_tasks(&self, company: &CompanyId) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .state
            .read()
            .tasks
            .values()
            .filter(|t| &t.company_id == company)
            .cloned()
            .collect())
    }

    async fn list_dependents(&self, id: &TaskId) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .state
            .read()
            .tasks
            .values()
            .filter(|t| t.dependencies.contains(id))
            .cloned()
            .collect())
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let task = state
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingTask(id.clone()))?;
        task.status = status;
        Ok(())
    }

    async fn commit_statuses(&self, batch: &[StatusChange]) -> Result<(), StoreError> {
        let mut state = self.state.write();
        for change in batch {
            let task = state
                .tasks
                .get(&change.task_id)
                .ok_or_else(|| StoreError::MissingTask(change.task_id.clone()))?;
            if task.status != change.from {
                return Err(StoreError::Conflict {
                    task: change.task_id.clone(),
                    expected: change.from,
                    actual: task.status,
                });
            }
        }
        for change in batch {
            if let Some(task) = state.tasks.get_mut(&change.task_id) {
                task.status = change.to;
            }
        }
        Ok(())
    }

    async fn list_artifacts(&self, task: &TaskId) -> Result<Vec<Artifact>, StoreError> {
        Ok(self
            .state
            .read()
            .artifacts
            .get(task)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_submissions(&self, task: &TaskId) -> Result<Vec<Submission>, StoreError> {
        Ok(self
            .state
            .read()
            .submissions
            .get(task)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_submissions(
        &self,
        task: &TaskId,
        submissions: Vec<Submission>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if submissions.is_empty() {
            state.submissions.remove(task);
        } else {
            state.submissions.insert(task.clone(), submissions);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> CompanyId {
        CompanyId::from("acme")
    }

    fn store() -> InMemoryStore {
        InMemoryStore::from_snapshot(Snapshot {
            tasks: vec![
                Task::new("a", company(), "collect").with_status(TaskStatus::Completed),
                Task::new("b", company(), "research").depends_on("a"),
                Task::new("z", CompanyId::from("other"), "elsewhere"),
            ],
            ..Snapshot::default()
        })
    }

    #[tokio::test]
    async fn lists_by_company_and_dependency() {
        let store = store();
        assert_eq!(store.list_tasks(&company()).await.unwrap().len(), 2);
        let dependents = store.list_dependents(&TaskId::from("a")).await.unwrap();
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].id, TaskId::from("b"));
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = store();
        let a = TaskId::from("a");
        let b = TaskId::from("b");
        let stale = [
            StatusChange {
                task_id: b.clone(),
                from: TaskStatus::Upcoming,
                to: TaskStatus::NeedsAttention,
            },
            StatusChange {
                task_id: a.clone(),
                from: TaskStatus::Available,
                to: TaskStatus::Completed,
            },
        ];
        let err = store.commit_statuses(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.statuses()[&b], TaskStatus::Upcoming);

        store.commit_statuses(&stale[..1]).await.unwrap();
        assert_eq!(store.statuses()[&b], TaskStatus::NeedsAttention);
    }

    #[tokio::test]
    async fn single_update_requires_task() {
        let store = store();
        store
            .update_task_status(&TaskId::from("b"), TaskStatus::Available)
            .await
            .unwrap();
        assert_eq!(store.statuses()[&TaskId::from("b")], TaskStatus::Available);
        assert!(matches!(
            store
                .update_task_status(&TaskId::from("ghost"), TaskStatus::Available)
                .await,
            Err(StoreError::MissingTask(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let store = store();
        store.save_json(&path).await.unwrap();

        let loaded = InMemoryStore::load_json(&path).await.unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[tokio::test]
    async fn legacy_status_spellings_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        tokio::fs::write(
            &path,
            r#"{"tasks": [
                {"id": "a", "companyId": "acme", "name": "collect", "status": "Done"},
                {"id": "b", "companyId": "acme", "name": "draft", "status": "pending", "dependencies": ["a"]}
            ]}"#,
        )
        .await
        .unwrap();

        let store = InMemoryStore::load_json(&path).await.unwrap();
        let statuses = store.statuses();
        assert_eq!(statuses[&TaskId::from("a")], TaskStatus::Completed);
        assert_eq!(statuses[&TaskId::from("b")], TaskStatus::NeedsAttention);
    }

    #[tokio::test]
    async fn unknown_status_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(
            &path,
            r#"{"tasks": [{"id": "a", "companyId": "acme", "name": "x", "status": "archived"}]}"#,
        )
        .await
        .unwrap();
        assert!(matches!(
            InMemoryStore::load_json(&path).await,
            Err(StoreError::Decode(_))
        ));
    }
}
