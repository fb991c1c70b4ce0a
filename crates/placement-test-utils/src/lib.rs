//! Testing utilities for the placement workspace
//!
//! Shared fixtures, scenario snapshots, and a store wrapper that counts
//! calls and injects failures.

#![allow(missing_docs)]

use async_trait::async_trait;
use placement_artifact::Artifact;
use placement_core::{InMemoryStore, Snapshot, StatusChange, StoreError, Submission, TaskStore};
use placement_graph::{CompanyId, InterfaceType, Task, TaskId, TaskStatus};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn company() -> CompanyId {
    CompanyId::from("acme")
}

pub fn task(id: &str, deps: &[&str], status: TaskStatus) -> Task {
    deps.iter()
        .fold(Task::new(id, company(), id), |t, d| t.depends_on(*d))
        .with_status(status)
}

pub fn email_task(id: &str, deps: &[&str], status: TaskStatus) -> Task {
    task(id, deps, status).with_interface(InterfaceType::Email)
}

pub fn artifact(task_id: &str, id: &str, content: &str) -> Artifact {
    Artifact::new(TaskId::from(task_id), format!("{task_id} output"), content).with_id(id)
}

pub fn seeded_store(snapshot: Snapshot) -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::from_snapshot(snapshot))
}

/// Two producers feeding one email task: `p1` (completed) writes the
/// letters, `p2` (available) the attachments, and `submit` depends on both
/// with `p1` primary.
pub fn acme_scenario() -> Snapshot {
    Snapshot {
        tasks: vec![
            task("p1", &[], TaskStatus::Completed),
            task("p2", &[], TaskStatus::Available),
            email_task("submit", &["p1", "p2"], TaskStatus::Upcoming).with_primary("p1"),
        ],
        artifacts: vec![
            artifact("p1", "a1", r#"<artifact id="AcmeCo">Hello Acme</artifact>"#),
            artifact("p2", "a2", r#"<artifact id="AcmeCo">Attachment for Acme</artifact>"#),
        ],
        submissions: Vec::new(),
    }
}

/// Linear workflow `t0 -> t1 -> ... -> t{n-1}` with `t0` available
pub fn chain(n: usize) -> Vec<Task> {
    (0..n)
        .map(|i| {
            let id = format!("t{i:02}");
            if i == 0 {
                task(&id, &[], TaskStatus::Available)
            } else {
                let dep = format!("t{:02}", i - 1);
                task(&id, &[dep.as_str()], TaskStatus::Upcoming)
            }
        })
        .collect()
}

/// Random DAGs: edges only point from lower to higher index
pub fn dag_tasks(max_nodes: usize) -> impl Strategy<Value = Vec<Task>> {
    (1..=max_nodes)
        .prop_flat_map(|n| {
            (
                Just(n),
                proptest::collection::vec((0..n, 0..n), 0..n * 3),
                proptest::collection::vec(any::<bool>(), n),
            )
        })
        .prop_map(|(n, edges, done)| {
            let mut tasks: Vec<Task> = (0..n)
                .map(|i| Task::new(format!("t{i:02}"), company(), format!("step {i}")))
                .collect();
            for (a, b) in edges {
                if a < b {
                    let dep = tasks[a].id.clone();
                    tasks[b] = tasks[b].clone().depends_on(dep);
                }
            }
            for (task, done) in tasks.iter_mut().zip(done) {
                task.status = if done {
                    TaskStatus::Completed
                } else if task.dependencies.is_empty() {
                    TaskStatus::Available
                } else {
                    TaskStatus::Upcoming
                };
            }
            tasks
        })
}

/// Store wrapper that counts calls and fails on demand
#[derive(Debug)]
pub struct InstrumentedStore<S> {
    inner: S,
    fail_commits: AtomicBool,
    fail_replacements: AtomicBool,
    fail_artifacts: AtomicBool,
    commits: AtomicUsize,
    replacements: AtomicUsize,
}

impl<S> InstrumentedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(false),
            fail_replacements: AtomicBool::new(false),
            fail_artifacts: AtomicBool::new(false),
            commits: AtomicUsize::new(0),
            replacements: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_replacements(&self, fail: bool) {
        self.fail_replacements.store(fail, Ordering::SeqCst);
    }

    pub fn fail_artifacts(&self, fail: bool) {
        self.fail_artifacts.store(fail, Ordering::SeqCst);
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn replacements(&self) -> usize {
        self.replacements.load(Ordering::SeqCst)
    }
}

fn injected(op: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {op} failure"))
}

#[async_trait]
impl<S: TaskStore> TaskStore for InstrumentedStore<S> {
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self, company: &CompanyId) -> Result<Vec<Task>, StoreError> {
        self.inner.list_tasks(company).await
    }

    async fn list_dependents(&self, id: &TaskId) -> Result<Vec<Task>, StoreError> {
        self.inner.list_dependents(id).await
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        self.inner.update_task_status(id, status).await
    }

    async fn commit_statuses(&self, batch: &[StatusChange]) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(injected("commit"));
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit_statuses(batch).await
    }

    async fn list_artifacts(&self, task: &TaskId) -> Result<Vec<Artifact>, StoreError> {
        if self.fail_artifacts.load(Ordering::SeqCst) {
            return Err(injected("artifact listing"));
        }
        self.inner.list_artifacts(task).await
    }

    async fn list_submissions(&self, task: &TaskId) -> Result<Vec<Submission>, StoreError> {
        self.inner.list_submissions(task).await
    }

    async fn replace_submissions(
        &self,
        task: &TaskId,
        submissions: Vec<Submission>,
    ) -> Result<(), StoreError> {
        if self.fail_replacements.load(Ordering::SeqCst) {
            return Err(injected("replace"));
        }
        self.replacements.fetch_add(1, Ordering::SeqCst);
        self.inner.replace_submissions(task, submissions).await
    }
}
