//! Engine facade
//!
//! [`Engine`] is the public surface: status resolution, interface-type
//! derivation, propagation after a completion, explicit completion and
//! reset, and submission synthesis. Every mutating operation holds its
//! company's lock for the whole read-decide-write cycle.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result, TaskFailure};
use crate::lock::CompanyLocks;
use crate::propagation::{self, PropagationReport, RunKind};
use crate::store::TaskStore;
use crate::synthesis::{self, DependencyOutput, SourceBlock, SynthesisReport};
use futures::future::try_join_all;
use placement_artifact::{current_parts, CacheStats, ParseCache};
use placement_graph::{effective_interface_type, resolve, InterfaceType, Task, TaskId, TaskStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Task dependency and derived-submission engine
#[derive(Debug)]
pub struct Engine<S> {
    store: Arc<S>,
    config: EngineConfig,
    locks: CompanyLocks,
    cache: ParseCache,
}

impl<S: TaskStore> Engine<S> {
    /// Create an engine over `store`
    #[must_use]
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let cache = ParseCache::new(config.cache.capacity);
        Self {
            store,
            config,
            locks: CompanyLocks::new(),
            cache,
        }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse cache statistics
    #[inline]
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Status `task_id` should have given its dependencies' current statuses
    ///
    /// # Errors
    /// [`EngineError::TaskNotFound`], [`EngineError::UnknownDependency`] or a
    /// store failure.
    pub async fn resolve_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let task = self.fetch_task(task_id).await?;
        let dependencies =
            try_join_all(task.unique_dependencies().into_iter().map(|d| self.store.get_task(d)))
                .await?;
        let statuses: BTreeMap<TaskId, TaskStatus> = dependencies
            .into_iter()
            .flatten()
            .map(|dep| (dep.id, dep.status))
            .collect();
        Ok(resolve(&task, &statuses)?)
    }

    /// Interface type of `task`: the stored value, or the derivation from
    /// the configured submission rules when none is stored
    #[inline]
    #[must_use]
    pub fn derive_interface_type(&self, task: &Task) -> InterfaceType {
        effective_interface_type(task, &self.config.submission)
    }

    /// Re-evaluate the dependents of a task that was completed elsewhere
    ///
    /// # Errors
    /// Run-level failures only; per-branch failures are in the report.
    pub async fn propagate(&self, task_id: &TaskId) -> Result<PropagationReport> {
        self.run(RunKind::Propagate, task_id).await
    }

    /// Completion trigger; same as [`Engine::propagate`]
    ///
    /// # Errors
    /// See [`Engine::propagate`].
    #[inline]
    pub async fn on_task_completed(&self, task_id: &TaskId) -> Result<PropagationReport> {
        self.propagate(task_id).await
    }

    /// Mark a task completed and propagate, as one run
    ///
    /// # Errors
    /// [`EngineError::IllegalTransition`] unless the task is available or
    /// needs attention, plus the errors of [`Engine::propagate`].
    pub async fn complete_task(&self, task_id: &TaskId) -> Result<PropagationReport> {
        self.run(RunKind::Complete, task_id).await
    }

    /// Reopen a task and re-gate its direct dependents.
    ///
    /// Completed dependents are left alone.
    ///
    /// # Errors
    /// [`EngineError::UnknownDependency`] or [`EngineError::CycleDetected`]
    /// for the task itself, plus the errors of [`Engine::propagate`].
    pub async fn reset_task(&self, task_id: &TaskId) -> Result<PropagationReport> {
        self.run(RunKind::Reset, task_id).await
    }

    /// Re-derive the submissions of a task from its dependencies' current
    /// artifacts, replacing the previous set.
    ///
    /// # Errors
    /// [`EngineError::TaskNotFound`] or a store failure; the previous set is
    /// untouched on failure.
    pub async fn synthesize_submissions(&self, task_id: &TaskId) -> Result<SynthesisReport> {
        let task = self.fetch_task(task_id).await?;
        let _guard = self.locks.acquire(&task.company_id).await;
        let task = self.fetch_task(task_id).await?;
        if self.derive_interface_type(&task) != InterfaceType::Email {
            debug!(task = %task.id, "synthesizing for a task that is not an email task");
        }
        self.synthesize_locked(&task).await
    }

    async fn fetch_task(&self, task_id: &TaskId) -> Result<Task> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))
    }

    async fn run(&self, kind: RunKind, task_id: &TaskId) -> Result<PropagationReport> {
        let origin = self.fetch_task(task_id).await?;
        let _guard = self.locks.acquire(&origin.company_id).await;

        let tasks = self.store.list_tasks(&origin.company_id).await?;
        info!(
            task = %task_id,
            company = %origin.company_id,
            ?kind,
            tasks = tasks.len(),
            "run started"
        );

        let plan = propagation::plan(kind, task_id, &tasks, &self.config)?;
        if !plan.changes.is_empty() {
            if let Err(err) = self.store.commit_statuses(&plan.changes).await {
                error!(task = %task_id, error = %err, "status commit failed, run aborted");
                return Err(err.into());
            }
            info!(task = %task_id, writes = plan.changes.len(), "statuses committed");
        }

        let pending = plan.synthesize.clone();
        let mut report = PropagationReport::from_plan(kind, task_id.clone(), plan);
        for id in pending {
            let Some(task) = tasks.iter().find(|t| t.id == id) else {
                continue;
            };
            match self.synthesize_locked(task).await {
                Ok(outcome) => {
                    report.warnings.extend(
                        outcome
                            .warnings
                            .into_iter()
                            .map(|w| TaskFailure::new(id.clone(), w)),
                    );
                    report.synthesized.push(id);
                }
                Err(err) => {
                    warn!(task = %id, error = %err, "submission synthesis failed");
                    report.errors.push(TaskFailure::new(id, err));
                }
            }
        }

        info!(
            task = %task_id,
            updated = report.updated.len(),
            synthesized = report.synthesized.len(),
            errors = report.errors.len(),
            "run finished"
        );
        Ok(report)
    }

    async fn synthesize_locked(&self, task: &Task) -> Result<SynthesisReport> {
        let dependencies: Vec<&TaskId> = task.unique_dependencies();
        let listings =
            try_join_all(dependencies.iter().map(|d| self.store.list_artifacts(d))).await?;

        let mut warnings = Vec::new();
        let mut outputs = Vec::with_capacity(dependencies.len());
        for (dependency, artifacts) in dependencies.into_iter().zip(listings) {
            let current = current_parts(artifacts);
            warnings.extend(current.issues.iter().map(|issue| EngineError::MalformedArtifact {
                task: dependency.clone(),
                artifact: None,
                reason: issue.to_string(),
            }));

            let mut blocks = Vec::new();
            for part in &current.parts {
                let outcome = self.cache.get_or_parse(&part.content).await;
                warnings.extend(outcome.diagnostics.iter().map(|d| {
                    EngineError::MalformedArtifact {
                        task: dependency.clone(),
                        artifact: Some(part.id.clone()),
                        reason: d.to_string(),
                    }
                }));
                blocks.extend(outcome.blocks.iter().cloned().map(|block| SourceBlock {
                    artifact_name: part.name.clone(),
                    block,
                }));
            }
            outputs.push(DependencyOutput {
                task_id: dependency.clone(),
                blocks,
            });
        }

        let mut report = synthesis::synthesize(task, &outputs, &self.config.synthesis);
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        for warning in &report.warnings {
            warn!(task = %task.id, %warning, "synthesis warning");
        }

        self.store
            .replace_submissions(&task.id, report.submissions.clone())
            .await?;
        info!(task = %task.id, submissions = report.submissions.len(), "submissions replaced");
        Ok(report)
    }
}
