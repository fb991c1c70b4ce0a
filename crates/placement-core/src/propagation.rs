//! Status propagation
//!
//! Planning is pure: [`plan`] takes one company's task snapshot and decides
//! every status write of a run without touching the store. The engine then
//! commits the whole plan as one batch, so a store failure can never leave a
//! run half-applied.
//!
//! Traversal is breadth-first over the forward-edge index, dependents in
//! ascending ID order. A task's own dependents are only enqueued when it
//! transitions to completed in the same run, because gating depends on
//! completion alone. Each task is visited at most once.

use crate::config::EngineConfig;
use crate::error::{EngineError, TaskFailure};
use crate::store::StatusChange;
use placement_graph::{
    effective_interface_type, resolve, resolve_excluding_self, validate_transition,
    InterfaceType, SubmissionRules, Task, TaskGraph, TaskId, TaskStatus, TransitionCause,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, warn};

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    /// The origin was completed elsewhere; re-evaluate its dependents
    Propagate,
    /// Mark the origin completed, then propagate
    Complete,
    /// Reopen the origin and re-gate its direct dependents
    Reset,
}

/// Decisions of one run, before anything is written
#[derive(Debug, Default)]
pub struct Plan {
    /// Tasks re-evaluated, in visit order
    pub visited: Vec<TaskId>,
    /// Status writes, in decision order
    pub changes: Vec<StatusChange>,
    /// Branches that could not be evaluated
    pub failures: Vec<TaskFailure>,
    /// Email tasks that ended up actionable and need their submissions derived
    pub synthesize: Vec<TaskId>,
}

impl Plan {
    fn record(
        &mut self,
        statuses: &mut BTreeMap<TaskId, TaskStatus>,
        id: &TaskId,
        from: TaskStatus,
        to: TaskStatus,
    ) {
        if from != to {
            debug!(task = %id, %from, %to, "status change planned");
            self.changes.push(StatusChange {
                task_id: id.clone(),
                from,
                to,
            });
            statuses.insert(id.clone(), to);
        }
    }
}

/// Plan a run of `kind` starting at `origin`.
///
/// `tasks` must be the complete task list of the origin's company.
///
/// # Errors
/// Errors that abort the whole run: the origin is missing, the origin's own
/// transition is illegal, the origin cannot be resolved on reset, or the visit
/// budget is exhausted. Per-branch problems are collected in
/// [`Plan::failures`] instead.
pub fn plan(
    kind: RunKind,
    origin: &TaskId,
    tasks: &[Task],
    config: &EngineConfig,
) -> Result<Plan, EngineError> {
    let by_id: BTreeMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();
    let origin_task = by_id
        .get(origin)
        .copied()
        .ok_or_else(|| EngineError::TaskNotFound(origin.clone()))?;
    let graph = TaskGraph::build(tasks);
    let mut statuses: BTreeMap<TaskId, TaskStatus> =
        tasks.iter().map(|t| (t.id.clone(), t.status)).collect();
    let budget = config.propagation.max_visits.unwrap_or(tasks.len());
    let rules = &config.submission;

    let mut plan = Plan::default();
    match kind {
        RunKind::Propagate => {
            if !origin_task.status.is_completed() {
                warn!(
                    task = %origin,
                    status = %origin_task.status,
                    "propagating from a task that is not completed"
                );
            }
        }
        RunKind::Complete => {
            let from = origin_task.status;
            validate_transition(from, TaskStatus::Completed, TransitionCause::Completion).map_err(
                |source| EngineError::IllegalTransition {
                    task: origin.clone(),
                    source,
                },
            )?;
            plan.record(&mut statuses, origin, from, TaskStatus::Completed);
        }
        RunKind::Reset => {
            if let Some(members) = graph.cycle_of(origin) {
                return Err(EngineError::cycle(origin, members));
            }
            let from = origin_task.status;
            let to = resolve_excluding_self(origin_task, &statuses)?;
            validate_transition(from, to, TransitionCause::Reset).map_err(|source| {
                EngineError::IllegalTransition {
                    task: origin.clone(),
                    source,
                }
            })?;
            plan.record(&mut statuses, origin, from, to);
            if needs_submissions(origin_task, to, rules) {
                plan.synthesize.push(origin.clone());
            }
        }
    }

    let mut queue: VecDeque<TaskId> = graph.dependents(origin).iter().cloned().collect();
    let mut seen = BTreeSet::from([origin.clone()]);

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if plan.visited.len() >= budget {
            tracing::error!(task = %id, budget, "visit budget exhausted");
            return Err(EngineError::cycle(&id, Vec::new()));
        }
        plan.visited.push(id.clone());

        if let Some(members) = graph.cycle_of(&id) {
            warn!(task = %id, ?members, "skipping task on a dependency cycle");
            plan.failures
                .push(TaskFailure::new(id.clone(), EngineError::cycle(&id, members)));
            continue;
        }
        let Some(task) = by_id.get(&id).copied() else {
            continue;
        };

        let from = statuses.get(&id).copied().unwrap_or(task.status);
        let to = match resolve(task, &statuses) {
            Ok(to) => to,
            Err(err) => {
                warn!(task = %id, error = %err, "branch aborted");
                plan.failures.push(TaskFailure::new(id.clone(), err));
                continue;
            }
        };
        if let Err(source) = validate_transition(from, to, TransitionCause::Propagation) {
            warn!(task = %id, error = %source, "transition rejected");
            plan.failures.push(TaskFailure::new(
                id.clone(),
                EngineError::IllegalTransition {
                    task: id.clone(),
                    source,
                },
            ));
            continue;
        }
        plan.record(&mut statuses, &id, from, to);

        if needs_submissions(task, to, rules) {
            plan.synthesize.push(id.clone());
        }
        if to.is_completed() && !from.is_completed() {
            queue.extend(graph.dependents(&id).iter().cloned());
        }
    }

    Ok(plan)
}

fn needs_submissions(task: &Task, status: TaskStatus, rules: &SubmissionRules) -> bool {
    status.is_actionable() && effective_interface_type(task, rules) == InterfaceType::Email
}

/// Outcome of a propagation, completion or reset run
#[derive(Debug)]
pub struct PropagationReport {
    /// Task the run started from
    pub origin: TaskId,
    /// Kind of run
    pub kind: RunKind,
    /// Tasks re-evaluated, in visit order
    pub visited: Vec<TaskId>,
    /// Status writes committed
    pub updated: Vec<StatusChange>,
    /// Tasks whose submissions were re-derived
    pub synthesized: Vec<TaskId>,
    /// Branch and synthesis failures
    pub errors: Vec<TaskFailure>,
    /// Non-fatal problems found while synthesizing
    pub warnings: Vec<TaskFailure>,
}

impl PropagationReport {
    pub(crate) fn from_plan(kind: RunKind, origin: TaskId, plan: Plan) -> Self {
        Self {
            origin,
            kind,
            visited: plan.visited,
            updated: plan.changes,
            synthesized: Vec::new(),
            errors: plan.failures,
            warnings: Vec::new(),
        }
    }

    /// IDs of tasks whose status changed
    #[must_use]
    pub fn updated_ids(&self) -> Vec<&TaskId> {
        self.updated.iter().map(|c| &c.task_id).collect()
    }

    /// New status of `id`, if this run changed it
    #[must_use]
    pub fn new_status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.updated
            .iter()
            .find(|c| &c.task_id == id)
            .map(|c| c.to)
    }

    /// Whether the run finished without errors
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_graph::CompanyId;
    use pretty_assertions::assert_eq;

    fn task(id: &str, deps: &[&str], status: TaskStatus) -> Task {
        deps.iter()
            .fold(Task::new(id, CompanyId::from("acme"), id), |t, d| t.depends_on(*d))
            .with_status(status)
    }

    fn changes(plan: &Plan) -> Vec<(&str, TaskStatus)> {
        plan.changes
            .iter()
            .map(|c| (c.task_id.as_str(), c.to))
            .collect()
    }

    #[test]
    fn unlocks_direct_dependents_only() {
        let tasks = vec![
            task("a", &[], TaskStatus::Completed),
            task("b", &["a"], TaskStatus::Upcoming),
            task("c", &["b"], TaskStatus::Upcoming),
        ];
        let plan = plan(RunKind::Propagate, &"a".into(), &tasks, &EngineConfig::default()).unwrap();
        assert_eq!(changes(&plan), vec![("b", TaskStatus::NeedsAttention)]);
        assert_eq!(plan.visited, vec![TaskId::from("b")]);
    }

    #[test]
    fn completion_cascades_one_level() {
        let tasks = vec![
            task("a", &[], TaskStatus::Available),
            task("b", &["a"], TaskStatus::Upcoming),
            task("c", &["a", "x"], TaskStatus::Upcoming),
            task("x", &[], TaskStatus::Available),
        ];
        let plan = plan(RunKind::Complete, &"a".into(), &tasks, &EngineConfig::default()).unwrap();
        assert_eq!(
            changes(&plan),
            vec![("a", TaskStatus::Completed), ("b", TaskStatus::NeedsAttention)]
        );
        assert_eq!(plan.visited, vec![TaskId::from("b"), TaskId::from("c")]);
    }

    #[test]
    fn completing_an_upcoming_task_is_illegal() {
        let tasks = vec![
            task("a", &[], TaskStatus::Available),
            task("b", &["a"], TaskStatus::Upcoming),
        ];
        let err = plan(RunKind::Complete, &"b".into(), &tasks, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::IllegalTransition { .. }));
    }

    #[test]
    fn unknown_dependency_aborts_only_its_branch() {
        let tasks = vec![
            task("a", &[], TaskStatus::Completed),
            task("b", &["a", "ghost"], TaskStatus::Upcoming),
            task("c", &["a"], TaskStatus::Upcoming),
        ];
        let plan = plan(RunKind::Propagate, &"a".into(), &tasks, &EngineConfig::default()).unwrap();
        assert_eq!(changes(&plan), vec![("c", TaskStatus::NeedsAttention)]);
        assert_eq!(plan.failures.len(), 1);
        assert!(matches!(
            plan.failures[0].error,
            EngineError::UnknownDependency { .. }
        ));
    }

    #[test]
    fn cyclic_dependents_are_skipped() {
        let tasks = vec![
            task("a", &[], TaskStatus::Completed),
            task("b", &["a", "c"], TaskStatus::Upcoming),
            task("c", &["b"], TaskStatus::Upcoming),
            task("d", &["a"], TaskStatus::Upcoming),
        ];
        let plan = plan(RunKind::Propagate, &"a".into(), &tasks, &EngineConfig::default()).unwrap();
        assert_eq!(changes(&plan), vec![("d", TaskStatus::NeedsAttention)]);
        assert_eq!(plan.failures[0].task_id, TaskId::from("b"));
        assert!(matches!(plan.failures[0].error, EngineError::CycleDetected { .. }));
    }

    #[test]
    fn budget_aborts_the_run() {
        let tasks = vec![
            task("a", &[], TaskStatus::Completed),
            task("b", &["a"], TaskStatus::Upcoming),
            task("c", &["a"], TaskStatus::Upcoming),
        ];
        let config = EngineConfig::default().with_max_visits(1);
        let err = plan(RunKind::Propagate, &"a".into(), &tasks, &config).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));
    }

    #[test]
    fn reset_reopens_and_regates() {
        let tasks = vec![
            task("a", &[], TaskStatus::Completed),
            task("b", &["a"], TaskStatus::NeedsAttention),
            task("c", &["a"], TaskStatus::Completed),
        ];
        let plan = plan(RunKind::Reset, &"a".into(), &tasks, &EngineConfig::default()).unwrap();
        assert_eq!(
            changes(&plan),
            vec![("a", TaskStatus::Available), ("b", TaskStatus::Upcoming)]
        );
    }

    #[test]
    fn actionable_email_tasks_are_flagged() {
        let tasks = vec![
            task("a", &[], TaskStatus::Completed),
            task("send", &["a"], TaskStatus::Upcoming).with_sort_order(7),
            task("draft", &["a"], TaskStatus::Upcoming),
        ];
        let config =
            EngineConfig::default().with_submission_rules(SubmissionRules::new().with_sort_order(7));
        let plan = plan(RunKind::Propagate, &"a".into(), &tasks, &config).unwrap();
        assert_eq!(plan.synthesize, vec![TaskId::from("send")]);
    }
}
