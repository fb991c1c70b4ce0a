use placement_core::{plan, Engine, EngineConfig, RunKind, Snapshot};
use placement_graph::{resolve, TaskStatus};
use placement_test_utils::{chain, dag_tasks, seeded_store};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

proptest! {
    // Every task in the company may be the origin; no run visits a task twice.
    #[test]
    fn prop_each_task_visited_at_most_once(tasks in dag_tasks(20), pick in any::<prop::sample::Index>()) {
        let origin = tasks[pick.index(tasks.len())].id.clone();
        let kind = if tasks[pick.index(tasks.len())].status.is_actionable() {
            RunKind::Complete
        } else {
            RunKind::Propagate
        };

        let plan = plan(kind, &origin, &tasks, &EngineConfig::default()).unwrap();

        let unique: BTreeSet<_> = plan.visited.iter().collect();
        prop_assert_eq!(unique.len(), plan.visited.len());
        prop_assert!(plan.visited.len() <= tasks.len());
        prop_assert!(!plan.visited.contains(&origin));
        prop_assert!(plan.failures.is_empty());
    }

    // After a committed run, every visited task agrees with the resolver.
    #[test]
    fn prop_visited_tasks_are_consistent(tasks in dag_tasks(15), pick in any::<prop::sample::Index>()) {
        let origin = tasks[pick.index(tasks.len())].id.clone();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let engine = Engine::new(
            seeded_store(Snapshot { tasks, ..Snapshot::default() }),
            EngineConfig::default(),
        );

        let report = runtime.block_on(engine.propagate(&origin)).unwrap();

        let after = engine.store().snapshot().tasks;
        let statuses: BTreeMap<_, _> = after.iter().map(|t| (t.id.clone(), t.status)).collect();
        for task in after.iter().filter(|t| report.visited.contains(&t.id)) {
            prop_assert_eq!(resolve(task, &statuses).unwrap(), task.status);
        }
    }
}

#[tokio::test]
async fn chain_advances_one_step_per_completion() {
    let tasks = chain(5);
    let ids: Vec<_> = tasks.iter().map(|t| t.id.clone()).collect();
    let engine = Engine::new(
        seeded_store(Snapshot {
            tasks,
            ..Snapshot::default()
        }),
        EngineConfig::default(),
    );

    for (step, id) in ids.iter().enumerate() {
        let report = engine.complete_task(id).await.unwrap();
        let statuses = engine.store().statuses();
        assert_eq!(statuses[id], TaskStatus::Completed);
        if let Some(next) = ids.get(step + 1) {
            assert_eq!(statuses[next], TaskStatus::NeedsAttention);
            assert_eq!(report.visited, vec![next.clone()]);
        }
        for later in ids.iter().skip(step + 2) {
            assert_eq!(statuses[later], TaskStatus::Upcoming);
        }
    }
}
