use placement_graph::{resolve, CompanyId, Task, TaskGraph, TaskId, TaskStatus};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;

fn company() -> CompanyId {
    CompanyId::from("acme")
}

proptest! {
    // Edges only point from lower to higher index, so the graph is a DAG by
    // construction and must validate and sort cleanly.
    #[test]
    fn prop_forward_only_graphs_validate(
        node_count in 1..25usize,
        edges in proptest::collection::vec((0..25usize, 0..25usize), 0..60)
    ) {
        let mut tasks: Vec<Task> = (0..node_count)
            .map(|i| Task::new(format!("t{i:02}"), company(), format!("task {i}")))
            .collect();

        for (a, b) in edges {
            if a < b && b < node_count {
                let dep = tasks[a].id.clone();
                let t = tasks[b].clone().depends_on(dep);
                tasks[b] = t;
            }
        }

        let graph = TaskGraph::build(&tasks);
        prop_assert!(graph.validate().is_ok());

        let order = graph.topological_order().unwrap();
        prop_assert_eq!(order.len(), node_count);
        for task in &tasks {
            let pos = order.iter().position(|t| t == &task.id).unwrap();
            for dep in &task.dependencies {
                let dep_pos = order.iter().position(|t| t == dep).unwrap();
                prop_assert!(dep_pos < pos);
            }
        }
    }

    // Closing any back edge must be reported as a cycle.
    #[test]
    fn prop_back_edge_is_detected(chain_len in 2..12usize) {
        let mut tasks: Vec<Task> = (0..chain_len)
            .map(|i| Task::new(format!("t{i:02}"), company(), "step"))
            .collect();
        for i in 1..chain_len {
            let dep = tasks[i - 1].id.clone();
            let t = tasks[i].clone().depends_on(dep);
            tasks[i] = t;
        }
        let last = tasks[chain_len - 1].id.clone();
        let t = tasks[0].clone().depends_on(last);
        tasks[0] = t;

        let graph = TaskGraph::build(&tasks);
        prop_assert!(graph.validate().is_err());
        for task in &tasks {
            prop_assert!(graph.is_cyclic(&task.id));
        }
    }
}

#[test]
fn resolution_follows_a_chain() {
    let a = Task::new("a", company(), "collect").with_status(TaskStatus::Completed);
    let b = Task::new("b", company(), "research").depends_on("a");
    let c = Task::new("c", company(), "draft").depends_on("b");

    let mut statuses: HashMap<TaskId, TaskStatus> = HashMap::new();
    statuses.insert(a.id.clone(), a.status);
    statuses.insert(b.id.clone(), b.status);
    statuses.insert(c.id.clone(), c.status);

    assert_eq!(resolve(&a, &statuses).unwrap(), TaskStatus::Completed);
    assert_eq!(resolve(&b, &statuses).unwrap(), TaskStatus::NeedsAttention);
    assert_eq!(resolve(&c, &statuses).unwrap(), TaskStatus::Upcoming);
}
