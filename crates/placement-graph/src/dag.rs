//! Forward-edge index over one company's tasks
//!
//! Built from a task snapshot. Dependents are kept sorted by task ID so any
//! traversal over them is reproducible. Cycles that slipped past
//! creation-time validation are located up front with Tarjan's SCC, so a
//! traversal can refuse to enter them instead of looping.

use crate::ids::TaskId;
use crate::task::Task;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Structural problems in a task graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Tasks depend on each other in a loop
    #[error("dependency cycle through {members:?}")]
    CycleDetected {
        /// Tasks on the cycle, sorted
        members: Vec<TaskId>,
    },

    /// A dependency does not name an existing task
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        /// Dependent task
        task: TaskId,
        /// Missing dependency
        dependency: TaskId,
    },
}

/// Dependency graph of one company's tasks
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
    dependents: BTreeMap<TaskId, Vec<TaskId>>,
    missing: BTreeMap<TaskId, Vec<TaskId>>,
    cycles: Vec<Vec<TaskId>>,
    cyclic: BTreeSet<TaskId>,
}

impl TaskGraph {
    /// Build the graph from a task snapshot
    #[must_use]
    pub fn build<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut sorted: Vec<&Task> = tasks.into_iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut graph = DiGraph::new();
        let mut index = HashMap::with_capacity(sorted.len());
        for task in &sorted {
            let node = graph.add_node(task.id.clone());
            index.insert(task.id.clone(), node);
        }

        let mut dependents: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        let mut missing: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for task in &sorted {
            for dep in task.unique_dependencies() {
                match index.get(dep) {
                    Some(&from) => {
                        graph.update_edge(from, index[&task.id], ());
                        dependents.entry(dep.clone()).or_default().push(task.id.clone());
                    }
                    None => missing.entry(task.id.clone()).or_default().push(dep.clone()),
                }
            }
        }
        for list in dependents.values_mut() {
            list.sort();
            list.dedup();
        }

        let mut cycles = Vec::new();
        for component in tarjan_scc(&graph) {
            let looped = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&n| graph.contains_edge(n, n));
            if looped {
                let mut members: Vec<TaskId> =
                    component.iter().map(|&n| graph[n].clone()).collect();
                members.sort();
                cycles.push(members);
            }
        }
        cycles.sort();
        let cyclic = cycles.iter().flatten().cloned().collect();

        Self {
            graph,
            index,
            dependents,
            missing,
            cycles,
            cyclic,
        }
    }

    /// Number of tasks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the graph has no tasks
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `id` is a task in this graph
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// Direct dependents of `id`, ascending by task ID
    #[must_use]
    pub fn dependents(&self, id: &TaskId) -> &[TaskId] {
        self.dependents.get(id).map_or(&[], Vec::as_slice)
    }

    /// Dependencies of `id` that name no task
    #[must_use]
    pub fn missing_dependencies(&self, id: &TaskId) -> &[TaskId] {
        self.missing.get(id).map_or(&[], Vec::as_slice)
    }

    /// Whether `id` lies on a dependency cycle
    #[inline]
    #[must_use]
    pub fn is_cyclic(&self, id: &TaskId) -> bool {
        self.cyclic.contains(id)
    }

    /// The cycle containing `id`, if any
    #[must_use]
    pub fn cycle_of(&self, id: &TaskId) -> Option<&[TaskId]> {
        self.cycles
            .iter()
            .find(|c| c.contains(id))
            .map(Vec::as_slice)
    }

    /// Check the whole graph: every dependency exists and there are no cycles.
    ///
    /// # Errors
    /// The first problem found, unknown dependencies before cycles.
    pub fn validate(&self) -> Result<(), GraphError> {
        if let Some((task, deps)) = self.missing.iter().next() {
            return Err(GraphError::UnknownDependency {
                task: task.clone(),
                dependency: deps[0].clone(),
            });
        }
        if let Some(members) = self.cycles.first() {
            return Err(GraphError::CycleDetected {
                members: members.clone(),
            });
        }
        Ok(())
    }

    /// Tasks ordered so every dependency precedes its dependents
    ///
    /// # Errors
    /// [`GraphError::CycleDetected`] if the graph is not a DAG.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order.into_iter().map(|n| self.graph[n].clone()).collect()),
            Err(cycle) => Err(GraphError::CycleDetected {
                members: self
                    .cycle_of(&self.graph[cycle.node_id()])
                    .map_or_else(|| vec![self.graph[cycle.node_id()].clone()], <[TaskId]>::to_vec),
            }),
        }
    }
}
