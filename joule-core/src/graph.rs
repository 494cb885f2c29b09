// SPDX-License-Identifier: MIT

//! Task dependency graph (C3).
//!
//! Construction validates acyclicity with Kahn's algorithm, failing with a
//! structured, inspectable reason rather than panicking. Upward rank and
//! priority order feed `heft::plan`'s task ordering; critical-path
//! extraction runs on a finished schedule.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::comm::CommMatrix;
use crate::task::{Resource, ScheduleResult, TaskProfile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate task id: {0}")]
    DuplicateId(String),
    #[error("task {task} depends on unknown predecessor {predecessor}")]
    UnknownPredecessor { task: String, predecessor: String },
    #[error("cycle detected among tasks: {offending_ids:?}")]
    Cycle { offending_ids: Vec<String> },
}

/// A validated, acyclic task dependency graph.
///
/// Stores predecessors as given and derives successors once at
/// construction time so both directions are O(1) to query afterward.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    predecessors: BTreeMap<String, Vec<String>>,
    successors: BTreeMap<String, Vec<String>>,
}

impl TaskGraph {
    /// Build a graph from `id -> list-of-predecessors`.
    ///
    /// # Errors
    /// [`GraphError::UnknownPredecessor`] if an edge references an id not
    /// present as a key; [`GraphError::Cycle`] if Kahn's algorithm cannot
    /// produce a full topological order.
    ///
    /// Duplicate ids cannot arise from a `BTreeMap<String, _>` input (the
    /// map itself enforces uniqueness), so [`GraphError::DuplicateId`] is
    /// reserved for a future builder that accepts a list of `(id, preds)`
    /// pairs rather than a map.
    pub fn new(edges: BTreeMap<String, Vec<String>>) -> Result<Self, GraphError> {
        for (task, preds) in &edges {
            for p in preds {
                if !edges.contains_key(p) {
                    return Err(GraphError::UnknownPredecessor {
                        task: task.clone(),
                        predecessor: p.clone(),
                    });
                }
            }
        }

        let mut successors: BTreeMap<String, Vec<String>> =
            edges.keys().map(|id| (id.clone(), Vec::new())).collect();
        for (task, preds) in &edges {
            for p in preds {
                successors.get_mut(p).unwrap().push(task.clone());
            }
        }

        let mut in_degree: HashMap<&str, usize> =
            edges.iter().map(|(id, preds)| (id.as_str(), preds.len())).collect();
        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut visited_count = 0usize;
        while let Some(id) = queue.pop_front() {
            visited_count += 1;
            for succ in &successors[id] {
                let deg = in_degree.get_mut(succ.as_str()).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(succ.as_str());
                }
            }
        }

        if visited_count != edges.len() {
            let offending_ids: Vec<String> = in_degree
                .iter()
                .filter(|(_, &deg)| deg > 0)
                .map(|(&id, _)| id.to_string())
                .collect();
            return Err(GraphError::Cycle { offending_ids });
        }

        Ok(Self {
            predecessors: edges,
            successors,
        })
    }

    pub fn predecessors(&self, id: &str) -> &[String] {
        self.predecessors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn successors(&self, id: &str) -> &[String] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &String> {
        self.predecessors.keys()
    }

    /// Tasks with no predecessors.
    pub fn entry_tasks(&self) -> Vec<String> {
        self.predecessors
            .iter()
            .filter(|(_, preds)| preds.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Tasks with no successors.
    pub fn exit_tasks(&self) -> Vec<String> {
        self.successors
            .iter()
            .filter(|(_, succs)| succs.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Average execution time of `profile` across every resource that can run
/// it, scaling each resource's unit-speed time by `1 / resource.speed`.
fn average_scaled_time(profile: &TaskProfile, resources: &[Resource]) -> f64 {
    let times: Vec<f64> = resources
        .iter()
        .filter_map(|r| profile.time_for(r.kind).map(|t| t / r.speed))
        .collect();
    if times.is_empty() {
        return 0.0;
    }
    times.iter().sum::<f64>() / times.len() as f64
}

/// Average communication time of `data_size_bytes` across every distinct
/// ordered resource pair.
fn average_comm_time(data_size_bytes: u64, resources: &[Resource], comm: &CommMatrix) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for a in resources {
        for b in resources {
            if a.id != b.id {
                total += comm.comm_time(data_size_bytes, a.id, b.id);
                count += 1;
            }
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Compute each task's upward rank, memoized via depth-first traversal
/// with a visited set.
///
/// `graph` must be acyclic (guaranteed by [`TaskGraph::new`]); `profiles`
/// must contain an entry for every task id in `graph`.
pub fn upward_ranks(
    graph: &TaskGraph,
    profiles: &BTreeMap<String, TaskProfile>,
    resources: &[Resource],
    comm: &CommMatrix,
) -> BTreeMap<String, f64> {
    let mut ranks: HashMap<String, f64> = HashMap::new();
    let mut visiting: HashSet<String> = HashSet::new();

    fn rank_of(
        id: &str,
        graph: &TaskGraph,
        profiles: &BTreeMap<String, TaskProfile>,
        resources: &[Resource],
        comm: &CommMatrix,
        ranks: &mut HashMap<String, f64>,
        visiting: &mut HashSet<String>,
    ) -> f64 {
        if let Some(r) = ranks.get(id) {
            return *r;
        }
        visiting.insert(id.to_string());

        let w_bar = profiles
            .get(id)
            .map(|p| average_scaled_time(p, resources))
            .unwrap_or(0.0);

        let successors = graph.successors(id);
        let rank = if successors.is_empty() {
            w_bar
        } else {
            let data_size = profiles.get(id).map(|p| p.data_size_bytes).unwrap_or(0);
            let c_bar = average_comm_time(data_size, resources, comm);
            let best_successor = successors
                .iter()
                .map(|s| {
                    let sr = rank_of(s, graph, profiles, resources, comm, ranks, visiting);
                    c_bar + sr
                })
                .fold(f64::NEG_INFINITY, f64::max);
            w_bar + best_successor
        };

        visiting.remove(id);
        ranks.insert(id.to_string(), rank);
        rank
    }

    for id in graph.task_ids() {
        rank_of(id, graph, profiles, resources, comm, &mut ranks, &mut visiting);
    }

    ranks.into_iter().collect()
}

/// Sort task ids by descending rank, ties broken by ascending id.
pub fn priority_order(ranks: &BTreeMap<String, f64>) -> Vec<String> {
    let mut ids: Vec<String> = ranks.keys().cloned().collect();
    ids.sort_by(|a, b| {
        let ra = ranks[a];
        let rb = ranks[b];
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.cmp(b))
    });
    ids
}

/// Sum of finish times over every task reachable from (and including) `id`
/// in `schedule`, memoized since the graph may share subtrees.
fn subtree_finish_sum(
    id: &str,
    graph: &TaskGraph,
    schedule: &ScheduleResult,
    memo: &mut HashMap<String, f64>,
) -> f64 {
    if let Some(v) = memo.get(id) {
        return *v;
    }
    let own_finish = schedule.find(id).map(|t| t.finish).unwrap_or(0.0);
    let sum: f64 = own_finish
        + graph
            .successors(id)
            .iter()
            .map(|s| subtree_finish_sum(s, graph, schedule, memo))
            .sum::<f64>();
    memo.insert(id.to_string(), sum);
    sum
}

/// Extract the critical path: starting from the entry task whose reachable
/// subtree has the largest total finish-time, repeatedly follow the
/// successor with the largest subtree finish-time sum until reaching a task
/// with no successors.
pub fn critical_path(graph: &TaskGraph, schedule: &ScheduleResult) -> Vec<String> {
    let entries = graph.entry_tasks();
    if entries.is_empty() {
        return Vec::new();
    }

    let mut memo: HashMap<String, f64> = HashMap::new();
    let mut current = entries
        .iter()
        .max_by(|a, b| {
            subtree_finish_sum(a, graph, schedule, &mut memo)
                .partial_cmp(&subtree_finish_sum(b, graph, schedule, &mut memo))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
        .unwrap();

    let mut path = vec![current.clone()];
    loop {
        let successors = graph.successors(&current);
        if successors.is_empty() {
            break;
        }
        let next = successors
            .iter()
            .max_by(|a, b| {
                subtree_finish_sum(a, graph, schedule, &mut memo)
                    .partial_cmp(&subtree_finish_sum(b, graph, schedule, &mut memo))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
            .unwrap();
        path.push(next.clone());
        current = next;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ResourceKind;

    fn edges(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(id, preds)| ((*id).to_string(), preds.iter().map(|p| p.to_string()).collect()))
            .collect()
    }

    #[test]
    fn detects_unknown_predecessor() {
        let e = edges(&[("a", &["missing"])]);
        assert_eq!(
            TaskGraph::new(e).unwrap_err(),
            GraphError::UnknownPredecessor {
                task: "a".to_string(),
                predecessor: "missing".to_string()
            }
        );
    }

    #[test]
    fn detects_simple_cycle() {
        let e = edges(&[("a", &["b"]), ("b", &["a"])]);
        match TaskGraph::new(e).unwrap_err() {
            GraphError::Cycle { offending_ids } => {
                assert_eq!(offending_ids.len(), 2);
            }
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn linear_chain_builds_and_orders_correctly() {
        let e = edges(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let g = TaskGraph::new(e).unwrap();
        assert_eq!(g.entry_tasks(), vec!["a".to_string()]);
        assert_eq!(g.exit_tasks(), vec!["c".to_string()]);
        assert_eq!(g.successors("a"), &["b".to_string()]);
        assert_eq!(g.predecessors("c"), &["b".to_string()]);
    }

    fn res(id: u32) -> Resource {
        Resource::new(id, ResourceKind::CpuCore, 1.0, 1_000_000, 10.0)
    }

    #[test]
    fn leaf_rank_equals_average_time() {
        let e = edges(&[("a", &[])]);
        let g = TaskGraph::new(e).unwrap();
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "a".to_string(),
            TaskProfile::new("a").with_time(ResourceKind::CpuCore, 10.0),
        );
        let resources = vec![res(1)];
        let comm = CommMatrix::new();
        let ranks = upward_ranks(&g, &profiles, &resources, &comm);
        assert!((ranks["a"] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn priority_order_ties_break_by_ascending_id() {
        let mut ranks = BTreeMap::new();
        ranks.insert("z".to_string(), 5.0);
        ranks.insert("a".to_string(), 5.0);
        ranks.insert("m".to_string(), 10.0);
        let order = priority_order(&ranks);
        assert_eq!(order, vec!["m".to_string(), "a".to_string(), "z".to_string()]);
    }

    #[test]
    fn rank_propagates_from_successor() {
        // a -> b, both cpu-bound at speed 1.0; b has higher weight than a
        let e = edges(&[("a", &[]), ("b", &["a"])]);
        let g = TaskGraph::new(e).unwrap();
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "a".to_string(),
            TaskProfile::new("a").with_time(ResourceKind::CpuCore, 5.0),
        );
        profiles.insert(
            "b".to_string(),
            TaskProfile::new("b").with_time(ResourceKind::CpuCore, 7.0),
        );
        let resources = vec![res(1)];
        let comm = CommMatrix::new();
        let ranks = upward_ranks(&g, &profiles, &resources, &comm);
        assert!((ranks["b"] - 7.0).abs() < 1e-9);
        assert!((ranks["a"] - 12.0).abs() < 1e-9); // w(a) + c(a,b) + rank(b), c=0 (single resource)
    }
}
