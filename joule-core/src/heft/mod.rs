// SPDX-License-Identifier: MIT

//! HEFT planner (C5).
//!
//! `plan` is the single public entry point: given a validated [`TaskGraph`],
//! per-task [`TaskProfile`]s, a mutable resource set, and an optional
//! communication matrix, it produces a [`ScheduleResult`] or a structured
//! [`HeftError`]. Logs one `info!` per completed plan and one `debug!` per
//! per-task placement decision.

pub mod error;
pub mod feasibility;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::comm::CommMatrix;
use crate::graph::{self, TaskGraph};
use crate::task::{Resource, ScheduleResult, ScheduledTask, TaskProfile};

pub use error::{HeftError, PlacementReason};

/// Run the HEFT planner over `graph`.
///
/// `resources` is reset (`available_at = 0`, `committed_memory_bytes = 0`)
/// at the start of every call, so a resource vector may be reused across
/// independent `plan` invocations (see `task::Resource::reset`).
///
/// # Errors
/// [`HeftError::MissingProfile`] if `graph` names a task absent from
/// `profiles`; [`HeftError::PlacementRejected`] (with
/// [`PlacementReason::NoFeasibleResource`]) if no resource's kind intersects
/// a task's profile, or (with [`PlacementReason::MemoryExhausted`]) if every
/// kind-compatible resource lacks sufficient free memory.
pub fn plan(
    graph: &TaskGraph,
    profiles: &BTreeMap<String, TaskProfile>,
    resources: &mut [Resource],
    comm_matrix: Option<CommMatrix>,
) -> Result<ScheduleResult, HeftError> {
    for id in graph.task_ids() {
        if !profiles.contains_key(id) {
            return Err(HeftError::MissingProfile { task_id: id.clone() });
        }
    }

    let comm = comm_matrix.unwrap_or_else(|| CommMatrix::create_default_matrix(resources));

    let ranks = graph::upward_ranks(graph, profiles, resources, &comm);
    let order = graph::priority_order(&ranks);

    // Work on a private copy so a mid-plan failure leaves the caller's
    // resources untouched: resource-exhaustion errors must mutate no state.
    let mut working: Vec<Resource> = resources.to_vec();
    for r in working.iter_mut() {
        r.reset();
    }

    let mut scheduled: BTreeMap<String, ScheduledTask> = BTreeMap::new();

    for task_id in &order {
        let profile = &profiles[task_id];

        let mut best: Option<(usize, f64, f64, f64)> = None; // (resource idx, earliest_start, finish, data_ready)

        for (idx, r) in working.iter().enumerate() {
            let Some(unit_time) = profile.time_for(r.kind) else {
                continue;
            };
            if r.free_memory_bytes() < profile.memory_required_bytes {
                continue;
            }

            let data_ready_time = graph
                .predecessors(task_id)
                .iter()
                .map(|dep_id| {
                    let dep = &scheduled[dep_id];
                    let dep_profile = &profiles[dep_id];
                    dep.finish + comm.comm_time(dep_profile.data_size_bytes, dep.resource_id, r.id)
                })
                .fold(0.0_f64, f64::max);

            let earliest_start = r.available_at.max(data_ready_time);
            let exec_time = unit_time / r.speed;
            let finish = earliest_start + exec_time;

            let better = match &best {
                None => true,
                Some((best_idx, _, best_finish, _)) => {
                    finish < *best_finish || (finish == *best_finish && r.id < working[*best_idx].id)
                }
            };
            if better {
                best = Some((idx, earliest_start, finish, data_ready_time));
            }
        }

        let Some((idx, earliest_start, finish, data_ready_time)) = best else {
            let kind_supported = working.iter().any(|r| profile.time_for(r.kind).is_some());
            let reason = if kind_supported {
                PlacementReason::MemoryExhausted {
                    required_bytes: profile.memory_required_bytes,
                }
            } else {
                PlacementReason::NoFeasibleResource
            };
            return Err(HeftError::PlacementRejected {
                task_id: task_id.clone(),
                reason,
            });
        };

        let resource = &mut working[idx];
        debug!(
            task = %task_id,
            resource = resource.id,
            start = earliest_start,
            finish,
            "placed task"
        );
        resource.available_at = finish;
        resource.committed_memory_bytes += profile.memory_required_bytes;

        scheduled.insert(
            task_id.clone(),
            ScheduledTask {
                task_id: task_id.clone(),
                resource_id: resource.id,
                start: earliest_start,
                finish,
                dependencies: graph.predecessors(task_id).to_vec(),
                data_ready_time,
            },
        );
    }

    let makespan = scheduled.values().map(|t| t.finish).fold(0.0_f64, f64::max);

    let mut busy_time: BTreeMap<u32, f64> = working.iter().map(|r| (r.id, 0.0)).collect();
    let mut task_count: BTreeMap<u32, usize> = working.iter().map(|r| (r.id, 0)).collect();
    let mut total_energy_j = 0.0;
    for t in scheduled.values() {
        let duration = t.finish - t.start;
        *busy_time.entry(t.resource_id).or_insert(0.0) += duration;
        *task_count.entry(t.resource_id).or_insert(0) += 1;
        if let Some(r) = working.iter().find(|r| r.id == t.resource_id) {
            total_energy_j += r.power_watts * duration;
        }
    }
    let utilization: BTreeMap<u32, f64> = busy_time
        .iter()
        .map(|(&id, &busy)| {
            let pct = if makespan > 0.0 { busy / makespan * 100.0 } else { 0.0 };
            (id, pct)
        })
        .collect();

    // Advisory only: HEFT's placements are aperiodic, so an exceeded Liu &
    // Layland bound does not invalidate the schedule above.
    for (&id, &busy) in &busy_time {
        let n = task_count[&id];
        let fraction = if makespan > 0.0 { busy / makespan } else { 0.0 };
        if let Some(u) = feasibility::check(fraction, n) {
            warn!(resource = id, utilization = u, n_tasks = n, "exceeds Liu & Layland schedulability bound");
        }
    }

    let tasks: Vec<ScheduledTask> = order
        .iter()
        .map(|id| scheduled.remove(id).expect("every task was scheduled above"))
        .collect();

    let result_for_critical_path = ScheduleResult {
        tasks: tasks.clone(),
        makespan,
        utilization: utilization.clone(),
        total_energy_j,
        critical_path: Vec::new(),
    };
    let critical_path = graph::critical_path(graph, &result_for_critical_path);

    info!(
        n_tasks = tasks.len(),
        makespan,
        total_energy_j,
        "plan complete"
    );

    // Plan succeeded: publish the committed resource state back to the caller.
    resources.clone_from_slice(&working);

    Ok(ScheduleResult {
        tasks,
        makespan,
        utilization,
        total_energy_j,
        critical_path,
    })
}

/// Validate a schedule's core guarantee: every task's start is no earlier
/// than every predecessor's finish plus the required communication time.
///
/// Returns the first violating `(task_id, predecessor_id)` pair found, or
/// `None` if the schedule satisfies the guarantee.
///
/// Takes `profiles` and `comm` rather than the `TaskGraph` alone: computing
/// `required` needs each predecessor's `data_size_bytes` (from `profiles`)
/// and the per-resource-pair transfer cost (from `comm`), neither of which
/// the dependency graph itself carries. [`validate_schedule_bool`] is the
/// boolean-returning counterpart for callers that only need a yes/no check.
pub fn validate_schedule(
    schedule: &ScheduleResult,
    profiles: &BTreeMap<String, TaskProfile>,
    comm: &CommMatrix,
) -> Option<(String, String)> {
    for t in &schedule.tasks {
        for dep_id in &t.dependencies {
            let Some(dep) = schedule.find(dep_id) else { continue };
            let data_size = profiles.get(dep_id).map(|p| p.data_size_bytes).unwrap_or(0);
            let required = dep.finish + comm.comm_time(data_size, dep.resource_id, t.resource_id);
            if t.start + 1e-9 < required {
                return Some((t.task_id.clone(), dep_id.clone()));
            }
        }
    }
    None
}

/// Boolean-returning form of [`validate_schedule`]: `true` iff no violation
/// is found.
pub fn validate_schedule_bool(
    schedule: &ScheduleResult,
    profiles: &BTreeMap<String, TaskProfile>,
    comm: &CommMatrix,
) -> bool {
    validate_schedule(schedule, profiles, comm).is_none()
}

/// The schedule's overall makespan: the maximum finish time across all
/// scheduled tasks.
pub fn makespan(schedule: &ScheduleResult) -> f64 {
    schedule.makespan
}

/// Per-resource utilization percentage, `busy_time / makespan * 100`.
pub fn resource_utilization(schedule: &ScheduleResult) -> &BTreeMap<u32, f64> {
    &schedule.utilization
}

/// The schedule's critical path, as computed by [`graph::critical_path`].
pub fn critical_path(schedule: &ScheduleResult) -> &[String] {
    &schedule.critical_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ResourceKind;

    fn res(id: u32, speed: f64, power: f64) -> Resource {
        Resource::new(id, ResourceKind::CpuCore, speed, 1_000_000_000, power)
    }

    fn linear_graph() -> TaskGraph {
        let mut edges = BTreeMap::new();
        edges.insert("a".to_string(), vec![]);
        edges.insert("b".to_string(), vec!["a".to_string()]);
        edges.insert("c".to_string(), vec!["b".to_string()]);
        TaskGraph::new(edges).unwrap()
    }

    fn linear_profiles() -> BTreeMap<String, TaskProfile> {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), TaskProfile::new("a").with_time(ResourceKind::CpuCore, 4.0));
        m.insert("b".to_string(), TaskProfile::new("b").with_time(ResourceKind::CpuCore, 4.0));
        m.insert("c".to_string(), TaskProfile::new("c").with_time(ResourceKind::CpuCore, 4.0));
        m
    }

    #[test]
    fn single_resource_schedules_tasks_sequentially() {
        let graph = linear_graph();
        let profiles = linear_profiles();
        let mut resources = vec![res(1, 1.0, 10.0)];
        let result = plan(&graph, &profiles, &mut resources, None).unwrap();
        assert_eq!(result.tasks.len(), 3);
        assert!((result.makespan - 12.0).abs() < 1e-9);
        assert!(validate_schedule(&result, &profiles, &CommMatrix::create_default_matrix(&resources)).is_none());
    }

    #[test]
    fn missing_profile_is_an_error() {
        let graph = linear_graph();
        let mut profiles = linear_profiles();
        profiles.remove("b");
        let mut resources = vec![res(1, 1.0, 10.0)];
        let err = plan(&graph, &profiles, &mut resources, None).unwrap_err();
        assert_eq!(err, HeftError::MissingProfile { task_id: "b".to_string() });
    }

    #[test]
    fn no_feasible_resource_when_kinds_never_match() {
        let mut edges = BTreeMap::new();
        edges.insert("a".to_string(), vec![]);
        let graph = TaskGraph::new(edges).unwrap();
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "a".to_string(),
            TaskProfile::new("a").with_time(ResourceKind::GpuDevice, 1.0),
        );
        let mut resources = vec![res(1, 1.0, 10.0)]; // CpuCore only
        let err = plan(&graph, &profiles, &mut resources, None).unwrap_err();
        assert_eq!(
            err,
            HeftError::PlacementRejected {
                task_id: "a".to_string(),
                reason: PlacementReason::NoFeasibleResource,
            }
        );
    }

    #[test]
    fn memory_exhausted_when_every_resource_lacks_space() {
        let mut edges = BTreeMap::new();
        edges.insert("a".to_string(), vec![]);
        let graph = TaskGraph::new(edges).unwrap();
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "a".to_string(),
            TaskProfile::new("a")
                .with_time(ResourceKind::CpuCore, 1.0)
                .with_memory(2_000),
        );
        let mut resources = vec![Resource::new(1, ResourceKind::CpuCore, 1.0, 1_000, 10.0)];
        let err = plan(&graph, &profiles, &mut resources, None).unwrap_err();
        assert_eq!(
            err,
            HeftError::PlacementRejected {
                task_id: "a".to_string(),
                reason: PlacementReason::MemoryExhausted { required_bytes: 2_000 },
            }
        );
    }

    #[test]
    fn faster_resource_preferred_for_earlier_finish() {
        let mut edges = BTreeMap::new();
        edges.insert("a".to_string(), vec![]);
        let graph = TaskGraph::new(edges).unwrap();
        let mut profiles = BTreeMap::new();
        profiles.insert("a".to_string(), TaskProfile::new("a").with_time(ResourceKind::CpuCore, 10.0));
        let mut resources = vec![res(1, 1.0, 10.0), res(2, 2.0, 20.0)];
        let result = plan(&graph, &profiles, &mut resources, None).unwrap();
        assert_eq!(result.tasks[0].resource_id, 2);
        assert!((result.tasks[0].finish - 5.0).abs() < 1e-9);
    }

    #[test]
    fn plan_is_deterministic_across_repeated_calls() {
        let graph = linear_graph();
        let profiles = linear_profiles();
        let mut resources = vec![res(1, 1.0, 10.0), res(2, 1.5, 15.0)];
        let first = plan(&graph, &profiles, &mut resources, None).unwrap();
        let second = plan(&graph, &profiles, &mut resources, None).unwrap();
        assert_eq!(first.makespan, second.makespan);
        for (a, b) in first.tasks.iter().zip(second.tasks.iter()) {
            assert_eq!(a.task_id, b.task_id);
            assert_eq!(a.resource_id, b.resource_id);
            assert_eq!(a.start, b.start);
            assert_eq!(a.finish, b.finish);
        }
    }

    #[test]
    fn scenario_a_heft_canonical() {
        use crate::comm::LinkCost;

        let mut edges = BTreeMap::new();
        edges.insert("t1".to_string(), vec![]);
        edges.insert("t2".to_string(), vec!["t1".to_string()]);
        edges.insert("t3".to_string(), vec!["t1".to_string()]);
        edges.insert("t4".to_string(), vec!["t2".to_string(), "t3".to_string()]);
        let graph = TaskGraph::new(edges).unwrap();

        // 2,000,000 bytes at 1,000,000 bytes/s = 2s transfer, no latency,
        // so any cross-resource dependency costs exactly 2s to satisfy.
        let data_size = 2_000_000u64;
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "t1".to_string(),
            TaskProfile::new("t1")
                .with_time(ResourceKind::CpuCore, 14.0)
                .with_time(ResourceKind::GpuDevice, 16.0)
                .with_data_size(data_size),
        );
        profiles.insert(
            "t2".to_string(),
            TaskProfile::new("t2")
                .with_time(ResourceKind::CpuCore, 13.0)
                .with_time(ResourceKind::GpuDevice, 19.0)
                .with_data_size(data_size),
        );
        profiles.insert(
            "t3".to_string(),
            TaskProfile::new("t3")
                .with_time(ResourceKind::CpuCore, 11.0)
                .with_time(ResourceKind::GpuDevice, 13.0)
                .with_data_size(data_size),
        );
        profiles.insert(
            "t4".to_string(),
            TaskProfile::new("t4")
                .with_time(ResourceKind::CpuCore, 13.0)
                .with_time(ResourceKind::GpuDevice, 8.0)
                .with_data_size(data_size),
        );

        let mut resources = vec![
            Resource::new(1, ResourceKind::CpuCore, 1.0, 1_000_000_000, 50.0),
            Resource::new(2, ResourceKind::GpuDevice, 1.0, 1_000_000_000, 150.0),
        ];
        let mut comm = CommMatrix::new();
        comm.set_link(1, 2, LinkCost::new(1.0, 0.0));
        comm.set_link(2, 1, LinkCost::new(1.0, 0.0));

        let result = plan(&graph, &profiles, &mut resources, Some(comm.clone())).unwrap();

        // t1: CPU finish 14 < GPU finish 16 -> CPU wins, starts at 0.
        let t1 = result.find("t1").unwrap();
        assert_eq!(t1.resource_id, 1);
        assert_eq!(t1.start, 0.0);
        assert!((t1.finish - 14.0).abs() < 1e-9);

        assert!(validate_schedule(&result, &profiles, &comm).is_none());
        assert!(validate_schedule_bool(&result, &profiles, &comm));
        assert!(result.makespan <= 40.0, "makespan {} should be <= 40", result.makespan);
        assert!(result.critical_path.contains(&"t1".to_string()));
    }
}
