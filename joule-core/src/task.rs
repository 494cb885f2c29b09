// SPDX-License-Identifier: MIT

//! Core data structures shared by every scheduling subsystem.
//!
//! [`Task`] is the user-facing unit of work; [`TaskProfile`] carries its
//! per-resource-kind timing; [`Resource`] is a single compute element the
//! planner can place work on. [`ScheduledTask`] and [`ScheduleResult`] are
//! the planner's output.
//!
//! # Ownership model
//! A [`Task`] is immutable input. [`Resource`] is the only mutable piece of
//! state the HEFT planner touches (`available_at`, `committed_memory_bytes`)
//! — callers must not share a resource vector across concurrent planner
//! invocations without external synchronization (see `heft::plan`).

use std::collections::BTreeMap;

// ── Workload classification ───────────────────────────────────────────────────

/// Coarse classification of what a task spends its time doing.
///
/// A small closed set, matched exhaustively wherever behaviour depends on
/// it — deliberately not an open-world trait object, so exhaustive
/// matching catches a new kind at compile time rather than at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkloadTag {
    #[default]
    CpuBound,
    GpuBound,
    MemoryBound,
    IoBound,
}

// ── Resource kind ──────────────────────────────────────────────────────────────

/// The kind of compute element a [`Resource`] represents.
///
/// Also used as the key type for a [`TaskProfile`]'s per-kind execution
/// times, so it must be `Ord` to live in a `BTreeMap` with deterministic
/// iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    CpuCore,
    GpuDevice,
    MemoryNode,
    Accelerator,
}

// ── Task (input) ───────────────────────────────────────────────────────────────

/// An opaque unit of work submitted for planning.
///
/// The scheduler never executes a task's body — it only reasons about its
/// resource requirements and dependency edges.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique identifier within a submission.
    pub id: String,
    /// Memory requirement in bytes.
    pub memory_bytes: u64,
    /// Nonnegative, dimensionless compute intensity.
    pub compute_intensity: f64,
    /// Coarse workload classification.
    pub workload_tag: WorkloadTag,
    /// Identifiers of tasks this one depends on.
    pub depends_on: Vec<String>,
    /// Deadline in seconds relative to submission time, if any.
    pub deadline_s: Option<f64>,
    /// Priority in `[0, 1]`.
    pub priority: f64,
}

impl Task {
    /// Construct a task with no dependencies, default priority, and no
    /// deadline — the common case in tests and small demos.
    pub fn new(id: impl Into<String>, memory_bytes: u64, compute_intensity: f64) -> Self {
        Self {
            id: id.into(),
            memory_bytes,
            compute_intensity,
            workload_tag: WorkloadTag::default(),
            depends_on: Vec::new(),
            deadline_s: None,
            priority: 0.5,
        }
    }
}

// ── Task execution profile ────────────────────────────────────────────────────

/// Per-resource-kind execution time (at unit speed), plus the task's
/// output size and memory footprint.
///
/// Invariant: `task_id` equals its task's identifier; at least one resource
/// kind must be populated (enforced by [`TaskProfile::new`] callers at the
/// graph-construction boundary, see `graph::TaskGraph::new`).
#[derive(Debug, Clone)]
pub struct TaskProfile {
    pub task_id: String,
    /// Execution time in seconds at unit speed, per resource kind able to
    /// run this task.
    pub time_for_kind: BTreeMap<ResourceKind, f64>,
    /// Bytes of data this task produces for its successors.
    pub data_size_bytes: u64,
    /// Bytes of memory this task requires while running.
    pub memory_required_bytes: u64,
}

impl TaskProfile {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            time_for_kind: BTreeMap::new(),
            data_size_bytes: 0,
            memory_required_bytes: 0,
        }
    }

    /// Builder-style: register an execution time for one resource kind.
    pub fn with_time(mut self, kind: ResourceKind, seconds: f64) -> Self {
        self.time_for_kind.insert(kind, seconds);
        self
    }

    pub fn with_data_size(mut self, bytes: u64) -> Self {
        self.data_size_bytes = bytes;
        self
    }

    pub fn with_memory(mut self, bytes: u64) -> Self {
        self.memory_required_bytes = bytes;
        self
    }

    /// Execution time in seconds for `kind`, or `None` if this task cannot
    /// run on that kind of resource.
    pub fn time_for(&self, kind: ResourceKind) -> Option<f64> {
        self.time_for_kind.get(&kind).copied()
    }

    /// Average execution time across every resource kind this profile
    /// supports. Used by the upward-rank computation (`graph::upward_ranks`).
    pub fn average_time(&self) -> f64 {
        if self.time_for_kind.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.time_for_kind.values().sum();
        sum / self.time_for_kind.len() as f64
    }
}

// ── Resource ────────────────────────────────────────────────────────────────

/// A single compute element the planner can place work on.
///
/// Invariant: `committed_memory_bytes <= max_memory_bytes` at all times;
/// `available_at` is monotonically nondecreasing as the planner commits
/// tasks to it (see `heft::plan`).
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: u32,
    pub kind: ResourceKind,
    /// Unitless multiplier applied to a profile's unit-speed execution time.
    pub speed: f64,
    /// Advisory memory bandwidth in GB/s.
    pub memory_bandwidth_gbps: f64,
    /// Earliest time, in seconds, this resource is free to start new work.
    pub available_at: f64,
    pub max_memory_bytes: u64,
    pub committed_memory_bytes: u64,
    /// Power draw in watts at nominal frequency — the planner's energy
    /// currency (see `power.rs`).
    pub power_watts: f64,
}

impl Resource {
    pub fn new(id: u32, kind: ResourceKind, speed: f64, max_memory_bytes: u64, power_watts: f64) -> Self {
        Self {
            id,
            kind,
            speed,
            memory_bandwidth_gbps: 0.0,
            available_at: 0.0,
            max_memory_bytes,
            committed_memory_bytes: 0,
            power_watts,
        }
    }

    /// Remaining free memory in bytes.
    pub fn free_memory_bytes(&self) -> u64 {
        self.max_memory_bytes.saturating_sub(self.committed_memory_bytes)
    }

    /// Reset per-run mutable state. Called once at the start of every
    /// `heft::plan` invocation so resources can be reused across calls.
    pub fn reset(&mut self) {
        self.available_at = 0.0;
        self.committed_memory_bytes = 0;
    }
}

// ── Scheduled task (planner output) ───────────────────────────────────────────

/// One task's placement and timing, as decided by the HEFT planner.
///
/// Invariant: `start >= data_ready_time`; `finish == start + exec_time`;
/// for every dependency `d`, `finish(d) + comm_time(d.resource -> this
/// resource) <= start`.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task_id: String,
    pub resource_id: u32,
    pub start: f64,
    pub finish: f64,
    pub dependencies: Vec<String>,
    pub data_ready_time: f64,
}

/// Final output of a planning run.
#[derive(Debug, Clone)]
pub struct ScheduleResult {
    pub tasks: Vec<ScheduledTask>,
    pub makespan: f64,
    /// Resource id -> utilization percentage in `[0, 100]`.
    pub utilization: BTreeMap<u32, f64>,
    pub total_energy_j: f64,
    pub critical_path: Vec<String>,
}

impl ScheduleResult {
    /// Find a scheduled task by id. `O(n)`; fine for the sizes this planner
    /// targets, and keeps `ScheduleResult` a plain data type instead of an
    /// index-backed one.
    pub fn find(&self, task_id: &str) -> Option<&ScheduledTask> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_average_time_across_kinds() {
        let p = TaskProfile::new("t1")
            .with_time(ResourceKind::CpuCore, 10.0)
            .with_time(ResourceKind::GpuDevice, 20.0);
        assert!((p.average_time() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn profile_average_time_empty_is_zero() {
        let p = TaskProfile::new("t1");
        assert_eq!(p.average_time(), 0.0);
    }

    #[test]
    fn resource_free_memory_never_underflows() {
        let mut r = Resource::new(1, ResourceKind::CpuCore, 1.0, 100, 10.0);
        r.committed_memory_bytes = 150; // should not happen, but free_memory must not panic
        assert_eq!(r.free_memory_bytes(), 0);
    }

    #[test]
    fn resource_reset_clears_mutable_state() {
        let mut r = Resource::new(1, ResourceKind::CpuCore, 1.0, 100, 10.0);
        r.available_at = 42.0;
        r.committed_memory_bytes = 50;
        r.reset();
        assert_eq!(r.available_at, 0.0);
        assert_eq!(r.committed_memory_bytes, 0);
    }
}
