// SPDX-License-Identifier: MIT

//! Structured error type for the HEFT planner.
//!
//! Two enums model the two failure layers, mirroring the teacher's
//! `scheduler::error` split between a detailed low-level reason and a
//! top-level operation error: [`PlacementReason`] is *why* a specific task
//! could not be placed on any resource; [`HeftError`] is the top-level error
//! [`super::plan`] returns, embedding a [`PlacementReason`] for its
//! placement-rejection case rather than flattening the reason into the
//! top-level variant.

use thiserror::Error;

/// Detailed reason a task could not be placed on any resource.
///
/// Carried inside [`HeftError::PlacementRejected`] so a caller always has
/// both *which* task failed and *why*, without needing to re-derive it from
/// the resource set.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlacementReason {
    /// No resource's kind set intersects the task's profile at all.
    #[error("no resource supports any of its profiled kinds")]
    NoFeasibleResource,

    /// At least one resource supports the task's kind, but none has enough
    /// free memory at the time the task was considered.
    #[error("requires {required_bytes} bytes but no resource has that much free")]
    MemoryExhausted { required_bytes: u64 },
}

/// Top-level error returned by [`super::plan`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeftError {
    /// `profiles` is missing an entry for a task present in `graph`.
    #[error("no execution profile registered for task '{task_id}'")]
    MissingProfile { task_id: String },

    /// A task could not be placed on any resource; `reason` carries the
    /// exact cause (kind mismatch vs. memory exhaustion).
    #[error("task '{task_id}' could not be placed: {reason}")]
    PlacementRejected { task_id: String, reason: PlacementReason },
}
