// SPDX-License-Identifier: MIT

//! Policy scheduler (C8).
//!
//! A bounded channel carries pending tasks to a pool of worker threads,
//! each holding its own cloned `Sender` so a task that fails its policy
//! check can be pushed back onto the same channel it was read from,
//! without ever treating the read side as the write side of a single
//! handle. Under a single policy mutex, each worker
//! checks the task's deadline and the energy budget before committing; a
//! task that would violate either is re-enqueued rather than dropped, so
//! the system degrades by slowdown — except once the configured
//! drain-attempt limit is exhausted, at which point the remaining queue is
//! reported instead of retried forever.

use std::collections::BTreeSet;
use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Default power draw assumed for a CPU task whose actual power was not
/// separately measured.
pub const DEFAULT_FIXED_WATTS: f64 = 50.0;

/// How long a worker waits for a new item before re-checking whether the
/// run has finished. Short enough to keep shutdown latency negligible in
/// tests, long enough to avoid spinning.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A unit of work submitted to the policy scheduler.
///
/// `measured_duration_s` stands in for the wall-clock time a real executor
/// would report after running the task; `deadline_s` is relative to the
/// scheduler run's start.
#[derive(Debug, Clone)]
pub struct PolicyTask {
    pub id: String,
    pub measured_duration_s: f64,
    pub deadline_s: Option<f64>,
}

impl PolicyTask {
    pub fn new(id: impl Into<String>, measured_duration_s: f64) -> Self {
        Self {
            id: id.into(),
            measured_duration_s,
            deadline_s: None,
        }
    }

    pub fn with_deadline(mut self, deadline_s: f64) -> Self {
        self.deadline_s = Some(deadline_s);
        self
    }
}

/// Tunable knobs for a `run_policy` invocation.
#[derive(Debug, Clone, Copy)]
pub struct PolicyConfig {
    pub energy_budget_j: f64,
    pub fixed_watts: f64,
    /// Total number of re-enqueue attempts allowed across the whole run
    /// before giving up on the remaining queue. `None` defaults to
    /// `2 * task_count` at call time.
    pub drain_attempt_limit: Option<usize>,
}

impl PolicyConfig {
    pub fn new(energy_budget_j: f64) -> Self {
        Self {
            energy_budget_j,
            fixed_watts: DEFAULT_FIXED_WATTS,
            drain_attempt_limit: None,
        }
    }
}

/// Outcome of a `run_policy` invocation. Every task's fate is accounted
/// for — no silent drops — rather than collapsing to a single
/// success-or-failure switch.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    pub completed_ids: Vec<String>,
    /// Tasks whose deadline had already passed at admission; dropped
    /// without ever being dispatched.
    pub deadline_expired_ids: Vec<String>,
    /// Present only when the drain-attempt limit was exhausted with tasks
    /// still outstanding.
    pub budget_exhausted_remaining_ids: Option<Vec<String>>,
    pub final_energy_budget_j: f64,
}

struct Shared {
    energy_budget_j: f64,
    fixed_watts: f64,
    completed: Vec<String>,
    pending: BTreeSet<String>,
    attempts_used: usize,
    drain_attempt_limit: usize,
    terminated: bool,
}

enum Verdict {
    Complete,
    Reenqueue,
}

fn check_and_commit(shared: &mut Shared, task: &PolicyTask, now_s: f64) -> Verdict {
    if let Some(deadline) = task.deadline_s {
        if now_s + task.measured_duration_s > deadline {
            return Verdict::Reenqueue;
        }
    }
    let estimated_energy = task.measured_duration_s * shared.fixed_watts;
    if shared.energy_budget_j < estimated_energy {
        return Verdict::Reenqueue;
    }
    shared.energy_budget_j -= estimated_energy;
    Verdict::Complete
}

/// Run the policy scheduler over `tasks` with `n_workers` worker threads.
///
/// Returns the wall-clock duration of the run and a [`PolicyOutcome`]
/// accounting for every task.
pub fn run_policy(n_workers: usize, tasks: Vec<PolicyTask>, config: PolicyConfig) -> (Duration, PolicyOutcome) {
    assert!(n_workers > 0, "policy scheduler needs at least one worker");

    let start = Instant::now();
    let drain_attempt_limit = config.drain_attempt_limit.unwrap_or(2 * tasks.len().max(1));

    let shared = Arc::new(Mutex::new(Shared {
        energy_budget_j: config.energy_budget_j,
        fixed_watts: config.fixed_watts,
        completed: Vec::new(),
        pending: BTreeSet::new(),
        attempts_used: 0,
        drain_attempt_limit,
        terminated: false,
    }));

    let capacity = (tasks.len() * 2).max(n_workers).max(1);
    let (tx, rx) = sync_channel::<PolicyTask>(capacity);
    let rx = Arc::new(Mutex::new(rx));

    let mut deadline_expired_ids = Vec::new();
    {
        let mut guard = shared.lock().expect("policy mutex poisoned");
        for task in tasks {
            if let Some(d) = task.deadline_s {
                if d < 0.0 {
                    deadline_expired_ids.push(task.id.clone());
                    continue;
                }
            }
            guard.pending.insert(task.id.clone());
            tx.send(task).expect("channel has capacity for every admitted task");
        }
    }

    let mut handles = Vec::new();
    for worker_id in 0..n_workers {
        let shared = Arc::clone(&shared);
        let rx = Arc::clone(&rx);
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            run_worker(worker_id, shared, rx, tx, start);
        }));
    }
    drop(tx);
    for h in handles {
        h.join().expect("policy worker thread panicked");
    }

    let guard = shared.lock().expect("policy mutex poisoned");
    let remaining: Vec<String> = guard.pending.iter().cloned().collect();
    let budget_exhausted_remaining_ids = if !remaining.is_empty() { Some(remaining) } else { None };

    let outcome = PolicyOutcome {
        completed_ids: guard.completed.clone(),
        deadline_expired_ids,
        budget_exhausted_remaining_ids,
        final_energy_budget_j: guard.energy_budget_j,
    };
    info!(
        completed = outcome.completed_ids.len(),
        dropped = outcome.deadline_expired_ids.len(),
        "policy run complete"
    );
    (start.elapsed(), outcome)
}

fn run_worker(
    worker_id: usize,
    shared: Arc<Mutex<Shared>>,
    rx: Arc<Mutex<std::sync::mpsc::Receiver<PolicyTask>>>,
    tx: std::sync::mpsc::SyncSender<PolicyTask>,
    start: Instant,
) {
    loop {
        {
            let guard = shared.lock().expect("policy mutex poisoned");
            if guard.pending.is_empty() || guard.terminated {
                break;
            }
        }

        let received = {
            let locked = rx.lock().expect("receiver mutex poisoned");
            locked.recv_timeout(POLL_INTERVAL)
        };

        let task = match received {
            Ok(t) => t,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let now_s = start.elapsed().as_secs_f64();
        let mut guard = shared.lock().expect("policy mutex poisoned");
        match check_and_commit(&mut guard, &task, now_s) {
            Verdict::Complete => {
                guard.pending.remove(&task.id);
                guard.completed.push(task.id.clone());
                debug!(worker_id, task = %task.id, "task completed");
            }
            Verdict::Reenqueue => {
                guard.attempts_used += 1;
                if guard.attempts_used > guard.drain_attempt_limit {
                    guard.terminated = true;
                    debug!(worker_id, task = %task.id, "drain attempt limit reached, dropping");
                } else {
                    drop(guard);
                    let _ = tx.send(task);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_d_policy_deferral() {
        let tasks: Vec<PolicyTask> = (0..10).map(|i| PolicyTask::new(format!("t{i}"), 1.0)).collect();
        let config = PolicyConfig {
            energy_budget_j: 30.0,
            fixed_watts: 5.0, // 1s * 5W = 5J per task
            drain_attempt_limit: None,
        };
        let (_duration, outcome) = run_policy(1, tasks, config);
        assert_eq!(outcome.completed_ids.len(), 6);
        assert!(outcome.final_energy_budget_j.abs() < 1e-9);
        let remaining = outcome.budget_exhausted_remaining_ids.expect("4 tasks should remain");
        assert_eq!(remaining.len(), 4);
    }

    #[test]
    fn deadline_already_passed_at_admission_is_dropped() {
        let tasks = vec![PolicyTask::new("late", 1.0).with_deadline(-1.0)];
        let config = PolicyConfig::new(1_000.0);
        let (_duration, outcome) = run_policy(1, tasks, config);
        assert_eq!(outcome.deadline_expired_ids, vec!["late".to_string()]);
        assert!(outcome.completed_ids.is_empty());
    }

    #[test]
    fn ample_budget_completes_every_task() {
        let tasks: Vec<PolicyTask> = (0..5).map(|i| PolicyTask::new(format!("t{i}"), 0.1)).collect();
        let config = PolicyConfig::new(1_000.0);
        let (_duration, outcome) = run_policy(2, tasks, config);
        assert_eq!(outcome.completed_ids.len(), 5);
        assert!(outcome.budget_exhausted_remaining_ids.is_none());
    }

    #[test]
    fn budget_never_goes_negative() {
        let tasks: Vec<PolicyTask> = (0..20).map(|i| PolicyTask::new(format!("t{i}"), 3.0)).collect();
        let config = PolicyConfig {
            energy_budget_j: 10.0,
            fixed_watts: 1.0,
            drain_attempt_limit: Some(10),
        };
        let (_duration, outcome) = run_policy(3, tasks, config);
        assert!(outcome.final_energy_budget_j >= 0.0);
    }
}
