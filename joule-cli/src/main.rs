// SPDX-License-Identifier: MIT

//! Thin CLI around `joule-core`: run a HEFT plan, a DVFS frequency
//! selection, a work-stealing demo, or a policy-scheduler demo, and print a
//! human-readable report. Contains no scheduling logic of its own — every
//! decision is made by the library.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use joule_core::config::ResourceConfigManager;
use joule_core::task::{ResourceKind, Task, TaskProfile, WorkloadTag};
use joule_core::{balance, dvfs, heft, policy, runtime, CommMatrix, PowerModelParams, TaskGraph};

#[derive(Parser, Debug)]
#[command(name = "joule", version, about = "Energy-aware heterogeneous task scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HEFT planner over a workload and resource description.
    Plan {
        /// YAML file describing the task DAG and per-resource-kind profiles.
        #[arg(long)]
        workload: PathBuf,
        /// YAML file describing the available resources.
        #[arg(long)]
        resources: PathBuf,
    },

    /// Pick an operating frequency for a workload.
    Dvfs {
        /// Comma-separated candidate frequencies in MHz. Defaults to the
        /// platform's reported set (empty here, so the DVFS default list).
        #[arg(long, value_delimiter = ',')]
        frequencies_mhz: Option<Vec<u32>>,

        /// Base execution time in seconds, measured at the set's maximum
        /// frequency. Required for `--mode energy-optimal`.
        #[arg(long)]
        base_time_s: Option<f64>,
        /// Deadline in seconds for `--mode energy-optimal`.
        #[arg(long)]
        deadline_s: Option<f64>,

        /// Normalized CPU utilization in [0,1] for `--mode workload`.
        #[arg(long, default_value_t = 0.5)]
        utilization: f64,
        /// Normalized memory-bandwidth pressure in [0,1] for `--mode workload`.
        #[arg(long, default_value_t = 0.0)]
        memory_pressure: f64,
        /// Power budget in watts for `--mode workload`.
        #[arg(long, default_value_t = 1_000.0)]
        power_budget_watts: f64,

        #[arg(long, value_enum, default_value_t = DvfsMode::Workload)]
        mode: DvfsMode,
    },

    /// Push N items onto one worker and watch the others steal them.
    StealDemo {
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long, default_value_t = runtime::DEFAULT_STEAL_THRESHOLD)]
        steal_threshold: usize,
        #[arg(long, default_value_t = 100)]
        items: usize,
    },

    /// Run the policy scheduler over a synthetic task stream.
    PolicyDemo {
        #[arg(long, default_value_t = 10)]
        tasks: usize,
        #[arg(long, default_value_t = 1.0)]
        duration_s: f64,
        #[arg(long, default_value_t = 30.0)]
        energy_budget_j: f64,
        #[arg(long, default_value_t = policy::DEFAULT_FIXED_WATTS)]
        fixed_watts: f64,
        #[arg(long, default_value_t = 1)]
        workers: usize,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DvfsMode {
    Workload,
    EnergyOptimal,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Plan { workload, resources } => run_plan(&workload, &resources),
        Command::Dvfs {
            frequencies_mhz,
            base_time_s,
            deadline_s,
            utilization,
            memory_pressure,
            power_budget_watts,
            mode,
        } => run_dvfs(frequencies_mhz, base_time_s, deadline_s, utilization, memory_pressure, power_budget_watts, mode),
        Command::StealDemo { workers, steal_threshold, items } => run_steal_demo(workers, steal_threshold, items),
        Command::PolicyDemo {
            tasks,
            duration_s,
            energy_budget_j,
            fixed_watts,
            workers,
        } => run_policy_demo(tasks, duration_s, energy_budget_j, fixed_watts, workers),
    }
}

// ── workload YAML shape ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WorkloadFile {
    tasks: BTreeMap<String, TaskEntry>,
}

#[derive(Debug, Deserialize)]
struct TaskEntry {
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    memory_bytes: u64,
    #[serde(default = "default_compute_intensity")]
    compute_intensity: f64,
    #[serde(default)]
    workload_tag: WorkloadTagConfig,
    #[serde(default)]
    deadline_s: Option<f64>,
    #[serde(default = "default_priority")]
    priority: f64,
    profile: ProfileEntry,
}

fn default_compute_intensity() -> f64 {
    1.0
}

fn default_priority() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum WorkloadTagConfig {
    #[default]
    CpuBound,
    GpuBound,
    MemoryBound,
    IoBound,
}

impl From<WorkloadTagConfig> for WorkloadTag {
    fn from(t: WorkloadTagConfig) -> Self {
        match t {
            WorkloadTagConfig::CpuBound => WorkloadTag::CpuBound,
            WorkloadTagConfig::GpuBound => WorkloadTag::GpuBound,
            WorkloadTagConfig::MemoryBound => WorkloadTag::MemoryBound,
            WorkloadTagConfig::IoBound => WorkloadTag::IoBound,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileEntry {
    #[serde(default)]
    data_size_bytes: u64,
    #[serde(default)]
    memory_required_bytes: u64,
    time_for_kind: BTreeMap<ResourceKindConfig, f64>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
enum ResourceKindConfig {
    CpuCore,
    GpuDevice,
    MemoryNode,
    Accelerator,
}

impl From<ResourceKindConfig> for ResourceKind {
    fn from(k: ResourceKindConfig) -> Self {
        match k {
            ResourceKindConfig::CpuCore => ResourceKind::CpuCore,
            ResourceKindConfig::GpuDevice => ResourceKind::GpuDevice,
            ResourceKindConfig::MemoryNode => ResourceKind::MemoryNode,
            ResourceKindConfig::Accelerator => ResourceKind::Accelerator,
        }
    }
}

fn load_workload(path: &std::path::Path) -> Result<(TaskGraph, BTreeMap<String, TaskProfile>, BTreeMap<String, Task>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open workload file: {}", path.display()))?;
    let file: WorkloadFile = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse workload YAML: {}", path.display()))?;

    let mut edges = BTreeMap::new();
    let mut profiles = BTreeMap::new();
    let mut tasks = BTreeMap::new();

    for (id, entry) in file.tasks {
        edges.insert(id.clone(), entry.depends_on.clone());

        let mut profile = TaskProfile::new(id.clone())
            .with_data_size(entry.profile.data_size_bytes)
            .with_memory(entry.profile.memory_required_bytes);
        for (kind, seconds) in &entry.profile.time_for_kind {
            profile = profile.with_time((*kind).into(), *seconds);
        }
        profiles.insert(id.clone(), profile);

        let task = Task {
            id: id.clone(),
            memory_bytes: entry.memory_bytes,
            compute_intensity: entry.compute_intensity,
            workload_tag: entry.workload_tag.into(),
            depends_on: entry.depends_on,
            deadline_s: entry.deadline_s,
            priority: entry.priority,
        };
        tasks.insert(id, task);
    }

    let graph = TaskGraph::new(edges).context("workload graph is invalid")?;
    Ok((graph, profiles, tasks))
}

// ── plan ───────────────────────────────────────────────────────────────────────

fn run_plan(workload_path: &std::path::Path, resources_path: &std::path::Path) -> Result<()> {
    let (graph, profiles, _tasks) = load_workload(workload_path)?;

    let mut mgr = ResourceConfigManager::new();
    mgr.load_from_file(resources_path)?;
    let mut resources = mgr.to_vec();

    let result = heft::plan(&graph, &profiles, &mut resources, None)?;
    let comm = CommMatrix::create_default_matrix(&resources);

    println!("== schedule ==");
    for t in &result.tasks {
        println!(
            "  {:<12} resource={:<4} start={:>8.3} finish={:>8.3} data_ready={:>8.3}",
            t.task_id, t.resource_id, t.start, t.finish, t.data_ready_time
        );
    }
    println!("makespan: {:.3}s", result.makespan);
    println!("total energy: {:.3}J", result.total_energy_j);
    println!("critical path: {}", result.critical_path.join(" -> "));
    println!("utilization:");
    for (id, pct) in &result.utilization {
        println!("  resource {id}: {pct:.1}%");
    }

    let violation = heft::validate_schedule(&result, &profiles, &comm);
    match violation {
        None => println!("schedule valid: yes"),
        Some((task, dep)) => println!("schedule INVALID: task {task} violates dependency {dep}"),
    }

    Ok(())
}

// ── dvfs ───────────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_dvfs(
    frequencies_mhz: Option<Vec<u32>>,
    base_time_s: Option<f64>,
    deadline_s: Option<f64>,
    utilization: f64,
    memory_pressure: f64,
    power_budget_watts: f64,
    mode: DvfsMode,
) -> Result<()> {
    let freqs = frequencies_mhz.unwrap_or_else(|| dvfs::DEFAULT_FREQUENCIES_MHZ.to_vec());
    let params = PowerModelParams::default();

    match mode {
        DvfsMode::Workload => {
            let f = dvfs::optimal_for_workload(&freqs, utilization, memory_pressure, power_budget_watts, params);
            println!("selected frequency: {f} MHz");
        }
        DvfsMode::EnergyOptimal => {
            let t0 = base_time_s.context("--base-time-s is required for --mode energy-optimal")?;
            let f = dvfs::energy_optimal(&freqs, t0, deadline_s, params);
            println!("selected frequency: {f} MHz");
        }
    }
    Ok(())
}

// ── work-stealing demo ──────────────────────────────────────────────────────────

fn run_steal_demo(workers: usize, steal_threshold: usize, items: usize) -> Result<()> {
    let rt = runtime::WorkStealingRuntime::with_steal_threshold(workers, steal_threshold);
    for i in 0..items {
        rt.push(1, i);
    }

    println!("pushed {items} items onto worker 1 of {workers}");
    let mut stolen_by: BTreeMap<usize, usize> = (1..=workers).map(|w| (w, 0)).collect();
    for thief in 2..=workers {
        while let Some(_item) = rt.steal(thief) {
            *stolen_by.get_mut(&thief).unwrap() += 1;
        }
    }
    for (worker, count) in &stolen_by {
        if *count > 0 {
            println!("  worker {worker} stole {count} items");
        }
    }
    println!("remaining on worker 1: {}", rt.len(1));
    Ok(())
}

// ── policy demo ──────────────────────────────────────────────────────────────

fn run_policy_demo(n_tasks: usize, duration_s: f64, energy_budget_j: f64, fixed_watts: f64, workers: usize) -> Result<()> {
    let tasks: Vec<policy::PolicyTask> = (0..n_tasks).map(|i| policy::PolicyTask::new(format!("t{i}"), duration_s)).collect();
    let config = policy::PolicyConfig {
        energy_budget_j,
        fixed_watts,
        drain_attempt_limit: None,
    };
    let (elapsed, outcome) = policy::run_policy(workers, tasks, config);

    println!("policy run finished in {:.3}s", elapsed.as_secs_f64());
    println!("completed: {}", outcome.completed_ids.len());
    println!("deadline-expired: {}", outcome.deadline_expired_ids.len());
    match &outcome.budget_exhausted_remaining_ids {
        Some(remaining) => println!("budget exhausted, {} task(s) remain: {}", remaining.len(), remaining.join(", ")),
        None => println!("budget exhausted: no"),
    }
    println!("final energy budget: {:.3}J", outcome.final_energy_budget_j);

    // balance::round_robin exercised here so the CLI also demonstrates the
    // static load-balancing strategies, not only the dependency-aware ones.
    let resources: Vec<joule_core::Resource> = (1..=workers as u32)
        .map(|id| joule_core::Resource::new(id, ResourceKind::CpuCore, 1.0, u64::MAX, fixed_watts))
        .collect();
    let assignment = balance::round_robin(outcome.completed_ids.clone(), &resources);
    println!("completed tasks by resource (round-robin view):");
    for (id, items) in &assignment {
        println!("  resource {id}: {}", items.join(", "));
    }

    Ok(())
}
