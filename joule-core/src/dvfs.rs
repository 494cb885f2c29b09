// SPDX-License-Identifier: MIT

//! Frequency selector / DVFS (C2).
//!
//! Two independent heuristics sit on top of the platform's reported
//! frequency set: [`optimal_for_workload`] picks a point from coarse
//! utilization/memory-pressure signals and a power budget; [`energy_optimal`]
//! picks the point minimizing total energy for a fixed amount of work under
//! an optional deadline. Neither function owns any state — both are pure
//! functions of their inputs, with no global mutable state.

use crate::platform::PlatformCapability;
use crate::power::{estimate_power_watts, PowerModelParams};

/// Frequencies reported when a platform has none to offer, in MHz.
pub const DEFAULT_FREQUENCIES_MHZ: [u32; 8] = [800, 1200, 1600, 2000, 2400, 2800, 3200, 3600];

/// Discover the available frequency set for `core_id` via `platform`,
/// falling back to [`DEFAULT_FREQUENCIES_MHZ`] if it reports none.
pub fn available_frequencies(platform: &dyn PlatformCapability, core_id: u32) -> Vec<u32> {
    let reported = platform.available_frequencies(core_id);
    if reported.is_empty() {
        DEFAULT_FREQUENCIES_MHZ.to_vec()
    } else {
        reported
    }
}

/// Pick a target fraction of `f_max` from coarse utilization/memory-pressure
/// signals.
fn target_fraction(cpu_utilization: f64, memory_pressure: f64) -> f64 {
    if cpu_utilization > 0.8 && memory_pressure < 0.5 {
        0.9 // CPU-bound
    } else if memory_pressure > 0.7 {
        0.6 // memory-bound
    } else if cpu_utilization < 0.3 {
        0.4 // idle
    } else {
        0.7 // balanced
    }
}

/// Choose the frequency in `frequencies_mhz` closest to the workload's
/// target fraction of `f_max` whose estimated power at `cpu_utilization`
/// stays within `power_budget_watts`.
///
/// Falls back to the minimum frequency in the set if no candidate satisfies
/// the budget. Panics only if `frequencies_mhz` is empty — callers should
/// always pass [`available_frequencies`]'s (non-empty) output.
pub fn optimal_for_workload(
    frequencies_mhz: &[u32],
    cpu_utilization: f64,
    memory_pressure: f64,
    power_budget_watts: f64,
    params: PowerModelParams,
) -> u32 {
    assert!(!frequencies_mhz.is_empty(), "frequency set must not be empty");

    let f_max = *frequencies_mhz.iter().max().unwrap() as f64;
    let fraction = target_fraction(cpu_utilization, memory_pressure);
    let target = fraction * f_max;

    let mut candidates: Vec<u32> = frequencies_mhz.to_vec();
    candidates.sort_by_key(|f| (*f as f64 - target).abs() as u64);

    for &f in &candidates {
        let watts = estimate_power_watts(params, f as f64 * 1e6, 1.0, cpu_utilization);
        if watts <= power_budget_watts {
            return f;
        }
    }

    *frequencies_mhz.iter().min().unwrap()
}

/// Execution time at `f` MHz given a base time `t0_s` measured at `f_max`,
/// assuming perfectly CPU-bound scaling: `t(f) = t0 * f_max / f`.
fn scaled_time_s(t0_s: f64, f_max_mhz: u32, f_mhz: u32) -> f64 {
    t0_s * f_max_mhz as f64 / f_mhz as f64
}

/// Pick the frequency in `frequencies_mhz` minimizing `P(f) * t(f)` subject
/// to an optional deadline.
///
/// `t0_s` is the base execution time measured at the set's maximum
/// frequency. Ties are broken toward the higher frequency. If no frequency
/// meets `deadline_s`, returns the maximum frequency (fail-open toward
/// performance rather than returning an infeasibility error).
///
/// Panics only if `frequencies_mhz` is empty.
pub fn energy_optimal(
    frequencies_mhz: &[u32],
    t0_s: f64,
    deadline_s: Option<f64>,
    params: PowerModelParams,
) -> u32 {
    assert!(!frequencies_mhz.is_empty(), "frequency set must not be empty");

    let f_max = *frequencies_mhz.iter().max().unwrap();

    let mut best: Option<(f64, u32)> = None; // (energy, frequency)
    for &f in frequencies_mhz {
        let t = scaled_time_s(t0_s, f_max, f);
        if let Some(d) = deadline_s {
            if t > d {
                continue;
            }
        }
        let watts = estimate_power_watts(params, f as f64 * 1e6, 1.0, 1.0);
        let energy = watts * t;
        best = match best {
            None => Some((energy, f)),
            Some((best_e, best_f)) => {
                if energy < best_e || (energy == best_e && f > best_f) {
                    Some((energy, f))
                } else {
                    Some((best_e, best_f))
                }
            }
        };
    }

    best.map(|(_, f)| f).unwrap_or(f_max)
}
