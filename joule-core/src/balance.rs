// SPDX-License-Identifier: MIT

//! Load-balancing strategies (C7).
//!
//! Four pure functions mapping `(items, resources)` to a `resource_id ->
//! items` assignment. None of these touch the HEFT planner or runtime —
//! they are the coarse, cheap-to-call alternative for callers who don't
//! need dependency-aware placement.

use std::collections::BTreeMap;

use rand::Rng;

use crate::task::Resource;

/// Order resource ids by current load (committed memory as a fraction of
/// max memory), ties broken by ascending id.
///
/// `prefer_emptiest = true` yields least-loaded-first (the order HEFT-style
/// tie-break-adjacent callers want); `false` yields fullest-first, useful
/// for bin-packing-style placement that tries to drain a resource before
/// spreading load to another.
pub fn sorted_by_load(resources: &[Resource], prefer_emptiest: bool) -> Vec<u32> {
    fn load_fraction(r: &Resource) -> f64 {
        if r.max_memory_bytes == 0 {
            0.0
        } else {
            r.committed_memory_bytes as f64 / r.max_memory_bytes as f64
        }
    }

    let mut ids: Vec<u32> = resources.iter().map(|r| r.id).collect();
    ids.sort_unstable_by(|&a, &b| {
        let ra = resources.iter().find(|r| r.id == a).unwrap();
        let rb = resources.iter().find(|r| r.id == b).unwrap();
        let (la, lb) = (load_fraction(ra), load_fraction(rb));
        let ord = if prefer_emptiest {
            la.partial_cmp(&lb)
        } else {
            lb.partial_cmp(&la)
        }
        .unwrap_or(std::cmp::Ordering::Equal);
        if ord == std::cmp::Ordering::Equal {
            a.cmp(&b)
        } else {
            ord
        }
    });
    ids
}

/// Assign item `k` to resource `k mod |R|`, preserving input order within
/// each resource's bucket.
pub fn round_robin<T>(items: Vec<T>, resources: &[Resource]) -> BTreeMap<u32, Vec<T>> {
    let mut out: BTreeMap<u32, Vec<T>> = resources.iter().map(|r| (r.id, Vec::new())).collect();
    if resources.is_empty() {
        return out;
    }
    for (k, item) in items.into_iter().enumerate() {
        let r = &resources[k % resources.len()];
        out.get_mut(&r.id).unwrap().push(item);
    }
    out
}

/// Sort items by weight descending (stable), repeatedly assigning the next
/// item to the currently least-loaded resource. Ties on load broken by
/// smallest resource id.
pub fn least_loaded<T>(items: Vec<(T, f64)>, resources: &[Resource]) -> BTreeMap<u32, Vec<T>> {
    let mut out: BTreeMap<u32, Vec<T>> = resources.iter().map(|r| (r.id, Vec::new())).collect();
    if resources.is_empty() {
        return out;
    }

    let mut indexed: Vec<(usize, T, f64)> = items
        .into_iter()
        .enumerate()
        .map(|(i, (item, weight))| (i, item, weight))
        .collect();
    indexed.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

    let mut load: BTreeMap<u32, f64> = resources.iter().map(|r| (r.id, 0.0)).collect();
    for (_, item, weight) in indexed {
        let target = *load
            .iter()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(b.0)))
            .unwrap()
            .0;
        *load.get_mut(&target).unwrap() += weight;
        out.get_mut(&target).unwrap().push(item);
    }
    out
}

/// For each item, sample two resource ids uniformly with replacement and
/// assign it to whichever currently has the smaller load (ties broken by
/// smallest resource id, since both candidates compare equal only when
/// they're the same resource or truly tied).
pub fn power_of_two_choices<T, R: Rng + ?Sized>(
    items: Vec<(T, f64)>,
    resources: &[Resource],
    rng: &mut R,
) -> BTreeMap<u32, Vec<T>> {
    let mut out: BTreeMap<u32, Vec<T>> = resources.iter().map(|r| (r.id, Vec::new())).collect();
    if resources.is_empty() {
        return out;
    }

    let mut load: BTreeMap<u32, f64> = resources.iter().map(|r| (r.id, 0.0)).collect();
    for (item, weight) in items {
        let a = resources[rng.gen_range(0..resources.len())].id;
        let b = resources[rng.gen_range(0..resources.len())].id;
        let target = if load[&a] <= load[&b] { a } else { b };
        *load.get_mut(&target).unwrap() += weight;
        out.get_mut(&target).unwrap().push(item);
    }
    out
}

/// Distribute items so each resource `r` receives a target count of
/// `round(N * w_r / sum(w))`, consumed in input order with any remainder
/// distributed round-robin.
pub fn weighted<T>(items: Vec<T>, resources: &[Resource], weights: &BTreeMap<u32, f64>) -> BTreeMap<u32, Vec<T>> {
    let mut out: BTreeMap<u32, Vec<T>> = resources.iter().map(|r| (r.id, Vec::new())).collect();
    if resources.is_empty() || items.is_empty() {
        return out;
    }

    let total_weight: f64 = resources.iter().map(|r| weights.get(&r.id).copied().unwrap_or(0.0)).sum();
    let n = items.len() as f64;

    let target_counts: BTreeMap<u32, usize> = resources
        .iter()
        .map(|r| {
            let w = weights.get(&r.id).copied().unwrap_or(0.0);
            let count = if total_weight > 0.0 { (n * w / total_weight).round() as usize } else { 0 };
            (r.id, count)
        })
        .collect();

    let mut items = items.into_iter();
    'outer: for r in resources {
        let count = target_counts[&r.id];
        for _ in 0..count {
            match items.next() {
                Some(item) => out.get_mut(&r.id).unwrap().push(item),
                None => break 'outer,
            }
        }
    }

    // remainder (rounding under/over-shoot, or zero-weight resources) goes round-robin
    let mut rr_idx = 0usize;
    for item in items {
        let r = &resources[rr_idx % resources.len()];
        out.get_mut(&r.id).unwrap().push(item);
        rr_idx += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ResourceKind;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn res(id: u32) -> Resource {
        Resource::new(id, ResourceKind::CpuCore, 1.0, 1_000, 10.0)
    }

    #[test]
    fn round_robin_distributes_in_order() {
        let resources = vec![res(1), res(2)];
        let out = round_robin(vec!["a", "b", "c", "d"], &resources);
        assert_eq!(out[&1], vec!["a", "c"]);
        assert_eq!(out[&2], vec!["b", "d"]);
    }

    #[test]
    fn round_robin_with_no_resources_is_empty() {
        let out = round_robin(vec!["a"], &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn least_loaded_balances_by_weight() {
        let resources = vec![res(1), res(2)];
        let items = vec![("big", 10.0), ("small", 1.0), ("medium", 5.0)];
        let out = least_loaded(items, &resources);
        // sorted desc: big(10) -> r1 (both 0, tie->smallest id), small... load r1=10
        // medium(5) -> r2 (load 0 < 10)
        // small(1) -> r2 (load 5 < 10)
        assert_eq!(out[&1], vec!["big"]);
        assert_eq!(out[&2], vec!["medium", "small"]);
    }

    #[test]
    fn power_of_two_choices_assigns_every_item() {
        let resources = vec![res(1), res(2), res(3)];
        let items: Vec<(u32, f64)> = (0..20).map(|i| (i, 1.0)).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let out = power_of_two_choices(items, &resources, &mut rng);
        let total: usize = out.values().map(|v| v.len()).sum();
        assert_eq!(total, 20);
    }

    #[test]
    fn scenario_e_power_of_two_balances_load_within_factor_two() {
        let resources: Vec<Resource> = (1..=16).map(res).collect();
        let items: Vec<(u32, f64)> = (0..10_000).map(|i| (i, 1.0)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let out = power_of_two_choices(items, &resources, &mut rng);
        let counts: Vec<usize> = out.values().map(|v| v.len()).collect();
        let max = *counts.iter().max().unwrap();
        let min = *counts.iter().min().unwrap();
        assert!(min > 0, "every resource should receive some load at this scale");
        assert!(max as f64 / min as f64 <= 2.0, "max/min load ratio {max}/{min} exceeds 2");
    }

    #[test]
    fn scenario_f_round_robin_determinism() {
        let resources = vec![res(1), res(2)];
        let out = round_robin(vec!["a", "b", "c", "d", "e"], &resources);
        assert_eq!(out[&1], vec!["a", "c", "e"]);
        assert_eq!(out[&2], vec!["b", "d"]);
    }

    #[test]
    fn weighted_splits_proportionally() {
        let resources = vec![res(1), res(2)];
        let mut weights = BTreeMap::new();
        weights.insert(1, 3.0);
        weights.insert(2, 1.0);
        let items: Vec<u32> = (0..8).collect();
        let out = weighted(items, &resources, &weights);
        assert_eq!(out[&1].len(), 6);
        assert_eq!(out[&2].len(), 2);
    }

    #[test]
    fn sorted_by_load_prefers_emptiest_first() {
        let mut r1 = res(1);
        r1.max_memory_bytes = 1_000;
        r1.committed_memory_bytes = 800;
        let mut r2 = res(2);
        r2.max_memory_bytes = 1_000;
        r2.committed_memory_bytes = 100;
        let order = sorted_by_load(&[r1, r2], true);
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn sorted_by_load_ties_break_by_ascending_id() {
        let resources = vec![res(3), res(1), res(2)];
        let order = sorted_by_load(&resources, true);
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn weighted_with_zero_weight_resource_gets_remainder_only() {
        let resources = vec![res(1), res(2)];
        let mut weights = BTreeMap::new();
        weights.insert(1, 1.0);
        weights.insert(2, 0.0);
        let items: Vec<u32> = (0..4).collect();
        let out = weighted(items, &resources, &weights);
        let total: usize = out.values().map(|v| v.len()).sum();
        assert_eq!(total, 4);
    }
}
