// SPDX-License-Identifier: MIT

//! Inter-resource communication cost model (C4).
//!
//! Loads a sparse configuration table with tolerant defaults: missing
//! entries fall back to a configurable default rather than erroring, and
//! self-edges are handled as a special case rather than stored.

use std::collections::BTreeMap;

use crate::task::Resource;

/// Bandwidth/latency pair for one `(src, dst)` resource edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkCost {
    pub bandwidth_mb_s: f64,
    pub latency_ms: f64,
}

impl LinkCost {
    pub const fn new(bandwidth_mb_s: f64, latency_ms: f64) -> Self {
        Self {
            bandwidth_mb_s,
            latency_ms,
        }
    }
}

/// Default link used for any `(src, dst)` pair not explicitly present in
/// the matrix: `1000 MB/s`, `0.1 ms`.
pub const DEFAULT_LINK: LinkCost = LinkCost::new(1000.0, 0.1);

/// Sparse `(src_resource, dst_resource) -> LinkCost` table.
///
/// Self-edges are never stored — `comm_time` special-cases `src == dst` to
/// zero regardless of what (if anything) is in the map, treating self-edges
/// as having infinite bandwidth and zero latency.
#[derive(Debug, Clone, Default)]
pub struct CommMatrix {
    links: BTreeMap<(u32, u32), LinkCost>,
}

impl CommMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matrix covering every pair in `resources`, with every
    /// cross-edge set to [`DEFAULT_LINK`] and self-edges implicitly free.
    pub fn create_default_matrix(resources: &[Resource]) -> Self {
        let mut m = Self::new();
        for a in resources {
            for b in resources {
                if a.id != b.id {
                    m.set_link(a.id, b.id, DEFAULT_LINK);
                }
            }
        }
        m
    }

    /// Explicitly set the link cost for `(src, dst)`.
    pub fn set_link(&mut self, src: u32, dst: u32, cost: LinkCost) {
        self.links.insert((src, dst), cost);
    }

    /// Time in seconds to move `bytes` of data from `src` to `dst`.
    ///
    /// Returns `0.0` when `src == dst`. Otherwise looks up the configured
    /// link, defaulting to [`DEFAULT_LINK`] when absent, and computes
    /// `latency_s + bytes / bandwidth_bytes_per_s`.
    pub fn comm_time(&self, bytes: u64, src: u32, dst: u32) -> f64 {
        if src == dst {
            return 0.0;
        }
        let link = self.links.get(&(src, dst)).copied().unwrap_or(DEFAULT_LINK);
        let bandwidth_bytes_s = link.bandwidth_mb_s * 1_000_000.0;
        let latency_s = link.latency_ms / 1_000.0;
        if bandwidth_bytes_s <= 0.0 {
            return latency_s;
        }
        latency_s + bytes as f64 / bandwidth_bytes_s
    }
}
