// SPDX-License-Identifier: MIT

//! Resource configuration loading.
//!
//! Loads a resource set from YAML into the richer [`Resource`] type this
//! crate schedules onto: any entry's `kind` can be a CPU core, GPU device,
//! memory node, or accelerator. Tolerant of partial input — missing fields
//! fall back to defaults rather than failing to parse.
//!
//! Expected YAML shape:
//! ```yaml
//! resources:
//!   cpu0:
//!     kind: cpu_core
//!     speed: 1.0
//!     max_memory_mb: 4096
//!     power_watts: 12.0
//!   gpu0:
//!     kind: gpu_device
//!     speed: 4.0
//!     max_memory_mb: 16384
//!     power_watts: 180.0
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::task::{Resource, ResourceKind};

#[derive(Debug, Deserialize)]
struct ResourceConfigFile {
    resources: HashMap<String, ResourceEntry>,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    kind: ResourceKindConfig,
    #[serde(default = "default_speed")]
    speed: f64,
    #[serde(default)]
    memory_bandwidth_gbps: f64,
    #[serde(default = "default_max_memory_mb")]
    max_memory_mb: u64,
    #[serde(default = "default_power_watts")]
    power_watts: f64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
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

fn default_speed() -> f64 {
    1.0
}

fn default_max_memory_mb() -> u64 {
    4096
}

fn default_power_watts() -> f64 {
    10.0
}

/// Loads and manages resource configurations from a YAML file.
#[derive(Debug, Default)]
pub struct ResourceConfigManager {
    resources: HashMap<String, Resource>,
    loaded: bool,
}

impl ResourceConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and populates the internal resource map, assigning
    /// each named entry a stable integer id in file (hash-map iteration,
    /// sorted by name) order.
    ///
    /// If the file contains no resources, a single default `"default_cpu"`
    /// entry is inserted rather than leaving the set empty.
    ///
    /// Calling this a second time replaces all previously loaded resources.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the YAML is
    /// structurally invalid.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("loading resource configuration from: {}", path.display());

        self.resources.clear();
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot open configuration file: {}", path.display()))?;

        let file: ResourceConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML file: {}", path.display()))?;

        let mut names: Vec<String> = file.resources.keys().cloned().collect();
        names.sort();

        for (id, name) in names.into_iter().enumerate() {
            let entry = &file.resources[&name];
            let resource = Resource {
                id: id as u32,
                kind: entry.kind.into(),
                speed: entry.speed,
                memory_bandwidth_gbps: entry.memory_bandwidth_gbps,
                available_at: 0.0,
                max_memory_bytes: entry.max_memory_mb * 1_000_000,
                committed_memory_bytes: 0,
                power_watts: entry.power_watts,
            };
            debug!(
                name = %name,
                id = resource.id,
                kind = ?resource.kind,
                speed = resource.speed,
                "loaded resource"
            );
            self.resources.insert(name, resource);
        }

        if self.resources.is_empty() {
            warn!("no resources found in configuration file, using default configuration");
            self.resources.insert(
                "default_cpu".to_string(),
                Resource::new(0, ResourceKind::CpuCore, 1.0, 4_096_000_000, 10.0),
            );
        }

        self.loaded = true;
        info!(n_resources = self.resources.len(), "resource configuration loaded");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn all(&self) -> &HashMap<String, Resource> {
        &self.resources
    }

    /// All loaded resources as a `Vec`, sorted by id, ready to hand to
    /// `heft::plan`.
    pub fn to_vec(&self) -> Vec<Resource> {
        let mut v: Vec<Resource> = self.resources.values().cloned().collect();
        v.sort_by_key(|r| r.id);
        v
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}
