// SPDX-License-Identifier: MIT

//! Platform sensor/actuator interface.
//!
//! These types are pure data contracts for information the core consumes
//! but never produces itself — actual OS/hardware queries (RAPL, NVML,
//! SMC, `sched_setaffinity`, `cpufreq`, ...) live outside this crate
//! entirely. The core only ever sees a [`SystemSnapshot`] someone else
//! constructed.

use thiserror::Error;

/// A snapshot of CPU/memory/load state, as read by an external sensor
/// implementation and handed to the core.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSnapshot {
    /// Per-core utilization percentage.
    pub per_core_utilization_pct: Vec<f64>,
    pub total_cpu_pct: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub memory_available_bytes: u64,
    /// 1/5/15-minute load averages.
    pub load_averages: [f64; 3],
    /// Per-core current frequency in MHz.
    pub per_core_frequency_mhz: Vec<u32>,
    pub temperature_c: Option<f64>,
    pub platform_tag: String,
    pub timestamp_s: f64,
}

/// A snapshot of one GPU device's state.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuSnapshot {
    pub id: u32,
    pub vendor_tag: String,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub memory_free_bytes: u64,
    pub utilization_pct: f64,
    pub temperature_c: Option<f64>,
    pub power_watts: Option<f64>,
    pub clock_mhz: Option<u32>,
}

/// Where a [`crate::power::PowerSample`]-style reading originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerSource {
    Rapl,
    Nvml,
    Smc,
    Hwmon,
    Estimated,
}

/// One instantaneous power reading, possibly broken down by domain.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerReading {
    pub timestamp_s: f64,
    pub total_watts: f64,
    pub cpu_package_watts: Option<f64>,
    pub gpu_watts: Option<f64>,
    pub memory_watts: Option<f64>,
    pub uncore_watts: Option<f64>,
    pub source: PowerSource,
}

/// Errors a platform actuator call can report. The core never retries
/// these — they propagate to the caller unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("operation not supported on this platform")]
    Unsupported,
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid value")]
    InvalidValue,
}

/// Capability surface the core consumes for sensing and (advisory) actuation.
///
/// A real implementation lives outside this crate (it would shell out to
/// `/sys/devices/system/cpu/...`, RAPL MSRs, `sched_setaffinity(2)`, etc).
/// Tests and demos use [`NullPlatform`] or a hand-built stub.
pub trait PlatformCapability {
    fn read_system_metrics(&self) -> SystemSnapshot;
    fn read_gpus(&self) -> Vec<GpuSnapshot>;
    fn read_power(&self) -> PowerReading;
    /// Available frequencies in MHz for `core_id`. Empty if unknown.
    fn available_frequencies(&self, core_id: u32) -> Vec<u32>;
    fn set_frequency(&self, core_id: u32, mhz: u32) -> Result<(), PlatformError>;
    fn set_affinity(&self, pid: u32, cores: &[u32]) -> Result<(), PlatformError>;
}

/// A platform stub that reports no capabilities — every sensor call
/// returns a plausible empty/zeroed snapshot and every actuator call
/// returns `Unsupported`. Useful as a default when no real platform layer
/// is wired in (tests, non-Linux hosts, containers without RAPL access).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlatform;

impl PlatformCapability for NullPlatform {
    fn read_system_metrics(&self) -> SystemSnapshot {
        SystemSnapshot {
            per_core_utilization_pct: Vec::new(),
            total_cpu_pct: 0.0,
            memory_used_bytes: 0,
            memory_total_bytes: 0,
            memory_available_bytes: 0,
            load_averages: [0.0; 3],
            per_core_frequency_mhz: Vec::new(),
            temperature_c: None,
            platform_tag: "null".to_string(),
            timestamp_s: 0.0,
        }
    }

    fn read_gpus(&self) -> Vec<GpuSnapshot> {
        Vec::new()
    }

    fn read_power(&self) -> PowerReading {
        PowerReading {
            timestamp_s: 0.0,
            total_watts: 0.0,
            cpu_package_watts: None,
            gpu_watts: None,
            memory_watts: None,
            uncore_watts: None,
            source: PowerSource::Estimated,
        }
    }

    fn available_frequencies(&self, _core_id: u32) -> Vec<u32> {
        Vec::new()
    }

    fn set_frequency(&self, _core_id: u32, _mhz: u32) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported)
    }

    fn set_affinity(&self, _pid: u32, _cores: &[u32]) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported)
    }
}
