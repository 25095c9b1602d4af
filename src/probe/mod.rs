// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Per-process measurement strategies
//!
//! Every host platform exposes process memory, CPU time and I/O counters
//! differently. [`ProcessProbe`] is the uniform contract the sampler talks
//! to; [`default_probe`] picks the implementation for the build target once,
//! at monitor start.
//!
//! # Platform Support
//!
//! | Platform | Process table  | Exclusive memory        | CPU user/sys | I/O bytes          |
//! |----------|----------------|-------------------------|--------------|--------------------|
//! | Linux    | /proc/*/stat   | smaps_rollup (USS)      | /proc stat   | /proc/*/io         |
//! | macOS    | libproc        | phys_footprint          | rusage v2    | rusage v2 diskio   |
//! | Windows  | ToolHelp32     | PrivateUsage            | GetProcessTimes | GetProcessIoCounters |
//!
//! Counters that a platform or permission level does not expose come back
//! as `None` (I/O) or fall back to a coarser metric (memory), never as an
//! error that aborts a tick.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(test)]
pub(crate) mod scripted;

/// Memory accounting granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMetric {
    /// Pages private to the process (USS, private bytes, physical footprint)
    Exclusive,
    /// Resident set size, including shared pages
    Resident,
}

impl std::fmt::Display for MemoryMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exclusive => write!(f, "exclusive"),
            Self::Resident => write!(f, "resident"),
        }
    }
}

/// One row of a process-table scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub ppid: u32,
}

/// Scheduler-visible state of a live PID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exited but not yet reaped; counters are final
    Zombie,
}

/// Liveness-checked identity of a process.
///
/// `start_time` is in platform units (clock ticks since boot, microseconds
/// since epoch, FILETIME); it only has to be stable for one process and
/// differ across PID reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub start_time: u64,
    pub state: ProcessState,
}

impl ProcessIdentity {
    /// Same PID and same start time, i.e. not a recycled PID
    pub fn same_process(&self, other: &ProcessIdentity) -> bool {
        self.pid == other.pid && self.start_time == other.start_time
    }

    pub fn is_zombie(&self) -> bool {
        self.state == ProcessState::Zombie
    }
}

/// A single memory measurement and the metric that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub bytes: u64,
    pub metric: MemoryMetric,
}

/// Cumulative CPU time in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
}

impl CpuTimes {
    pub fn total(&self) -> f64 {
        self.user + self.system
    }
}

/// Cumulative storage I/O in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Uniform per-process measurement contract
pub trait ProcessProbe: Send {
    /// Short platform name for logs
    fn platform(&self) -> &'static str;

    /// Scan every visible process with its parent PID
    fn process_table(&self) -> Result<Vec<ProcessEntry>>;

    /// Current identity of `pid`, or `None` if nothing is running under it
    fn identity(&self, pid: u32) -> Option<ProcessIdentity>;

    /// Memory in use by `pid`, using `preferred` when the platform allows it
    fn memory(&self, pid: u32, preferred: MemoryMetric) -> Result<MemoryReading>;

    /// Cumulative user/system CPU time of `pid`
    fn cpu_times(&self, pid: u32) -> Result<CpuTimes>;

    /// Cumulative I/O counters, `None` when not exposed for this process
    fn io_counters(&self, pid: u32) -> Option<IoCounters>;
}

/// Probe for targets without a measurement backend.
///
/// Every process is unobservable, which the monitor turns into an all-zero
/// snapshot.
#[derive(Debug, Default)]
pub struct UnsupportedProbe;

impl ProcessProbe for UnsupportedProbe {
    fn platform(&self) -> &'static str {
        "unsupported"
    }

    fn process_table(&self) -> Result<Vec<ProcessEntry>> {
        Err(BenchError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }

    fn identity(&self, _pid: u32) -> Option<ProcessIdentity> {
        None
    }

    fn memory(&self, pid: u32, _preferred: MemoryMetric) -> Result<MemoryReading> {
        Err(BenchError::ProcessVanished(pid))
    }

    fn cpu_times(&self, pid: u32) -> Result<CpuTimes> {
        Err(BenchError::ProcessVanished(pid))
    }

    fn io_counters(&self, _pid: u32) -> Option<IoCounters> {
        None
    }
}

/// Measurement strategy for the host platform
#[cfg(target_os = "linux")]
pub fn default_probe() -> Box<dyn ProcessProbe> {
    Box::new(linux::LinuxProbe::new())
}

/// Measurement strategy for the host platform
#[cfg(target_os = "macos")]
pub fn default_probe() -> Box<dyn ProcessProbe> {
    Box::new(macos::MacProbe::new())
}

/// Measurement strategy for the host platform
#[cfg(target_os = "windows")]
pub fn default_probe() -> Box<dyn ProcessProbe> {
    Box::new(windows::WindowsProbe::new())
}

/// Measurement strategy for the host platform
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn default_probe() -> Box<dyn ProcessProbe> {
    Box::new(UnsupportedProbe)
}
