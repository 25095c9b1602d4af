// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Summary statistics of a finished monitoring session

use crate::accumulator::RunningTotals;
use crate::probe::MemoryMetric;
use crate::sampler::StoppedMonitor;
use serde::{Deserialize, Serialize};

/// Bytes per megabyte (binary)
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn bytes_to_mb(bytes: f64) -> f64 {
    bytes / BYTES_PER_MB
}

/// How a monitoring session ended, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    /// Sampler finished and returned its state
    Complete,
    /// Nothing was observable under the root PID at start
    RootNotFound,
    /// Sampler did not answer within the stop timeout
    TimedOut,
    /// Sampler thread died
    Failed,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::RootNotFound => write!(f, "root not found"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Which memory metric backed the samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    /// No memory reading succeeded
    #[default]
    None,
    Exclusive,
    Resident,
    /// Some readings fell back to resident memory
    Mixed,
}

impl MemorySource {
    pub fn record(&mut self, metric: MemoryMetric) {
        let seen = match metric {
            MemoryMetric::Exclusive => Self::Exclusive,
            MemoryMetric::Resident => Self::Resident,
        };
        *self = self.merge(seen);
    }

    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, x) | (x, Self::None) => x,
            (a, b) if a == b => a,
            _ => Self::Mixed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub peak_bytes: u64,
    /// Mean over samples, 0 if there are none
    pub mean_bytes: f64,
    /// Sample standard deviation, `None` with fewer than two samples
    pub std_dev_bytes: Option<f64>,
    pub sample_count: usize,
    pub source: MemorySource,
}

impl MemoryStats {
    pub fn from_samples(samples: &[u64], peak_bytes: u64, source: MemorySource) -> Self {
        Self {
            peak_bytes,
            mean_bytes: mean(samples),
            std_dev_bytes: sample_std_dev(samples),
            sample_count: samples.len(),
            source,
        }
    }

    pub fn peak_mb(&self) -> f64 {
        bytes_to_mb(self.peak_bytes as f64)
    }

    pub fn mean_mb(&self) -> f64 {
        bytes_to_mb(self.mean_bytes)
    }

    pub fn std_dev_mb(&self) -> Option<f64> {
        self.std_dev_bytes.map(bytes_to_mb)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub user_seconds: f64,
    pub system_seconds: f64,
    pub total_seconds: f64,
}

impl CpuStats {
    pub fn new(user_seconds: f64, system_seconds: f64) -> Self {
        Self {
            user_seconds,
            system_seconds,
            total_seconds: user_seconds + system_seconds,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
    /// Raised to a file-size floor instead of measured
    pub estimated: bool,
}

impl IoStats {
    pub fn read_mb(&self) -> f64 {
        bytes_to_mb(self.read_bytes as f64)
    }

    pub fn write_mb(&self) -> f64 {
        bytes_to_mb(self.write_bytes as f64)
    }

    /// Raise counters that came out below what the tool must have touched.
    ///
    /// Page-cache hits and platforms without per-process I/O accounting
    /// under-report; the input and output file sizes are a lower bound.
    pub fn apply_floor(&mut self, min_read_bytes: u64, min_write_bytes: u64) {
        if self.read_bytes < min_read_bytes {
            self.read_bytes = min_read_bytes;
            self.estimated = true;
        }
        if self.write_bytes < min_write_bytes {
            self.write_bytes = min_write_bytes;
            self.estimated = true;
        }
    }
}

/// Final metrics of one monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub status: MonitorStatus,
    pub memory: MemoryStats,
    pub cpu: CpuStats,
    pub io: IoStats,
    /// Sampler iterations run
    pub ticks: u64,
    /// Distinct processes tracked
    pub processes_seen: u64,
    /// Counter readings that went backwards and were clamped
    pub clamped_deltas: u64,
}

impl MetricsSnapshot {
    /// All-zero snapshot for a session that produced no data
    pub fn empty(status: MonitorStatus) -> Self {
        Self {
            status,
            memory: MemoryStats::default(),
            cpu: CpuStats::default(),
            io: IoStats::default(),
            ticks: 0,
            processes_seen: 0,
            clamped_deltas: 0,
        }
    }

    pub fn from_totals(
        status: MonitorStatus,
        totals: &RunningTotals,
        samples: &[u64],
        source: MemorySource,
        ticks: u64,
        processes_seen: u64,
    ) -> Self {
        Self {
            status,
            memory: MemoryStats::from_samples(samples, totals.peak_memory_bytes, source),
            cpu: CpuStats::new(totals.cpu_user, totals.cpu_system),
            io: IoStats {
                read_bytes: totals.io_read_bytes,
                write_bytes: totals.io_write_bytes,
                estimated: false,
            },
            ticks,
            processes_seen,
            clamped_deltas: totals.clamped_deltas,
        }
    }

    /// Merge sessions that together make up one benchmark run.
    ///
    /// CPU and I/O add up, peak is the largest peak, the distribution
    /// statistics come from the pooled samples and the status is the worst.
    pub fn combine<'a>(parts: impl IntoIterator<Item = (&'a MetricsSnapshot, &'a [u64])>) -> Self {
        let mut combined = Self::empty(MonitorStatus::Complete);
        let mut pooled: Vec<u64> = Vec::new();
        let mut source = MemorySource::None;
        let mut user = 0.0;
        let mut system = 0.0;

        for (snapshot, samples) in parts {
            combined.status = combined.status.max(snapshot.status);
            combined.memory.peak_bytes = combined.memory.peak_bytes.max(snapshot.memory.peak_bytes);
            source = source.merge(snapshot.memory.source);
            pooled.extend_from_slice(samples);
            user += snapshot.cpu.user_seconds;
            system += snapshot.cpu.system_seconds;
            combined.io.read_bytes += snapshot.io.read_bytes;
            combined.io.write_bytes += snapshot.io.write_bytes;
            combined.io.estimated |= snapshot.io.estimated;
            combined.ticks += snapshot.ticks;
            combined.processes_seen += snapshot.processes_seen;
            combined.clamped_deltas += snapshot.clamped_deltas;
        }

        combined.memory = MemoryStats::from_samples(&pooled, combined.memory.peak_bytes, source);
        combined.cpu = CpuStats::new(user, system);
        combined
    }
}

/// Merge several stopped sessions (one per project) into one snapshot
pub fn combine(runs: &[StoppedMonitor]) -> MetricsSnapshot {
    MetricsSnapshot::combine(runs.iter().map(|r| (r.metrics(), r.samples())))
}

/// Arithmetic mean, 0 for no samples
pub fn mean(samples: &[u64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64
}

/// Sample (n - 1) standard deviation, `None` for fewer than two samples
pub fn sample_std_dev(samples: &[u64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let m = mean(samples);
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let d = s as f64 - m;
            d * d
        })
        .sum();
    Some((sum_sq / (samples.len() - 1) as f64).sqrt())
}
