// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Cumulative counter → running total conversion
//!
//! OS counters for CPU time and I/O are cumulative per process. The
//! accumulator keeps the last reading of every tracked process and adds only
//! the non-negative difference to [`RunningTotals`], so a process that exits
//! keeps everything it contributed and a process discovered late contributes
//! nothing for work done before discovery.

use crate::probe::{CpuTimes, IoCounters};
use crate::tracker::MonitoredProcess;
use log::debug;

/// Totals across every process ever tracked in one monitoring session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningTotals {
    /// User CPU seconds
    pub cpu_user: f64,
    /// System CPU seconds
    pub cpu_system: f64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
    /// Largest per-tick memory total seen
    pub peak_memory_bytes: u64,
    /// Deltas that came out negative and were clamped to zero
    pub clamped_deltas: u64,
}

impl RunningTotals {
    pub fn cpu_total(&self) -> f64 {
        self.cpu_user + self.cpu_system
    }
}

/// Sole writer of [`RunningTotals`]
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    totals: RunningTotals,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> &RunningTotals {
        &self.totals
    }

    pub fn into_totals(self) -> RunningTotals {
        self.totals
    }

    /// Record the first reading of a newly discovered process without
    /// attributing anything to the totals
    pub fn establish_baseline(
        &mut self,
        process: &mut MonitoredProcess,
        cpu: Option<CpuTimes>,
        io: Option<IoCounters>,
    ) {
        process.last_cpu = cpu;
        process.last_io = io;
    }

    /// Fold a new reading of `process` into the totals.
    ///
    /// A counter seen for the first time only sets the baseline. A missing
    /// counter (`None`) contributes nothing and keeps the previous baseline.
    pub fn accumulate(
        &mut self,
        process: &mut MonitoredProcess,
        cpu: Option<CpuTimes>,
        io: Option<IoCounters>,
    ) {
        let pid = process.pid();

        if let Some(current) = cpu {
            if let Some(last) = process.last_cpu {
                self.totals.cpu_user += self.clamp_secs(pid, "cpu_user", current.user - last.user);
                self.totals.cpu_system +=
                    self.clamp_secs(pid, "cpu_system", current.system - last.system);
            }
            process.last_cpu = Some(current);
        }

        if let Some(current) = io {
            if let Some(last) = process.last_io {
                self.totals.io_read_bytes +=
                    self.clamp_bytes(pid, "io_read", current.read_bytes, last.read_bytes);
                self.totals.io_write_bytes +=
                    self.clamp_bytes(pid, "io_write", current.write_bytes, last.write_bytes);
            }
            process.last_io = Some(current);
        }
    }

    /// Update the running memory maximum with one tick's total
    pub fn observe_memory(&mut self, bytes: u64) {
        self.totals.peak_memory_bytes = self.totals.peak_memory_bytes.max(bytes);
    }

    fn clamp_secs(&mut self, pid: u32, counter: &str, delta: f64) -> f64 {
        if delta < 0.0 {
            self.totals.clamped_deltas += 1;
            debug!("pid {}: {} went backwards by {:.6}s, clamped", pid, counter, -delta);
            0.0
        } else {
            delta
        }
    }

    fn clamp_bytes(&mut self, pid: u32, counter: &str, current: u64, last: u64) -> u64 {
        match current.checked_sub(last) {
            Some(delta) => delta,
            None => {
                self.totals.clamped_deltas += 1;
                debug!(
                    "pid {}: {} went backwards by {} bytes, clamped",
                    pid,
                    counter,
                    last - current
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProcessIdentity, ProcessState};

    fn process(pid: u32) -> MonitoredProcess {
        MonitoredProcess::new(
            ProcessIdentity {
                pid,
                start_time: 1,
                state: ProcessState::Running,
            },
            0,
        )
    }

    fn cpu(user: f64, system: f64) -> Option<CpuTimes> {
        Some(CpuTimes { user, system })
    }

    fn io(read_bytes: u64, write_bytes: u64) -> Option<IoCounters> {
        Some(IoCounters {
            read_bytes,
            write_bytes,
        })
    }

    #[test]
    fn test_first_reading_is_baseline_only() {
        let mut acc = DeltaAccumulator::new();
        let mut p = process(1);
        acc.accumulate(&mut p, cpu(5.0, 2.0), io(1000, 500));
        assert_eq!(acc.totals(), &RunningTotals::default());
        assert_eq!(p.last_cpu, cpu(5.0, 2.0));
    }

    #[test]
    fn test_deltas_accumulate() {
        let mut acc = DeltaAccumulator::new();
        let mut p = process(1);
        acc.establish_baseline(&mut p, cpu(1.0, 0.5), io(100, 10));
        acc.accumulate(&mut p, cpu(1.5, 0.75), io(300, 20));
        acc.accumulate(&mut p, cpu(2.0, 1.0), io(400, 60));

        let t = acc.totals();
        assert!((t.cpu_user - 1.0).abs() < 1e-9);
        assert!((t.cpu_system - 0.5).abs() < 1e-9);
        assert!((t.cpu_total() - 1.5).abs() < 1e-9);
        assert_eq!(t.io_read_bytes, 300);
        assert_eq!(t.io_write_bytes, 50);
        assert_eq!(t.clamped_deltas, 0);
    }

    #[test]
    fn test_negative_delta_clamped_and_counted() {
        let mut acc = DeltaAccumulator::new();
        let mut p = process(1);
        acc.establish_baseline(&mut p, cpu(3.0, 3.0), io(1000, 1000));
        acc.accumulate(&mut p, cpu(2.0, 3.5), io(10, 1100));

        let t = acc.totals().clone();
        assert_eq!(t.cpu_user, 0.0);
        assert!((t.cpu_system - 0.5).abs() < 1e-9);
        assert_eq!(t.io_read_bytes, 0);
        assert_eq!(t.io_write_bytes, 100);
        assert_eq!(t.clamped_deltas, 2);

        // The lower reading becomes the new baseline
        acc.accumulate(&mut p, cpu(2.5, 3.5), io(20, 1100));
        assert!((acc.totals().cpu_user - 0.5).abs() < 1e-9);
        assert_eq!(acc.totals().io_read_bytes, 10);
    }

    #[test]
    fn test_missing_io_contributes_nothing() {
        let mut acc = DeltaAccumulator::new();
        let mut with_io = process(1);
        let mut without_io = process(2);
        acc.establish_baseline(&mut with_io, cpu(0.0, 0.0), io(0, 0));
        acc.establish_baseline(&mut without_io, cpu(0.0, 0.0), None);

        acc.accumulate(&mut with_io, cpu(0.1, 0.0), io(4096, 0));
        acc.accumulate(&mut without_io, cpu(0.2, 0.0), None);

        assert_eq!(acc.totals().io_read_bytes, 4096);
        assert!((acc.totals().cpu_user - 0.3).abs() < 1e-9);
        assert_eq!(without_io.last_io, None);
    }

    #[test]
    fn test_unavailable_counter_keeps_baseline() {
        let mut acc = DeltaAccumulator::new();
        let mut p = process(1);
        acc.establish_baseline(&mut p, cpu(1.0, 0.0), io(100, 0));
        acc.accumulate(&mut p, None, None);
        acc.accumulate(&mut p, cpu(2.0, 0.0), io(150, 0));
        assert!((acc.totals().cpu_user - 1.0).abs() < 1e-9);
        assert_eq!(acc.totals().io_read_bytes, 50);
    }

    #[test]
    fn test_totals_never_decrease() {
        let mut acc = DeltaAccumulator::new();
        let mut p = process(1);
        let readings = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let mut previous = acc.totals().clone();
        for (i, &r) in readings.iter().enumerate() {
            acc.accumulate(&mut p, cpu(r, r / 2.0), io((r * 100.0) as u64, i as u64));
            let t = acc.totals();
            assert!(t.cpu_user >= previous.cpu_user);
            assert!(t.cpu_system >= previous.cpu_system);
            assert!(t.io_read_bytes >= previous.io_read_bytes);
            assert!(t.io_write_bytes >= previous.io_write_bytes);
            previous = t.clone();
        }
    }

    #[test]
    fn test_peak_memory_is_running_max() {
        let mut acc = DeltaAccumulator::new();
        for bytes in [10, 50, 20, 50, 5] {
            acc.observe_memory(bytes);
        }
        assert_eq!(acc.totals().peak_memory_bytes, 50);
    }
}
