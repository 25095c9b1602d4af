// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Set of processes belonging to one monitored tree
//!
//! The root is registered once; every refresh liveness-checks what is
//! already tracked, then walks the current process table to pick up new
//! descendants. A tracked PID whose start time changed has been recycled by
//! the OS and is dropped, never merged with its predecessor.

use crate::accumulator::DeltaAccumulator;
use crate::probe::{CpuTimes, IoCounters, ProcessIdentity, ProcessProbe};
use crate::process_tree::ProcessTree;
use log::{debug, trace};
use std::collections::HashMap;

/// A tracked process and its last cumulative counter readings
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredProcess {
    pub identity: ProcessIdentity,
    /// Discovery order within the session, root is 0
    pub generation: u64,
    pub last_cpu: Option<CpuTimes>,
    pub last_io: Option<IoCounters>,
}

impl MonitoredProcess {
    pub fn new(identity: ProcessIdentity, generation: u64) -> Self {
        Self {
            identity,
            generation,
            last_cpu: None,
            last_io: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.identity.pid
    }
}

/// What one refresh changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub discovered: usize,
    /// Exited normally (gone or zombie)
    pub exited: usize,
    /// PID now belongs to a different process
    pub recycled: usize,
}

/// Live processes of one monitored tree
#[derive(Debug)]
pub struct ProcessSet {
    root_pid: u32,
    live: HashMap<u32, MonitoredProcess>,
    next_generation: u64,
}

impl ProcessSet {
    pub fn new(root_pid: u32) -> Self {
        Self {
            root_pid,
            live: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn root_pid(&self) -> u32 {
        self.root_pid
    }

    /// Register the root and take its baseline. Returns false if no process
    /// is observable under the root PID.
    pub fn track_root(&mut self, probe: &dyn ProcessProbe, acc: &mut DeltaAccumulator) -> bool {
        match probe.identity(self.root_pid) {
            Some(identity) => {
                self.discover(identity, probe, acc);
                true
            }
            None => false,
        }
    }

    /// Scan the process table, liveness-check tracked processes, then
    /// discover new descendants of anything still tracked
    pub fn refresh(
        &mut self,
        probe: &dyn ProcessProbe,
        acc: &mut DeltaAccumulator,
    ) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        let tree = match probe.process_table() {
            Ok(table) => Some(ProcessTree::from_entries(table)),
            Err(e) => {
                debug!("process table scan failed: {}", e);
                None
            }
        };

        for pid in self.pids() {
            let current = probe.identity(pid);
            let Some(tracked) = self.live.get_mut(&pid) else {
                continue;
            };
            match current {
                Some(id) if id.same_process(&tracked.identity) && !id.is_zombie() => {
                    tracked.identity.state = id.state;
                }
                Some(id) if id.same_process(&tracked.identity) => {
                    // Counters of an exited process are final; fold them in once
                    acc.accumulate(tracked, probe.cpu_times(pid).ok(), probe.io_counters(pid));
                    self.live.remove(&pid);
                    summary.exited += 1;
                    trace!("pid {} exited (zombie)", pid);
                }
                Some(_) => {
                    self.live.remove(&pid);
                    summary.recycled += 1;
                    debug!("pid {} was recycled, dropping stale entry", pid);
                }
                None => {
                    self.live.remove(&pid);
                    summary.exited += 1;
                    trace!("pid {} exited", pid);
                }
            }
        }

        let Some(tree) = tree else {
            return summary;
        };

        let mut candidates: Vec<u32> = self
            .pids()
            .into_iter()
            .flat_map(|pid| tree.descendants(pid))
            .filter(|pid| !self.live.contains_key(pid))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        for pid in candidates {
            match probe.identity(pid) {
                // Already exited before we saw it; nothing to attribute
                Some(identity) if identity.is_zombie() => {}
                Some(identity) => {
                    self.discover(identity, probe, acc);
                    summary.discovered += 1;
                }
                None => {}
            }
        }

        summary
    }

    fn discover(
        &mut self,
        identity: ProcessIdentity,
        probe: &dyn ProcessProbe,
        acc: &mut DeltaAccumulator,
    ) {
        let pid = identity.pid;
        let mut process = MonitoredProcess::new(identity, self.next_generation);
        self.next_generation += 1;
        acc.establish_baseline(&mut process, probe.cpu_times(pid).ok(), probe.io_counters(pid));
        debug!("tracking pid {} (generation {})", pid, process.generation);
        self.live.insert(pid, process);
    }

    /// Drop a process that vanished mid-tick
    pub fn remove(&mut self, pid: u32) -> Option<MonitoredProcess> {
        self.live.remove(&pid)
    }

    pub fn get_mut(&mut self, pid: u32) -> Option<&mut MonitoredProcess> {
        self.live.get_mut(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.live.contains_key(&pid)
    }

    /// Tracked PIDs in ascending order
    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.live.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Distinct processes tracked since the session began
    pub fn processes_seen(&self) -> u64 {
        self.next_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::scripted::{frame, FakeProcess, ScriptedProbe};

    fn setup(probe: &ScriptedProbe, root: u32) -> (ProcessSet, DeltaAccumulator) {
        let mut set = ProcessSet::new(root);
        let mut acc = DeltaAccumulator::new();
        assert!(set.track_root(probe, &mut acc));
        (set, acc)
    }

    #[test]
    fn test_missing_root() {
        let probe = ScriptedProbe::new(vec![frame(vec![(1, FakeProcess::new(0))])]);
        let mut set = ProcessSet::new(42);
        let mut acc = DeltaAccumulator::new();
        assert!(!set.track_root(&probe, &mut acc));
        assert!(set.is_empty());
        assert_eq!(set.processes_seen(), 0);
    }

    #[test]
    fn test_discovers_grandchildren() {
        let probe = ScriptedProbe::new(vec![frame(vec![
            (1, FakeProcess::new(0)),
            (10, FakeProcess::new(1)),
            (11, FakeProcess::new(10)),
            (12, FakeProcess::new(11)),
            (20, FakeProcess::new(1)),
        ])]);
        let (mut set, mut acc) = setup(&probe, 10);
        let summary = set.refresh(&probe, &mut acc);

        assert_eq!(summary.discovered, 2);
        assert_eq!(set.pids(), vec![10, 11, 12]);
        assert!(!set.contains(20));
        assert_eq!(set.processes_seen(), 3);
    }

    #[test]
    fn test_discovery_sets_baseline() {
        let probe = ScriptedProbe::new(vec![
            frame(vec![(10, FakeProcess::new(1))]),
            frame(vec![
                (10, FakeProcess::new(1)),
                (11, FakeProcess::new(10).cpu(7.0, 3.0).io(5000, 100)),
            ]),
        ]);
        let (mut set, mut acc) = setup(&probe, 10);
        set.refresh(&probe, &mut acc);
        assert!(!set.contains(11));
        set.refresh(&probe, &mut acc);

        assert!(set.contains(11));
        // Work done before discovery is not attributed
        assert_eq!(acc.totals().cpu_total(), 0.0);
        assert_eq!(acc.totals().io_read_bytes, 0);
        let child = set.get_mut(11).unwrap();
        assert_eq!(child.last_cpu, Some(CpuTimes { user: 7.0, system: 3.0 }));
        assert_eq!(child.generation, 1);
    }

    #[test]
    fn test_zombie_gets_final_reading() {
        let probe = ScriptedProbe::new(vec![
            frame(vec![(10, FakeProcess::new(1)), (11, FakeProcess::new(10))]),
            frame(vec![
                (10, FakeProcess::new(1)),
                (11, FakeProcess::new(10).cpu(2.0, 0.5).io(800, 200).zombie()),
            ]),
        ]);
        let (mut set, mut acc) = setup(&probe, 10);
        set.refresh(&probe, &mut acc);
        assert!(set.contains(11));

        let summary = set.refresh(&probe, &mut acc);
        assert_eq!(summary.exited, 1);
        assert!(!set.contains(11));
        assert!((acc.totals().cpu_total() - 2.5).abs() < 1e-9);
        assert_eq!(acc.totals().io_read_bytes, 800);
        assert_eq!(acc.totals().io_write_bytes, 200);
    }

    #[test]
    fn test_recycled_pid_is_new_process() {
        let probe = ScriptedProbe::new(vec![
            frame(vec![
                (10, FakeProcess::new(1)),
                (11, FakeProcess::new(10).cpu(1.0, 0.0)),
            ]),
            // 11 exited and its PID was reused by another child of 10
            frame(vec![
                (10, FakeProcess::new(1)),
                (11, FakeProcess::new(10).started_at(99).cpu(50.0, 0.0)),
            ]),
        ]);
        let (mut set, mut acc) = setup(&probe, 10);
        set.refresh(&probe, &mut acc);
        assert_eq!(set.get_mut(11).unwrap().generation, 1);

        let summary = set.refresh(&probe, &mut acc);
        assert_eq!(summary.recycled, 1);
        assert_eq!(summary.discovered, 1);

        let reborn = set.get_mut(11).unwrap();
        assert_eq!(reborn.identity.start_time, 99);
        assert_eq!(reborn.generation, 2);
        // The new occupant's prior CPU is its baseline, not a delta
        assert_eq!(acc.totals().cpu_total(), 0.0);
        assert_eq!(set.processes_seen(), 3);
    }

    #[test]
    fn test_recycled_pid_outside_tree_dropped() {
        let probe = ScriptedProbe::new(vec![
            frame(vec![(10, FakeProcess::new(1)), (11, FakeProcess::new(10))]),
            frame(vec![
                (10, FakeProcess::new(1)),
                (11, FakeProcess::new(500).started_at(7)),
            ]),
        ]);
        let (mut set, mut acc) = setup(&probe, 10);
        set.refresh(&probe, &mut acc);
        set.refresh(&probe, &mut acc);
        assert_eq!(set.pids(), vec![10]);
    }

    #[test]
    fn test_orphans_stay_tracked() {
        let probe = ScriptedProbe::new(vec![
            frame(vec![(10, FakeProcess::new(1)), (11, FakeProcess::new(10))]),
            // Root gone, child reparented to init
            frame(vec![(11, FakeProcess::new(1)), (12, FakeProcess::new(11))]),
        ]);
        let (mut set, mut acc) = setup(&probe, 10);
        set.refresh(&probe, &mut acc);
        set.refresh(&probe, &mut acc);
        assert_eq!(set.pids(), vec![11, 12]);
    }

    #[test]
    fn test_already_exited_child_skipped() {
        let probe = ScriptedProbe::new(vec![frame(vec![
            (10, FakeProcess::new(1)),
            (11, FakeProcess::new(10).zombie()),
        ])]);
        let (mut set, mut acc) = setup(&probe, 10);
        let summary = set.refresh(&probe, &mut acc);
        assert_eq!(summary.discovered, 0);
        assert!(!set.contains(11));
    }

    #[test]
    fn test_everything_exited() {
        let probe = ScriptedProbe::new(vec![
            frame(vec![(10, FakeProcess::new(1))]),
            frame(vec![]),
        ]);
        let (mut set, mut acc) = setup(&probe, 10);
        set.refresh(&probe, &mut acc);
        set.refresh(&probe, &mut acc);
        assert!(set.is_empty());
        assert_eq!(set.processes_seen(), 1);
    }
}
