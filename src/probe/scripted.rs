// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! In-memory probe that replays a tick-by-tick script

use super::{
    CpuTimes, IoCounters, MemoryMetric, MemoryReading, ProcessEntry, ProcessIdentity,
    ProcessProbe, ProcessState,
};
use crate::error::{BenchError, Result};
use std::cell::Cell;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) struct FakeProcess {
    pub ppid: u32,
    pub start_time: u64,
    pub zombie: bool,
    pub memory: Option<u64>,
    pub cpu: Option<CpuTimes>,
    pub io: Option<IoCounters>,
}

impl FakeProcess {
    pub fn new(ppid: u32) -> Self {
        Self {
            ppid,
            start_time: 1,
            zombie: false,
            memory: Some(0),
            cpu: Some(CpuTimes::default()),
            io: Some(IoCounters::default()),
        }
    }

    pub fn memory(mut self, bytes: u64) -> Self {
        self.memory = Some(bytes);
        self
    }

    pub fn cpu(mut self, user: f64, system: f64) -> Self {
        self.cpu = Some(CpuTimes { user, system });
        self
    }

    pub fn io(mut self, read_bytes: u64, write_bytes: u64) -> Self {
        self.io = Some(IoCounters {
            read_bytes,
            write_bytes,
        });
        self
    }

    pub fn no_io(mut self) -> Self {
        self.io = None;
        self
    }

    pub fn started_at(mut self, start_time: u64) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn zombie(mut self) -> Self {
        self.zombie = true;
        self
    }
}

pub(crate) type Frame = HashMap<u32, FakeProcess>;

/// Each `process_table` call moves to the next frame; the last frame repeats.
pub(crate) struct ScriptedProbe {
    frames: Vec<Frame>,
    cursor: Cell<Option<usize>>,
}

impl ScriptedProbe {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            cursor: Cell::new(None),
        }
    }

    fn current(&self) -> Option<&Frame> {
        // Before the first scan the first frame is visible
        let idx = self.cursor.get().unwrap_or(0);
        self.frames.get(idx.min(self.frames.len().saturating_sub(1)))
    }

    fn process(&self, pid: u32) -> Option<&FakeProcess> {
        self.current().and_then(|f| f.get(&pid))
    }
}

/// Build a frame from `(pid, process)` pairs
pub(crate) fn frame(procs: Vec<(u32, FakeProcess)>) -> Frame {
    procs.into_iter().collect()
}

impl ProcessProbe for ScriptedProbe {
    fn platform(&self) -> &'static str {
        "scripted"
    }

    fn process_table(&self) -> Result<Vec<ProcessEntry>> {
        let next = self.cursor.get().map_or(0, |c| c + 1);
        self.cursor.set(Some(next));
        let mut entries: Vec<ProcessEntry> = self
            .current()
            .map(|f| {
                f.iter()
                    .map(|(&pid, p)| ProcessEntry { pid, ppid: p.ppid })
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by_key(|e| e.pid);
        Ok(entries)
    }

    fn identity(&self, pid: u32) -> Option<ProcessIdentity> {
        self.process(pid).map(|p| ProcessIdentity {
            pid,
            start_time: p.start_time,
            state: if p.zombie {
                ProcessState::Zombie
            } else {
                ProcessState::Running
            },
        })
    }

    fn memory(&self, pid: u32, preferred: MemoryMetric) -> Result<MemoryReading> {
        let p = self.process(pid).ok_or(BenchError::ProcessVanished(pid))?;
        let bytes = p
            .memory
            .ok_or_else(|| BenchError::PermissionDenied(format!("process {}", pid)))?;
        Ok(MemoryReading {
            bytes,
            metric: preferred,
        })
    }

    fn cpu_times(&self, pid: u32) -> Result<CpuTimes> {
        let p = self.process(pid).ok_or(BenchError::ProcessVanished(pid))?;
        p.cpu
            .ok_or_else(|| BenchError::PermissionDenied(format!("process {}", pid)))
    }

    fn io_counters(&self, pid: u32) -> Option<IoCounters> {
        self.process(pid).and_then(|p| p.io)
    }
}
