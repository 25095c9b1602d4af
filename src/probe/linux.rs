// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Linux probe backed by procfs

use super::{
    CpuTimes, IoCounters, MemoryMetric, MemoryReading, ProcessEntry, ProcessIdentity,
    ProcessProbe, ProcessState,
};
use crate::error::{BenchError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_CLK_TCK: f64 = 100.0;
const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Fields of `/proc/<pid>/stat` the monitor needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StatFields {
    pub state: char,
    pub ppid: u32,
    pub utime: u64,
    pub stime: u64,
    pub starttime: u64,
}

/// procfs reader
pub struct LinuxProbe {
    proc_root: PathBuf,
    clk_tck: f64,
    page_size: u64,
}

impl LinuxProbe {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Read from an alternate procfs mount (containers, tests)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        // SAFETY: sysconf has no preconditions; it returns -1 for unknown names
        let clk_tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        Self {
            proc_root: root.into(),
            clk_tck: if clk_tck > 0 {
                clk_tck as f64
            } else {
                DEFAULT_CLK_TCK
            },
            page_size: if page_size > 0 {
                page_size as u64
            } else {
                DEFAULT_PAGE_SIZE
            },
        }
    }

    fn pid_file(&self, pid: u32, name: &str) -> PathBuf {
        self.proc_root.join(pid.to_string()).join(name)
    }

    fn read_pid_file(&self, pid: u32, name: &str) -> Result<String> {
        fs::read_to_string(self.pid_file(pid, name)).map_err(|e| map_read_error(pid, e))
    }

    fn read_stat(&self, pid: u32) -> Result<StatFields> {
        parse_stat(&self.read_pid_file(pid, "stat")?)
    }

    fn resident_bytes(&self, pid: u32) -> Result<u64> {
        let statm = self.read_pid_file(pid, "statm")?;
        let pages: u64 = statm
            .split_whitespace()
            .nth(1)
            .and_then(|rss| rss.parse().ok())
            .ok_or_else(|| BenchError::Parse(format!("Malformed statm for {}", pid)))?;
        Ok(pages * self.page_size)
    }
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for LinuxProbe {
    fn platform(&self) -> &'static str {
        "linux"
    }

    fn process_table(&self) -> Result<Vec<ProcessEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.proc_root)? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let pid: u32 = match entry.file_name().to_string_lossy().parse() {
                Ok(p) => p,
                Err(_) => continue,
            };
            // Processes exit mid-scan all the time
            if let Ok(stat) = self.read_stat(pid) {
                entries.push(ProcessEntry {
                    pid,
                    ppid: stat.ppid,
                });
            }
        }
        Ok(entries)
    }

    fn identity(&self, pid: u32) -> Option<ProcessIdentity> {
        let stat = self.read_stat(pid).ok()?;
        let state = match stat.state {
            'Z' | 'X' | 'x' => ProcessState::Zombie,
            _ => ProcessState::Running,
        };
        Some(ProcessIdentity {
            pid,
            start_time: stat.starttime,
            state,
        })
    }

    fn memory(&self, pid: u32, preferred: MemoryMetric) -> Result<MemoryReading> {
        if preferred == MemoryMetric::Exclusive {
            match self.read_pid_file(pid, "smaps_rollup") {
                Ok(content) => {
                    if let Some(bytes) = parse_smaps_rollup(&content) {
                        return Ok(MemoryReading {
                            bytes,
                            metric: MemoryMetric::Exclusive,
                        });
                    }
                }
                // Missing on kernels < 4.14, unreadable without ptrace access.
                // statm reports a process that is really gone.
                Err(_) => {}
            }
        }
        Ok(MemoryReading {
            bytes: self.resident_bytes(pid)?,
            metric: MemoryMetric::Resident,
        })
    }

    fn cpu_times(&self, pid: u32) -> Result<CpuTimes> {
        let stat = self.read_stat(pid)?;
        Ok(CpuTimes {
            user: stat.utime as f64 / self.clk_tck,
            system: stat.stime as f64 / self.clk_tck,
        })
    }

    fn io_counters(&self, pid: u32) -> Option<IoCounters> {
        // /proc/<pid>/io is mode 0400 for other users' processes
        let content = self.read_pid_file(pid, "io").ok()?;
        parse_io(&content)
    }
}

fn map_read_error(pid: u32, err: io::Error) -> BenchError {
    // Reading a procfs file of a process that died after open yields ESRCH
    if err.raw_os_error() == Some(libc::ESRCH) {
        return BenchError::ProcessVanished(pid);
    }
    BenchError::from_process_io(pid, err)
}

/// Parse `pid (comm) state ppid ...`.
///
/// `comm` may contain spaces and parentheses, so fields are counted from the
/// last `)`.
pub(crate) fn parse_stat(stat: &str) -> Result<StatFields> {
    let end = stat
        .rfind(')')
        .ok_or_else(|| BenchError::Parse("No closing parenthesis in stat".to_string()))?;
    let fields: Vec<&str> = stat[end + 1..].split_whitespace().collect();
    if fields.len() < 20 {
        return Err(BenchError::Parse(
            "Insufficient fields in stat file".to_string(),
        ));
    }

    let number = |idx: usize, name: &str| -> Result<u64> {
        fields[idx]
            .parse()
            .map_err(|e| BenchError::Parse(format!("Invalid {} in stat: {}", name, e)))
    };

    Ok(StatFields {
        state: fields[0].chars().next().unwrap_or('?'),
        ppid: number(1, "ppid")? as u32,
        utime: number(11, "utime")?,
        stime: number(12, "stime")?,
        starttime: number(19, "starttime")?,
    })
}

/// Unique set size from `smaps_rollup`, `None` if it lists no private pages
pub(crate) fn parse_smaps_rollup(content: &str) -> Option<u64> {
    let mut found = false;
    let mut kib = 0u64;
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if matches!(key, "Private_Clean" | "Private_Dirty" | "Private_Hugetlb") {
            if let Some(v) = value.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) {
                kib += v;
                found = true;
            }
        }
    }
    found.then_some(kib * 1024)
}

/// `read_bytes` / `write_bytes` from `/proc/<pid>/io`
pub(crate) fn parse_io(content: &str) -> Option<IoCounters> {
    let mut read = None;
    let mut write = None;
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().parse::<u64>().ok();
        match key {
            "read_bytes" => read = value,
            "write_bytes" => write = value,
            _ => {}
        }
    }
    Some(IoCounters {
        read_bytes: read?,
        write_bytes: write?,
    })
}

/// Whether `root` looks like a mounted procfs
pub fn procfs_available(root: &Path) -> bool {
    root.join("self").join("stat").exists()
}
