// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Windows probe backed by ToolHelp32 and the process status APIs

use super::{
    CpuTimes, IoCounters, MemoryMetric, MemoryReading, ProcessEntry, ProcessIdentity,
    ProcessProbe, ProcessState,
};
use crate::error::{BenchError, Result};
use ::windows::Win32::Foundation::{CloseHandle, FILETIME, HANDLE};
use ::windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use ::windows::Win32::System::ProcessStatus::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS_EX};
use ::windows::Win32::System::Threading::{
    GetExitCodeProcess, GetProcessIoCounters, GetProcessTimes, OpenProcess, IO_COUNTERS,
    PROCESS_ACCESS_RIGHTS, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_READ,
};

const STILL_ACTIVE: u32 = 259;
const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_PARAMETER: u32 = 87;

/// Process handle closed on drop
struct OwnedHandle(HANDLE);

impl OwnedHandle {
    fn open(pid: u32, access: PROCESS_ACCESS_RIGHTS) -> Result<Self> {
        // SAFETY: OpenProcess has no memory-safety preconditions
        unsafe { OpenProcess(access, false, pid) }
            .map(OwnedHandle)
            .map_err(|e| {
                // HRESULT_FROM_WIN32 keeps the Win32 code in the low word
                match (e.code().0 as u32) & 0xFFFF {
                    ERROR_INVALID_PARAMETER => BenchError::ProcessVanished(pid),
                    ERROR_ACCESS_DENIED => {
                        BenchError::PermissionDenied(format!("process {}: {}", pid, e))
                    }
                    _ => BenchError::Other(format!("OpenProcess({}) failed: {}", pid, e)),
                }
            })
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcess and is closed once
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

struct Times {
    creation: u64,
    kernel: u64,
    user: u64,
}

fn filetime_to_u64(ft: &FILETIME) -> u64 {
    (ft.dwHighDateTime as u64) << 32 | ft.dwLowDateTime as u64
}

fn process_times(handle: &OwnedHandle) -> Option<Times> {
    let mut creation = FILETIME::default();
    let mut exit = FILETIME::default();
    let mut kernel = FILETIME::default();
    let mut user = FILETIME::default();
    // SAFETY: all out-pointers are valid locals
    unsafe { GetProcessTimes(handle.0, &mut creation, &mut exit, &mut kernel, &mut user) }
        .ok()?;
    Some(Times {
        creation: filetime_to_u64(&creation),
        kernel: filetime_to_u64(&kernel),
        user: filetime_to_u64(&user),
    })
}

/// Win32 reader
#[derive(Debug, Default)]
pub struct WindowsProbe;

impl WindowsProbe {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessProbe for WindowsProbe {
    fn platform(&self) -> &'static str {
        "windows"
    }

    fn process_table(&self) -> Result<Vec<ProcessEntry>> {
        let mut entries = Vec::new();

        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).map_err(|e| {
                BenchError::Other(format!("Failed to create process snapshot: {}", e))
            })?;
            let snapshot = OwnedHandle(snapshot);

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            if Process32FirstW(snapshot.0, &mut entry).is_ok() {
                loop {
                    entries.push(ProcessEntry {
                        pid: entry.th32ProcessID,
                        ppid: entry.th32ParentProcessID,
                    });
                    if Process32NextW(snapshot.0, &mut entry).is_err() {
                        break;
                    }
                }
            }
        }

        Ok(entries)
    }

    fn identity(&self, pid: u32) -> Option<ProcessIdentity> {
        let handle = OwnedHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION).ok()?;
        let times = process_times(&handle)?;

        let mut exit_code = 0u32;
        // SAFETY: exit_code is a valid out-pointer
        unsafe { GetExitCodeProcess(handle.0, &mut exit_code) }.ok()?;
        // The process object outlives the process while any handle is open
        let state = if exit_code == STILL_ACTIVE {
            ProcessState::Running
        } else {
            ProcessState::Zombie
        };

        Some(ProcessIdentity {
            pid,
            start_time: times.creation,
            state,
        })
    }

    fn memory(&self, pid: u32, preferred: MemoryMetric) -> Result<MemoryReading> {
        let handle = OwnedHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_VM_READ)?;
        let mut counters = PROCESS_MEMORY_COUNTERS_EX::default();
        // SAFETY: PROCESS_MEMORY_COUNTERS_EX extends PROCESS_MEMORY_COUNTERS; cb says which
        unsafe {
            GetProcessMemoryInfo(
                handle.0,
                std::ptr::addr_of_mut!(counters) as *mut _,
                std::mem::size_of::<PROCESS_MEMORY_COUNTERS_EX>() as u32,
            )
        }
        .map_err(|e| BenchError::PermissionDenied(format!("process {}: {}", pid, e)))?;

        let private = counters.PrivateUsage as u64;
        Ok(
            if preferred == MemoryMetric::Exclusive && private > 0 {
                MemoryReading {
                    bytes: private,
                    metric: MemoryMetric::Exclusive,
                }
            } else {
                MemoryReading {
                    bytes: counters.WorkingSetSize as u64,
                    metric: MemoryMetric::Resident,
                }
            },
        )
    }

    fn cpu_times(&self, pid: u32) -> Result<CpuTimes> {
        let handle = OwnedHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION)?;
        let times = process_times(&handle)
            .ok_or_else(|| BenchError::PermissionDenied(format!("process {}: times", pid)))?;
        // FILETIME durations are 100ns units
        Ok(CpuTimes {
            user: times.user as f64 / 10_000_000.0,
            system: times.kernel as f64 / 10_000_000.0,
        })
    }

    fn io_counters(&self, pid: u32) -> Option<IoCounters> {
        let handle = OwnedHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION).ok()?;
        let mut io = IO_COUNTERS::default();
        // SAFETY: io is a valid out-pointer
        unsafe { GetProcessIoCounters(handle.0, &mut io) }.ok()?;
        Some(IoCounters {
            read_bytes: io.ReadTransferCount,
            write_bytes: io.WriteTransferCount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filetime_to_u64() {
        let ft = FILETIME {
            dwLowDateTime: 0x0000_0010,
            dwHighDateTime: 0x0000_0001,
        };
        assert_eq!(filetime_to_u64(&ft), 0x1_0000_0010);
    }

    #[test]
    fn test_self_process() {
        let probe = WindowsProbe::new();
        let pid = std::process::id();
        let table = probe.process_table().unwrap();
        assert!(table.iter().any(|e| e.pid == pid));
        assert!(probe.io_counters(pid).is_some());
    }
}
