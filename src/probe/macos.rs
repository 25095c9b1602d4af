// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! macOS probe backed by libproc

use super::{
    CpuTimes, IoCounters, MemoryMetric, MemoryReading, ProcessEntry, ProcessIdentity,
    ProcessProbe, ProcessState,
};
use crate::error::{BenchError, Result};
use std::ffi::c_void;
use std::io;
use std::mem;

// libproc flavors
const PROC_PIDTASKINFO: i32 = 4;
const PROC_PIDTBSDINFO: i32 = 3;
const RUSAGE_INFO_V2: i32 = 2;
// proc_bsdinfo.pbi_status
const SZOMB: u32 = 5;

#[link(name = "proc", kind = "dylib")]
extern "C" {
    fn proc_listallpids(buffer: *mut c_void, buffersize: i32) -> i32;

    fn proc_pidinfo(pid: i32, flavor: i32, arg: u64, buffer: *mut c_void, buffersize: i32) -> i32;

    fn proc_pid_rusage(pid: i32, flavor: i32, buffer: *mut c_void) -> i32;
}

extern "C" {
    fn mach_timebase_info(info: *mut MachTimebaseInfo) -> i32;
}

#[repr(C)]
#[derive(Default)]
struct MachTimebaseInfo {
    numer: u32,
    denom: u32,
}

#[repr(C)]
#[allow(dead_code)]
struct ProcBsdInfo {
    pbi_flags: u32,
    pbi_status: u32,
    pbi_xstatus: u32,
    pbi_pid: u32,
    pbi_ppid: u32,
    pbi_uid: u32,
    pbi_gid: u32,
    pbi_ruid: u32,
    pbi_rgid: u32,
    pbi_svuid: u32,
    pbi_svgid: u32,
    _pad1: u32,
    pbi_comm: [u8; 16],
    pbi_name: [u8; 32],
    pbi_nfiles: u32,
    pbi_pgid: u32,
    pbi_pjobc: u32,
    e_tdev: u32,
    e_tpgid: u32,
    pbi_nice: i32,
    pbi_start_tvsec: u64,
    pbi_start_tvusec: u64,
}

#[repr(C)]
#[allow(dead_code)]
struct ProcTaskInfo {
    pti_virtual_size: u64,
    pti_resident_size: u64,
    pti_total_user: u64,
    pti_total_system: u64,
    pti_threads_user: u64,
    pti_threads_system: u64,
    pti_policy: i32,
    pti_faults: i32,
    pti_pageins: i32,
    pti_cow_faults: i32,
    pti_messages_sent: i32,
    pti_messages_received: i32,
    pti_syscalls_mach: i32,
    pti_syscalls_unix: i32,
    pti_csw: i32,
    pti_threadnum: i32,
    pti_numrunning: i32,
    pti_priority: i32,
}

#[repr(C)]
#[allow(dead_code)]
struct RusageInfoV2 {
    ri_uuid: [u8; 16],
    ri_user_time: u64,
    ri_system_time: u64,
    ri_pkg_idle_wkups: u64,
    ri_interrupt_wkups: u64,
    ri_pageins: u64,
    ri_wired_size: u64,
    ri_resident_size: u64,
    ri_phys_footprint: u64,
    ri_proc_start_abstime: u64,
    ri_proc_exit_abstime: u64,
    ri_child_user_time: u64,
    ri_child_system_time: u64,
    ri_child_pkg_idle_wkups: u64,
    ri_child_interrupt_wkups: u64,
    ri_child_pageins: u64,
    ri_child_elapsed_abstime: u64,
    ri_diskio_bytesread: u64,
    ri_diskio_byteswritten: u64,
}

/// libproc reader
pub struct MacProbe {
    /// Nanoseconds per mach absolute time unit (1.0 on Intel, 125/3 on Apple Silicon)
    ns_per_tick: f64,
}

impl MacProbe {
    pub fn new() -> Self {
        let mut info = MachTimebaseInfo::default();
        // SAFETY: info is a valid out-pointer for the duration of the call
        let ok = unsafe { mach_timebase_info(&mut info) } == 0;
        let ns_per_tick = if ok && info.denom != 0 {
            info.numer as f64 / info.denom as f64
        } else {
            1.0
        };
        Self { ns_per_tick }
    }

    fn ticks_to_secs(&self, ticks: u64) -> f64 {
        ticks as f64 * self.ns_per_tick / 1_000_000_000.0
    }

    fn bsd_info(&self, pid: u32) -> Option<ProcBsdInfo> {
        // SAFETY: ProcBsdInfo is plain old data; the kernel writes at most `size` bytes
        unsafe {
            let mut info: ProcBsdInfo = mem::zeroed();
            let size = mem::size_of::<ProcBsdInfo>() as i32;
            let written = proc_pidinfo(
                pid as i32,
                PROC_PIDTBSDINFO,
                0,
                &mut info as *mut _ as *mut c_void,
                size,
            );
            (written == size).then_some(info)
        }
    }

    fn task_info(&self, pid: u32) -> Result<ProcTaskInfo> {
        // SAFETY: as above
        unsafe {
            let mut info: ProcTaskInfo = mem::zeroed();
            let size = mem::size_of::<ProcTaskInfo>() as i32;
            let written = proc_pidinfo(
                pid as i32,
                PROC_PIDTASKINFO,
                0,
                &mut info as *mut _ as *mut c_void,
                size,
            );
            if written == size {
                Ok(info)
            } else {
                Err(last_error(pid))
            }
        }
    }

    fn rusage(&self, pid: u32) -> Result<RusageInfoV2> {
        // SAFETY: RusageInfoV2 matches rusage_info_v2 from <sys/resource.h>
        unsafe {
            let mut info: RusageInfoV2 = mem::zeroed();
            if proc_pid_rusage(
                pid as i32,
                RUSAGE_INFO_V2,
                &mut info as *mut _ as *mut c_void,
            ) == 0
            {
                Ok(info)
            } else {
                Err(last_error(pid))
            }
        }
    }
}

impl Default for MacProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for MacProbe {
    fn platform(&self) -> &'static str {
        "macos"
    }

    fn process_table(&self) -> Result<Vec<ProcessEntry>> {
        // SAFETY: a null buffer asks only for the current count
        let count = unsafe { proc_listallpids(std::ptr::null_mut(), 0) };
        if count <= 0 {
            return Err(BenchError::Other("Failed to get process count".to_string()));
        }

        // Headroom for processes spawned between the two calls
        let mut pids = vec![0i32; count as usize + 64];
        let buffer_size = (pids.len() * mem::size_of::<i32>()) as i32;
        // SAFETY: pids has room for buffer_size bytes
        let listed =
            unsafe { proc_listallpids(pids.as_mut_ptr() as *mut c_void, buffer_size) };
        if listed <= 0 {
            return Err(BenchError::Other("Failed to list processes".to_string()));
        }

        let listed = (listed as usize).min(pids.len());
        Ok(pids[..listed]
            .iter()
            .filter(|&&pid| pid > 0)
            .filter_map(|&pid| {
                self.bsd_info(pid as u32).map(|info| ProcessEntry {
                    pid: pid as u32,
                    ppid: info.pbi_ppid,
                })
            })
            .collect())
    }

    fn identity(&self, pid: u32) -> Option<ProcessIdentity> {
        let info = self.bsd_info(pid)?;
        let state = if info.pbi_status == SZOMB {
            ProcessState::Zombie
        } else {
            ProcessState::Running
        };
        Some(ProcessIdentity {
            pid,
            start_time: info.pbi_start_tvsec * 1_000_000 + info.pbi_start_tvusec,
            state,
        })
    }

    fn memory(&self, pid: u32, preferred: MemoryMetric) -> Result<MemoryReading> {
        match self.rusage(pid) {
            Ok(usage) => Ok(match preferred {
                MemoryMetric::Exclusive => MemoryReading {
                    bytes: usage.ri_phys_footprint,
                    metric: MemoryMetric::Exclusive,
                },
                MemoryMetric::Resident => MemoryReading {
                    bytes: usage.ri_resident_size,
                    metric: MemoryMetric::Resident,
                },
            }),
            Err(e) if e.is_vanished() => Err(e),
            // rusage needs same-user or root; task info is less strict
            Err(_) => Ok(MemoryReading {
                bytes: self.task_info(pid)?.pti_resident_size,
                metric: MemoryMetric::Resident,
            }),
        }
    }

    fn cpu_times(&self, pid: u32) -> Result<CpuTimes> {
        match self.rusage(pid) {
            Ok(usage) => Ok(CpuTimes {
                user: self.ticks_to_secs(usage.ri_user_time),
                system: self.ticks_to_secs(usage.ri_system_time),
            }),
            Err(e) if e.is_vanished() => Err(e),
            Err(_) => {
                let info = self.task_info(pid)?;
                Ok(CpuTimes {
                    user: self.ticks_to_secs(info.pti_total_user),
                    system: self.ticks_to_secs(info.pti_total_system),
                })
            }
        }
    }

    fn io_counters(&self, pid: u32) -> Option<IoCounters> {
        let usage = self.rusage(pid).ok()?;
        Some(IoCounters {
            read_bytes: usage.ri_diskio_bytesread,
            write_bytes: usage.ri_diskio_byteswritten,
        })
    }
}

fn last_error(pid: u32) -> BenchError {
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return BenchError::ProcessVanished(pid);
    }
    if err.raw_os_error() == Some(libc::EPERM) {
        return BenchError::PermissionDenied(format!("process {}: {}", pid, err));
    }
    BenchError::from_process_io(pid, err)
}
