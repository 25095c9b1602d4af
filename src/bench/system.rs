// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Host description recorded next to benchmark results
//!
//! - **Linux**: `/etc/os-release`, `/proc/sys/kernel/{osrelease,version}`,
//!   `/proc/cpuinfo`, `/proc/meminfo`
//! - **macOS**: `sw_vers`, `uname`, `sysctl`
//! - **Windows**: `ver`, `PROCESSOR_IDENTIFIER`, `GlobalMemoryStatusEx`

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsDetails {
    /// Distribution or product name, e.g. "Ubuntu 24.04 LTS"
    pub name: String,
    pub version: String,
    /// Kernel release
    pub release: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuDetails {
    pub name: String,
    pub cores_logical: usize,
    /// `None` where the platform does not expose the physical layout
    pub cores_physical: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDetails {
    /// Rounded to one decimal, 0 if unknown
    pub total_gb: f64,
}

/// Machine the benchmark ran on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: OsDetails,
    pub cpu: CpuDetails,
    pub memory: MemoryDetails,
    /// RFC 3339, local time
    pub timestamp: String,
}

impl SystemInfo {
    /// Gather what the host exposes; missing pieces stay empty
    pub fn collect() -> Self {
        let mut info = Self {
            os: OsDetails {
                name: std::env::consts::OS.to_string(),
                ..Default::default()
            },
            cpu: CpuDetails {
                name: std::env::consts::ARCH.to_string(),
                cores_logical: std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1),
                cores_physical: None,
            },
            memory: MemoryDetails::default(),
            timestamp: Local::now().to_rfc3339(),
        };
        let total_bytes = info.fill_platform();
        info.memory.total_gb = bytes_to_gb(total_bytes.unwrap_or(0));
        info
    }

    #[cfg(target_os = "linux")]
    fn fill_platform(&mut self) -> Option<u64> {
        let read = |path: &str| std::fs::read_to_string(path).ok();

        if let Some(name) = read("/etc/os-release").and_then(|c| parse_os_release(&c)) {
            self.os.name = name;
        }
        if let Some(release) = read("/proc/sys/kernel/osrelease") {
            self.os.release = release.trim().to_string();
        }
        if let Some(version) = read("/proc/sys/kernel/version") {
            self.os.version = version.trim().to_string();
        }
        if let Some(cpuinfo) = read("/proc/cpuinfo") {
            let (model, physical) = parse_cpuinfo(&cpuinfo);
            if let Some(model) = model {
                self.cpu.name = model;
            }
            self.cpu.cores_physical = physical;
        }
        read("/proc/meminfo").and_then(|c| parse_mem_total(&c))
    }

    #[cfg(target_os = "macos")]
    fn fill_platform(&mut self) -> Option<u64> {
        if let Some(text) = command_output("sw_vers", &[]) {
            for line in text.lines() {
                if let Some(val) = line.strip_prefix("ProductName:") {
                    self.os.name = val.trim().to_string();
                } else if let Some(val) = line.strip_prefix("ProductVersion:") {
                    self.os.version = val.trim().to_string();
                }
            }
        }
        if let Some(release) = command_output("uname", &["-r"]) {
            self.os.release = release;
        }
        if let Some(brand) = command_output("sysctl", &["-n", "machdep.cpu.brand_string"]) {
            self.cpu.name = brand;
        }
        self.cpu.cores_physical =
            command_output("sysctl", &["-n", "hw.physicalcpu"]).and_then(|s| s.parse().ok());
        command_output("sysctl", &["-n", "hw.memsize"]).and_then(|s| s.parse().ok())
    }

    #[cfg(windows)]
    fn fill_platform(&mut self) -> Option<u64> {
        use windows::Win32::System::SystemInformation::{GlobalMemoryStatusEx, MEMORYSTATUSEX};

        self.os.name = "Windows".to_string();
        // "Microsoft Windows [Version 10.0.22631.4460]"
        if let Some(ver) = command_output("cmd", &["/C", "ver"]) {
            if let Some(version) = ver
                .split("Version ")
                .nth(1)
                .map(|v| v.trim_end_matches(']').to_string())
            {
                self.os.release = version.clone();
                self.os.version = version;
            }
        }
        if let Ok(identifier) = std::env::var("PROCESSOR_IDENTIFIER") {
            self.cpu.name = identifier;
        }

        let mut status = MEMORYSTATUSEX {
            dwLength: std::mem::size_of::<MEMORYSTATUSEX>() as u32,
            ..Default::default()
        };
        // SAFETY: status is a properly sized, writable MEMORYSTATUSEX
        unsafe { GlobalMemoryStatusEx(&mut status) }.ok()?;
        Some(status.ullTotalPhys)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    fn fill_platform(&mut self) -> Option<u64> {
        None
    }
}

#[cfg(any(target_os = "macos", windows))]
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn bytes_to_gb(bytes: u64) -> f64 {
    let gb = bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    (gb * 10.0).round() / 10.0
}

/// `PRETTY_NAME`, falling back to `NAME`
pub(crate) fn parse_os_release(content: &str) -> Option<String> {
    let mut name = None;
    for line in content.lines() {
        if let Some(val) = line.strip_prefix("PRETTY_NAME=") {
            return Some(val.trim_matches('"').to_string());
        } else if let Some(val) = line.strip_prefix("NAME=") {
            name = Some(val.trim_matches('"').to_string());
        }
    }
    name
}

/// First `model name`, and the number of distinct (package, core) pairs
pub(crate) fn parse_cpuinfo(content: &str) -> (Option<String>, Option<usize>) {
    let mut model = None;
    let mut cores = HashSet::new();
    let mut package = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "model name" | "Model" if model.is_none() => model = Some(value.to_string()),
            "physical id" => package = value.parse::<u32>().ok(),
            "core id" => {
                if let Ok(core) = value.parse::<u32>() {
                    cores.insert((package.unwrap_or(0), core));
                }
            }
            _ => {}
        }
    }

    // Some ARM kernels list no core ids at all
    let physical = (!cores.is_empty()).then_some(cores.len());
    (model, physical)
}

/// `MemTotal` in bytes
pub(crate) fn parse_mem_total(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse::<u64>().ok())
        .map(|kib| kib * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPUINFO: &str = "processor\t: 0\n\
                           model name\t: AMD Ryzen 9 7950X 16-Core Processor\n\
                           physical id\t: 0\n\
                           core id\t\t: 0\n\
                           \n\
                           processor\t: 1\n\
                           model name\t: AMD Ryzen 9 7950X 16-Core Processor\n\
                           physical id\t: 0\n\
                           core id\t\t: 0\n\
                           \n\
                           processor\t: 2\n\
                           model name\t: AMD Ryzen 9 7950X 16-Core Processor\n\
                           physical id\t: 0\n\
                           core id\t\t: 1\n";

    #[test]
    fn test_parse_cpuinfo_counts_cores_not_threads() {
        let (model, physical) = parse_cpuinfo(CPUINFO);
        assert_eq!(model.as_deref(), Some("AMD Ryzen 9 7950X 16-Core Processor"));
        assert_eq!(physical, Some(2));
    }

    #[test]
    fn test_parse_cpuinfo_without_topology() {
        let (model, physical) = parse_cpuinfo("processor\t: 0\nBogoMIPS\t: 48.00\n");
        assert_eq!(model, None);
        assert_eq!(physical, None);
    }

    #[test]
    fn test_parse_os_release() {
        let content = "NAME=\"Ubuntu\"\nVERSION_ID=\"24.04\"\nPRETTY_NAME=\"Ubuntu 24.04.1 LTS\"\n";
        assert_eq!(parse_os_release(content).as_deref(), Some("Ubuntu 24.04.1 LTS"));
        assert_eq!(parse_os_release("NAME=Alpine Linux\n").as_deref(), Some("Alpine Linux"));
        assert_eq!(parse_os_release(""), None);
    }

    #[test]
    fn test_parse_mem_total() {
        let content = "MemTotal:       32768000 kB\nMemFree:         1000 kB\n";
        assert_eq!(parse_mem_total(content), Some(32_768_000 * 1024));
        assert_eq!(parse_mem_total("MemFree: 1 kB\n"), None);
    }

    #[test]
    fn test_bytes_to_gb_rounds() {
        assert_eq!(bytes_to_gb(0), 0.0);
        assert_eq!(bytes_to_gb(16 * 1024 * 1024 * 1024), 16.0);
        assert_eq!(bytes_to_gb(1_610_612_736), 1.5);
    }

    #[test]
    fn test_collect_host() {
        let info = SystemInfo::collect();
        assert!(!info.os.name.is_empty());
        assert!(!info.cpu.name.is_empty());
        assert!(info.cpu.cores_logical >= 1);
        if let Some(physical) = info.cpu.cores_physical {
            assert!(physical >= 1);
        }
        assert!(chrono::DateTime::parse_from_rfc3339(&info.timestamp).is_ok());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(SystemInfo::default()).unwrap();
        assert!(json["os"]["release"].is_string());
        assert!(json["cpu"]["cores_physical"].is_null());
        assert!(json["memory"]["total_gb"].is_number());
    }
}
