// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! # CSS build benchmark
//!
//! Benchmarks CSS build tools by running each one as a child process and
//! sampling the resource use of its whole process tree while it works.
//!
//! ## Architecture
//!
//! - [`probe`]: per-platform process measurement (Linux procfs, macOS
//!   libproc, Windows process APIs) behind the [`probe::ProcessProbe`] trait
//! - [`process_tree`]: parent/child relation from one process-table scan
//! - [`tracker`]: the set of live processes of a monitored tree, with PID
//!   reuse detection
//! - [`accumulator`]: cumulative CPU/I/O counters folded into running totals
//! - [`sampler`]: the background sampling thread and its handle
//! - [`metrics`]: summary statistics once sampling stops
//! - [`bench`]: the benchmark driver (input/output analysis, throughput)
//!
//! ## Example
//!
//! ```no_run
//! use cssbench::{start_monitoring, stop_monitoring, MonitorConfig};
//! use std::process::Command;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut child = Command::new("npx").args(["@tailwindcss/cli", "-o", "out.css"]).spawn()?;
//! let handle = start_monitoring(child.id(), &MonitorConfig::default());
//! let status = child.wait()?;
//! let stopped = stop_monitoring(handle);
//!
//! let metrics = stopped.metrics();
//! println!("exit: {}", status);
//! println!("peak memory: {:.1} MB", metrics.memory.peak_mb());
//! println!("cpu: {:.2}s", metrics.cpu.total_seconds);
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod bench;
pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod process_tree;
pub mod sampler;
pub mod tracker;

pub use bench::{BenchmarkReport, BenchmarkResult, BenchmarkRunner, SystemInfo};
pub use config::{BenchConfig, MonitorConfig, ToolSpec};
pub use error::{BenchError, Result};
pub use metrics::{MetricsSnapshot, MonitorStatus};
pub use probe::{default_probe, MemoryMetric, ProcessProbe};
pub use sampler::{get_metrics, start_monitoring, stop_monitoring, MonitorHandle, StoppedMonitor};
