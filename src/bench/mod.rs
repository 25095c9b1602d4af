// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Benchmark driver
//!
//! Runs each configured CSS build tool as a child process under the
//! process-tree monitor and turns the measurements into a
//! [`BenchmarkResult`]: input and output sizes from disk, process metrics
//! from the monitor, and throughput rates derived from both.
//!
//! # Examples
//!
//! ```no_run
//! use cssbench::bench::BenchmarkRunner;
//! use cssbench::config::BenchConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = BenchmarkRunner::new(BenchConfig::default())?;
//! for (tool, outcome) in runner.run_all(&[]) {
//!     match outcome {
//!         Ok(result) => println!("{}: {:.3}s", tool, result.throughput.build_time_seconds),
//!         Err(e) => eprintln!("{}: {}", tool, e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod input;
pub mod output;
pub mod result;
pub mod system;
pub mod throughput;

pub use input::{InputAnalyzer, InputMetrics};
pub use output::{OutputAnalyzer, OutputMetrics};
pub use result::{BenchmarkReport, BenchmarkResult};
pub use system::SystemInfo;
pub use throughput::Throughput;

use crate::config::{BenchConfig, ToolSpec};
use crate::error::{BenchError, Result};
use crate::metrics;
use crate::sampler::{MonitorHandle, StoppedMonitor};
use chrono::Utc;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// One monitored child process run
#[derive(Debug)]
pub struct ProcessRun {
    /// `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub monitor: StoppedMonitor,
    pub stdout: String,
    pub stderr: String,
}

/// Drives tool runs for one configuration
pub struct BenchmarkRunner {
    config: BenchConfig,
    input: InputAnalyzer,
}

impl BenchmarkRunner {
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            input: InputAnalyzer::new()?,
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Clear stale CSS from the tool's output directory and measure the input
    pub fn prepare(&self, tool: &ToolSpec) -> Result<InputMetrics> {
        info!("Counting classes in input files...");
        let input = self.input.analyze(&self.config.input_dir);

        fs::create_dir_all(&tool.output_dir)?;
        for entry in fs::read_dir(&tool.output_dir)? {
            let path = entry?.path();
            if path.is_file() && output::is_css(&path) {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Error removing file {}: {}", path.display(), e);
                }
            }
        }

        Ok(input)
    }

    /// Spawn `command` and monitor it until it exits.
    ///
    /// The child is reaped before the monitor stops, so CPU and I/O the root
    /// process spent after the last completed tick are not counted. Builds
    /// shorter than one sampling interval can report close to zero CPU time.
    pub fn run_process(&self, command: &[String], cwd: Option<&Path>) -> Result<ProcessRun> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| BenchError::CommandFailed("empty command".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let started = Instant::now();
        let child = cmd
            .spawn()
            .map_err(|e| BenchError::CommandFailed(format!("{}: {}", command.join(" "), e)))?;
        let monitor = MonitorHandle::start(child.id(), &self.config.monitor);

        // Drains both pipes so a chatty tool cannot block on a full buffer
        let waited = child.wait_with_output();
        let elapsed = started.elapsed();
        let stopped = monitor.stop();
        let output = waited?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", program, stderr.trim());
        }
        log_abnormal_exit(program, &output.status);

        Ok(ProcessRun {
            exit_code: output.status.code(),
            elapsed,
            monitor: stopped,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
    }

    /// Benchmark one tool
    pub fn run_tool(&self, tool: &ToolSpec) -> Result<BenchmarkResult> {
        let started_at = Utc::now().to_rfc3339();
        let input = self.prepare(tool)?;

        info!("Running {} build...", tool.name);
        let runs = if tool.per_project {
            let projects = input::project_dirs(&self.config.input_dir);
            if projects.is_empty() {
                warn!(
                    "No project directories under {}",
                    self.config.input_dir.display()
                );
            }
            let mut runs = Vec::with_capacity(projects.len());
            for dir in projects {
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                info!("Processing {}...", name);
                runs.push(self.run_process(&tool.command_for_project(&name), Some(&dir))?);
            }
            runs
        } else {
            vec![self.run_process(&tool.command, None)?]
        };

        let elapsed: Duration = runs.iter().map(|r| r.elapsed).sum();
        let exit_code = first_failure(&runs);
        let monitors: Vec<StoppedMonitor> = runs.into_iter().map(|r| r.monitor).collect();
        let process = match monitors.as_slice() {
            [single] => single.metrics().clone(),
            many => metrics::combine(many),
        };

        let output = OutputAnalyzer::analyze(&tool.output_dir);
        Ok(BenchmarkResult::assemble(
            &tool.name,
            started_at,
            input,
            output,
            process,
            elapsed,
            exit_code,
        ))
    }

    /// Benchmark the named tools, or every configured tool if `names` is empty.
    ///
    /// A tool that fails does not stop the others.
    pub fn run_all(&self, names: &[String]) -> Vec<(String, Result<BenchmarkResult>)> {
        let selected: Vec<(String, Option<&ToolSpec>)> = if names.is_empty() {
            self.config
                .tools
                .iter()
                .map(|t| (t.name.clone(), Some(t)))
                .collect()
        } else {
            names
                .iter()
                .map(|n| (n.clone(), self.config.tool(n)))
                .collect()
        };

        selected
            .into_iter()
            .map(|(name, tool)| {
                let outcome = match tool {
                    Some(tool) => self.run_tool(tool),
                    None => Err(BenchError::Configuration(format!("unknown tool '{}'", name))),
                };
                if let Err(e) = &outcome {
                    warn!("Error running {} benchmark: {}", name, e);
                }
                (name, outcome)
            })
            .collect()
    }
}

/// Exit code of the first run that did not exit cleanly, else `Some(0)`
fn first_failure(runs: &[ProcessRun]) -> Option<i32> {
    runs.iter()
        .map(|r| r.exit_code)
        .find(|code| *code != Some(0))
        .unwrap_or(Some(0))
}

#[cfg(unix)]
fn log_abnormal_exit(program: &str, status: &ExitStatus) {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    if let Some(raw) = status.signal() {
        match Signal::try_from(raw) {
            Ok(signal) => warn!("{} was terminated by {}", program, signal),
            Err(_) => warn!("{} was terminated by signal {}", program, raw),
        }
    }
}

#[cfg(not(unix))]
fn log_abnormal_exit(program: &str, status: &ExitStatus) {
    if status.code().is_none() {
        warn!("{} exited without a status code", program);
    }
}
