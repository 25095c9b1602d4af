// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Per-tool benchmark result record

use super::input::InputMetrics;
use super::output::OutputMetrics;
use super::system::SystemInfo;
use super::throughput::Throughput;
use crate::metrics::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub tool: String,
    /// RFC 3339 start time
    pub started_at: String,
    pub input: InputMetrics,
    pub output: OutputMetrics,
    pub process: MetricsSnapshot,
    pub throughput: Throughput,
    /// First non-zero exit code, `None` if a run was killed by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl BenchmarkResult {
    /// Merge measured process metrics with what is known from disk
    pub fn assemble(
        tool: impl Into<String>,
        started_at: String,
        input: InputMetrics,
        output: OutputMetrics,
        mut process: MetricsSnapshot,
        elapsed: Duration,
        exit_code: Option<i32>,
    ) -> Self {
        process
            .io
            .apply_floor(input.total_input_size_bytes, output.total_size_bytes);
        let throughput = Throughput::compute(
            elapsed,
            input.unique_class_count,
            process.memory.peak_mb(),
            input.total_input_size_bytes,
            output.total_size_bytes,
        );
        Self {
            tool: tool.into(),
            started_at,
            input,
            output,
            process,
            throughput,
            exit_code,
            success: exit_code == Some(0),
        }
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Everything one invocation produced, with the host it ran on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub system_info: SystemInfo,
    pub results: Vec<BenchmarkResult>,
}

impl BenchmarkReport {
    pub fn new(system_info: SystemInfo, results: Vec<BenchmarkResult>) -> Self {
        Self {
            system_info,
            results,
        }
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
