// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Size accounting of the CSS a tool produced

use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputMetrics {
    pub file_count: usize,
    pub total_size_bytes: u64,
    /// 0 when no files were found
    pub avg_size_bytes: f64,
}

impl OutputMetrics {
    pub fn total_size_kb(&self) -> f64 {
        self.total_size_bytes as f64 / 1024.0
    }

    pub fn avg_size_kb(&self) -> f64 {
        self.avg_size_bytes / 1024.0
    }
}

/// Sums every `*.css` file under an output directory, recursively
pub struct OutputAnalyzer;

impl OutputAnalyzer {
    pub fn analyze(output_dir: &Path) -> OutputMetrics {
        if !output_dir.is_dir() {
            warn!("Output directory {} does not exist", output_dir.display());
            return OutputMetrics::default();
        }

        let mut metrics = OutputMetrics::default();
        for entry in WalkDir::new(output_dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !is_css(entry.path()) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => {
                    metrics.file_count += 1;
                    metrics.total_size_bytes += meta.len();
                }
                Err(e) => warn!("Error analyzing CSS file {}: {}", entry.path().display(), e),
            }
        }

        if metrics.file_count > 0 {
            metrics.avg_size_bytes = metrics.total_size_bytes as f64 / metrics.file_count as f64;
        }
        metrics
    }
}

pub(crate) fn is_css(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "css")
}
