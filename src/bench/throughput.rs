// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Rates derived from wall time, input size and peak memory

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Floor for peak memory in the efficiency ratio, in MB
pub const MIN_PEAK_MB: f64 = 0.001;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub build_time_seconds: f64,
    pub classes_per_second: f64,
    /// Classes per MB of peak memory
    pub memory_efficiency: f64,
    pub bytes_processed_per_second: f64,
    pub bytes_generated_per_second: f64,
}

impl Throughput {
    /// All rates are 0 for a zero elapsed time
    pub fn compute(
        elapsed: Duration,
        classes: usize,
        peak_mb: f64,
        input_bytes: u64,
        output_bytes: u64,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let per_second = |amount: f64| if secs > 0.0 { amount / secs } else { 0.0 };

        Self {
            build_time_seconds: secs,
            classes_per_second: per_second(classes as f64),
            memory_efficiency: classes as f64 / peak_mb.max(MIN_PEAK_MB),
            bytes_processed_per_second: per_second(input_bytes as f64),
            bytes_generated_per_second: per_second(output_bytes as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let t = Throughput::compute(Duration::from_millis(500), 1000, 20.0, 4096, 2048);
        assert_eq!(t.build_time_seconds, 0.5);
        assert_eq!(t.classes_per_second, 2000.0);
        assert_eq!(t.memory_efficiency, 50.0);
        assert_eq!(t.bytes_processed_per_second, 8192.0);
        assert_eq!(t.bytes_generated_per_second, 4096.0);
    }

    #[test]
    fn test_zero_elapsed() {
        let t = Throughput::compute(Duration::ZERO, 1000, 20.0, 4096, 2048);
        assert_eq!(t.classes_per_second, 0.0);
        assert_eq!(t.bytes_processed_per_second, 0.0);
        assert_eq!(t.bytes_generated_per_second, 0.0);
        assert!(t.memory_efficiency.is_finite());
    }

    #[test]
    fn test_zero_peak_memory() {
        let t = Throughput::compute(Duration::from_secs(1), 5, 0.0, 0, 0);
        assert!((t.memory_efficiency - 5000.0).abs() < 1e-6);
    }
}
