// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Error types for the benchmark driver and process monitor

use std::io;
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors raised while probing processes or running benchmarks
#[derive(Error, Debug)]
pub enum BenchError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The process exited (or its PID was recycled) between enumeration and read
    #[error("Process {0} no longer exists")]
    ProcessVanished(u32),

    /// Permission denied for a process or counter
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unsupported platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Command failed to launch or run
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl BenchError {
    /// Map an I/O error from reading a per-process counter.
    ///
    /// `NotFound` means the process is gone, `PermissionDenied` is kept
    /// distinct so callers can treat the counter as unavailable.
    pub fn from_process_io(pid: u32, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => BenchError::ProcessVanished(pid),
            io::ErrorKind::PermissionDenied => {
                BenchError::PermissionDenied(format!("process {}: {}", pid, err))
            }
            _ => BenchError::Io(err),
        }
    }

    /// Whether the sampler should drop the reading and keep monitoring
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BenchError::ProcessVanished(_) | BenchError::PermissionDenied(_) | BenchError::Parse(_)
        )
    }

    /// Whether the error means the process is no longer running
    pub fn is_vanished(&self) -> bool {
        matches!(self, BenchError::ProcessVanished(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_vanished() {
        let err = BenchError::ProcessVanished(4242);
        assert_eq!(err.to_string(), "Process 4242 no longer exists");
    }

    #[test]
    fn test_error_display_configuration() {
        let err = BenchError::Configuration("interval_ms must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: interval_ms must be > 0"
        );
    }

    #[test]
    fn test_from_process_io_not_found() {
        let err = BenchError::from_process_io(7, io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.is_vanished());
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_process_io_permission() {
        let err = BenchError::from_process_io(
            7,
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        match err {
            BenchError::PermissionDenied(msg) => assert!(msg.contains("process 7")),
            other => panic!("Expected PermissionDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_from_process_io_other_is_not_transient() {
        let err = BenchError::from_process_io(7, io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: BenchError = json_err.into();
        assert!(err.to_string().contains("JSON error"));
    }
}
