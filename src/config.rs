// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Benchmark and monitor configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration that benchmarks the two stock CSS build tools.

use crate::error::{BenchError, Result};
use crate::probe::MemoryMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced with the project directory name in per-project commands
pub const PROJECT_PLACEHOLDER: &str = "{project}";

/// Sampler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in milliseconds
    pub interval_ms: u64,
    /// Upper bound on how long `stop` waits for the sampling thread
    pub stop_timeout_ms: u64,
    /// Preferred memory accounting
    pub memory_metric: MemoryMetric,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            stop_timeout_ms: 2000,
            memory_metric: MemoryMetric::Exclusive,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(BenchError::Configuration(
                "monitor.interval_ms must be greater than 0".into(),
            ));
        }
        if self.stop_timeout_ms == 0 {
            return Err(BenchError::Configuration(
                "monitor.stop_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// One CSS build tool under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Name used in result records
    pub name: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Directory the tool writes its CSS into
    pub output_dir: PathBuf,
    /// Run once per `project*` input directory instead of once overall
    #[serde(default)]
    pub per_project: bool,
}

impl ToolSpec {
    /// Command line with `{project}` substituted
    pub fn command_for_project(&self, project: &str) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| arg.replace(PROJECT_PLACEHOLDER, project))
            .collect()
    }
}

/// Top-level benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Directory holding the `project*` input directories
    pub input_dir: PathBuf,
    pub monitor: MonitorConfig,
    pub tools: Vec<ToolSpec>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            monitor: MonitorConfig::default(),
            tools: default_tools(),
        }
    }
}

fn default_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "grimoire_css".into(),
            command: vec!["../target/release/grimoire_css".into(), "build".into()],
            output_dir: PathBuf::from("grimoire_css_output"),
            per_project: false,
        },
        ToolSpec {
            name: "tailwind_css".into(),
            command: [
                "npx",
                "@tailwindcss/cli",
                "-c",
                "tailwind.config.js",
                "-i",
                "./input.css",
                "-o",
                "../../tailwind_css_output/{project}.css",
                "-m",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            output_dir: PathBuf::from("tailwind_css_output"),
            per_project: true,
        },
    ]
}

impl BenchConfig {
    /// Load from TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BenchError::Configuration(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;

        let mut names = HashSet::new();
        for tool in &self.tools {
            if tool.command.first().map_or(true, |p| p.trim().is_empty()) {
                return Err(BenchError::Configuration(format!(
                    "tool '{}' has an empty command",
                    tool.name
                )));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(BenchError::Configuration(format!(
                    "duplicate tool name '{}'",
                    tool.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a tool by name
    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Generate sample config
    pub fn sample_toml() -> String {
        r#"# CSS build benchmark configuration
input_dir = "input"

[monitor]
interval_ms = 10
stop_timeout_ms = 2000
# "exclusive" (private/unique memory, falls back to RSS) or "resident"
memory_metric = "exclusive"

[[tools]]
name = "grimoire_css"
command = ["../target/release/grimoire_css", "build"]
output_dir = "grimoire_css_output"

# Runs inside every input/project* directory; {project} is the directory name
[[tools]]
name = "tailwind_css"
command = ["npx", "@tailwindcss/cli", "-c", "tailwind.config.js", "-i", "./input.css", "-o", "../../tailwind_css_output/{project}.css", "-m"]
output_dir = "tailwind_css_output"
per_project = true
"#
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.interval(), Duration::from_millis(10));
        assert_eq!(config.stop_timeout(), Duration::from_secs(2));
        assert_eq!(config.memory_metric, MemoryMetric::Exclusive);
    }

    #[test]
    fn test_sample_matches_default() {
        let parsed = BenchConfig::from_toml(&BenchConfig::sample_toml()).unwrap();
        assert_eq!(parsed, BenchConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let parsed = BenchConfig::from_toml("").unwrap();
        assert_eq!(parsed, BenchConfig::default());
    }

    #[test]
    fn test_partial_monitor_section() {
        let parsed = BenchConfig::from_toml("[monitor]\ninterval_ms = 25\n").unwrap();
        assert_eq!(parsed.monitor.interval_ms, 25);
        assert_eq!(parsed.monitor.stop_timeout_ms, 2000);
    }

    #[test]
    fn test_resident_metric() {
        let parsed = BenchConfig::from_toml("[monitor]\nmemory_metric = \"resident\"\n").unwrap();
        assert_eq!(parsed.monitor.memory_metric, MemoryMetric::Resident);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = BenchConfig::from_toml("[monitor]\ninterval_ms = 0\n").unwrap_err();
        assert!(matches!(err, BenchError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let toml = r#"
[[tools]]
name = "a"
command = ["true"]
output_dir = "out"

[[tools]]
name = "a"
command = ["true"]
output_dir = "out2"
"#;
        let err = BenchConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate tool name"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let toml = "[[tools]]\nname = \"a\"\ncommand = []\noutput_dir = \"out\"\n";
        assert!(BenchConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_command_for_project() {
        let config = BenchConfig::default();
        let tailwind = config.tool("tailwind_css").unwrap();
        let cmd = tailwind.command_for_project("project3");
        assert!(cmd.contains(&"../../tailwind_css_output/project3.css".to_string()));
        assert!(!cmd.iter().any(|a| a.contains(PROJECT_PLACEHOLDER)));
    }

    #[test]
    fn test_from_toml_file_missing() {
        let err = BenchConfig::from_toml_file("/nonexistent/cssbench.toml").unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }
}
