// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Benchmark input discovery: CSS class names used by the HTML fixtures

use crate::error::{BenchError, Result};
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of the per-project input directories
pub const PROJECT_PREFIX: &str = "project";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMetrics {
    pub unique_class_count: usize,
    pub total_input_size_bytes: u64,
    pub file_count: usize,
}

/// Counts unique class names across `project*/*.html`
pub struct InputAnalyzer {
    class_attr: Regex,
}

impl InputAnalyzer {
    pub fn new() -> Result<Self> {
        let class_attr = Regex::new(r#"class="([^"]*)""#)
            .map_err(|e| BenchError::Parse(format!("class attribute pattern: {}", e)))?;
        Ok(Self { class_attr })
    }

    /// Scan every `project*` directory directly under `input_dir`.
    ///
    /// A missing input directory is not an error; it yields zeros.
    pub fn analyze(&self, input_dir: &Path) -> InputMetrics {
        if !input_dir.is_dir() {
            warn!("Input directory {} does not exist", input_dir.display());
            return InputMetrics::default();
        }

        let mut classes: HashSet<String> = HashSet::new();
        let mut metrics = InputMetrics::default();

        for project in project_dirs(input_dir) {
            for html in html_files(&project) {
                match fs::read_to_string(&html) {
                    Ok(content) => {
                        metrics.file_count += 1;
                        metrics.total_input_size_bytes += content.len() as u64;
                        self.collect_classes(&content, &mut classes);
                    }
                    Err(e) => warn!("Error reading {}: {}", html.display(), e),
                }
            }
        }

        metrics.unique_class_count = classes.len();
        info!(
            "Found {} unique CSS classes in {} HTML files",
            metrics.unique_class_count, metrics.file_count
        );
        metrics
    }

    fn collect_classes(&self, content: &str, into: &mut HashSet<String>) {
        for caps in self.class_attr.captures_iter(content) {
            if let Some(value) = caps.get(1) {
                into.extend(value.as_str().split_whitespace().map(str::to_string));
            }
        }
    }
}

/// `project*` directories directly under `input_dir`, sorted by name
pub fn project_dirs(input_dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = match fs::read_dir(input_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| e.file_name().to_string_lossy().starts_with(PROJECT_PREFIX))
            .map(|e| e.path())
            .collect(),
        Err(_) => Vec::new(),
    };
    dirs.sort();
    dirs
}

fn html_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "html"))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_counts_unique_classes() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path();
        let a = r#"<div class="p-4 m-2"><span class="p-4  text-red"></span></div>"#;
        let b = r#"<p class="m-2 font-bold"></p><p class=""></p>"#;
        write(&input.join("project1/index.html"), a);
        write(&input.join("project2/page.html"), b);

        let metrics = InputAnalyzer::new().unwrap().analyze(input);
        assert_eq!(metrics.unique_class_count, 4);
        assert_eq!(metrics.file_count, 2);
        assert_eq!(metrics.total_input_size_bytes, (a.len() + b.len()) as u64);
    }

    #[test]
    fn test_only_direct_html_in_project_dirs() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path();
        write(&input.join("project1/index.html"), r#"<a class="x"></a>"#);
        write(&input.join("project1/nested/deep.html"), r#"<a class="nested"></a>"#);
        write(&input.join("project1/input.css"), r#"class="not-html""#);
        write(&input.join("assets/page.html"), r#"<a class="elsewhere"></a>"#);

        let metrics = InputAnalyzer::new().unwrap().analyze(input);
        assert_eq!(metrics.unique_class_count, 1);
        assert_eq!(metrics.file_count, 1);
    }

    #[test]
    fn test_missing_input_dir() {
        let tmp = TempDir::new().unwrap();
        let metrics = InputAnalyzer::new()
            .unwrap()
            .analyze(&tmp.path().join("missing"));
        assert_eq!(metrics, InputMetrics::default());
    }

    #[test]
    fn test_project_dirs_sorted() {
        let tmp = TempDir::new().unwrap();
        for name in ["project2", "project10", "project1", "other"] {
            fs::create_dir(tmp.path().join(name)).unwrap();
        }
        fs::write(tmp.path().join("project_file"), "").unwrap();

        let names: Vec<String> = project_dirs(tmp.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["project1", "project10", "project2"]);
    }
}
