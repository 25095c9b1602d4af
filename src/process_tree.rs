// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Parent/child process tree built from one process-table scan
//!
//! # Examples
//!
//! ```no_run
//! use cssbench::probe::default_probe;
//! use cssbench::process_tree::ProcessTree;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let probe = default_probe();
//! let tree = ProcessTree::from_entries(probe.process_table()?);
//!
//! for pid in tree.descendants(std::process::id()) {
//!     println!("child: {}", pid);
//! }
//! # Ok(())
//! # }
//! ```

use crate::probe::ProcessEntry;
use std::collections::{HashMap, HashSet};

/// Snapshot of the parent → children relation
#[derive(Debug, Default, Clone)]
pub struct ProcessTree {
    /// Parent PID by PID
    parents: HashMap<u32, u32>,
    /// Direct child PIDs by parent PID
    children: HashMap<u32, Vec<u32>>,
}

impl ProcessTree {
    pub fn from_entries(entries: impl IntoIterator<Item = ProcessEntry>) -> Self {
        let mut parents = HashMap::new();
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();

        for entry in entries {
            parents.insert(entry.pid, entry.ppid);
            // Windows reports the idle process as its own parent
            if entry.pid != entry.ppid {
                children.entry(entry.ppid).or_default().push(entry.pid);
            }
        }

        for kids in children.values_mut() {
            kids.sort_unstable();
        }

        Self { parents, children }
    }

    /// Total number of processes
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether the tree is empty
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.parents.contains_key(&pid)
    }

    pub fn parent(&self, pid: u32) -> Option<u32> {
        self.parents.get(&pid).copied()
    }

    /// Direct children of a process
    pub fn children(&self, pid: u32) -> &[u32] {
        self.children.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get all descendants of a process (recursive, excluding `pid` itself).
    ///
    /// A PID recycled into its own ancestry would form a cycle; each PID is
    /// visited once.
    pub fn descendants(&self, pid: u32) -> Vec<u32> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([pid]);
        let mut stack = vec![pid];
        while let Some(current) = stack.pop() {
            for &child in self.children(current) {
                if seen.insert(child) {
                    result.push(child);
                    stack.push(child);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: u32, ppid: u32) -> ProcessEntry {
        ProcessEntry { pid, ppid }
    }

    #[test]
    fn test_descendants_recursive() {
        let tree = ProcessTree::from_entries(vec![
            entry(1, 0),
            entry(100, 1),
            entry(101, 100),
            entry(102, 100),
            entry(103, 101),
            entry(200, 1),
        ]);
        let mut desc = tree.descendants(100);
        desc.sort_unstable();
        assert_eq!(desc, vec![101, 102, 103]);
        assert!(tree.descendants(103).is_empty());
        assert_eq!(tree.parent(103), Some(101));
        assert_eq!(tree.children(100), &[101, 102]);
    }

    #[test]
    fn test_unknown_pid_has_no_descendants() {
        let tree = ProcessTree::from_entries(vec![entry(1, 0)]);
        assert!(tree.descendants(999).is_empty());
        assert!(!tree.contains(999));
    }

    #[test]
    fn test_cycle_terminates() {
        // Stale parent links from PID reuse can loop
        let tree = ProcessTree::from_entries(vec![entry(10, 11), entry(11, 10), entry(0, 0)]);
        assert_eq!(tree.descendants(10), vec![11]);
        assert!(tree.descendants(0).is_empty());
    }

    #[test]
    fn test_empty() {
        let tree = ProcessTree::default();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }
}
