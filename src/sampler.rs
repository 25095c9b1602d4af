// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Background sampling of a process tree
//!
//! [`MonitorHandle::start`] registers the root process and moves all
//! sampling state into a dedicated thread. That thread is the only writer:
//! on every tick it refreshes the tracked set, sums memory across it and
//! folds CPU and I/O deltas into the running totals. After every completed
//! tick it publishes a copy of its report, which is what a caller gets if
//! the thread later hangs or panics. When asked to stop (or when the whole
//! tree has exited) it takes one final reading and sends its state back over
//! a channel, so the caller never observes a half-updated tick.
//!
//! # Examples
//!
//! ```no_run
//! use cssbench::config::MonitorConfig;
//! use cssbench::sampler::MonitorHandle;
//! use std::process::Command;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut child = Command::new("sleep").arg("1").spawn()?;
//! let monitor = MonitorHandle::start(child.id(), &MonitorConfig::default());
//! child.wait()?;
//! let stopped = monitor.stop();
//! println!("peak: {:.2} MB", stopped.metrics().memory.peak_mb());
//! # Ok(())
//! # }
//! ```

use crate::accumulator::DeltaAccumulator;
use crate::config::MonitorConfig;
use crate::metrics::{MemorySource, MetricsSnapshot, MonitorStatus};
use crate::probe::{default_probe, ProcessProbe};
use crate::tracker::ProcessSet;
use log::{debug, error, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sampling state owned by the sampler thread
pub struct Sampler {
    probe: Box<dyn ProcessProbe>,
    config: MonitorConfig,
    tracker: ProcessSet,
    accumulator: DeltaAccumulator,
    samples: Vec<u64>,
    source: MemorySource,
    ticks: u64,
    root_found: bool,
    latest: Option<Arc<Mutex<Option<SamplerReport>>>>,
}

/// What the sampler thread hands back when it finishes
#[derive(Debug, Clone)]
pub struct SamplerReport {
    pub snapshot: MetricsSnapshot,
    pub samples: Vec<u64>,
}

impl Sampler {
    /// Register `root_pid` and take its baseline
    pub fn new(root_pid: u32, probe: Box<dyn ProcessProbe>, config: MonitorConfig) -> Self {
        let mut tracker = ProcessSet::new(root_pid);
        let mut accumulator = DeltaAccumulator::new();
        let root_found = tracker.track_root(probe.as_ref(), &mut accumulator);
        Self {
            probe,
            config,
            tracker,
            accumulator,
            samples: Vec::new(),
            source: MemorySource::None,
            ticks: 0,
            root_found,
            latest: None,
        }
    }

    /// Publish a report into `latest` after every completed tick
    pub fn publish_to(mut self, latest: Arc<Mutex<Option<SamplerReport>>>) -> Self {
        self.latest = Some(latest);
        self
    }

    pub fn root_found(&self) -> bool {
        self.root_found
    }

    /// Whether every tracked process has exited
    pub fn is_idle(&self) -> bool {
        self.tracker.is_empty()
    }

    /// One sampling iteration
    pub fn tick(&mut self) {
        let summary = self.tracker.refresh(self.probe.as_ref(), &mut self.accumulator);
        if summary != Default::default() {
            trace!(
                "tick {}: +{} discovered, {} exited, {} recycled",
                self.ticks,
                summary.discovered,
                summary.exited,
                summary.recycled
            );
        }

        let mut total = 0u64;
        let mut vanished = Vec::new();
        for pid in self.tracker.pids() {
            match self.probe.memory(pid, self.config.memory_metric) {
                Ok(reading) => {
                    total += reading.bytes;
                    self.source.record(reading.metric);
                }
                Err(e) if e.is_vanished() => {
                    vanished.push(pid);
                    continue;
                }
                Err(e) if e.is_transient() => trace!("pid {}: memory unavailable: {}", pid, e),
                Err(e) => debug!("pid {}: memory read failed: {}", pid, e),
            }

            let cpu = match self.probe.cpu_times(pid) {
                Ok(cpu) => Some(cpu),
                Err(e) if e.is_vanished() => {
                    vanished.push(pid);
                    continue;
                }
                Err(e) => {
                    if e.is_transient() {
                        trace!("pid {}: cpu times unavailable: {}", pid, e);
                    } else {
                        debug!("pid {}: cpu times read failed: {}", pid, e);
                    }
                    None
                }
            };
            let io = self.probe.io_counters(pid);
            if let Some(process) = self.tracker.get_mut(pid) {
                self.accumulator.accumulate(process, cpu, io);
            }
        }

        for pid in vanished {
            self.tracker.remove(pid);
            trace!("pid {} vanished mid-tick", pid);
        }

        // A tick where nothing was readable says nothing about memory use
        if total > 0 {
            self.samples.push(total);
            self.accumulator.observe_memory(total);
        }
        self.ticks += 1;
    }

    /// Last CPU and I/O reading of everything still tracked
    pub fn final_reading(&mut self) {
        for pid in self.tracker.pids() {
            let Some(current) = self.probe.identity(pid) else {
                continue;
            };
            let cpu = self.probe.cpu_times(pid).ok();
            let io = self.probe.io_counters(pid);
            if let Some(process) = self.tracker.get_mut(pid) {
                if current.same_process(&process.identity) {
                    self.accumulator.accumulate(process, cpu, io);
                }
            }
        }
    }

    /// Sample until `stop` is set or the tree has exited.
    ///
    /// At least one tick runs even if `stop` is already set.
    pub fn run(mut self, stop: &AtomicBool) -> SamplerReport {
        let interval = self.config.interval();
        let mut next_tick = Instant::now();

        loop {
            self.tick();
            if self.is_idle() {
                debug!(
                    "process tree of {} exited after {} ticks",
                    self.tracker.root_pid(),
                    self.ticks
                );
                break;
            }
            self.publish();
            if stop.load(Ordering::Acquire) {
                break;
            }

            next_tick += interval;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                // Fell behind; resume the cadence from now instead of bursting
                next_tick = now;
            }
        }

        self.final_reading();
        self.into_report()
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let status = if self.root_found {
            MonitorStatus::Complete
        } else {
            MonitorStatus::RootNotFound
        };
        MetricsSnapshot::from_totals(
            status,
            self.accumulator.totals(),
            &self.samples,
            self.source,
            self.ticks,
            self.tracker.processes_seen(),
        )
    }

    fn publish(&self) {
        let Some(latest) = &self.latest else {
            return;
        };
        let report = SamplerReport {
            snapshot: self.snapshot(),
            samples: self.samples.clone(),
        };
        *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
    }

    pub fn into_report(self) -> SamplerReport {
        SamplerReport {
            snapshot: self.snapshot(),
            samples: self.samples,
        }
    }
}

/// Result of a stopped monitoring session
#[derive(Debug, Clone)]
pub struct StoppedMonitor {
    pid: u32,
    snapshot: MetricsSnapshot,
    samples: Vec<u64>,
}

impl StoppedMonitor {
    fn unavailable(pid: u32, status: MonitorStatus) -> Self {
        Self {
            pid,
            snapshot: MetricsSnapshot::empty(status),
            samples: Vec::new(),
        }
    }

    /// Last published report with `status`, or zeros if none was published
    fn partial(pid: u32, latest: Option<SamplerReport>, status: MonitorStatus) -> Self {
        match latest {
            Some(mut report) => {
                report.snapshot.status = status;
                Self {
                    pid,
                    snapshot: report.snapshot,
                    samples: report.samples,
                }
            }
            None => Self::unavailable(pid, status),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn metrics(&self) -> &MetricsSnapshot {
        &self.snapshot
    }

    /// Per-tick memory totals in bytes
    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    pub fn into_metrics(self) -> MetricsSnapshot {
        self.snapshot
    }
}

/// Running monitoring session
pub struct MonitorHandle {
    pid: u32,
    stop: Arc<AtomicBool>,
    receiver: mpsc::Receiver<SamplerReport>,
    latest: Arc<Mutex<Option<SamplerReport>>>,
    thread: Option<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl MonitorHandle {
    /// Start sampling `pid` and its descendants with the host platform probe
    pub fn start(pid: u32, config: &MonitorConfig) -> Self {
        Self::start_with_probe(pid, config, default_probe())
    }

    pub fn start_with_probe(
        pid: u32,
        config: &MonitorConfig,
        probe: Box<dyn ProcessProbe>,
    ) -> Self {
        let platform = probe.platform();
        let latest = Arc::new(Mutex::new(None));
        let sampler = Sampler::new(pid, probe, config.clone()).publish_to(Arc::clone(&latest));
        if sampler.root_found() {
            debug!(
                "monitoring pid {} every {:?} ({} probe)",
                pid,
                config.interval(),
                platform
            );
        } else {
            warn!("process {} is not observable, metrics will be empty", pid);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel();
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name(format!("sampler-{}", pid))
            .spawn(move || {
                let report = sampler.run(&stop_flag);
                // The handle may already have given up waiting
                let _ = sender.send(report);
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("failed to spawn sampler thread for {}: {}", pid, e);
                None
            }
        };

        Self {
            pid,
            stop,
            receiver,
            latest,
            thread,
            stop_timeout: config.stop_timeout(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the sampler has already finished on its own
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the sampler and wait, at most the stop timeout, for its state.
    ///
    /// Never fails. A sampler that cannot be collected yields the report of
    /// its last completed tick (all zeros if there was none), with a status
    /// that says why.
    pub fn stop(mut self) -> StoppedMonitor {
        self.stop.store(true, Ordering::Release);

        match self.receiver.recv_timeout(self.stop_timeout) {
            Ok(report) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                StoppedMonitor {
                    pid: self.pid,
                    snapshot: report.snapshot,
                    samples: report.samples,
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // Dropping the JoinHandle detaches the thread
                self.thread.take();
                warn!(
                    "sampler for {} did not stop within {:?}, abandoning it",
                    self.pid, self.stop_timeout
                );
                StoppedMonitor::partial(self.pid, self.take_latest(), MonitorStatus::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    if let Err(payload) = thread.join() {
                        error!(
                            "sampler for {} panicked: {}",
                            self.pid,
                            panic_message(payload.as_ref())
                        );
                    }
                }
                StoppedMonitor::partial(self.pid, self.take_latest(), MonitorStatus::Failed)
            }
        }
    }

    fn take_latest(&self) -> Option<SamplerReport> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Start monitoring `pid` and its descendants
pub fn start_monitoring(pid: u32, config: &MonitorConfig) -> MonitorHandle {
    MonitorHandle::start(pid, config)
}

/// Stop a session and collect what it measured
pub fn stop_monitoring(handle: MonitorHandle) -> StoppedMonitor {
    handle.stop()
}

/// Metrics of a stopped session
pub fn get_metrics(stopped: &StoppedMonitor) -> MetricsSnapshot {
    stopped.metrics().clone()
}
