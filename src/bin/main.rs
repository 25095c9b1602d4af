// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! CLI for the CSS build benchmark (cssbench)

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use colored::Colorize;
#[cfg(feature = "cli")]
use cssbench::{
    metrics::MetricsSnapshot, BenchConfig, BenchmarkReport, BenchmarkResult, BenchmarkRunner,
    MonitorConfig, MonitorHandle, MonitorStatus, SystemInfo, ToolSpec,
};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "cssbench")]
#[command(about = "Benchmark CSS build tools with process-tree memory, CPU and I/O monitoring", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Run the configured build tools and report one result per tool
    Run {
        /// Configuration file (built-in defaults if not specified)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only run these tools (repeatable)
        #[arg(short, long)]
        tool: Vec<String>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (json or text)
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Benchmark a single ad-hoc command
    Exec {
        /// Directory holding the project* input directories
        #[arg(long, default_value = "input")]
        input_dir: PathBuf,

        /// Directory the command writes its CSS into
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Sampling interval in milliseconds
        #[arg(long, default_value = "10")]
        interval_ms: u64,

        /// Name recorded in the result
        #[arg(long, default_value = "command")]
        name: String,

        /// Output format (json or text)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Command and arguments
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Monitor an already running process tree until it exits
    Watch {
        /// Root process ID
        #[arg(short, long)]
        pid: u32,

        /// Stop after this many seconds even if the tree is still running
        #[arg(short, long)]
        duration: Option<f64>,

        /// Sampling interval in milliseconds
        #[arg(long, default_value = "10")]
        interval_ms: u64,

        /// Output format (json or text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print a sample configuration file
    Config,
}

#[cfg(feature = "cli")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match cli.command {
        Commands::Run {
            config,
            tool,
            output,
            format,
        } => {
            let config = match config {
                Some(path) => BenchConfig::from_toml_file(&path)?,
                None => BenchConfig::default(),
            };
            let runner = BenchmarkRunner::new(config)?;
            let system_info = collect_system_info();
            let outcomes = runner.run_all(&tool);

            let mut results = Vec::new();
            let mut failed = false;
            for (name, outcome) in outcomes {
                match outcome {
                    Ok(result) => {
                        failed |= !result.success;
                        status_line(&result);
                        results.push(result);
                    }
                    Err(e) => {
                        failed = true;
                        eprintln!("{} {}: {}", "[FAIL]".red().bold(), name, e);
                    }
                }
            }

            let report = BenchmarkReport::new(system_info, results);
            emit_report(&report, &format, output.as_ref())?;
            if failed {
                std::process::exit(1);
            }
        }

        Commands::Exec {
            input_dir,
            output_dir,
            interval_ms,
            name,
            format,
            command,
        } => {
            let tool = ToolSpec {
                name,
                command,
                output_dir,
                per_project: false,
            };
            let config = BenchConfig {
                input_dir,
                monitor: MonitorConfig {
                    interval_ms,
                    ..Default::default()
                },
                tools: vec![tool.clone()],
            };
            let runner = BenchmarkRunner::new(config)?;
            let system_info = collect_system_info();
            let result = runner.run_tool(&tool)?;
            status_line(&result);
            let success = result.success;
            emit_report(&BenchmarkReport::new(system_info, vec![result]), &format, None)?;
            if !success {
                std::process::exit(1);
            }
        }

        Commands::Watch {
            pid,
            duration,
            interval_ms,
            format,
        } => {
            let config = MonitorConfig {
                interval_ms,
                ..Default::default()
            };
            config.validate()?;
            let deadline = duration.map(Duration::from_secs_f64);

            eprintln!("{} watching process tree of {}", "[INFO]".cyan(), pid);
            let handle = MonitorHandle::start(pid, &config);
            let started = std::time::Instant::now();
            while !handle.is_finished() && deadline.map_or(true, |d| started.elapsed() < d) {
                std::thread::sleep(Duration::from_millis(50));
            }
            let stopped = handle.stop();

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(stopped.metrics())?);
            } else {
                print_snapshot(stopped.metrics(), started.elapsed());
            }
        }

        Commands::Config => {
            print!("{}", BenchConfig::sample_toml());
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn collect_system_info() -> SystemInfo {
    let info = SystemInfo::collect();
    eprintln!(
        "{} {} {} | {} | {:.1} GB",
        "[INFO]".cyan(),
        info.os.name,
        info.os.release,
        info.cpu.name,
        info.memory.total_gb
    );
    info
}

#[cfg(feature = "cli")]
fn emit_report(
    report: &BenchmarkReport,
    format: &str,
    output: Option<&PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rendered = if format == "json" {
        report.to_json_pretty()?
    } else {
        let info = &report.system_info;
        let mut text = format!(
            "{} {} ({}), {} x{} logical, {:.1} GB\n\n",
            info.os.name,
            info.os.release,
            info.timestamp,
            info.cpu.name,
            info.cpu.cores_logical,
            info.memory.total_gb
        );
        for result in &report.results {
            text.push_str(&render_result(result));
        }
        text
    };

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            eprintln!(
                "{} results written to {}",
                "[INFO]".cyan(),
                path.display()
            );
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn status_line(result: &BenchmarkResult) {
    let tag = if result.success {
        "[ OK ]".green().bold()
    } else {
        "[FAIL]".red().bold()
    };
    let mut line = format!(
        "{} {} in {:.3}s, peak {:.1} MB",
        tag,
        result.tool.white().bold(),
        result.throughput.build_time_seconds,
        result.process.memory.peak_mb()
    );
    if result.process.status != MonitorStatus::Complete {
        line.push_str(&format!(
            " ({})",
            result.process.status.to_string().yellow()
        ));
    }
    eprintln!("{}", line);
}

#[cfg(feature = "cli")]
fn render_result(result: &BenchmarkResult) -> String {
    let p = &result.process;
    let t = &result.throughput;
    let exit = result
        .exit_code
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    format!(
        "{}\n  exit: {}  time: {:.3}s\n  classes: {}  inputs: {} files  outputs: {} files ({:.1} KB)\n  memory: peak {:.2} MB, mean {:.2} MB, stddev {}\n  cpu: {:.3}s user, {:.3}s system\n  io: {:.2} MB read, {:.2} MB written{}\n  throughput: {:.1} classes/s, {:.1} classes/MB\n",
        result.tool,
        exit,
        t.build_time_seconds,
        result.input.unique_class_count,
        result.input.file_count,
        result.output.file_count,
        result.output.total_size_kb(),
        p.memory.peak_mb(),
        p.memory.mean_mb(),
        p.memory
            .std_dev_mb()
            .map_or_else(|| "n/a".to_string(), |s| format!("{:.2} MB", s)),
        p.cpu.user_seconds,
        p.cpu.system_seconds,
        p.io.read_mb(),
        p.io.write_mb(),
        if p.io.estimated { " (estimated)" } else { "" },
        t.classes_per_second,
        t.memory_efficiency,
    )
}

#[cfg(feature = "cli")]
fn print_snapshot(metrics: &MetricsSnapshot, elapsed: Duration) {
    println!("{}", "═══ Process Tree ═══".cyan().bold());
    println!(
        "  {} {} after {:.2}s ({} ticks, {} processes)",
        "Status:".white().bold(),
        metrics.status.to_string().green(),
        elapsed.as_secs_f64(),
        metrics.ticks,
        metrics.processes_seen
    );
    println!(
        "  {} peak {:.2} MB, mean {:.2} MB over {} samples ({:?})",
        "Memory:".white().bold(),
        metrics.memory.peak_mb(),
        metrics.memory.mean_mb(),
        metrics.memory.sample_count,
        metrics.memory.source
    );
    println!(
        "  {} {:.3}s user, {:.3}s system",
        "CPU:".white().bold(),
        metrics.cpu.user_seconds,
        metrics.cpu.system_seconds
    );
    println!(
        "  {} {:.2} MB read, {:.2} MB written",
        "I/O:".white().bold(),
        metrics.io.read_mb(),
        metrics.io.write_mb()
    );
    if metrics.clamped_deltas > 0 {
        println!(
            "  {} {} counter readings went backwards",
            "Note:".yellow(),
            metrics.clamped_deltas
        );
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
