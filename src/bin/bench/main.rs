// Cluster Mesh Benchmark Runner v0.1.0: convergence, delivery and failure recovery
// Monte Carlo (N=30), Poisson traffic, seedable PRNG, per-tick time series
//
// Usage:
//   cargo run --release --bin bench                     # Run all scenarios (30 runs each)
//   cargo run --release --bin bench -- --runs 5         # Quick mode (5 runs each)
//   cargo run --release --bin bench -- RING             # Filter by name
//   cargo run --release --bin bench -- --time-series    # Enable JSONL output
//   cargo run --release --bin bench -- --seed 42        # Custom base seed
//
// RUST_LOG=cluster_mesh_engine=debug narrates every tick.

mod report;
mod scenarios;
mod monte_carlo;
mod traffic;
mod time_series;

use report::*;
use scenarios::*;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    time_series: bool,
    filter: Option<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 30,
        seed: 0,
        time_series: false,
        filter: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(30);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--time-series" => {
                cli.time_series = true;
            }
            arg if !arg.starts_with('-') => {
                cli.filter = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

fn fmt_tick(stats: &Stats) -> String {
    if stats.n == 0 {
        "-".to_string()
    } else {
        format!("{:.1}", stats.mean)
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = parse_args();
    let all_scenarios = scenarios();

    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios.iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower)
                          || s.label.to_lowercase().contains(&f_lower)
                          || s.category.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", cli.filter);
        std::process::exit(1);
    }

    let ts_dir = if cli.time_series {
        let dir = std::path::Path::new("benchmark-results/time-series");
        Some(dir.to_path_buf())
    } else {
        None
    };

    println!("\n  Cluster Mesh Benchmark Runner v0.1.0");
    println!("  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {}", cli.runs, cli.seed);
    println!("  Running {} scenario(s)...\n", to_run.len());
    println!("  {:<44} {:>5} {:>11} {:>5} {:>6} {:>7} {:>7}",
        "Scenario", "Pass%", "Deliv%", "Hops", "Conv", "Reconv", "Time");
    println!("  {}", "-".repeat(92));

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        let report = match monte_carlo::run_monte_carlo(scenario, cli.runs, cli.seed, ts_dir.as_deref()) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("  {}: invalid configuration: {}", scenario.name, e);
                std::process::exit(2);
            }
        };

        let pass_pct = report.pass_rate * 100.0;
        let status = if pass_pct >= 93.3 { "PASS" } else { "FAIL" };

        println!("  {:<44} {:>4}% {:>6.1}±{:<3.1} {:>5.2} {:>6} {:>7} {:>5.0}ms  {}",
            report.label,
            pass_pct as u32,
            report.delivery_rate.mean, report.delivery_rate.half_width(),
            report.mean_hops.mean,
            fmt_tick(&report.convergence_tick),
            fmt_tick(&report.reconvergence_ticks),
            report.elapsed_ms.mean,
            status,
        );

        mc_reports.push(report);
    }

    let suite_elapsed = suite_start.elapsed();

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= 0.933).count();
    let failed = total - passed;

    println!("  {}", "-".repeat(92));
    println!("  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        total, passed, failed, suite_elapsed.as_secs_f64());

    let mut drops: std::collections::BTreeMap<&str, u64> = std::collections::BTreeMap::new();
    for (reason, count) in mc_reports.iter().flat_map(|r| r.drops_by_reason.iter()) {
        *drops.entry(reason.as_str()).or_default() += count;
    }
    if !drops.is_empty() {
        println!("  Drops by reason (all runs):");
        for (reason, count) in &drops {
            println!("    {:<24} {}", reason, count);
        }
        println!();
    }

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis());
    let timestamp = format!("{}", ts);

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: "0.1.0",
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
        },
        scenarios: mc_reports,
    };

    let dir = std::path::Path::new("benchmark-results");
    let path = dir.join(format!("bench-{}.json", timestamp));
    let written = std::fs::create_dir_all(dir)
        .and_then(|_| {
            serde_json::to_string_pretty(&report)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
        })
        .and_then(|json| std::fs::write(&path, json));
    match written {
        Ok(()) => println!("  Results saved to: {}\n", path.display()),
        Err(e) => eprintln!("  Failed to write {}: {}", path.display(), e),
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
