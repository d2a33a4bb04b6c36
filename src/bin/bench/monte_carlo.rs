// Monte Carlo Infrastructure: N runs per scenario with statistical aggregation
// Each scenario runs N times with seeds base..base+N, computing mean ± 95% CI

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use cluster_mesh_engine::routing::is_converged;
use cluster_mesh_engine::*;
use std::collections::BTreeMap;

use crate::report::*;
use crate::scenarios::{self, Scenario};
use crate::time_series::TimeSeriesRecorder;
use crate::traffic::{live_endpoints, TrafficGenerator};

use std::time::Instant;

/// Keeps forwarding and workload streams independent for one seed.
const TRAFFIC_STREAM: u64 = 0x7261_6666_6963;

/// Run a single scenario iteration with a specific seed.
pub fn run_single(
    scenario: &Scenario,
    seed: u64,
    time_series_dir: Option<&std::path::Path>,
) -> Result<BenchResult, ConfigError> {
    let start = Instant::now();
    let config = SimConfig {
        rng_seed: seed,
        route_cost_ceiling: scenario.route_cost_ceiling,
        // Bench never reads old entries back
        log_capacity: Some(1024),
        ..SimConfig::default()
    };
    let mut sim = NetworkSimulation::with_config(config)?;
    let layout = scenarios::build(&mut sim, scenario);
    let (clusters, gateways, links) =
        (layout.clusters.len(), layout.gateway_count(), layout.links.len());

    let mut traffic = TrafficGenerator::new(ChaCha8Rng::seed_from_u64(seed ^ TRAFFIC_STREAM));
    let mut time_series = time_series_dir.map(|_| TimeSeriesRecorder::new());

    let mut sent: u32 = 0;
    let mut rejected_sends: u32 = 0;
    let mut delivered: u32 = 0;
    let mut total_hops: u64 = 0;
    let mut drops_by_reason: BTreeMap<String, u32> = BTreeMap::new();
    let mut route_changes = 0;
    let mut convergence_tick: Option<u64> = None;
    let mut event_tick: Option<u64> = None;
    let mut reconvergence_ticks: Option<u64> = None;
    let mut integrity_ok = true;

    for tick in 1..=scenario.ticks {
        // Mid-scenario failure
        if let Some(event) = scenario.event.filter(|e| e.tick() == tick) {
            let applied = event.apply(&mut sim, &layout);
            tracing::info!(scenario = scenario.name, seed, tick, applied, "failure injected: {:?}", event);
            event_tick = Some(tick);
            integrity_ok &= sim.topology().integrity_violations().is_empty();
        }

        if tick > scenario.warmup_ticks {
            let endpoints = live_endpoints(&sim);
            for request in traffic.generate_tick(&endpoints, scenario.traffic) {
                match sim.send(request) {
                    Ok(_) => sent += 1,
                    Err(_) => rejected_sends += 1,
                }
            }
        }

        let result = sim.tick_core();
        route_changes += result.exchange.changes();
        for id in &result.forwarding.delivered {
            delivered += 1;
            total_hops += sim.message(*id).map_or(0, |m| m.hops as u64);
        }
        for (_, reason) in &result.forwarding.dropped {
            *drops_by_reason.entry(reason.to_string()).or_default() += 1;
        }

        let converged = is_converged(sim.topology());
        if converged && convergence_tick.is_none() {
            convergence_tick = Some(tick);
        }
        if let (Some(at), None, true) = (event_tick, reconvergence_ticks, converged) {
            reconvergence_ticks = Some(tick - at);
        }

        if let Some(ts) = time_series.as_mut() {
            ts.record(&result, &sim, converged);
        }
    }
    integrity_ok &= sim.topology().integrity_violations().is_empty();

    // Write time series if enabled
    if let (Some(ts), Some(dir)) = (&time_series, time_series_dir) {
        let path = dir.join(format!("seed-{}.jsonl", seed));
        if let Err(e) = ts.write_jsonl(&path) {
            eprintln!("  Warning: failed to write time series: {}", e);
        }
    }

    let elapsed = start.elapsed();
    let elapsed_secs = elapsed.as_secs_f64().max(0.001);

    let dropped: u32 = drops_by_reason.values().sum();
    let finished = delivered + dropped;
    let delivery_rate = if finished > 0 { delivered as f64 / finished as f64 * 100.0 } else { 0.0 };
    let mean_hops = if delivered > 0 { total_hops as f64 / delivered as f64 } else { 0.0 };
    let converged_at_end = is_converged(sim.topology());

    // Evaluate pass/fail
    let criteria = &scenario.criteria;
    let mut pass = true;
    if criteria.require_integrity && !integrity_ok {
        pass = false;
    }
    if criteria.require_converged_at_end && !converged_at_end {
        pass = false;
    }
    if let Some(max_tick) = criteria.max_convergence_tick {
        if convergence_tick.map_or(true, |t| t > max_tick) {
            pass = false;
        }
    }
    if let Some(max_ticks) = criteria.max_reconvergence_ticks {
        if event_tick.is_some() && reconvergence_ticks.map_or(true, |t| t > max_ticks) {
            pass = false;
        }
    }
    if let Some(min_rate) = criteria.min_delivery_rate {
        if finished > 0 && delivery_rate < min_rate {
            pass = false;
        }
    }

    Ok(BenchResult {
        scenario: scenario.label.to_string(),
        name: scenario.name.to_string(),
        category: scenario.category.to_string(),
        seed,
        pass,
        ticks: scenario.ticks,
        clusters,
        gateways,
        links,
        sent,
        rejected_sends,
        delivered,
        dropped,
        in_flight_at_end: sim.messages().filter(|m| !m.status.is_terminal()).count(),
        delivery_rate,
        mean_hops,
        drops_by_reason,
        convergence_tick,
        reconvergence_ticks,
        converged_at_end,
        integrity_ok,
        route_changes,
        log_entries: sim.log().next_seq(),
        elapsed_ms: elapsed.as_millis(),
        throughput_per_sec: scenario.ticks as f64 / elapsed_secs,
    })
}

/// Run Monte Carlo: N runs of a scenario, aggregate stats.
pub fn run_monte_carlo(
    scenario: &Scenario,
    n_runs: usize,
    base_seed: u64,
    time_series_base: Option<&std::path::Path>,
) -> Result<MonteCarloReport, ConfigError> {
    let ts_dir = time_series_base.map(|base| base.join(scenario.name.to_lowercase()));

    let mut results = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        let seed = base_seed + i as u64;
        results.push(run_single(scenario, seed, ts_dir.as_deref())?);
    }

    Ok(aggregate(scenario, results))
}

/// Aggregate individual runs into a MonteCarloReport.
fn aggregate(scenario: &Scenario, results: Vec<BenchResult>) -> MonteCarloReport {
    let n = results.len();
    let passed = results.iter().filter(|r| r.pass).count();
    let pass_rate = if n > 0 { passed as f64 / n as f64 } else { 0.0 };

    let metric = |f: fn(&BenchResult) -> f64| {
        Stats::from_samples(&results.iter().map(f).collect::<Vec<_>>())
    };

    let mut drops_by_reason: BTreeMap<String, u64> = BTreeMap::new();
    for (reason, count) in results.iter().flat_map(|r| r.drops_by_reason.iter()) {
        *drops_by_reason.entry(reason.clone()).or_default() += *count as u64;
    }

    MonteCarloReport {
        scenario_name: scenario.name.to_string(),
        label: scenario.label.to_string(),
        category: scenario.category.to_string(),
        n_runs: n,
        pass_rate,
        delivery_rate: metric(|r| r.delivery_rate),
        mean_hops: metric(|r| r.mean_hops),
        convergence_tick: Stats::from_optional(
            results.iter().map(|r| r.convergence_tick.map(|t| t as f64)),
        ),
        reconvergence_ticks: Stats::from_optional(
            results.iter().map(|r| r.reconvergence_ticks.map(|t| t as f64)),
        ),
        route_changes: metric(|r| r.route_changes as f64),
        elapsed_ms: metric(|r| r.elapsed_ms as f64),
        throughput_per_sec: metric(|r| r.throughput_per_sec),
        drops_by_reason,
        individual_runs: results,
    }
}
