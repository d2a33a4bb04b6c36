// Benchmark Report Types
// Structured output for independent analysis of convergence and delivery

use serde::Serialize;
use std::collections::BTreeMap;

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }

    /// Skips runs where the metric never materialised.
    pub fn from_optional<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let present: Vec<f64> = samples.into_iter().flatten().collect();
        Self::from_samples(&present)
    }

    pub fn half_width(&self) -> f64 {
        (self.ci_upper - self.ci_lower) / 2.0
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub scenario: String,
    pub name: String,
    pub category: String,
    pub seed: u64,
    pub pass: bool,
    pub ticks: u64,
    pub clusters: usize,
    pub gateways: usize,
    pub links: usize,
    pub sent: u32,
    pub rejected_sends: u32,
    pub delivered: u32,
    pub dropped: u32,
    pub in_flight_at_end: usize,
    /// Delivered share of finished messages, in percent.
    pub delivery_rate: f64,
    pub mean_hops: f64,
    pub drops_by_reason: BTreeMap<String, u32>,
    pub convergence_tick: Option<u64>,
    pub reconvergence_ticks: Option<u64>,
    pub converged_at_end: bool,
    pub integrity_ok: bool,
    pub route_changes: usize,
    pub log_entries: u64,
    pub elapsed_ms: u128,
    pub throughput_per_sec: f64,
}

// ─── Monte Carlo Report (per-scenario aggregation) ──────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub scenario_name: String,
    pub label: String,
    pub category: String,
    pub n_runs: usize,
    pub pass_rate: f64,
    pub delivery_rate: Stats,
    pub mean_hops: Stats,
    pub convergence_tick: Stats,
    pub reconvergence_ticks: Stats,
    pub route_changes: Stats,
    pub elapsed_ms: Stats,
    pub throughput_per_sec: Stats,
    pub drops_by_reason: BTreeMap<String, u64>,
    pub individual_runs: Vec<BenchResult>,
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub n_runs_per_scenario: usize,
    pub summary: Summary,
    pub scenarios: Vec<MonteCarloReport>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}
