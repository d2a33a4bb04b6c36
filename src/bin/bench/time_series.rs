// Per-Tick JSONL Time Series Recorder
// Outputs one JSON line per tick for independent analysis

use cluster_mesh_engine::{NetworkSimulation, TickResult};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub time_ms: u64,
    pub clusters: usize,
    pub gateways: usize,
    pub links: usize,
    pub in_flight: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub discovered: usize,
    pub expired: usize,
    pub routes_installed: usize,
    pub routes_refreshed: usize,
    pub routes_withdrawn: usize,
    pub converged: bool,
}

impl TickSnapshot {
    pub fn from_tick(result: &TickResult, sim: &NetworkSimulation, converged: bool) -> Self {
        let topology = sim.topology();
        Self {
            tick: result.tick,
            time_ms: result.time_ms,
            clusters: topology.cluster_count(),
            gateways: topology.gateways().count(),
            links: topology.link_count(),
            in_flight: sim.messages().filter(|m| !m.status.is_terminal()).count(),
            delivered: result.forwarding.delivered.len(),
            dropped: result.forwarding.dropped.len(),
            discovered: result.discovery.discovered,
            expired: result.discovery.expired,
            routes_installed: result.exchange.installed,
            routes_refreshed: result.exchange.refreshed,
            routes_withdrawn: result.exchange.withdrawn,
            converged,
        }
    }
}

/// Time series recorder that accumulates snapshots and writes JSONL
pub struct TimeSeriesRecorder {
    snapshots: Vec<TickSnapshot>,
}

impl TimeSeriesRecorder {
    pub fn new() -> Self {
        Self { snapshots: Vec::new() }
    }

    pub fn record(&mut self, result: &TickResult, sim: &NetworkSimulation, converged: bool) {
        self.snapshots.push(TickSnapshot::from_tick(result, sim, converged));
    }

    /// Write all snapshots to a JSONL file
    pub fn write_jsonl(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        for snapshot in &self.snapshots {
            let line = serde_json::to_string(snapshot)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}
