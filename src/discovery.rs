// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Gateway Discovery
//
// Every tick each gateway re-announces itself to the standard nodes of its
// cluster; the announcement itself is the liveness signal. Entries not
// refreshed within the expiry window are forgotten.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::SimTime;
use crate::event_log::{EventLog, LogCategory};
use crate::topology::Topology;
use crate::types::{ClusterId, DiscoveryReport};

// ---------------------------------------------------------------------------
// LocalGatewayTable
// ---------------------------------------------------------------------------

/// Gateway name -> simulated time (ms) it was last heard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalGatewayTable(BTreeMap<String, u64>);

impl LocalGatewayTable {
    pub fn last_heard(&self, gateway: &str) -> Option<u64> {
        self.0.get(gateway).copied()
    }

    pub fn contains(&self, gateway: &str) -> bool {
        self.0.contains_key(gateway)
    }

    /// Known gateway names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record an announcement. Returns true on first contact.
    pub fn hear(&mut self, gateway: &str, at_ms: u64) -> bool {
        self.0.insert(gateway.to_string(), at_ms).is_none()
    }

    /// Remove a gateway outright. Returns true if it was known.
    pub fn forget(&mut self, gateway: &str) -> bool {
        self.0.remove(gateway).is_some()
    }

    /// Drop entries silent for longer than `window_ms`; return their names.
    pub fn expire(&mut self, now_ms: u64, window_ms: u64) -> Vec<String> {
        let stale: Vec<String> = self
            .0
            .iter()
            .filter(|(_, &heard)| now_ms.saturating_sub(heard) > window_ms)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &stale {
            self.0.remove(name);
        }
        stale
    }
}

// ---------------------------------------------------------------------------
// Discovery pass
// ---------------------------------------------------------------------------

/// Announce every gateway to its cluster, then expire silent entries.
pub fn run_discovery(
    topology: &mut Topology,
    now: SimTime,
    expiry_window_ms: u64,
    log: &mut EventLog,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();
    let announcers: Vec<(ClusterId, String)> =
        topology.gateways().map(|g| (g.cluster, g.name.clone())).collect();

    for node in topology.nodes_mut() {
        let cluster = node.cluster;
        let label = node.label();
        let Some(table) = node.local_gateways_mut() else {
            continue;
        };

        for (_, gateway) in announcers.iter().filter(|(c, _)| *c == cluster) {
            report.announcements += 1;
            if table.hear(gateway, now.time_ms) {
                report.discovered += 1;
                log.record(
                    now,
                    LogCategory::Discovery,
                    format!("{label} discovered gateway {gateway}"),
                );
            }
        }

        for gateway in table.expire(now.time_ms, expiry_window_ms) {
            report.expired += 1;
            log.record(
                now,
                LogCategory::Discovery,
                format!("{label} expired gateway {gateway}: silent for over {expiry_window_ms}ms"),
            );
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
