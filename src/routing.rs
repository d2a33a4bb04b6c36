// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Inter-Cluster Routing (distance vector)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::clock::SimTime;
use crate::event_log::{EventLog, LogCategory};
use crate::topology::Topology;
use crate::types::{ClusterId, ExchangeReport, GatewayLink, NodeId};

// ---------------------------------------------------------------------------
// Route / RoutingTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: ClusterId,
    /// Peers are addressed by (name, cluster), not by node id.
    pub next_hop: String,
    pub next_hop_cluster: ClusterId,
    pub cost: u32,
}

impl Route {
    pub fn via(&self, name: &str, cluster: ClusterId) -> bool {
        self.next_hop_cluster == cluster && self.next_hop == name
    }
}

/// Destination cluster -> best known route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable(BTreeMap<ClusterId, Route>);

impl RoutingTable {
    /// Table holding only the zero-cost route to the gateway's own cluster.
    pub fn seeded(cluster: ClusterId, name: &str) -> Self {
        let mut table = Self::default();
        table.insert(Route {
            destination: cluster,
            next_hop: name.to_string(),
            next_hop_cluster: cluster,
            cost: 0,
        });
        table
    }

    pub fn get(&self, destination: ClusterId) -> Option<&Route> {
        self.0.get(&destination)
    }

    pub fn contains(&self, destination: ClusterId) -> bool {
        self.0.contains_key(&destination)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, route: Route) -> Option<Route> {
        self.0.insert(route.destination, route)
    }

    pub fn remove(&mut self, destination: ClusterId) -> Option<Route> {
        self.0.remove(&destination)
    }

    /// Keep routes matching `keep`; return the ones removed.
    pub fn retain_routes<F>(&mut self, mut keep: F) -> Vec<Route>
    where
        F: FnMut(&Route) -> bool,
    {
        let doomed: Vec<ClusterId> =
            self.0.values().filter(|r| !keep(r)).map(|r| r.destination).collect();
        doomed.into_iter().filter_map(|d| self.0.remove(&d)).collect()
    }
}

// ---------------------------------------------------------------------------
// Exchange pass
// ---------------------------------------------------------------------------

/// Run one distance-vector exchange over every gateway link, both
/// directions, in link order.
pub fn run_exchange(
    topology: &mut Topology,
    now: SimTime,
    cost_ceiling: Option<u32>,
    log: &mut EventLog,
) -> ExchangeReport {
    let mut report = ExchangeReport::default();
    let links: Vec<GatewayLink> = topology.links().copied().collect();
    for link in links {
        propagate(topology, link.a, link.b, now, cost_ceiling, log, &mut report);
        propagate(topology, link.b, link.a, now, cost_ceiling, log, &mut report);
    }
    report
}

/// Offer `sender`'s table to `receiver`.
///
/// Install on a strictly better cost, refresh on any cost change from the
/// current next hop, and withdraw routes through `sender` for destinations
/// it no longer advertises. The refresh rule is what lets degradations
/// propagate; it also permits count-to-infinity once a destination becomes
/// unreachable, unless `cost_ceiling` is set.
fn propagate(
    topology: &mut Topology,
    sender: NodeId,
    receiver: NodeId,
    now: SimTime,
    cost_ceiling: Option<u32>,
    log: &mut EventLog,
    report: &mut ExchangeReport,
) {
    let Some(from) = topology.node(sender) else {
        return;
    };
    // Snapshot: the receiver never sees a half-updated sender table.
    let Some(advertised) = from.routing_table().cloned() else {
        return;
    };
    let (hop_name, hop_cluster, hop_label) = (from.name.clone(), from.cluster, from.label());

    let Some(to) = topology.node_mut(receiver) else {
        return;
    };
    let own_cluster = to.cluster;
    let label = to.label();
    let Some(table) = to.routing_table_mut() else {
        return;
    };
    report.exchanges += 1;

    for offered in advertised.routes() {
        // Split horizon: never learn a path back into our own cluster.
        if offered.destination == own_cluster {
            continue;
        }
        let candidate = Route {
            destination: offered.destination,
            next_hop: hop_name.clone(),
            next_hop_cluster: hop_cluster,
            cost: offered.cost.saturating_add(1),
        };
        let unreachable = cost_ceiling.is_some_and(|max| candidate.cost > max);

        match table.get(candidate.destination) {
            None if unreachable => {}
            None => {
                log.record(
                    now,
                    LogCategory::Routing,
                    format!(
                        "{label} installed route to {} via {hop_label} (cost {})",
                        candidate.destination, candidate.cost
                    ),
                );
                table.insert(candidate);
                report.installed += 1;
            }
            Some(existing) if unreachable => {
                if existing.via(&hop_name, hop_cluster) {
                    let old = existing.cost;
                    table.remove(candidate.destination);
                    report.withdrawn += 1;
                    log.record(
                        now,
                        LogCategory::Routing,
                        format!(
                            "{label} withdrew route to {} (cost {old}): {hop_label} now offers {}, past the ceiling",
                            candidate.destination, candidate.cost
                        ),
                    );
                }
            }
            Some(existing) if candidate.cost < existing.cost => {
                log.record(
                    now,
                    LogCategory::Routing,
                    format!(
                        "{label} installed route to {} via {hop_label} (cost {} -> {})",
                        candidate.destination, existing.cost, candidate.cost
                    ),
                );
                table.insert(candidate);
                report.installed += 1;
            }
            Some(existing)
                if existing.via(&hop_name, hop_cluster) && existing.cost != candidate.cost =>
            {
                log.record(
                    now,
                    LogCategory::Routing,
                    format!(
                        "{label} refreshed route to {} via {hop_label} (cost {} -> {})",
                        candidate.destination, existing.cost, candidate.cost
                    ),
                );
                table.insert(candidate);
                report.refreshed += 1;
            }
            Some(_) => {}
        }
    }

    let withdrawn = table.retain_routes(|r| {
        !(r.via(&hop_name, hop_cluster) && !advertised.contains(r.destination))
    });
    for route in withdrawn {
        report.withdrawn += 1;
        log.record(
            now,
            LogCategory::Routing,
            format!(
                "{label} withdrew route to {} (cost {}): no longer advertised by {hop_label}",
                route.destination, route.cost
            ),
        );
    }
}

// ---------------------------------------------------------------------------
// Convergence analysis
// ---------------------------------------------------------------------------

/// Hop count from gateway `from` to the nearest gateway of every cluster it
/// can reach over gateway links. This is the fixpoint the exchange should
/// settle on for a stable topology.
pub fn shortest_costs(topology: &Topology, from: NodeId) -> BTreeMap<ClusterId, u32> {
    let mut costs = BTreeMap::new();
    let Some(origin) = topology.node(from).filter(|n| n.is_gateway()) else {
        return costs;
    };

    let mut seen: BTreeMap<NodeId, u32> = BTreeMap::new();
    let mut queue = VecDeque::new();
    seen.insert(origin.id, 0);
    queue.push_back(origin.id);

    while let Some(current) = queue.pop_front() {
        let dist = seen.get(&current).copied().unwrap_or(0);
        if let Some(node) = topology.node(current) {
            let best = costs.entry(node.cluster).or_insert(dist);
            *best = (*best).min(dist);
        }
        for next in topology.neighbors(current) {
            if !seen.contains_key(&next) {
                seen.insert(next, dist + 1);
                queue.push_back(next);
            }
        }
    }
    // A gateway always reaches its own cluster at zero cost.
    costs.insert(origin.cluster, 0);
    costs
}

/// True when every gateway's table holds exactly the shortest-path costs.
pub fn is_converged(topology: &Topology) -> bool {
    topology.gateways().all(|g| {
        let expected = shortest_costs(topology, g.id);
        g.routing_table().is_some_and(|table| {
            table.len() == expected.len()
                && expected
                    .iter()
                    .all(|(dest, cost)| table.get(*dest).is_some_and(|r| r.cost == *cost))
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
