// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Topology Store
//
// Authoritative store for clusters, nodes and gateway links. Every mutation
// is a transaction: it validates, applies, cascades, and leaves the store
// with no dangling link, routing-table or local-gateway reference.

use std::collections::BTreeMap;

use crate::clock::SimTime;
use crate::error::CommandError;
use crate::event_log::{EventLog, LogCategory};
use crate::routing::Route;
use crate::types::{Cluster, ClusterId, GatewayLink, LinkId, NodeId, SimNode};

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Topology {
    clusters: BTreeMap<ClusterId, Cluster>,
    nodes: BTreeMap<NodeId, SimNode>,
    links: BTreeMap<LinkId, GatewayLink>,
    last_cluster_id: u32,
    last_node_id: u32,
    last_link_id: u32,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(&id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut SimNode> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SimNode> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut SimNode> {
        self.nodes.values_mut()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes_in(&self, cluster: ClusterId) -> impl Iterator<Item = &SimNode> {
        self.nodes.values().filter(move |n| n.cluster == cluster)
    }

    pub fn gateways(&self) -> impl Iterator<Item = &SimNode> {
        self.nodes.values().filter(|n| n.is_gateway())
    }

    /// Resolve a peer the way forwarding does: by name within a cluster.
    pub fn find_node(&self, cluster: ClusterId, name: &str) -> Option<&SimNode> {
        self.nodes.values().find(|n| n.cluster == cluster && n.name == name)
    }

    pub fn link(&self, id: LinkId) -> Option<&GatewayLink> {
        self.links.get(&id)
    }

    pub fn links(&self) -> impl Iterator<Item = &GatewayLink> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_linked(&self, a: NodeId, b: NodeId) -> bool {
        self.links.values().any(|l| l.joins(a, b))
    }

    /// Gateways directly linked to `node`, in link order.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.links
            .values()
            .filter_map(|l| {
                if l.a == node {
                    Some(l.b)
                } else if l.b == node {
                    Some(l.a)
                } else {
                    None
                }
            })
            .collect()
    }

    fn node_label(&self, id: NodeId) -> String {
        self.nodes.get(&id).map_or_else(|| id.to_string(), |n| n.label())
    }

    fn link_label(&self, link: &GatewayLink) -> String {
        format!("{} ({} <-> {})", link.id, self.node_label(link.a), self.node_label(link.b))
    }

    // ─── Commands ────────────────────────────────────────────────────────

    pub fn add_cluster(
        &mut self,
        name: &str,
        log: &mut EventLog,
        now: SimTime,
    ) -> Result<ClusterId, CommandError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::EmptyName);
        }
        self.last_cluster_id += 1;
        let id = ClusterId(self.last_cluster_id);
        self.clusters.insert(id, Cluster { id, name: name.to_string() });
        log.record(now, LogCategory::Topology, format!("cluster {id} ({name}) created"));
        Ok(id)
    }

    /// Removes the cluster, its member nodes, their links, and every route
    /// that points into or through the cluster.
    pub fn remove_cluster(
        &mut self,
        id: ClusterId,
        log: &mut EventLog,
        now: SimTime,
    ) -> Result<(), CommandError> {
        let cluster = self.clusters.get(&id).cloned().ok_or(CommandError::UnknownCluster(id))?;

        let members: Vec<NodeId> = self.nodes_in(id).map(|n| n.id).collect();
        for node in members {
            self.detach_node(node, log, now);
        }
        self.clusters.remove(&id);

        self.purge_routes(
            |r| r.destination == id || r.next_hop_cluster == id,
            &format!("cluster {id} removed"),
            log,
            now,
        );
        log.record(
            now,
            LogCategory::Topology,
            format!("cluster {id} ({}) removed", cluster.name),
        );
        Ok(())
    }

    pub fn add_node(
        &mut self,
        cluster: ClusterId,
        name: &str,
        is_gateway: bool,
        log: &mut EventLog,
        now: SimTime,
    ) -> Result<NodeId, CommandError> {
        if !self.clusters.contains_key(&cluster) {
            return Err(CommandError::UnknownCluster(cluster));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::EmptyName);
        }
        if self.find_node(cluster, name).is_some() {
            return Err(CommandError::DuplicateNodeName { cluster, name: name.to_string() });
        }

        self.last_node_id += 1;
        let id = NodeId(self.last_node_id);
        let node = if is_gateway {
            SimNode::gateway(id, name.to_string(), cluster)
        } else {
            SimNode::standard(id, name.to_string(), cluster)
        };
        let kind = if is_gateway { "gateway" } else { "node" };
        log.record(now, LogCategory::Topology, format!("{kind} {} ({id}) created", node.label()));
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn remove_node(
        &mut self,
        id: NodeId,
        log: &mut EventLog,
        now: SimTime,
    ) -> Result<(), CommandError> {
        if !self.nodes.contains_key(&id) {
            return Err(CommandError::UnknownNode(id));
        }
        self.detach_node(id, log, now);
        Ok(())
    }

    pub fn connect_gateways(
        &mut self,
        a: NodeId,
        b: NodeId,
        log: &mut EventLog,
        now: SimTime,
    ) -> Result<LinkId, CommandError> {
        let node_a = self.nodes.get(&a).ok_or(CommandError::UnknownNode(a))?;
        let node_b = self.nodes.get(&b).ok_or(CommandError::UnknownNode(b))?;
        if !node_a.is_gateway() {
            return Err(CommandError::NotAGateway(a));
        }
        if !node_b.is_gateway() {
            return Err(CommandError::NotAGateway(b));
        }
        if node_a.cluster == node_b.cluster {
            return Err(CommandError::SameCluster(a, b));
        }
        if self.is_linked(a, b) {
            return Err(CommandError::DuplicateLink(a, b));
        }

        self.last_link_id += 1;
        let link = GatewayLink { id: LinkId(self.last_link_id), a, b };
        self.links.insert(link.id, link);
        log.record(now, LogCategory::Topology, format!("link {} created", self.link_label(&link)));
        Ok(link.id)
    }

    /// Removes the link and immediately withdraws every route either
    /// endpoint learned through the other.
    pub fn disconnect_gateways(
        &mut self,
        id: LinkId,
        log: &mut EventLog,
        now: SimTime,
    ) -> Result<(), CommandError> {
        let link = self.links.get(&id).copied().ok_or(CommandError::UnknownLink(id))?;
        log.record(now, LogCategory::Topology, format!("link {} removed", self.link_label(&link)));
        self.links.remove(&id);
        self.withdraw_between(link.a, link.b, log, now);
        self.withdraw_between(link.b, link.a, log, now);
        Ok(())
    }

    // ─── Cascades ────────────────────────────────────────────────────────

    fn detach_node(&mut self, id: NodeId, log: &mut EventLog, now: SimTime) {
        let touching: Vec<GatewayLink> =
            self.links.values().filter(|l| l.touches(id)).copied().collect();
        for link in &touching {
            log.record(
                now,
                LogCategory::Topology,
                format!("link {} removed with its endpoint", self.link_label(link)),
            );
            self.links.remove(&link.id);
        }

        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        let kind = if node.is_gateway() { "gateway" } else { "node" };
        log.record(now, LogCategory::Topology, format!("{kind} {} ({id}) removed", node.label()));

        if node.is_gateway() {
            let (name, cluster) = (node.name.clone(), node.cluster);
            self.forget_gateway(cluster, &name, log, now);
            self.purge_routes(
                |r| r.via(&name, cluster),
                &format!("next hop {} removed", node.label()),
                log,
                now,
            );
        }
    }

    /// Drop a removed gateway from the local-gateway tables of its cluster.
    fn forget_gateway(&mut self, cluster: ClusterId, gateway: &str, log: &mut EventLog, now: SimTime) {
        for node in self.nodes.values_mut().filter(|n| n.cluster == cluster) {
            let label = node.label();
            let Some(table) = node.local_gateways_mut() else {
                continue;
            };
            if table.forget(gateway) {
                log.record(
                    now,
                    LogCategory::Discovery,
                    format!("{label} forgot gateway {gateway}: removed"),
                );
            }
        }
    }

    /// Drop routes in `holder` whose next hop is `neighbor`.
    fn withdraw_between(&mut self, holder: NodeId, neighbor: NodeId, log: &mut EventLog, now: SimTime) {
        let Some(peer) = self.nodes.get(&neighbor) else {
            return;
        };
        let (peer_name, peer_cluster, peer_label) = (peer.name.clone(), peer.cluster, peer.label());
        let Some(node) = self.nodes.get_mut(&holder) else {
            return;
        };
        let label = node.label();
        let Some(table) = node.routing_table_mut() else {
            return;
        };
        for route in table.retain_routes(|r| !r.via(&peer_name, peer_cluster)) {
            log.record(
                now,
                LogCategory::Routing,
                format!(
                    "{label} withdrew route to {} (cost {}): link to {peer_label} removed",
                    route.destination, route.cost
                ),
            );
        }
    }

    fn purge_routes<F>(&mut self, doomed: F, why: &str, log: &mut EventLog, now: SimTime) -> usize
    where
        F: Fn(&Route) -> bool,
    {
        let mut purged = 0;
        for node in self.nodes.values_mut() {
            let label = node.label();
            let Some(table) = node.routing_table_mut() else {
                continue;
            };
            for route in table.retain_routes(|r| !doomed(r)) {
                purged += 1;
                log.record(
                    now,
                    LogCategory::Routing,
                    format!(
                        "{label} withdrew route to {} via {}@{}: {why}",
                        route.destination, route.next_hop, route.next_hop_cluster
                    ),
                );
            }
        }
        purged
    }

    // ─── Integrity ───────────────────────────────────────────────────────

    /// Every broken invariant, described. Empty means the store is sound.
    pub fn integrity_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for node in self.nodes.values() {
            if !self.clusters.contains_key(&node.cluster) {
                violations.push(format!("node {} in missing cluster {}", node.id, node.cluster));
            }
            if self.nodes_in(node.cluster).filter(|n| n.name == node.name).count() > 1 {
                violations.push(format!("duplicate name {:?} in cluster {}", node.name, node.cluster));
            }
            if let Some(table) = node.local_gateways() {
                for gateway in table.names() {
                    if !self.find_node(node.cluster, gateway).is_some_and(|g| g.is_gateway()) {
                        violations.push(format!(
                            "node {} lists missing local gateway {gateway}",
                            node.id
                        ));
                    }
                }
            }
            if let Some(table) = node.routing_table() {
                match table.get(node.cluster) {
                    Some(r) if r.cost == 0 && r.via(&node.name, node.cluster) => {}
                    _ => violations.push(format!("gateway {} lost its self-route", node.id)),
                }
                for route in table.routes() {
                    if !self.clusters.contains_key(&route.destination) {
                        violations.push(format!(
                            "gateway {} routes to missing cluster {}",
                            node.id, route.destination
                        ));
                    }
                    if self.find_node(route.next_hop_cluster, &route.next_hop).is_none() {
                        violations.push(format!(
                            "gateway {} routes via missing node {}@{}",
                            node.id, route.next_hop, route.next_hop_cluster
                        ));
                    }
                }
            }
        }

        for (i, link) in self.links.values().enumerate() {
            let ends = (self.nodes.get(&link.a), self.nodes.get(&link.b));
            match ends {
                (Some(a), Some(b)) => {
                    if !a.is_gateway() || !b.is_gateway() {
                        violations.push(format!("link {} has a non-gateway endpoint", link.id));
                    }
                    if a.cluster == b.cluster {
                        violations.push(format!("link {} is intra-cluster", link.id));
                    }
                }
                _ => violations.push(format!("link {} has a missing endpoint", link.id)),
            }
            if self.links.values().skip(i + 1).any(|o| o.joins(link.a, link.b)) {
                violations.push(format!("link {} is duplicated", link.id));
            }
        }

        violations
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
