// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Message Forwarding
//
// Per-message state machine: Moving -> {Delivered, Dropped}. One hop per
// message per tick, decided against the discovery and routing state built
// earlier in the same tick.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::SimTime;
use crate::error::CommandError;
use crate::event_log::{EventLog, LogCategory};
use crate::topology::Topology;
use crate::types::{
    ClusterId, DropReason, ForwardingReport, MessageId, MessageStatus, NodeId, NodeState,
    SimMessage,
};

// ---------------------------------------------------------------------------
// MessageRequest
// ---------------------------------------------------------------------------

/// Parameters of a send command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub source_cluster: ClusterId,
    pub source_name: String,
    pub dest_cluster: ClusterId,
    pub dest_name: String,
    #[serde(default)]
    pub payload: String,
    /// Overrides the configured initial TTL.
    #[serde(default)]
    pub ttl: Option<u32>,
}

impl MessageRequest {
    pub fn new(
        source_cluster: ClusterId,
        source_name: &str,
        dest_cluster: ClusterId,
        dest_name: &str,
        payload: &str,
    ) -> Self {
        Self {
            source_cluster,
            source_name: source_name.to_string(),
            dest_cluster,
            dest_name: dest_name.to_string(),
            payload: payload.to_string(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Outcome of one advancement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hop {
    Forward(NodeId),
    /// `Some` when the last intra-cluster hop is taken in the same step.
    Deliver(Option<NodeId>),
    Drop(DropReason),
}

// ---------------------------------------------------------------------------
// ForwardingEngine
// ---------------------------------------------------------------------------

/// Owns the active message set and the gateway-selection PRNG.
#[derive(Debug, Clone)]
pub struct ForwardingEngine {
    messages: BTreeMap<MessageId, SimMessage>,
    last_message_id: u32,
    rng: ChaCha8Rng,
    initial_ttl: u32,
    terminal_grace_ms: u64,
}

impl ForwardingEngine {
    pub fn new(rng: ChaCha8Rng, initial_ttl: u32, terminal_grace_ms: u64) -> Self {
        Self {
            messages: BTreeMap::new(),
            last_message_id: 0,
            rng,
            initial_ttl,
            terminal_grace_ms,
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &SimMessage> {
        self.messages.values()
    }

    pub fn message(&self, id: MessageId) -> Option<&SimMessage> {
        self.messages.get(&id)
    }

    pub fn moving_count(&self) -> usize {
        self.messages.values().filter(|m| m.status == MessageStatus::Moving).count()
    }

    /// Place a new message on its source node. The destination is resolved
    /// hop by hop, not here.
    pub fn send(
        &mut self,
        topology: &Topology,
        request: MessageRequest,
        log: &mut EventLog,
        now: SimTime,
    ) -> Result<MessageId, CommandError> {
        if topology.cluster(request.source_cluster).is_none() {
            return Err(CommandError::UnknownCluster(request.source_cluster));
        }
        let source = topology
            .find_node(request.source_cluster, &request.source_name)
            .ok_or_else(|| CommandError::UnknownNodeName {
                cluster: request.source_cluster,
                name: request.source_name.clone(),
            })?;

        self.last_message_id += 1;
        let id = MessageId(self.last_message_id);
        let ttl = request.ttl.unwrap_or(self.initial_ttl);
        log.record(
            now,
            LogCategory::Forwarding,
            format!(
                "message {id} queued {} -> {}@{} (ttl {ttl})",
                source.label(),
                request.dest_name,
                request.dest_cluster
            ),
        );
        self.messages.insert(
            id,
            SimMessage {
                id,
                source_cluster: request.source_cluster,
                source_name: request.source_name,
                dest_cluster: request.dest_cluster,
                dest_name: request.dest_name,
                payload: request.payload,
                ttl,
                trace: Vec::new(),
                location: source.id,
                status: MessageStatus::Moving,
                drop_reason: None,
                hops: 0,
                created_at_ms: now.time_ms,
                finished_at_ms: None,
            },
        );
        Ok(id)
    }

    /// Advance every moving message one hop, then purge terminal messages
    /// whose display grace period has elapsed.
    pub fn run(&mut self, topology: &Topology, now: SimTime, log: &mut EventLog) -> ForwardingReport {
        let mut report = ForwardingReport::default();
        let Self { messages, rng, terminal_grace_ms, .. } = self;

        for msg in messages.values_mut().filter(|m| m.status == MessageStatus::Moving) {
            report.advanced += 1;
            match next_hop(topology, msg, rng) {
                Hop::Forward(next) => {
                    let from = topology.node(msg.location).map(|n| n.label()).unwrap_or_default();
                    let to = topology.node(next).map(|n| n.label()).unwrap_or_default();
                    take_hop(msg, next);
                    log.record(
                        now,
                        LogCategory::Forwarding,
                        format!("message {} {from} -> {to} (ttl {})", msg.id, msg.ttl),
                    );
                }
                Hop::Deliver(final_hop) => {
                    if let Some(next) = final_hop {
                        take_hop(msg, next);
                    }
                    msg.status = MessageStatus::Delivered;
                    msg.finished_at_ms = Some(now.time_ms);
                    report.delivered.push(msg.id);
                    let at = topology.node(msg.location).map(|n| n.label()).unwrap_or_default();
                    log.record(
                        now,
                        LogCategory::Forwarding,
                        format!(
                            "message {} delivered to {at} after {} hops, trace [{}]",
                            msg.id,
                            msg.hops,
                            msg.trace.join(", ")
                        ),
                    );
                }
                Hop::Drop(reason) => {
                    msg.status = MessageStatus::Dropped;
                    msg.drop_reason = Some(reason);
                    msg.finished_at_ms = Some(now.time_ms);
                    report.dropped.push((msg.id, reason));
                    log.record(
                        now,
                        LogCategory::Forwarding,
                        format!("message {} dropped: {reason}", msg.id),
                    );
                }
            }
        }

        let grace = *terminal_grace_ms;
        let before = messages.len();
        messages.retain(|_, m| match m.finished_at_ms {
            Some(done) if m.status.is_terminal() => now.time_ms.saturating_sub(done) < grace,
            _ => true,
        });
        report.purged = before - messages.len();
        report
    }
}

fn take_hop(msg: &mut SimMessage, next: NodeId) {
    msg.location = next;
    msg.ttl = msg.ttl.saturating_sub(1);
    msg.hops += 1;
}

/// Decide the fate of `msg` at its current node. Appends the current node
/// to the trace once the node and TTL checks pass.
fn next_hop(topology: &Topology, msg: &mut SimMessage, rng: &mut ChaCha8Rng) -> Hop {
    let Some(current) = topology.node(msg.location) else {
        return Hop::Drop(DropReason::LocationGone);
    };
    if msg.ttl == 0 {
        return Hop::Drop(DropReason::TtlExpired);
    }
    msg.trace.push(current.name.clone());

    // Covers a destination deleted while the message was in flight.
    let Some(dest) = topology.find_node(msg.dest_cluster, &msg.dest_name) else {
        return Hop::Drop(DropReason::DestinationUnknown);
    };

    if dest.cluster == current.cluster {
        return if dest.id == current.id {
            Hop::Deliver(None)
        } else {
            Hop::Deliver(Some(dest.id))
        };
    }

    match &current.state {
        NodeState::Gateway { routing_table } => {
            let Some(route) = routing_table.get(msg.dest_cluster) else {
                return Hop::Drop(DropReason::NoRoute);
            };
            topology
                .find_node(route.next_hop_cluster, &route.next_hop)
                .filter(|n| n.is_gateway() && n.id != current.id)
                .map_or(Hop::Drop(DropReason::NextHopGone), |n| Hop::Forward(n.id))
        }
        NodeState::Standard { local_gateways } => {
            // Policy: uniform choice among known local gateways.
            let names: Vec<&str> = local_gateways.names().collect();
            if names.is_empty() {
                return Hop::Drop(DropReason::NoLocalGateway);
            }
            let pick = names[rng.gen_range(0..names.len())];
            topology
                .find_node(current.cluster, pick)
                .filter(|n| n.is_gateway())
                .map_or(Hop::Drop(DropReason::NextHopGone), |n| Hop::Forward(n.id))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::run_discovery;
    use crate::routing::run_exchange;
    use rand::SeedableRng;

    struct World {
        topo: Topology,
        log: EventLog,
        engine: ForwardingEngine,
        tick: u64,
    }

    impl World {
        fn new() -> Self {
            Self {
                topo: Topology::new(),
                log: EventLog::default(),
                engine: ForwardingEngine::new(ChaCha8Rng::seed_from_u64(1), 10, 2000),
                tick: 0,
            }
        }

        fn now(&self) -> SimTime {
            SimTime { tick: self.tick, time_ms: self.tick * 1000 }
        }

        fn cluster(&mut self, name: &str) -> ClusterId {
            let now = self.now();
            self.topo.add_cluster(name, &mut self.log, now).unwrap()
        }

        fn node(&mut self, cluster: ClusterId, name: &str, gateway: bool) -> NodeId {
            let now = self.now();
            self.topo.add_node(cluster, name, gateway, &mut self.log, now).unwrap()
        }

        fn send(&mut self, request: MessageRequest) -> MessageId {
            let now = self.now();
            self.engine.send(&self.topo, request, &mut self.log, now).unwrap()
        }

        fn tick(&mut self) -> ForwardingReport {
            self.tick += 1;
            let now = self.now();
            run_discovery(&mut self.topo, now, 3000, &mut self.log);
            run_exchange(&mut self.topo, now, None, &mut self.log);
            self.engine.run(&self.topo, now, &mut self.log)
        }

        fn msg(&self, id: MessageId) -> &SimMessage {
            self.engine.message(id).unwrap()
        }
    }

    #[test]
    fn test_send_from_unknown_source_rejected() {
        let mut w = World::new();
        let a = w.cluster("A");
        let now = w.now();
        let err = w.engine.send(
            &w.topo,
            MessageRequest::new(a, "ghost", a, "x", "hi"),
            &mut w.log,
            now,
        );
        assert!(matches!(err, Err(CommandError::UnknownNodeName { .. })));
        let err = w.engine.send(
            &w.topo,
            MessageRequest::new(ClusterId(9), "n", a, "x", "hi"),
            &mut w.log,
            now,
        );
        assert_eq!(err, Err(CommandError::UnknownCluster(ClusterId(9))));
    }

    #[test]
    fn test_local_delivery_to_self() {
        let mut w = World::new();
        let a = w.cluster("A");
        w.node(a, "n", false);
        let id = w.send(MessageRequest::new(a, "n", a, "n", "loopback"));
        let report = w.tick();
        assert_eq!(report.delivered, vec![id]);
        assert_eq!(w.msg(id).trace, vec!["n".to_string()]);
        assert_eq!(w.msg(id).hops, 0);
    }

    #[test]
    fn test_same_cluster_peer_delivered_in_one_step() {
        let mut w = World::new();
        let a = w.cluster("A");
        w.node(a, "n1", false);
        let n2 = w.node(a, "n2", false);
        let id = w.send(MessageRequest::new(a, "n1", a, "n2", "hi"));
        w.tick();
        let m = w.msg(id);
        assert_eq!(m.status, MessageStatus::Delivered);
        assert_eq!(m.location, n2);
        assert_eq!(m.ttl, 9);
    }

    #[test]
    fn test_unknown_destination_name_dropped_first_tick() {
        let mut w = World::new();
        let a = w.cluster("A");
        w.node(a, "n", false);
        let id = w.send(MessageRequest::new(a, "n", a, "nobody", "hi"));
        let report = w.tick();
        assert_eq!(report.dropped, vec![(id, DropReason::DestinationUnknown)]);
        assert!(w.msg(id).trace.len() <= 1);
    }

    #[test]
    fn test_standard_node_without_gateway_drops() {
        let mut w = World::new();
        let a = w.cluster("A");
        let b = w.cluster("B");
        w.node(a, "n", false);
        w.node(b, "m", false);
        let id = w.send(MessageRequest::new(a, "n", b, "m", "hi"));
        w.tick();
        assert_eq!(w.msg(id).drop_reason, Some(DropReason::NoLocalGateway));
    }

    #[test]
    fn test_gateway_without_route_drops() {
        let mut w = World::new();
        let a = w.cluster("A");
        let b = w.cluster("B");
        w.node(a, "gA", true);
        w.node(b, "m", false);
        let id = w.send(MessageRequest::new(a, "gA", b, "m", "hi"));
        w.tick();
        assert_eq!(w.msg(id).drop_reason, Some(DropReason::NoRoute));
    }

    #[test]
    fn test_ttl_one_two_hops_always_dropped() {
        for seed in 0..5 {
            let mut w = World::new();
            w.engine = ForwardingEngine::new(ChaCha8Rng::seed_from_u64(seed), 10, 2000);
            let a = w.cluster("A");
            let b = w.cluster("B");
            let ga = w.node(a, "gA", true);
            let gb = w.node(b, "gB", true);
            w.node(b, "nB", false);
            let now = w.now();
            w.topo.connect_gateways(ga, gb, &mut w.log, now).unwrap();
            w.tick();

            // gA -> gB -> nB needs two hops.
            let id = w.send(MessageRequest::new(a, "gA", b, "nB", "hi").with_ttl(1));
            for _ in 0..4 {
                w.tick();
            }
            assert_eq!(w.msg(id).status, MessageStatus::Dropped);
            assert_eq!(w.msg(id).drop_reason, Some(DropReason::TtlExpired));
        }
    }

    #[test]
    fn test_message_at_removed_node_dropped() {
        let mut w = World::new();
        let a = w.cluster("A");
        let b = w.cluster("B");
        let ga = w.node(a, "gA", true);
        let gb = w.node(b, "gB", true);
        w.node(b, "nB", false);
        let now = w.now();
        w.topo.connect_gateways(ga, gb, &mut w.log, now).unwrap();
        w.tick();

        let id = w.send(MessageRequest::new(a, "gA", b, "nB", "hi"));
        w.tick();
        assert_eq!(w.msg(id).location, gb);
        let now = w.now();
        w.topo.remove_node(gb, &mut w.log, now).unwrap();
        w.tick();
        assert_eq!(w.msg(id).drop_reason, Some(DropReason::LocationGone));
    }

    #[test]
    fn test_terminal_messages_purged_after_grace() {
        let mut w = World::new();
        let a = w.cluster("A");
        w.node(a, "n", false);
        let id = w.send(MessageRequest::new(a, "n", a, "n", "hi"));
        w.tick();
        assert!(w.engine.message(id).is_some());
        w.tick();
        assert!(w.engine.message(id).is_some(), "1000ms < 2000ms grace");
        let report = w.tick();
        assert_eq!(report.purged, 1);
        assert!(w.engine.message(id).is_none());
    }

    #[test]
    fn test_random_pick_only_among_local_gateways() {
        let mut w = World::new();
        let a = w.cluster("A");
        let b = w.cluster("B");
        let g1 = w.node(a, "g1", true);
        let g2 = w.node(a, "g2", true);
        let gb = w.node(b, "gB", true);
        w.node(a, "n", false);
        w.node(b, "m", false);
        let now = w.now();
        w.topo.connect_gateways(g1, gb, &mut w.log, now).unwrap();
        w.topo.connect_gateways(g2, gb, &mut w.log, now).unwrap();
        w.tick();

        let ids: Vec<MessageId> =
            (0..20).map(|_| w.send(MessageRequest::new(a, "n", b, "m", "x"))).collect();
        w.tick();
        for id in ids {
            let loc = w.msg(id).location;
            assert!(loc == g1 || loc == g2, "first hop must be a local gateway");
        }
    }
}
