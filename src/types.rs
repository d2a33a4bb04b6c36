// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Type Definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::discovery::LocalGatewayTable;
use crate::routing::RoutingTable;

// ─── Identifiers ─────────────────────────────────────────────────────────────

macro_rules! sim_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self { $name(v) }
        }
    };
}

sim_id!(
    /// Cluster identity. Allocated monotonically, never reused.
    ClusterId, "C"
);
sim_id!(
    /// Node identity. Peers are resolved by (name, cluster), not by this id.
    NodeId, "N"
);
sim_id!(
    /// Gateway link identity.
    LinkId, "L"
);
sim_id!(MessageId, "M");

// ─── Cluster ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
}

// ─── Node Role ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeRole {
    Standard = 0,
    Gateway = 1,
}

/// Per-role protocol state. The variant is fixed at creation, which is what
/// makes a node's role immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum NodeState {
    /// Learned by GDP: gateway name -> last heard (simulated ms).
    Standard { local_gateways: LocalGatewayTable },
    /// Maintained by ICRP: destination cluster -> route.
    Gateway { routing_table: RoutingTable },
}

// ─── SimNode ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimNode {
    pub id: NodeId,
    pub name: String,
    pub cluster: ClusterId,
    pub state: NodeState,
}

impl SimNode {
    pub fn standard(id: NodeId, name: String, cluster: ClusterId) -> Self {
        Self {
            id,
            name,
            cluster,
            state: NodeState::Standard { local_gateways: LocalGatewayTable::default() },
        }
    }

    /// A gateway starts with its zero-cost self-route, the seed that ICRP
    /// propagates outward.
    pub fn gateway(id: NodeId, name: String, cluster: ClusterId) -> Self {
        let routing_table = RoutingTable::seeded(cluster, &name);
        Self {
            id,
            name,
            cluster,
            state: NodeState::Gateway { routing_table },
        }
    }

    pub fn role(&self) -> NodeRole {
        match self.state {
            NodeState::Standard { .. } => NodeRole::Standard,
            NodeState::Gateway { .. } => NodeRole::Gateway,
        }
    }

    pub fn is_gateway(&self) -> bool {
        self.role() == NodeRole::Gateway
    }

    pub fn routing_table(&self) -> Option<&RoutingTable> {
        match &self.state {
            NodeState::Gateway { routing_table } => Some(routing_table),
            NodeState::Standard { .. } => None,
        }
    }

    pub fn routing_table_mut(&mut self) -> Option<&mut RoutingTable> {
        match &mut self.state {
            NodeState::Gateway { routing_table } => Some(routing_table),
            NodeState::Standard { .. } => None,
        }
    }

    pub fn local_gateways(&self) -> Option<&LocalGatewayTable> {
        match &self.state {
            NodeState::Standard { local_gateways } => Some(local_gateways),
            NodeState::Gateway { .. } => None,
        }
    }

    pub fn local_gateways_mut(&mut self) -> Option<&mut LocalGatewayTable> {
        match &mut self.state {
            NodeState::Standard { local_gateways } => Some(local_gateways),
            NodeState::Gateway { .. } => None,
        }
    }

    /// `name@cluster`, the form used throughout the event log.
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.cluster)
    }
}

// ─── GatewayLink ─────────────────────────────────────────────────────────────

/// Bidirectional inter-cluster link between two gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLink {
    pub id: LinkId,
    pub a: NodeId,
    pub b: NodeId,
}

impl GatewayLink {
    pub fn touches(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// Unordered-pair comparison.
    pub fn joins(&self, x: NodeId, y: NodeId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

// ─── Message Status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageStatus {
    Moving = 0,
    Delivered = 1, // TERMINAL
    Dropped = 2,   // TERMINAL
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Dropped)
    }
}

/// Why a message was dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    /// The node holding the message was removed.
    LocationGone,
    /// Hop budget exhausted.
    TtlExpired,
    /// Destination cluster gone, or no node of that name in it.
    DestinationUnknown,
    /// Gateway has no routing entry for the destination cluster.
    NoRoute,
    /// Selected next hop no longer resolves to a live gateway.
    NextHopGone,
    /// Standard node has not heard any local gateway.
    NoLocalGateway,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LocationGone => "current node no longer exists",
            Self::TtlExpired => "TTL expired",
            Self::DestinationUnknown => "destination unknown",
            Self::NoRoute => "no route to destination cluster",
            Self::NextHopGone => "next hop no longer exists",
            Self::NoLocalGateway => "no known local gateway",
        };
        f.write_str(s)
    }
}

// ─── SimMessage ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimMessage {
    pub id: MessageId,
    pub source_cluster: ClusterId,
    pub source_name: String,
    pub dest_cluster: ClusterId,
    pub dest_name: String,
    pub payload: String,
    /// Remaining hop budget.
    pub ttl: u32,
    /// Names of visited nodes, in order.
    pub trace: Vec<String>,
    pub location: NodeId,
    pub status: MessageStatus,
    #[serde(default)]
    pub drop_reason: Option<DropReason>,
    pub hops: u32,
    pub created_at_ms: u64,
    #[serde(default)]
    pub finished_at_ms: Option<u64>,
}

// ─── Tick Reports ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub announcements: usize,
    pub discovered: usize,
    pub expired: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub exchanges: usize,
    pub installed: usize,
    pub refreshed: usize,
    pub withdrawn: usize,
}

impl ExchangeReport {
    pub fn changes(&self) -> usize {
        self.installed + self.refreshed + self.withdrawn
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingReport {
    pub advanced: usize,
    pub delivered: Vec<MessageId>,
    pub dropped: Vec<(MessageId, DropReason)>,
    pub purged: usize,
}

// ─── TickResult ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TickResult {
    pub tick: u64,
    pub time_ms: u64,
    pub applied_commands: usize,
    pub discovery: DiscoveryReport,
    pub exchange: ExchangeReport,
    pub forwarding: ForwardingReport,
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time_ms: u64,
    pub running: bool,
    pub tick_period_ms: u64,
    pub clusters: Vec<Cluster>,
    pub nodes: Vec<SimNode>,
    pub links: Vec<GatewayLink>,
    pub messages: Vec<SimMessage>,
}
