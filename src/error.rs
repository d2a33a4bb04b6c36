// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Errors

use crate::types::{ClusterId, LinkId, NodeId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A command rejected before it touched any state.
///
/// Stale references met during a tick are not errors; they resolve to a
/// dropped message or a skipped route row instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("cluster {0} does not exist")]
    UnknownCluster(ClusterId),
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("link {0} does not exist")]
    UnknownLink(LinkId),
    #[error("cluster {cluster} already has a node named {name:?}")]
    DuplicateNodeName { cluster: ClusterId, name: String },
    #[error("no node named {name:?} in cluster {cluster}")]
    UnknownNodeName { cluster: ClusterId, name: String },
    #[error("node {0} is not a gateway")]
    NotAGateway(NodeId),
    #[error("gateways {0} and {1} belong to the same cluster")]
    SameCluster(NodeId, NodeId),
    #[error("gateways {0} and {1} are already linked")]
    DuplicateLink(NodeId, NodeId),
    #[error("tick period {period_ms}ms outside {min_ms}..={max_ms}ms")]
    PeriodOutOfRange { period_ms: u64, min_ms: u64, max_ms: u64 },
}

/// Invalid simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("tick period bounds {min_ms}..={max_ms}ms are empty or start at zero")]
    InvalidPeriodBounds { min_ms: u64, max_ms: u64 },
    #[error("initial tick period {period_ms}ms outside {min_ms}..={max_ms}ms")]
    PeriodOutOfRange { period_ms: u64, min_ms: u64, max_ms: u64 },
    #[error("dead peer multiplier must be at least 1")]
    ZeroDeadPeerMultiplier,
    #[error("max catch-up ticks must be at least 1")]
    ZeroCatchUp,
    #[error("malformed config: {0}")]
    Parse(String),
}
