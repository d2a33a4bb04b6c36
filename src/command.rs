// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Commands
//
// JSON-friendly form of every mutation, either applied at once or queued
// for the next tick boundary.

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::forwarding::MessageRequest;
use crate::simulation::NetworkSimulation;
use crate::types::{ClusterId, LinkId, MessageId, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    CreateCluster {
        name: String,
    },
    DeleteCluster {
        id: ClusterId,
    },
    CreateNode {
        cluster: ClusterId,
        name: String,
        #[serde(default)]
        is_gateway: bool,
    },
    DeleteNode {
        id: NodeId,
    },
    CreateGatewayLink {
        a: NodeId,
        b: NodeId,
    },
    DeleteGatewayLink {
        id: LinkId,
    },
    SendMessage(MessageRequest),
    SetTickPeriod {
        period_ms: u64,
    },
    Start,
    Stop,
}

/// What an accepted command produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CommandOutcome {
    Cluster(ClusterId),
    Node(NodeId),
    Link(LinkId),
    Message(MessageId),
    /// Accepted, nothing allocated. For start/stop, `false` means no-op.
    Done(bool),
}

impl NetworkSimulation {
    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome, CommandError> {
        Ok(match command {
            Command::CreateCluster { name } => CommandOutcome::Cluster(self.create_cluster(&name)?),
            Command::DeleteCluster { id } => {
                self.delete_cluster(id)?;
                CommandOutcome::Done(true)
            }
            Command::CreateNode { cluster, name, is_gateway } => {
                CommandOutcome::Node(self.create_node(cluster, &name, is_gateway)?)
            }
            Command::DeleteNode { id } => {
                self.delete_node(id)?;
                CommandOutcome::Done(true)
            }
            Command::CreateGatewayLink { a, b } => CommandOutcome::Link(self.create_gateway_link(a, b)?),
            Command::DeleteGatewayLink { id } => {
                self.delete_gateway_link(id)?;
                CommandOutcome::Done(true)
            }
            Command::SendMessage(request) => CommandOutcome::Message(self.send(request)?),
            Command::SetTickPeriod { period_ms } => {
                self.set_tick_period(period_ms)?;
                CommandOutcome::Done(true)
            }
            Command::Start => CommandOutcome::Done(self.start()),
            Command::Stop => CommandOutcome::Done(self.stop()),
        })
    }

    /// Queue a command for the start of the next tick. Returns the queue
    /// length.
    pub fn submit(&mut self, command: Command) -> usize {
        self.pending.push_back(command);
        self.pending.len()
    }

    pub fn pending_commands(&self) -> impl Iterator<Item = &Command> {
        self.pending.iter()
    }

    /// Apply every queued command in submission order. Returns how many
    /// were accepted; rejections are already in the log.
    pub(crate) fn drain_pending(&mut self) -> usize {
        let mut accepted = 0;
        while let Some(command) = self.pending.pop_front() {
            if self.apply(command).is_ok() {
                accepted += 1;
            }
        }
        accepted
    }
}
