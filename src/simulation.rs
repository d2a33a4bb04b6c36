// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Simulation Core

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use wasm_bindgen::prelude::*;

use crate::clock::{SimTime, SimulationClock};
use crate::command::Command;
use crate::config::SimConfig;
use crate::discovery;
use crate::error::{CommandError, ConfigError};
use crate::event_log::{EventLog, LogCategory, LogEntry};
use crate::forwarding::{ForwardingEngine, MessageRequest};
use crate::routing;
use crate::topology::Topology;
use crate::types::*;

// ─── NetworkSimulation struct ────────────────────────────────────────────────

/// The whole simulated world. All mutation goes through `&mut self`, so a
/// command can never interleave with a tick.
#[wasm_bindgen]
pub struct NetworkSimulation {
    pub(crate) config: SimConfig,
    pub(crate) topology: Topology,
    pub(crate) forwarding: ForwardingEngine,
    pub(crate) clock: SimulationClock,
    pub(crate) log: EventLog,
    pub(crate) pending: VecDeque<Command>,
}

impl NetworkSimulation {
    pub fn with_config(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    pub fn from_seed(seed: u64) -> Self {
        Self::build(SimConfig::with_seed(seed))
    }

    /// Assumes `config` is valid.
    pub(crate) fn build(config: SimConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        Self {
            topology: Topology::new(),
            forwarding: ForwardingEngine::new(rng, config.initial_ttl, config.terminal_grace_ms),
            clock: SimulationClock::new(
                config.tick_period_ms,
                config.min_tick_period_ms,
                config.max_tick_period_ms,
                config.max_catch_up_ticks,
            ),
            log: EventLog::new(config.log_capacity),
            pending: VecDeque::new(),
            config,
        }
    }

    // ─── Read access ─────────────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn tick_period_ms(&self) -> u64 {
        self.clock.period_ms()
    }

    pub fn messages(&self) -> impl Iterator<Item = &SimMessage> {
        self.forwarding.messages()
    }

    pub fn message(&self, id: MessageId) -> Option<&SimMessage> {
        self.forwarding.message(id)
    }

    pub fn node_named(&self, cluster: ClusterId, name: &str) -> Option<&SimNode> {
        self.topology.find_node(cluster, name)
    }

    /// Log entries with `seq >= from`. Pass the previous `next_seq()` to
    /// stream only what is new.
    pub fn log_since(&self, from: u64) -> Vec<LogEntry> {
        self.log.since(from).cloned().collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        Snapshot {
            tick: now.tick,
            time_ms: now.time_ms,
            running: self.clock.is_running(),
            tick_period_ms: self.clock.period_ms(),
            clusters: self.topology.clusters().cloned().collect(),
            nodes: self.topology.nodes().cloned().collect(),
            links: self.topology.links().copied().collect(),
            messages: self.forwarding.messages().cloned().collect(),
        }
    }

    // ─── Commands ────────────────────────────────────────────────────────

    pub fn create_cluster(&mut self, name: &str) -> Result<ClusterId, CommandError> {
        let now = self.clock.now();
        let result = self.topology.add_cluster(name, &mut self.log, now);
        self.settle(|| format!("create cluster {name:?}"), result)
    }

    pub fn delete_cluster(&mut self, id: ClusterId) -> Result<(), CommandError> {
        let now = self.clock.now();
        let result = self.topology.remove_cluster(id, &mut self.log, now);
        self.settle(|| format!("delete cluster {id}"), result)
    }

    pub fn create_node(
        &mut self,
        cluster: ClusterId,
        name: &str,
        is_gateway: bool,
    ) -> Result<NodeId, CommandError> {
        let now = self.clock.now();
        let result = self.topology.add_node(cluster, name, is_gateway, &mut self.log, now);
        self.settle(|| format!("create node {name:?} in {cluster}"), result)
    }

    pub fn delete_node(&mut self, id: NodeId) -> Result<(), CommandError> {
        let now = self.clock.now();
        let result = self.topology.remove_node(id, &mut self.log, now);
        self.settle(|| format!("delete node {id}"), result)
    }

    pub fn create_gateway_link(&mut self, a: NodeId, b: NodeId) -> Result<LinkId, CommandError> {
        let now = self.clock.now();
        let result = self.topology.connect_gateways(a, b, &mut self.log, now);
        self.settle(|| format!("link {a} <-> {b}"), result)
    }

    pub fn delete_gateway_link(&mut self, id: LinkId) -> Result<(), CommandError> {
        let now = self.clock.now();
        let result = self.topology.disconnect_gateways(id, &mut self.log, now);
        self.settle(|| format!("delete link {id}"), result)
    }

    pub fn send_message(
        &mut self,
        source_cluster: ClusterId,
        source_name: &str,
        dest_cluster: ClusterId,
        dest_name: &str,
        payload: &str,
    ) -> Result<MessageId, CommandError> {
        self.send(MessageRequest::new(source_cluster, source_name, dest_cluster, dest_name, payload))
    }

    pub fn send(&mut self, request: MessageRequest) -> Result<MessageId, CommandError> {
        let now = self.clock.now();
        let what = format!("send from {}@{}", request.source_name, request.source_cluster);
        let result = self.forwarding.send(&self.topology, request, &mut self.log, now);
        self.settle(|| what, result)
    }

    pub fn set_tick_period(&mut self, period_ms: u64) -> Result<(), CommandError> {
        let now = self.clock.now();
        let result = self.clock.set_period(period_ms);
        if result.is_ok() {
            self.log.record(
                now,
                LogCategory::Clock,
                format!("tick period set to {period_ms}ms from next tick"),
            );
        }
        self.settle(|| format!("set tick period {period_ms}ms"), result)
    }

    /// Returns false when the clock was already running.
    pub fn start(&mut self) -> bool {
        let now = self.clock.now();
        let started = self.clock.start();
        let message = if started {
            format!("clock started ({}ms period)", self.clock.period_ms())
        } else {
            "start ignored: clock already running".to_string()
        };
        self.log.record(now, LogCategory::Clock, message);
        started
    }

    /// Returns false when the clock was already stopped.
    pub fn stop(&mut self) -> bool {
        let now = self.clock.now();
        let stopped = self.clock.stop();
        let message = if stopped {
            format!("clock stopped at tick {}", now.tick)
        } else {
            "stop ignored: clock already stopped".to_string()
        };
        self.log.record(now, LogCategory::Clock, message);
        stopped
    }

    /// Log a rejection; the topology is untouched on the error path.
    fn settle<T, F>(&mut self, describe: F, result: Result<T, CommandError>) -> Result<T, CommandError>
    where
        F: FnOnce() -> String,
    {
        if let Err(err) = &result {
            let now = self.clock.now();
            self.log.record(now, LogCategory::Rejected, format!("{} rejected: {err}", describe()));
        }
        debug_assert!(
            self.topology.integrity_violations().is_empty(),
            "topology integrity broken: {:?}",
            self.topology.integrity_violations()
        );
        result
    }

    // ─── Tick ────────────────────────────────────────────────────────────

    /// One tick: queued commands, then GDP, ICRP and forwarding in that
    /// order, each seeing the state left by the one before.
    pub fn tick_core(&mut self) -> TickResult {
        let applied_commands = self.drain_pending();

        let now = self.clock.begin_tick();
        let window_ms = self.config.expiry_window_ms(self.clock.period_ms());

        let discovery = discovery::run_discovery(&mut self.topology, now, window_ms, &mut self.log);
        let exchange = routing::run_exchange(
            &mut self.topology,
            now,
            self.config.route_cost_ceiling,
            &mut self.log,
        );
        let forwarding = self.forwarding.run(&self.topology, now, &mut self.log);

        tracing::debug!(
            tick = now.tick,
            time_ms = now.time_ms,
            commands = applied_commands,
            discovered = discovery.discovered,
            expired = discovery.expired,
            route_changes = exchange.changes(),
            delivered = forwarding.delivered.len(),
            dropped = forwarding.dropped.len(),
            in_flight = self.forwarding.moving_count(),
            "tick complete"
        );

        TickResult {
            tick: now.tick,
            time_ms: now.time_ms,
            applied_commands,
            discovery,
            exchange,
            forwarding,
        }
    }

    /// Feed elapsed wall time; runs every tick that became due, until a
    /// queued stop drained by one of those ticks halts the clock.
    pub fn advance(&mut self, elapsed_ms: f64) -> Vec<TickResult> {
        let due = self.clock.advance(elapsed_ms);
        let mut results = Vec::with_capacity(due as usize);
        for _ in 0..due {
            if !results.is_empty() && !self.clock.is_running() {
                break;
            }
            results.push(self.tick_core());
        }
        results
    }
}
