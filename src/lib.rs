// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite

pub mod types;
pub mod error;
pub mod config;
pub mod clock;
pub mod event_log;
pub mod topology;
pub mod discovery;
pub mod routing;
pub mod forwarding;
pub mod simulation;
pub mod command;

pub use clock::SimTime;
pub use command::{Command, CommandOutcome};
pub use config::SimConfig;
pub use error::{CommandError, ConfigError};
pub use event_log::{EventLog, LogCategory, LogEntry};
pub use forwarding::MessageRequest;
pub use simulation::NetworkSimulation;
pub use types::*;

use wasm_bindgen::prelude::*;

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

// ─── WASM Interface ──────────────────────────────────────────────────────────

#[wasm_bindgen]
impl NetworkSimulation {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u32) -> Self {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        Self::from_seed(seed as u64)
    }

    /// Build from a partial JSON `SimConfig`; missing fields take defaults.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn js_with_config(config_json: &str) -> Result<NetworkSimulation, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let config = SimConfig::from_json(config_json).map_err(js_error)?;
        Ok(Self::build(config))
    }

    #[wasm_bindgen(js_name = createCluster)]
    pub fn js_create_cluster(&mut self, name: &str) -> Result<u32, JsValue> {
        self.create_cluster(name).map(|id| id.0).map_err(js_error)
    }

    #[wasm_bindgen(js_name = deleteCluster)]
    pub fn js_delete_cluster(&mut self, id: u32) -> Result<(), JsValue> {
        self.delete_cluster(ClusterId(id)).map_err(js_error)
    }

    #[wasm_bindgen(js_name = createNode)]
    pub fn js_create_node(&mut self, cluster: u32, name: &str, is_gateway: bool) -> Result<u32, JsValue> {
        self.create_node(ClusterId(cluster), name, is_gateway).map(|id| id.0).map_err(js_error)
    }

    #[wasm_bindgen(js_name = deleteNode)]
    pub fn js_delete_node(&mut self, id: u32) -> Result<(), JsValue> {
        self.delete_node(NodeId(id)).map_err(js_error)
    }

    #[wasm_bindgen(js_name = createGatewayLink)]
    pub fn js_create_gateway_link(&mut self, a: u32, b: u32) -> Result<u32, JsValue> {
        self.create_gateway_link(NodeId(a), NodeId(b)).map(|id| id.0).map_err(js_error)
    }

    #[wasm_bindgen(js_name = deleteGatewayLink)]
    pub fn js_delete_gateway_link(&mut self, id: u32) -> Result<(), JsValue> {
        self.delete_gateway_link(LinkId(id)).map_err(js_error)
    }

    #[wasm_bindgen(js_name = sendMessage)]
    pub fn js_send_message(
        &mut self,
        src_cluster: u32,
        src_name: &str,
        dst_cluster: u32,
        dst_name: &str,
        payload: &str,
    ) -> Result<u32, JsValue> {
        self.send_message(ClusterId(src_cluster), src_name, ClusterId(dst_cluster), dst_name, payload)
            .map(|id| id.0)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = setTickPeriod)]
    pub fn js_set_tick_period(&mut self, period_ms: u32) -> Result<(), JsValue> {
        self.set_tick_period(period_ms as u64).map_err(js_error)
    }

    #[wasm_bindgen(js_name = start)]
    pub fn js_start(&mut self) -> bool {
        self.start()
    }

    #[wasm_bindgen(js_name = stop)]
    pub fn js_stop(&mut self) -> bool {
        self.stop()
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn js_is_running(&self) -> bool {
        self.is_running()
    }

    /// Manual single step, regardless of whether the clock runs.
    #[wasm_bindgen(js_name = step)]
    pub fn tick(&mut self) -> JsValue {
        let result = self.tick_core();
        serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
    }

    /// Called from the animation loop with the wall time since the last call.
    #[wasm_bindgen(js_name = advance)]
    pub fn js_advance(&mut self, elapsed_ms: f64) -> JsValue {
        let results = self.advance(elapsed_ms);
        serde_wasm_bindgen::to_value(&results).unwrap_or(JsValue::NULL)
    }

    /// Run N ticks without returning results (fast batch mode for benchmarking)
    #[wasm_bindgen(js_name = runBatch)]
    pub fn run_batch(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.tick_core();
        }
    }

    /// Apply a JSON command now.
    pub fn execute(&mut self, command: JsValue) -> Result<JsValue, JsValue> {
        let command: Command = serde_wasm_bindgen::from_value(command).map_err(js_error)?;
        let outcome = self.apply(command).map_err(js_error)?;
        serde_wasm_bindgen::to_value(&outcome).map_err(js_error)
    }

    /// Queue a JSON command for the next tick boundary.
    #[wasm_bindgen(js_name = submit)]
    pub fn js_submit(&mut self, command: JsValue) -> Result<u32, JsValue> {
        let command: Command = serde_wasm_bindgen::from_value(command).map_err(js_error)?;
        Ok(self.submit(command) as u32)
    }

    #[wasm_bindgen(js_name = snapshot)]
    pub fn js_snapshot(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.snapshot()).unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(js_name = logSince)]
    pub fn js_log_since(&self, seq: u64) -> JsValue {
        serde_wasm_bindgen::to_value(&self.log_since(seq)).unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(js_name = nextLogSeq)]
    pub fn next_log_seq(&self) -> u64 {
        self.log.next_seq()
    }

    /// Reset simulation to initial state, keeping the configuration
    pub fn reset(&mut self) {
        *self = NetworkSimulation::build(self.config.clone());
    }
}
