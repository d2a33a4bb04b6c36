// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Configuration

//! Simulation parameters.
//!
//! Protocol constants (TTL, dead-peer multiplier) default to the values the
//! protocols are defined with. Everything else is presentation pacing.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hop budget every message starts with unless a send overrides it.
pub const DEFAULT_TTL: u32 = 10;

/// A gateway must miss this many announcement windows before a standard
/// node forgets it.
pub const DEFAULT_DEAD_PEER_MULTIPLIER: u32 = 3;

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Initial clock period in milliseconds.
    pub tick_period_ms: u64,
    pub min_tick_period_ms: u64,
    pub max_tick_period_ms: u64,
    /// GDP expiry window = multiplier x current tick period.
    pub dead_peer_multiplier: u32,
    pub initial_ttl: u32,
    /// How long delivered/dropped messages stay visible before removal.
    pub terminal_grace_ms: u64,
    /// Optional distance-vector infinity. `None` keeps the unbounded
    /// refresh behaviour, count-to-infinity included.
    pub route_cost_ceiling: Option<u32>,
    /// Upper bound on ticks fired by a single `advance` call.
    pub max_catch_up_ticks: u32,
    /// Seed for the gateway-selection PRNG.
    pub rng_seed: u64,
    /// Retained log entries. `None` keeps everything.
    pub log_capacity: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1000,
            min_tick_period_ms: 100,
            max_tick_period_ms: 2000,
            dead_peer_multiplier: DEFAULT_DEAD_PEER_MULTIPLIER,
            initial_ttl: DEFAULT_TTL,
            terminal_grace_ms: 2000,
            route_cost_ceiling: None,
            max_catch_up_ticks: 5,
            rng_seed: 0,
            log_capacity: None,
        }
    }
}

impl SimConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self { rng_seed: seed, ..Self::default() }
    }

    /// Parse a (possibly partial) JSON object; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_tick_period_ms == 0 || self.min_tick_period_ms > self.max_tick_period_ms {
            return Err(ConfigError::InvalidPeriodBounds {
                min_ms: self.min_tick_period_ms,
                max_ms: self.max_tick_period_ms,
            });
        }
        if !self.period_in_bounds(self.tick_period_ms) {
            return Err(ConfigError::PeriodOutOfRange {
                period_ms: self.tick_period_ms,
                min_ms: self.min_tick_period_ms,
                max_ms: self.max_tick_period_ms,
            });
        }
        if self.dead_peer_multiplier == 0 {
            return Err(ConfigError::ZeroDeadPeerMultiplier);
        }
        if self.max_catch_up_ticks == 0 {
            return Err(ConfigError::ZeroCatchUp);
        }
        Ok(())
    }

    pub fn period_in_bounds(&self, period_ms: u64) -> bool {
        (self.min_tick_period_ms..=self.max_tick_period_ms).contains(&period_ms)
    }

    /// Silence after which a gateway entry expires, for a given period.
    pub fn expiry_window_ms(&self, period_ms: u64) -> u64 {
        period_ms.saturating_mul(self.dead_peer_multiplier as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
