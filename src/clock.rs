// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Simulation Clock

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Simulated instant: tick count and simulated milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTime {
    pub tick: u64,
    pub time_ms: u64,
}

// ---------------------------------------------------------------------------
// SimulationClock
// ---------------------------------------------------------------------------

/// Periodic tick driver. Wall time is fed in from outside via `advance`;
/// simulated time moves by exactly one period per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationClock {
    period_ms: u64,
    min_period_ms: u64,
    max_period_ms: u64,
    running: bool,
    accumulated_ms: f64,
    max_catch_up_ticks: u32,
    now: SimTime,
}

impl SimulationClock {
    pub fn new(period_ms: u64, min_period_ms: u64, max_period_ms: u64, max_catch_up_ticks: u32) -> Self {
        Self {
            period_ms: period_ms.clamp(min_period_ms, max_period_ms),
            min_period_ms,
            max_period_ms,
            running: false,
            accumulated_ms: 0.0,
            max_catch_up_ticks: max_catch_up_ticks.max(1),
            now: SimTime::default(),
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns false if the clock was already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.accumulated_ms = 0.0;
        true
    }

    /// Returns false if the clock was already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.accumulated_ms = 0.0;
        true
    }

    /// Takes effect from the next tick.
    pub fn set_period(&mut self, period_ms: u64) -> Result<(), CommandError> {
        if !(self.min_period_ms..=self.max_period_ms).contains(&period_ms) {
            return Err(CommandError::PeriodOutOfRange {
                period_ms,
                min_ms: self.min_period_ms,
                max_ms: self.max_period_ms,
            });
        }
        self.period_ms = period_ms;
        Ok(())
    }

    /// Feed elapsed wall time and return how many ticks are now due.
    /// Backlog beyond `max_catch_up_ticks` is discarded.
    pub fn advance(&mut self, elapsed_ms: f64) -> u32 {
        if !self.running || !elapsed_ms.is_finite() || elapsed_ms <= 0.0 {
            return 0;
        }
        self.accumulated_ms += elapsed_ms;
        let period = self.period_ms as f64;
        let due = (self.accumulated_ms / period).floor();
        if due < 1.0 {
            return 0;
        }
        let cap = self.max_catch_up_ticks as f64;
        if due > cap {
            self.accumulated_ms = 0.0;
            self.max_catch_up_ticks
        } else {
            self.accumulated_ms -= due * period;
            due as u32
        }
    }

    /// Move simulated time forward by one period and return the new instant.
    pub fn begin_tick(&mut self) -> SimTime {
        self.now.tick += 1;
        self.now.time_ms += self.period_ms;
        self.now
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
