//! Pneumatic chamber physics.
//!
//! Each proportional valve feeds one chamber. The chamber pressure follows
//! a first-order lag towards the pressure the valve opening would settle
//! at: `dp/dt = (p_target - p) / tau`, with `p_target` linear in the
//! commanded output and zero for any output at or below zero.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters shared by every chamber of the bench.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChamberModel {
    /// Pressure reached at full-scale output [bar].
    #[serde(default = "default_supply_pressure")]
    pub supply_pressure: f64,
    /// Fill/vent time constant [s].
    #[serde(default = "default_time_constant")]
    pub time_constant_s: f64,
    /// Controller output that opens the valve completely.
    #[serde(default = "default_full_scale_output")]
    pub full_scale_output: f64,
}

fn default_supply_pressure() -> f64 {
    1.2
}
fn default_time_constant() -> f64 {
    0.08
}
fn default_full_scale_output() -> f64 {
    0.5
}

impl Default for ChamberModel {
    fn default() -> Self {
        Self {
            supply_pressure: default_supply_pressure(),
            time_constant_s: default_time_constant(),
            full_scale_output: default_full_scale_output(),
        }
    }
}

impl ChamberModel {
    /// Steady-state pressure for a constant `output` [bar].
    pub fn settle_pressure(&self, output: f64) -> f64 {
        if self.full_scale_output <= 0.0 {
            return 0.0;
        }
        (output / self.full_scale_output).clamp(0.0, 1.0) * self.supply_pressure
    }
}

/// One inflatable chamber.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Chamber {
    /// Current pressure [bar].
    pub pressure: f64,
    /// Last commanded valve output.
    pub output: f64,
}

impl Chamber {
    /// Integrate the lag over `dt`.
    ///
    /// Exact discretization of the first-order lag, stable for any `dt`.
    pub fn advance(&mut self, model: &ChamberModel, dt: Duration) {
        let target = model.settle_pressure(self.output);
        let dt_s = dt.as_secs_f64();
        if model.time_constant_s <= 0.0 {
            self.pressure = target;
            return;
        }
        let decay = (-dt_s / model.time_constant_s).exp();
        self.pressure = target + (self.pressure - target) * decay;
    }
}
