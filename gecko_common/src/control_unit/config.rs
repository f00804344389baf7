//! Configuration structures for the control unit.
//!
//! All config types use `serde::Deserialize` for TOML loading. Every field
//! has a default reproducing the commissioned robot, so an empty file is a
//! valid configuration. Bounds live in [`crate::consts`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    ANCHOR_PAIR, CYCLE_COUNT_LIMIT, DEFAULT_PATTERN_NAME, IDLE_OUTPUT, IMU_HOLD_OUTPUT,
    IMU_PID_GAINS, IMU_REFERENCE_SCALE_DEG, MAX_CONTROLLER_OUTPUT, MAX_PRESSURE, MAX_ROW_HOLD_S, PID_GAINS,
    SAMPLING_PERIOD_US, SAMPLING_PERIOD_US_MAX, SAMPLING_PERIOD_US_MIN, TRANSITION_IN_HOLDS,
    TRANSITION_OUT_HOLDS,
};
use crate::mode::Mode;
use crate::pattern::{GaitParameters, Pattern, PatternLayout, PatternLibrary, generate_pattern, preset};

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level control unit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlUnitConfig {
    #[serde(default)]
    pub shared: SharedConfig,

    /// Sampling period of every mode loop [µs] (default: 1000).
    #[serde(default = "default_sampling_period_us")]
    pub sampling_period_us: u64,

    /// Mode the dispatcher starts in (default: PAUSE).
    #[serde(default = "default_start_mode")]
    pub start_mode: Mode,

    /// Route handler failures into ERROR (→ PAUSE) instead of terminating.
    #[serde(default)]
    pub route_faults_to_error: bool,

    #[serde(default)]
    pub hardware: HardwareConfig,

    /// Pressure controllers, one instance per proportional valve.
    #[serde(default)]
    pub pid: PidConfig,

    #[serde(default)]
    pub imu_control: ImuControlConfig,

    #[serde(default)]
    pub gait: GaitConfig,

    /// Extra named patterns, added on top of the built-in library.
    #[serde(default)]
    pub patterns: Vec<PatternEntry>,

    /// Optional JSON pattern library merged after `patterns`.
    #[serde(default)]
    pub pattern_library: Option<PathBuf>,
}

fn default_sampling_period_us() -> u64 {
    SAMPLING_PERIOD_US
}
fn default_start_mode() -> Mode {
    Mode::Pause
}

impl Default for ControlUnitConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            sampling_period_us: default_sampling_period_us(),
            start_mode: default_start_mode(),
            route_faults_to_error: false,
            hardware: HardwareConfig::default(),
            pid: PidConfig::default(),
            imu_control: ImuControlConfig::default(),
            gait: GaitConfig::default(),
            patterns: Vec::new(),
            pattern_library: None,
        }
    }
}

impl ControlUnitConfig {
    #[inline]
    pub fn sampling_period(&self) -> Duration {
        Duration::from_micros(self.sampling_period_us)
    }

    /// Layout every pattern must have on this robot.
    #[inline]
    pub fn layout(&self) -> PatternLayout {
        PatternLayout::new(self.hardware.valves.len(), self.hardware.dvalves.len())
    }

    /// Validate parameter bounds and cross references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.sampling_period_us < SAMPLING_PERIOD_US_MIN
            || self.sampling_period_us > SAMPLING_PERIOD_US_MAX
        {
            return Err(invalid(format!(
                "sampling_period_us {} out of range [{}, {}]",
                self.sampling_period_us, SAMPLING_PERIOD_US_MIN, SAMPLING_PERIOD_US_MAX
            )));
        }
        if self.start_mode.is_terminal() {
            return Err(invalid("start_mode cannot be QUIT".to_string()));
        }

        self.hardware.validate()?;
        self.pid.validate("pid")?;
        self.imu_control.validate(&self.hardware)?;
        self.gait.validate(self.hardware.dvalves.len())?;

        // Builds every pattern source, which checks layouts and names.
        let library = self.build_library()?;
        if !library.contains(&self.gait.active_pattern) {
            return Err(invalid(format!(
                "gait.active_pattern '{}' is not in the pattern library",
                self.gait.active_pattern
            )));
        }
        Ok(())
    }

    /// Built-in library, then `[[patterns]]`, then the JSON library file.
    ///
    /// Every entry is checked against the robot layout. The built-in
    /// entries are dropped when the robot is not the 8+4 layout they
    /// were generated for.
    pub fn build_library(&self) -> Result<PatternLibrary, ConfigError> {
        let layout = self.layout();
        let mut library = PatternLibrary::default();
        if library.check_layout(layout).is_err() {
            warn!("Built-in patterns do not fit a {layout} robot, starting from an empty library");
            library = PatternLibrary::empty();
        }

        for entry in &self.patterns {
            let pattern = entry.resolve()?;
            pattern
                .check_layout(layout)
                .map_err(|e| invalid(format!("pattern '{}': {e}", entry.name)))?;
            if library.insert(entry.name.clone(), pattern).is_some() {
                debug!("Pattern '{}' replaces the built-in entry", entry.name);
            }
        }

        if let Some(path) = &self.pattern_library {
            let file = PatternLibrary::load_json(path).map_err(|e| invalid(e.to_string()))?;
            file.check_layout(layout)
                .map_err(|e| invalid(format!("{}: {e}", path.display())))?;
            for name in file.names() {
                if let Some(p) = file.get(name) {
                    library.insert(name, p.clone());
                }
            }
        }

        Ok(library)
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

// ─── Hardware ───────────────────────────────────────────────────────

/// Names of the hardware proxies and their electrical scaling.
///
/// A proportional valve is fed back by the sensor of the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default = "default_eight_names")]
    pub sensors: Vec<String>,
    #[serde(default = "default_eight_names")]
    pub valves: Vec<String>,
    #[serde(default = "default_four_names")]
    pub dvalves: Vec<String>,
    #[serde(default = "default_two_names")]
    pub imus: Vec<String>,
    /// Full-scale pressure [bar].
    #[serde(default = "default_max_pressure")]
    pub max_pressure: f64,
    /// Output that vents a chamber.
    #[serde(default = "default_idle_output")]
    pub idle_output: f64,
}

fn numbered(n: usize) -> Vec<String> {
    (0..n).map(|i| i.to_string()).collect()
}
fn default_eight_names() -> Vec<String> {
    numbered(8)
}
fn default_four_names() -> Vec<String> {
    numbered(4)
}
fn default_two_names() -> Vec<String> {
    numbered(2)
}
fn default_max_pressure() -> f64 {
    MAX_PRESSURE
}
fn default_idle_output() -> f64 {
    IDLE_OUTPUT
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            sensors: default_eight_names(),
            valves: default_eight_names(),
            dvalves: default_four_names(),
            imus: default_two_names(),
            max_pressure: default_max_pressure(),
            idle_output: default_idle_output(),
        }
    }
}

impl HardwareConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, names) in [
            ("sensors", &self.sensors),
            ("valves", &self.valves),
            ("dvalves", &self.dvalves),
            ("imus", &self.imus),
        ] {
            check_unique(kind, names)?;
        }
        if self.valves.is_empty() {
            return Err(invalid("hardware.valves cannot be empty".to_string()));
        }
        for valve in &self.valves {
            if !self.sensors.contains(valve) {
                return Err(invalid(format!(
                    "valve '{valve}' has no feedback sensor of the same name"
                )));
            }
        }
        if !(self.max_pressure > 0.0 && self.max_pressure.is_finite()) {
            return Err(invalid(format!(
                "hardware.max_pressure {} must be positive",
                self.max_pressure
            )));
        }
        if !self.idle_output.is_finite() {
            return Err(invalid("hardware.idle_output must be finite".to_string()));
        }
        Ok(())
    }
}

fn check_unique(kind: &str, names: &[String]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(invalid(format!("hardware.{kind}: empty name")));
        }
        if !seen.insert(name.as_str()) {
            return Err(invalid(format!("hardware.{kind}: duplicate name '{name}'")));
        }
    }
    Ok(())
}

// ─── Controllers ────────────────────────────────────────────────────

/// PID gains and saturation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    #[serde(default = "default_kp")]
    pub kp: f64,
    #[serde(default = "default_ki")]
    pub ki: f64,
    #[serde(default = "default_kd")]
    pub kd: f64,
    /// Derivative filter time constant [s] (0 = unfiltered).
    #[serde(default)]
    pub tf: f64,
    /// Anti-windup tracking time constant [s] (0 = disabled).
    #[serde(default)]
    pub tt: f64,
    /// Symmetric output bound (0 = unbounded).
    #[serde(default = "default_out_max")]
    pub out_max: f64,
}

fn default_kp() -> f64 {
    PID_GAINS[0]
}
fn default_ki() -> f64 {
    PID_GAINS[1]
}
fn default_kd() -> f64 {
    PID_GAINS[2]
}
fn default_out_max() -> f64 {
    MAX_CONTROLLER_OUTPUT
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: default_kp(),
            ki: default_ki(),
            kd: default_kd(),
            tf: 0.0,
            tt: 0.0,
            out_max: default_out_max(),
        }
    }
}

impl PidConfig {
    pub fn validate(&self, section: &str) -> Result<(), ConfigError> {
        let finite = [self.kp, self.ki, self.kd, self.tf, self.tt]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(invalid(format!("{section}: gains must be finite")));
        }
        if self.tf < 0.0 || self.tt < 0.0 {
            return Err(invalid(format!("{section}: tf and tt must be >= 0")));
        }
        if !(self.out_max >= 0.0 && self.out_max.is_finite()) {
            return Err(invalid(format!(
                "{section}: out_max {} must be >= 0",
                self.out_max
            )));
        }
        Ok(())
    }
}

/// IMU_CONTROL settings.
///
/// Only the first proportional valve is closed over the IMU angle; the
/// others hold `hold_output` for the whole mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuControlConfig {
    #[serde(default = "default_imu_pid")]
    pub pid: PidConfig,
    /// IMU indices either side of the first valve's joint.
    #[serde(default = "default_imu_pair")]
    pub imu_pair: [usize; 2],
    #[serde(default = "default_hold_output")]
    pub hold_output: f64,
    /// Operator reference → degrees.
    #[serde(default = "default_reference_scale")]
    pub reference_scale_deg: f64,
}

fn default_imu_pid() -> PidConfig {
    PidConfig {
        kp: IMU_PID_GAINS[0],
        ki: IMU_PID_GAINS[1],
        kd: IMU_PID_GAINS[2],
        ..PidConfig::default()
    }
}
fn default_imu_pair() -> [usize; 2] {
    [0, 1]
}
fn default_hold_output() -> f64 {
    IMU_HOLD_OUTPUT
}
fn default_reference_scale() -> f64 {
    IMU_REFERENCE_SCALE_DEG
}

impl Default for ImuControlConfig {
    fn default() -> Self {
        Self {
            pid: default_imu_pid(),
            imu_pair: default_imu_pair(),
            hold_output: default_hold_output(),
            reference_scale_deg: default_reference_scale(),
        }
    }
}

impl ImuControlConfig {
    pub fn validate(&self, hardware: &HardwareConfig) -> Result<(), ConfigError> {
        self.pid.validate("imu_control.pid")?;
        let [a, b] = self.imu_pair;
        if a == b {
            return Err(invalid("imu_control.imu_pair must name two IMUs".to_string()));
        }
        // A robot without IMUs simply cannot enter IMU_CONTROL.
        if !hardware.imus.is_empty() && (a >= hardware.imus.len() || b >= hardware.imus.len()) {
            return Err(invalid(format!(
                "imu_control.imu_pair {:?} out of range for {} IMUs",
                self.imu_pair,
                hardware.imus.len()
            )));
        }
        if !self.hold_output.is_finite() || !self.reference_scale_deg.is_finite() {
            return Err(invalid("imu_control: values must be finite".to_string()));
        }
        Ok(())
    }
}

// ─── Gait ───────────────────────────────────────────────────────────

/// Gait playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaitConfig {
    /// Cycles per confirm when not in infinite mode.
    #[serde(default = "default_cycle_count_limit")]
    pub cycle_count_limit: u32,
    /// Walk until confirm is cleared.
    #[serde(default = "default_infinite_mode")]
    pub infinite_mode: bool,
    /// Discrete valves asserted in the resting phase.
    #[serde(default = "default_anchor_pair")]
    pub anchor_pair: [usize; 2],
    #[serde(default = "default_transition_in")]
    pub transition_in_holds: [f64; 2],
    #[serde(default = "default_transition_out")]
    pub transition_out_holds: [f64; 2],
    /// Library entry played on confirm.
    #[serde(default = "default_active_pattern")]
    pub active_pattern: String,
}

fn default_cycle_count_limit() -> u32 {
    CYCLE_COUNT_LIMIT
}
fn default_infinite_mode() -> bool {
    true
}
fn default_anchor_pair() -> [usize; 2] {
    ANCHOR_PAIR
}
fn default_transition_in() -> [f64; 2] {
    TRANSITION_IN_HOLDS
}
fn default_transition_out() -> [f64; 2] {
    TRANSITION_OUT_HOLDS
}
fn default_active_pattern() -> String {
    DEFAULT_PATTERN_NAME.to_string()
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            cycle_count_limit: default_cycle_count_limit(),
            infinite_mode: default_infinite_mode(),
            anchor_pair: default_anchor_pair(),
            transition_in_holds: default_transition_in(),
            transition_out_holds: default_transition_out(),
            active_pattern: default_active_pattern(),
        }
    }
}

impl GaitConfig {
    pub fn validate(&self, n_dvalve: usize) -> Result<(), ConfigError> {
        if self.cycle_count_limit == 0 {
            return Err(invalid("gait.cycle_count_limit must be >= 1".to_string()));
        }
        let [a, b] = self.anchor_pair;
        if a == b || a >= n_dvalve || b >= n_dvalve {
            return Err(invalid(format!(
                "gait.anchor_pair {:?} invalid for {n_dvalve} discrete valves",
                self.anchor_pair
            )));
        }
        let holds = self
            .transition_in_holds
            .iter()
            .chain(self.transition_out_holds.iter());
        for hold in holds {
            if !(0.0..=MAX_ROW_HOLD_S).contains(hold) {
                return Err(invalid(format!("gait: invalid transition hold {hold}")));
            }
        }
        Ok(())
    }
}

// ─── Patterns ───────────────────────────────────────────────────────

/// One `[[patterns]]` entry. Exactly one source must be given.
///
/// ```toml
/// [[patterns]]
/// name = "slow"
/// gait = { pressures = [0.7, 0.7, 0.9, 0.9, 0.7, 0.7, 0.0, 0.0], t_move = 4.0 }
///
/// [[patterns]]
/// name = "old"
/// preset = "v2_2"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEntry {
    pub name: String,
    /// Explicit rows in stored form.
    #[serde(default)]
    pub rows: Option<Pattern>,
    /// Commissioned preset name.
    #[serde(default)]
    pub preset: Option<String>,
    /// Generated crawl gait.
    #[serde(default)]
    pub gait: Option<GaitParameters>,
}

impl PatternEntry {
    pub fn resolve(&self) -> Result<Pattern, ConfigError> {
        let err = |msg: String| invalid(format!("pattern '{}': {msg}", self.name));
        match (&self.rows, &self.preset, &self.gait) {
            (Some(rows), None, None) => Ok(rows.clone()),
            (None, Some(name), None) => {
                let params = preset(name).ok_or_else(|| err(format!("unknown preset '{name}'")))?;
                generate_pattern(&params).map_err(|e| err(e.to_string()))
            }
            (None, None, Some(params)) => generate_pattern(params).map_err(|e| err(e.to_string())),
            _ => Err(err("exactly one of rows, preset, gait is required".to_string())),
        }
    }
}
