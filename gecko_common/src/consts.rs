//! System-wide constants for the GeckoBot workspace.
//!
//! Single source of truth for defaults and bounds. Values mirror the
//! tuning of the robot as it was commissioned.

/// Default sampling period in microseconds (1 kHz).
pub const SAMPLING_PERIOD_US: u64 = 1000;

/// Smallest accepted sampling period [µs].
pub const SAMPLING_PERIOD_US_MIN: u64 = 100;

/// Largest accepted sampling period [µs].
pub const SAMPLING_PERIOD_US_MAX: u64 = 100_000;

/// Full-scale pressure of the chamber sensors [bar].
pub const MAX_PRESSURE: f64 = 0.85;

/// Controller output bound (PID saturation) [10 V].
pub const MAX_CONTROLLER_OUTPUT: f64 = 0.50;

/// Output written to a proportional valve when it should vent.
pub const IDLE_OUTPUT: f64 = 0.01;

/// Output held on the non-controlled valves in IMU_CONTROL.
pub const IMU_HOLD_OUTPUT: f64 = 0.20;

/// Operator reference to degrees scale in IMU_CONTROL.
pub const IMU_REFERENCE_SCALE_DEG: f64 = 90.0;

/// Default pressure PID gains `[P, I, D]`.
pub const PID_GAINS: [f64; 3] = [1.05, 0.03, 0.01];

/// Default angle PID gains `[P, I, D]`.
pub const IMU_PID_GAINS: [f64; 3] = [1.05 / 90.0, 0.03 * 20.0, 0.01];

/// Number of pattern cycles per confirm session when not walking forever.
pub const CYCLE_COUNT_LIMIT: u32 = 3;

/// Discrete valves asserted while the robot rests between cycles.
pub const ANCHOR_PAIR: [usize; 2] = [1, 2];

/// Transition-in holds [s]: settle with feet released, then anchor.
pub const TRANSITION_IN_HOLDS: [f64; 2] = [2.0, 0.66];

/// Transition-out holds [s]: stay anchored, then vent everything.
pub const TRANSITION_OUT_HOLDS: [f64; 2] = [2.0, 0.25];

/// Longest hold a pattern row may ask for [s].
pub const MAX_ROW_HOLD_S: f64 = 3600.0;

/// Default pattern library entry name.
pub const DEFAULT_PATTERN_NAME: &str = "default";

/// Operator-uploaded pattern library entry name.
pub const CUSTOM_PATTERN_NAME: &str = "custom";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gecko/control_unit.toml";
