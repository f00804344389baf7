//! Common re-exports.
//!
//! ```rust
//! use gecko_common::prelude::*;
//! ```

pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::consts::*;
pub use crate::control_unit::config::{
    ControlUnitConfig, GaitConfig, HardwareConfig, ImuControlConfig, PatternEntry, PidConfig,
};
pub use crate::hal::{
    ActuatorError, DiscreteValve, InertialSensor, ProportionalValve, ProxySet, Sensor, SensorError,
    Vector3,
};
pub use crate::imu::calc_angle;
pub use crate::mode::{Mode, UnknownMode};
pub use crate::pattern::{
    GaitParameters, Pattern, PatternError, PatternLayout, PatternLibrary, PatternRow,
    generate_pattern,
};
