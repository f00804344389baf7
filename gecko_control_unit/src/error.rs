//! Error types of the control unit.
//!
//! Handler failures ([`ControlError`]) unwind out of the running mode and
//! the dispatcher wraps them in [`DispatchError`]. Whether they end the
//! process or are routed into the ERROR mode is the dispatcher's
//! configuration.

use gecko_common::config::ConfigError;
use gecko_common::hal::{ActuatorError, SensorError};
use gecko_common::pattern::PatternError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Proxy collection an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Sensor,
    Valve,
    DiscreteValve,
    Imu,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sensor => "sensor",
            Self::Valve => "valve",
            Self::DiscreteValve => "discrete valve",
            Self::Imu => "IMU",
        })
    }
}

/// Building or addressing the shared context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Operator addressed a proxy that does not exist.
    #[error("unknown {kind} [{name}]")]
    UnknownName { kind: ProxyKind, name: String },

    /// Two proxies of one collection share a name.
    #[error("duplicate {kind} name [{name}]")]
    DuplicateName { kind: ProxyKind, name: String },

    /// Proportional valve without a same-named pressure sensor.
    #[error("valve [{0}] has no feedback sensor of the same name")]
    MissingFeedback(String),

    /// IMU pair does not fit the IMU collection.
    #[error("IMU pair {pair:?} out of range for {n_imu} IMUs")]
    ImuPair { pair: [usize; 2], n_imu: usize },

    /// Pattern name not in the library.
    #[error("unknown pattern '{0}'")]
    UnknownPattern(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A sensor failed fatally while taking the first sample.
    #[error("initial sample failed: {0}")]
    InitialSample(#[source] SensorError),
}

/// Failure inside a mode handler.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// IMU_CONTROL entered on a robot without the configured IMU pair.
    #[error("IMU_CONTROL needs IMUs {pair:?}, robot has {n_imu}")]
    ImuUnavailable { pair: [usize; 2], n_imu: usize },
}

/// Failure of the mode dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError<E: std::error::Error + 'static> {
    /// `run` called before `set_initial`.
    #[error("no initial mode set")]
    NoInitialMode,

    /// Requested mode has no registered handler.
    #[error("no handler registered for mode {0}")]
    NoHandler(String),

    /// Handler failed and no fault route caught it.
    #[error("handler for mode {mode} failed: {source}")]
    Handler {
        mode: String,
        #[source]
        source: E,
    },
}

/// Communication endpoint failures.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("failed to spawn communication thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("communication thread panicked")]
    Panicked,

    /// Operator panel hardware failed.
    #[error("panel {channel}: {message}")]
    Panel { channel: String, message: String },

    #[error("script: {0}")]
    Script(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Sampling pacer and RT setup failures.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT setup failed (mlockall, affinity, scheduler).
    #[error("RT setup error: {0}")]
    RtSetup(String),
}
