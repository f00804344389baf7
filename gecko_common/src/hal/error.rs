//! Error types for hardware proxies.
//!
//! Sensor faults come in two classes. A remote I/O fault (the sensor bus
//! did not answer this time) is tolerated by the control loop, which keeps
//! the previous sample. Every other fault aborts the running mode.

use std::io;
use thiserror::Error;

/// Error returned by a sampled device (pressure sensor or IMU).
#[derive(Debug, Error)]
pub enum SensorError {
    /// Transient bus failure (`EREMOTEIO`). Tolerated.
    #[error("remote I/O error on sensor [{name}]")]
    RemoteIo {
        /// Sensor name.
        name: String,
    },

    /// Any other bus error reported by the driver.
    #[error("bus error on sensor [{name}]: {source}")]
    Bus {
        /// Sensor name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Device vanished from the bus or multiplexer.
    #[error("sensor [{0}] disconnected")]
    Disconnected(String),

    /// Reading outside of the physically possible range.
    #[error("sensor [{name}] reading {value} out of range")]
    OutOfRange {
        /// Sensor name.
        name: String,
        /// Offending raw value.
        value: f64,
    },
}

impl SensorError {
    /// Classify an OS error raised while reading sensor `name`.
    ///
    /// `EREMOTEIO` maps to [`SensorError::RemoteIo`], everything else to
    /// [`SensorError::Bus`].
    pub fn from_io(name: &str, err: io::Error) -> Self {
        if is_remote_io(&err) {
            Self::RemoteIo {
                name: name.to_string(),
            }
        } else {
            Self::Bus {
                name: name.to_string(),
                source: err,
            }
        }
    }

    /// `true` for the fault class the control loop rides through.
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteIo { .. })
    }
}

#[cfg(target_os = "linux")]
fn is_remote_io(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EREMOTEIO)
}

#[cfg(not(target_os = "linux"))]
fn is_remote_io(_err: &io::Error) -> bool {
    false
}

/// Error returned by a driven device (proportional or discrete valve).
///
/// Always fatal for the running mode.
#[derive(Debug, Error)]
pub enum ActuatorError {
    /// Output could not be written.
    #[error("failed to drive actuator [{name}]: {source}")]
    Write {
        /// Actuator name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Actuator was released and can no longer be driven.
    #[error("actuator [{0}] already released")]
    Released(String),
}
