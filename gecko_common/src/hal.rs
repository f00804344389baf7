//! Hardware proxy abstractions.
//!
//! The control loop never talks to I2C or PWM drivers directly. It drives
//! capability traits ("can be sampled", "can be driven") so that real
//! drivers and the simulated bench in `gecko_hal` are interchangeable.

pub mod error;
pub mod proxy;
pub mod types;

pub use error::{ActuatorError, SensorError};
pub use proxy::{DiscreteValve, InertialSensor, ProportionalValve, ProxySet, Sensor};
pub use types::Vector3;
