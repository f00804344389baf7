//! Capability traits implemented by hardware drivers.
//!
//! Each proxy carries a stable name, unique within its collection. The
//! control loop addresses telemetry and operator tasks by that name.
//!
//! # Lifecycle
//!
//! 1. Constructed by process bootstrap (wiring tables live there)
//! 2. Moved into the control context, driven every sampling period
//! 3. `cleanup()` once, from the EXIT mode

use super::error::{ActuatorError, SensorError};
use super::types::Vector3;

/// A scalar sensor, e.g. a chamber pressure sensor [bar].
pub trait Sensor: Send {
    /// Stable name, unique among sensors.
    fn name(&self) -> &str;

    /// Take one sample. May block on the bus.
    fn read(&mut self) -> Result<f64, SensorError>;
}

/// A proportional (PWM) valve.
///
/// The output domain and its mapping to a PWM duty cycle are the
/// driver's business. The control loop writes controller output units.
pub trait ProportionalValve: Send {
    /// Stable name, unique among proportional valves.
    fn name(&self) -> &str;

    /// Command a new output.
    fn set_output(&mut self, output: f64) -> Result<(), ActuatorError>;

    /// Output that vents the chamber.
    fn idle_output(&self) -> f64;

    /// Release PWM resources. Must tolerate being called twice.
    fn cleanup(&mut self) -> Result<(), ActuatorError>;
}

/// An on/off valve (the suction cups of the feet).
pub trait DiscreteValve: Send {
    /// Stable name, unique among discrete valves.
    fn name(&self) -> &str;

    fn set_state(&mut self, on: bool) -> Result<(), ActuatorError>;

    /// Release GPIO resources. Must tolerate being called twice.
    fn cleanup(&mut self) -> Result<(), ActuatorError>;
}

/// A three-axis accelerometer.
pub trait InertialSensor: Send {
    /// Stable name, unique among inertial sensors.
    fn name(&self) -> &str;

    fn read_acceleration(&mut self) -> Result<Vector3, SensorError>;
}

/// Every proxy of one robot, in index order.
///
/// Built once by process bootstrap and moved into the control context.
#[derive(Default)]
pub struct ProxySet {
    pub sensors: Vec<Box<dyn Sensor>>,
    pub valves: Vec<Box<dyn ProportionalValve>>,
    pub dvalves: Vec<Box<dyn DiscreteValve>>,
    pub imus: Vec<Box<dyn InertialSensor>>,
}

impl ProxySet {
    /// Names per collection, in index order.
    pub fn names(&self) -> [Vec<String>; 4] {
        [
            self.sensors.iter().map(|s| s.name().to_string()).collect(),
            self.valves.iter().map(|v| v.name().to_string()).collect(),
            self.dvalves.iter().map(|d| d.name().to_string()).collect(),
            self.imus.iter().map(|i| i.name().to_string()).collect(),
        ]
    }
}

impl std::fmt::Debug for ProxySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [sensors, valves, dvalves, imus] = self.names();
        f.debug_struct("ProxySet")
            .field("sensors", &sensors)
            .field("valves", &valves)
            .field("dvalves", &dvalves)
            .field("imus", &imus)
            .finish()
    }
}
