//! Simulated proxies.
//!
//! Each device holds its index into the shared bench state and locks it
//! for the duration of one call.

use gecko_common::hal::{
    ActuatorError, DiscreteValve, InertialSensor, ProportionalValve, Sensor, SensorError, Vector3,
};
use std::io;
use tracing::trace;

use super::bench::{SharedBench, SimFault};

fn fault_error(name: &str, fault: SimFault) -> SensorError {
    match fault {
        SimFault::RemoteIo => SensorError::RemoteIo {
            name: name.to_string(),
        },
        SimFault::Disconnected => SensorError::Disconnected(name.to_string()),
    }
}

/// Pressure sensor reading the chamber of the same-named valve.
pub(super) struct SimSensor {
    name: String,
    idx: usize,
    bench: SharedBench,
}

impl SimSensor {
    pub fn new(name: &str, idx: usize, bench: SharedBench) -> Self {
        Self {
            name: name.to_string(),
            idx,
            bench,
        }
    }
}

impl Sensor for SimSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> Result<f64, SensorError> {
        let mut s = self.bench.lock();
        if let Some(fault) = s.sensors[self.idx].faults.pop_front() {
            return Err(fault_error(&self.name, fault));
        }
        s.advance();
        s.sensors[self.idx].reads += 1;
        Ok(s.sensors[self.idx]
            .pinned
            .unwrap_or_else(|| s.sensor_pressure(self.idx)))
    }
}

/// Proportional valve feeding one chamber.
pub(super) struct SimValve {
    name: String,
    idx: usize,
    idle_output: f64,
    bench: SharedBench,
}

impl SimValve {
    pub fn new(name: &str, idx: usize, idle_output: f64, bench: SharedBench) -> Self {
        Self {
            name: name.to_string(),
            idx,
            idle_output,
            bench,
        }
    }
}

impl ProportionalValve for SimValve {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_output(&mut self, output: f64) -> Result<(), ActuatorError> {
        let mut s = self.bench.lock();
        // Integrate up to now with the previous output before switching.
        s.advance();
        let slot = &mut s.valves[self.idx];
        if slot.released {
            return Err(ActuatorError::Released(self.name.clone()));
        }
        if slot.fail_next_write {
            slot.fail_next_write = false;
            return Err(ActuatorError::Write {
                name: self.name.clone(),
                source: io::Error::other("injected write fault"),
            });
        }
        slot.chamber.output = output;
        slot.writes += 1;
        Ok(())
    }

    fn idle_output(&self) -> f64 {
        self.idle_output
    }

    fn cleanup(&mut self) -> Result<(), ActuatorError> {
        let mut s = self.bench.lock();
        let slot = &mut s.valves[self.idx];
        slot.cleanups += 1;
        slot.released = true;
        trace!("Valve [{}] released", self.name);
        Ok(())
    }
}

/// Latching foot valve.
pub(super) struct SimDiscreteValve {
    name: String,
    idx: usize,
    bench: SharedBench,
}

impl SimDiscreteValve {
    pub fn new(name: &str, idx: usize, bench: SharedBench) -> Self {
        Self {
            name: name.to_string(),
            idx,
            bench,
        }
    }
}

impl DiscreteValve for SimDiscreteValve {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_state(&mut self, on: bool) -> Result<(), ActuatorError> {
        let mut s = self.bench.lock();
        if s.dvalves[self.idx].released {
            return Err(ActuatorError::Released(self.name.clone()));
        }
        s.record_dvalve(self.idx, on);
        let slot = &mut s.dvalves[self.idx];
        slot.on = on;
        slot.writes += 1;
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), ActuatorError> {
        let mut s = self.bench.lock();
        let slot = &mut s.dvalves[self.idx];
        slot.cleanups += 1;
        slot.released = true;
        slot.on = false;
        Ok(())
    }
}

/// Accelerometer.
pub(super) struct SimImu {
    name: String,
    idx: usize,
    bench: SharedBench,
}

impl SimImu {
    pub fn new(name: &str, idx: usize, bench: SharedBench) -> Self {
        Self {
            name: name.to_string(),
            idx,
            bench,
        }
    }
}

impl InertialSensor for SimImu {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_acceleration(&mut self) -> Result<Vector3, SensorError> {
        let mut s = self.bench.lock();
        if let Some(fault) = s.imus[self.idx].faults.pop_front() {
            return Err(fault_error(&self.name, fault));
        }
        s.advance();
        s.imus[self.idx].reads += 1;
        Ok(s.imu_acceleration(self.idx))
    }
}
