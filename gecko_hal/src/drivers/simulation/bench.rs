//! Shared bench state, the proxy factory and the test probe.

use gecko_common::control_unit::config::HardwareConfig;
use gecko_common::hal::{
    DiscreteValve, InertialSensor, ProportionalValve, ProxySet, Sensor, Vector3,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::chamber::{Chamber, ChamberModel};
use super::devices::{SimDiscreteValve, SimImu, SimSensor, SimValve};

/// Discrete valve transitions kept for inspection.
const DVALVE_LOG_CAPACITY: usize = 4096;

// ─── Configuration ──────────────────────────────────────────────────

/// Bench physics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Chamber model shared by every valve.
    #[serde(default)]
    pub chamber: ChamberModel,
    /// Gravity vector seen by every IMU at rest [g].
    #[serde(default = "default_gravity")]
    pub gravity: Vector3,
    /// Joint whose bending the IMU pair observes.
    #[serde(default = "default_joint")]
    pub joint: Option<JointCoupling>,
}

/// Couples one chamber's pressure to the angle between two IMUs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointCoupling {
    /// Index of the proportional valve that bends the joint.
    pub valve: usize,
    /// IMU indices either side of the joint; the second one rotates.
    pub imus: [usize; 2],
    /// Bending per bar of chamber pressure [deg/bar].
    pub deg_per_bar: f64,
}

fn default_gravity() -> Vector3 {
    Vector3::new(0.0, -1.0, 0.0)
}
fn default_joint() -> Option<JointCoupling> {
    Some(JointCoupling {
        valve: 0,
        imus: [0, 1],
        deg_per_bar: 90.0,
    })
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            chamber: ChamberModel::default(),
            gravity: default_gravity(),
            joint: default_joint(),
        }
    }
}

// ─── Shared State ───────────────────────────────────────────────────

/// Fault a simulated device reports on its next reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// Bus did not answer; tolerated by the control loop.
    RemoteIo,
    /// Device vanished; fatal for the running mode.
    Disconnected,
}

/// One discrete valve state change.
#[derive(Debug, Clone, PartialEq)]
pub struct DvalveEvent {
    /// When the change was written.
    pub at: Instant,
    /// Discrete valve name.
    pub name: String,
    /// New state.
    pub on: bool,
}

#[derive(Debug, Default)]
pub(super) struct ValveSlot {
    pub chamber: Chamber,
    pub writes: u64,
    pub cleanups: u32,
    pub released: bool,
    pub fail_next_write: bool,
}

#[derive(Debug, Default)]
pub(super) struct DvalveSlot {
    pub on: bool,
    pub writes: u64,
    pub cleanups: u32,
    pub released: bool,
}

#[derive(Debug, Default)]
pub(super) struct ReadSlot {
    pub faults: VecDeque<SimFault>,
    pub reads: u64,
    pub pinned: Option<f64>,
}

#[derive(Debug)]
pub(super) struct BenchState {
    pub config: BenchConfig,
    pub idle_output: f64,
    pub last_update: Instant,
    pub sensor_names: Vec<String>,
    pub valve_names: Vec<String>,
    pub dvalve_names: Vec<String>,
    pub imu_names: Vec<String>,
    pub sensors: Vec<ReadSlot>,
    pub valves: Vec<ValveSlot>,
    pub dvalves: Vec<DvalveSlot>,
    pub imus: Vec<ReadSlot>,
    pub imu_base: Vec<Vector3>,
    pub dvalve_log: VecDeque<DvalveEvent>,
}

impl BenchState {
    /// Bring every chamber up to `now`.
    pub fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_update);
        self.last_update = now;
        let model = self.config.chamber;
        for slot in &mut self.valves {
            slot.chamber.advance(&model, dt);
        }
    }

    /// Pressure seen by sensor `idx`: the chamber of the same-named valve.
    pub fn sensor_pressure(&self, idx: usize) -> f64 {
        let name = &self.sensor_names[idx];
        self.valve_names
            .iter()
            .position(|v| v == name)
            .map(|v| self.valves[v].chamber.pressure)
            .unwrap_or(0.0)
    }

    /// Acceleration seen by IMU `idx`.
    pub fn imu_acceleration(&self, idx: usize) -> Vector3 {
        let base = self.imu_base[idx];
        let Some(joint) = self.config.joint else {
            return base;
        };
        if joint.imus[1] != idx {
            return base;
        }
        let pressure = self
            .valves
            .get(joint.valve)
            .map(|v| v.chamber.pressure)
            .unwrap_or(0.0);
        rotate_xy(base, (joint.deg_per_bar * pressure).to_radians())
    }

    pub fn record_dvalve(&mut self, idx: usize, on: bool) {
        if self.dvalves[idx].on == on && self.dvalves[idx].writes > 0 {
            return;
        }
        if self.dvalve_log.len() == DVALVE_LOG_CAPACITY {
            self.dvalve_log.pop_front();
        }
        self.dvalve_log.push_back(DvalveEvent {
            at: Instant::now(),
            name: self.dvalve_names[idx].clone(),
            on,
        });
    }
}

fn rotate_xy(v: Vector3, angle: f64) -> Vector3 {
    let (s, c) = angle.sin_cos();
    Vector3::new(v.x * c - v.y * s, v.x * s + v.y * c, v.z)
}

pub(super) type SharedBench = Arc<Mutex<BenchState>>;

// ─── Bench ──────────────────────────────────────────────────────────

/// A simulated robot.
///
/// Hands out boxed proxies for the control context and a [`BenchProbe`]
/// for inspection. Both views share the same state.
pub struct SimBench {
    state: SharedBench,
}

impl SimBench {
    /// Build a bench with one device per name in `hardware`.
    pub fn new(hardware: &HardwareConfig, config: BenchConfig) -> Self {
        let n_imu = hardware.imus.len();
        let state = BenchState {
            idle_output: hardware.idle_output,
            last_update: Instant::now(),
            sensors: hardware.sensors.iter().map(|_| ReadSlot::default()).collect(),
            valves: hardware
                .valves
                .iter()
                .map(|_| ValveSlot {
                    chamber: Chamber {
                        pressure: 0.0,
                        output: hardware.idle_output,
                    },
                    ..ValveSlot::default()
                })
                .collect(),
            dvalves: hardware.dvalves.iter().map(|_| DvalveSlot::default()).collect(),
            imus: hardware.imus.iter().map(|_| ReadSlot::default()).collect(),
            imu_base: vec![config.gravity; n_imu],
            dvalve_log: VecDeque::new(),
            sensor_names: hardware.sensors.clone(),
            valve_names: hardware.valves.clone(),
            dvalve_names: hardware.dvalves.clone(),
            imu_names: hardware.imus.clone(),
            config,
        };
        info!(
            "Simulated bench: {} sensors, {} valves, {} discrete valves, {} IMUs",
            state.sensors.len(),
            state.valves.len(),
            state.dvalves.len(),
            state.imus.len()
        );
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Fresh proxies, one per device, in configuration order.
    pub fn proxies(&self) -> ProxySet {
        let s = self.state.lock();
        let idle_output = s.idle_output;
        let sensors: Vec<Box<dyn Sensor>> = s
            .sensor_names
            .iter()
            .enumerate()
            .map(|(i, n)| Box::new(SimSensor::new(n, i, self.state.clone())) as Box<dyn Sensor>)
            .collect();
        let valves: Vec<Box<dyn ProportionalValve>> = s
            .valve_names
            .iter()
            .enumerate()
            .map(|(i, n)| Box::new(SimValve::new(n, i, idle_output, self.state.clone())) as Box<dyn ProportionalValve>)
            .collect();
        let dvalves: Vec<Box<dyn DiscreteValve>> = s
            .dvalve_names
            .iter()
            .enumerate()
            .map(|(i, n)| Box::new(SimDiscreteValve::new(n, i, self.state.clone())) as Box<dyn DiscreteValve>)
            .collect();
        let imus: Vec<Box<dyn InertialSensor>> = s
            .imu_names
            .iter()
            .enumerate()
            .map(|(i, n)| Box::new(SimImu::new(n, i, self.state.clone())) as Box<dyn InertialSensor>)
            .collect();
        ProxySet {
            sensors,
            valves,
            dvalves,
            imus,
        }
    }

    /// Inspection and fault injection handle.
    pub fn probe(&self) -> BenchProbe {
        BenchProbe {
            state: self.state.clone(),
        }
    }
}

// ─── Probe ──────────────────────────────────────────────────────────

/// Read-side view of the bench plus fault injection.
///
/// Every lookup is by device name; unknown names yield `None` or are
/// ignored.
#[derive(Clone)]
pub struct BenchProbe {
    state: SharedBench,
}

impl BenchProbe {
    /// Current chamber pressure behind sensor `name` [bar].
    pub fn pressure(&self, name: &str) -> Option<f64> {
        let mut s = self.state.lock();
        s.advance();
        let idx = s.sensor_names.iter().position(|n| n == name)?;
        Some(s.sensor_pressure(idx))
    }

    /// Make sensor `name` report `value` regardless of the chamber.
    /// `None` restores the physics.
    pub fn pin_pressure(&self, name: &str, value: Option<f64>) {
        let mut s = self.state.lock();
        if let Some(idx) = s.sensor_names.iter().position(|n| n == name) {
            s.sensors[idx].pinned = value;
        }
    }

    /// Queue `count` faults on sensor `name`.
    pub fn inject_sensor_fault(&self, name: &str, fault: SimFault, count: usize) {
        let mut s = self.state.lock();
        if let Some(idx) = s.sensor_names.iter().position(|n| n == name) {
            s.sensors[idx].faults.extend(std::iter::repeat_n(fault, count));
            debug!("Injected {count} x {fault:?} on sensor [{name}]");
        }
    }

    /// Queue `count` faults on IMU `name`.
    pub fn inject_imu_fault(&self, name: &str, fault: SimFault, count: usize) {
        let mut s = self.state.lock();
        if let Some(idx) = s.imu_names.iter().position(|n| n == name) {
            s.imus[idx].faults.extend(std::iter::repeat_n(fault, count));
        }
    }

    /// Fail the next write to valve `name`.
    pub fn fail_next_valve_write(&self, name: &str) {
        let mut s = self.state.lock();
        if let Some(idx) = s.valve_names.iter().position(|n| n == name) {
            s.valves[idx].fail_next_write = true;
        }
    }

    /// Number of successful reads of sensor `name`.
    pub fn sensor_reads(&self, name: &str) -> Option<u64> {
        let s = self.state.lock();
        let idx = s.sensor_names.iter().position(|n| n == name)?;
        Some(s.sensors[idx].reads)
    }

    /// Last output written to valve `name`.
    pub fn valve_output(&self, name: &str) -> Option<f64> {
        let s = self.state.lock();
        let idx = s.valve_names.iter().position(|n| n == name)?;
        Some(s.valves[idx].chamber.output)
    }

    /// Number of writes to valve `name`.
    pub fn valve_writes(&self, name: &str) -> Option<u64> {
        let s = self.state.lock();
        let idx = s.valve_names.iter().position(|n| n == name)?;
        Some(s.valves[idx].writes)
    }

    /// Number of `cleanup()` calls on valve `name`.
    pub fn valve_cleanups(&self, name: &str) -> Option<u32> {
        let s = self.state.lock();
        let idx = s.valve_names.iter().position(|n| n == name)?;
        Some(s.valves[idx].cleanups)
    }

    /// Current state of discrete valve `name`.
    pub fn dvalve_state(&self, name: &str) -> Option<bool> {
        let s = self.state.lock();
        let idx = s.dvalve_names.iter().position(|n| n == name)?;
        Some(s.dvalves[idx].on)
    }

    /// Number of writes to discrete valve `name`.
    pub fn dvalve_writes(&self, name: &str) -> Option<u64> {
        let s = self.state.lock();
        let idx = s.dvalve_names.iter().position(|n| n == name)?;
        Some(s.dvalves[idx].writes)
    }

    /// Number of `cleanup()` calls on discrete valve `name`.
    pub fn dvalve_cleanups(&self, name: &str) -> Option<u32> {
        let s = self.state.lock();
        let idx = s.dvalve_names.iter().position(|n| n == name)?;
        Some(s.dvalves[idx].cleanups)
    }

    /// Discrete valve state changes, oldest first.
    pub fn dvalve_log(&self) -> Vec<DvalveEvent> {
        self.state.lock().dvalve_log.iter().cloned().collect()
    }

    /// Forget recorded discrete valve changes.
    pub fn clear_dvalve_log(&self) {
        self.state.lock().dvalve_log.clear();
    }

    /// Override the resting acceleration of IMU `name`.
    pub fn set_acceleration(&self, name: &str, acc: Vector3) {
        let mut s = self.state.lock();
        if let Some(idx) = s.imu_names.iter().position(|n| n == name) {
            s.imu_base[idx] = acc;
        }
    }
}
