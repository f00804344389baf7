//! State owned by the sampling thread.
//!
//! [`ControlContext`] holds the hardware proxies, the controllers and the
//! scratch buffers of the mode loops. Nothing here is shared; the
//! operator-visible part lives behind [`ControlContext::shared`].

use gecko_common::control_unit::config::{ControlUnitConfig, ImuControlConfig};
use gecko_common::hal::{ProxySet, SensorError, Vector3};
use gecko_common::mode::Mode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::shared::{FaultRecord, GaitState, Roster, SharedContext};
use crate::control::{Controller, PidController, PidGains};
use crate::cycle::Pacer;
use crate::dispatcher::Dispatchable;
use crate::error::{ContextError, ControlError};

/// Per-mode settings fixed at startup.
#[derive(Debug, Clone)]
pub struct ModeSettings {
    pub imu: ImuControlConfig,
    /// Discrete valves asserted in the resting phase.
    pub anchor_pair: [usize; 2],
    pub transition_in_holds: [f64; 2],
    pub transition_out_holds: [f64; 2],
}

impl ModeSettings {
    pub fn from_config(config: &ControlUnitConfig) -> Self {
        Self {
            imu: config.imu_control.clone(),
            anchor_pair: config.gait.anchor_pair,
            transition_in_holds: config.gait.transition_in_holds,
            transition_out_holds: config.gait.transition_out_holds,
        }
    }
}

/// The sampling loop's context.
pub struct ControlContext {
    shared: Arc<SharedContext>,
    hw: ProxySet,
    controllers: Vec<PidController>,
    imu_controller: PidController,
    /// Valve index → index of its feedback sensor.
    feedback: Vec<usize>,
    settings: ModeSettings,
    pacer: Pacer,
    released: bool,

    // Scratch, reused every period.
    samples: Vec<f64>,
    accelerations: Vec<Vector3>,
    outputs: Vec<f64>,
    references: Vec<Option<f64>>,
    dvalves: Vec<bool>,
}

impl ControlContext {
    /// Wire `hw` to the configuration and take a first sample.
    ///
    /// # Errors
    ///
    /// Name collisions, a valve without a same-named sensor, an IMU pair
    /// outside the IMU collection, a pattern library that does not fit
    /// the robot, or a fatal sensor fault during the first sample.
    pub fn new(config: &ControlUnitConfig, hw: ProxySet) -> Result<Self, ContextError> {
        let [sensors, valves, dvalves, imus] = hw.names();
        let roster = Roster::new(sensors, valves, dvalves, imus)?;

        let feedback = roster
            .valves
            .iter()
            .map(|v| {
                roster
                    .sensors
                    .iter()
                    .position(|s| s == v)
                    .ok_or_else(|| ContextError::MissingFeedback(v.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pair = config.imu_control.imu_pair;
        let n_imu = roster.imus.len();
        if n_imu > 0 && (pair[0] >= n_imu || pair[1] >= n_imu) {
            return Err(ContextError::ImuPair { pair, n_imu });
        }

        let library = config.build_library()?;
        library.check_layout(roster.layout())?;
        let gait = GaitState::new(
            library,
            &config.gait.active_pattern,
            config.gait.cycle_count_limit,
            config.gait.infinite_mode,
        )?;

        let period = config.sampling_period();
        let dt = period.as_secs_f64();
        let n_valve = roster.valves.len();
        let controllers = vec![PidController::new(PidGains::from(&config.pid), dt); n_valve];
        let imu_controller = PidController::new(PidGains::from(&config.imu_control.pid), dt);

        let mut ctx = Self {
            samples: vec![0.0; roster.sensors.len()],
            accelerations: vec![Vector3::default(); n_imu],
            outputs: vec![0.0; n_valve],
            references: vec![None; n_valve],
            dvalves: vec![false; roster.dvalves.len()],
            shared: Arc::new(SharedContext::new(roster, period, config.start_mode, gait)),
            hw,
            controllers,
            imu_controller,
            feedback,
            settings: ModeSettings::from_config(config),
            pacer: Pacer::new(period),
            released: false,
        };

        ctx.sample_sensors().map_err(initial_sample_error)?;
        if n_imu > 0 {
            ctx.sample_imus().map_err(initial_sample_error)?;
        }
        info!(
            "Control context ready: {} sensors, {} valves, {} discrete valves, {} IMUs",
            ctx.samples.len(),
            n_valve,
            ctx.dvalves.len(),
            n_imu
        );
        Ok(ctx)
    }

    // ─── Accessors ──────────────────────────────────────────────

    /// Handle for the operator side.
    pub fn shared(&self) -> Arc<SharedContext> {
        Arc::clone(&self.shared)
    }

    #[inline]
    pub fn roster(&self) -> &Roster {
        self.shared.roster()
    }

    #[inline]
    pub fn settings(&self) -> &ModeSettings {
        &self.settings
    }

    #[inline]
    pub fn sampling_period(&self) -> Duration {
        self.pacer.period()
    }

    #[inline]
    pub fn requested_mode(&self) -> Mode {
        self.shared.requested_mode()
    }

    #[inline]
    pub fn n_valve(&self) -> usize {
        self.outputs.len()
    }

    #[inline]
    pub fn n_dvalve(&self) -> usize {
        self.dvalves.len()
    }

    #[inline]
    pub fn n_imu(&self) -> usize {
        self.accelerations.len()
    }

    /// Last good sample of the sensor feeding back valve `valve`.
    #[inline]
    pub fn measured(&self, valve: usize) -> f64 {
        self.samples[self.feedback[valve]]
    }

    /// Last good acceleration of IMU `imu`.
    #[inline]
    pub fn acceleration(&self, imu: usize) -> Vector3 {
        self.accelerations[imu]
    }

    pub(crate) fn gait(&self) -> parking_lot::MutexGuard<'_, GaitState> {
        self.shared.gait.lock()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    // ─── Loop Skeleton ──────────────────────────────────────────

    /// Publish `mode` as running and reset the loop statistics.
    pub fn enter(&mut self, mode: Mode) {
        self.shared.set_running(mode);
        self.pacer.take_stats();
        info!("Arriving in {mode} state");
    }

    /// Log the loop statistics of `mode` and return the mode now requested.
    pub fn leave(&mut self, mode: Mode) -> Mode {
        let stats = self.pacer.take_stats();
        let next = self.requested_mode();
        debug!(
            "Leaving {mode} for {next}: {} periods, avg {} ns, max {} ns, {} overruns",
            stats.count,
            stats.avg_ns(),
            if stats.count == 0 { 0 } else { stats.max_ns },
            stats.overruns
        );
        next
    }

    /// Loop-top check: keep going while `mode` is still requested.
    #[inline]
    pub fn keep_running(&self, mode: Mode) -> bool {
        self.shared.requested_mode() == mode
    }

    #[inline]
    pub fn begin_period(&mut self) {
        self.pacer.begin();
    }

    #[inline]
    pub fn end_period(&mut self) {
        self.pacer.wait();
    }

    /// End the period, but never sleep past `deadline`.
    #[inline]
    pub fn end_period_by(&mut self, deadline: std::time::Instant) {
        self.pacer.wait_until(deadline);
    }

    /// Sleep one full sampling period.
    pub fn idle_period(&mut self) {
        self.pacer.begin();
        self.pacer.wait();
    }

    // ─── Sampling ───────────────────────────────────────────────

    /// Sample every sensor into the telemetry map.
    ///
    /// A remote I/O fault keeps the previous value. Any other fault aborts.
    pub fn sample_sensors(&mut self) -> Result<(), ControlError> {
        for (sensor, slot) in self.hw.sensors.iter_mut().zip(self.samples.iter_mut()) {
            match sensor.read() {
                Ok(value) => *slot = value,
                Err(e) if e.is_transient() => {
                    warn!("Can't read sensor [{}], continuing with stale value: {e}", sensor.name());
                }
                Err(e) => {
                    error!("Sensor [{}]: {e}", sensor.name());
                    return Err(e.into());
                }
            }
        }
        self.shared
            .telemetry
            .write()
            .sensors
            .copy_from_slice(&self.samples);
        Ok(())
    }

    /// Sample every IMU, with the same fault policy as the sensors.
    pub fn sample_imus(&mut self) -> Result<(), ControlError> {
        for (imu, slot) in self.hw.imus.iter_mut().zip(self.accelerations.iter_mut()) {
            match imu.read_acceleration() {
                Ok(acc) => *slot = acc,
                Err(e) if e.is_transient() => {
                    warn!("Can't read IMU [{}], continuing with stale value: {e}", imu.name());
                }
                Err(e) => {
                    error!("IMU [{}]: {e}", imu.name());
                    return Err(e.into());
                }
            }
        }
        self.shared
            .telemetry
            .write()
            .imus
            .copy_from_slice(&self.accelerations);
        Ok(())
    }

    // ─── Actuation ──────────────────────────────────────────────

    /// Copy the operator's tasks into `refs`, `duties` and `dvalves`
    /// under one read lock.
    pub fn load_tasks(&self, refs: &mut [f64], duties: &mut [f64], dvalves: &mut [bool]) {
        let tasks = self.shared.tasks.read();
        refs.copy_from_slice(&tasks.references);
        duties.copy_from_slice(&tasks.duties);
        dvalves.copy_from_slice(&tasks.dvalves);
    }

    /// Command `output` on valve `valve`, open loop.
    pub fn drive(&mut self, valve: usize, output: f64) -> Result<(), ControlError> {
        self.hw.valves[valve].set_output(output)?;
        self.outputs[valve] = output;
        self.references[valve] = None;
        Ok(())
    }

    /// Close the loop on valve `valve` towards `reference` with its own
    /// PID controller.
    pub fn track(&mut self, valve: usize, reference: f64) -> Result<f64, ControlError> {
        let measured = self.measured(valve);
        let output = self.controllers[valve].output(reference, measured);
        self.hw.valves[valve].set_output(output)?;
        self.outputs[valve] = output;
        self.references[valve] = Some(reference);
        Ok(output)
    }

    /// Close the loop on valve `valve` with the IMU controller.
    pub fn track_angle(&mut self, valve: usize, reference_deg: f64, angle_deg: f64) -> Result<f64, ControlError> {
        let output = self.imu_controller.output(reference_deg, angle_deg);
        self.hw.valves[valve].set_output(output)?;
        self.outputs[valve] = output;
        self.references[valve] = Some(reference_deg);
        Ok(output)
    }

    /// Command every valve's idle output.
    pub fn idle_valves(&mut self) -> Result<(), ControlError> {
        for (i, valve) in self.hw.valves.iter_mut().enumerate() {
            let idle = valve.idle_output();
            valve.set_output(idle)?;
            self.outputs[i] = idle;
            self.references[i] = None;
        }
        Ok(())
    }

    /// Command every discrete valve from `targets`.
    pub fn set_dvalves(&mut self, targets: &[bool]) -> Result<(), ControlError> {
        for ((dvalve, slot), &on) in self.hw.dvalves.iter_mut().zip(self.dvalves.iter_mut()).zip(targets) {
            dvalve.set_state(on)?;
            *slot = on;
        }
        Ok(())
    }

    /// Switch every discrete valve off.
    pub fn release_dvalves(&mut self) -> Result<(), ControlError> {
        for (dvalve, slot) in self.hw.dvalves.iter_mut().zip(self.dvalves.iter_mut()) {
            dvalve.set_state(false)?;
            *slot = false;
        }
        Ok(())
    }

    /// Publish commanded outputs, references and discrete states.
    pub fn publish_outputs(&self) {
        let mut t = self.shared.telemetry.write();
        t.outputs.copy_from_slice(&self.outputs);
        t.references.copy_from_slice(&self.references);
        t.dvalves.copy_from_slice(&self.dvalves);
    }

    pub fn publish_imu_angle(&self, angle: Option<f64>) {
        self.shared.telemetry.write().imu_angle = angle;
    }

    /// Forget every controller's history.
    pub fn reset_controllers(&mut self) {
        for c in &mut self.controllers {
            c.reset();
        }
        self.imu_controller.reset();
    }

    /// Reset the operator's reference tasks to 0.
    pub fn clear_reference_tasks(&self) {
        self.shared.tasks.write().references.fill(0.0);
    }

    // ─── Faults & Shutdown ──────────────────────────────────────

    /// Keep `message` for the ERROR mode.
    pub fn record_fault(&self, mode: Mode, message: String) {
        self.shared.telemetry.write().last_fault = Some(FaultRecord { mode, message });
    }

    pub fn last_fault(&self) -> Option<FaultRecord> {
        self.shared.telemetry.read().last_fault.clone()
    }

    /// Idle and release every valve. Runs once; later calls do nothing.
    ///
    /// Every release is attempted even if one fails; the first failure is
    /// returned.
    pub fn release(&mut self) -> Result<(), ControlError> {
        if self.released {
            debug!("Hardware already released");
            return Ok(());
        }
        self.released = true;

        let mut first: Option<ControlError> = None;
        for (i, valve) in self.hw.valves.iter_mut().enumerate() {
            let idle = valve.idle_output();
            let result = valve.set_output(idle).and_then(|()| valve.cleanup());
            self.outputs[i] = idle;
            self.references[i] = None;
            if let Err(e) = result {
                error!("Releasing valve [{}] failed: {e}", valve.name());
                first.get_or_insert(e.into());
            }
        }
        for (dvalve, slot) in self.hw.dvalves.iter_mut().zip(self.dvalves.iter_mut()) {
            *slot = false;
            if let Err(e) = dvalve.cleanup() {
                error!("Releasing discrete valve [{}] failed: {e}", dvalve.name());
                first.get_or_insert(e.into());
            }
        }
        self.publish_outputs();
        info!("Hardware released");
        first.map_or(Ok(()), Err)
    }
}

impl Dispatchable<Mode> for ControlContext {
    fn requested_mode(&self) -> Mode {
        self.shared.requested_mode()
    }

    fn install_mode(&mut self, from: Mode, next: Mode) -> Mode {
        self.shared.install_mode(from, next)
    }

    fn force_mode(&mut self, mode: Mode) {
        self.shared.force_mode(mode);
    }

    fn record_fault(&mut self, mode: Mode, message: String) {
        self.shared.telemetry.write().last_fault = Some(FaultRecord { mode, message });
    }
}

fn initial_sample_error(e: ControlError) -> ContextError {
    match e {
        ControlError::Sensor(s) => ContextError::InitialSample(s),
        other => ContextError::InitialSample(SensorError::Disconnected(other.to_string())),
    }
}
