//! `IMU_CONTROL`: a demonstration mode for one joint.
//!
//! Only the first valve is controlled. Its PID tracks the bending angle
//! measured between the configured IMU pair against the operator's first
//! reference task scaled to degrees. Every other valve holds a fixed output
//! set once on entry.

use gecko_common::imu::calc_angle;
use gecko_common::mode::Mode;

use crate::context::ControlContext;
use crate::error::ControlError;

/// Valve driven by the angle loop.
const JOINT_VALVE: usize = 0;

pub fn run(ctx: &mut ControlContext) -> Result<Mode, ControlError> {
    let mode = Mode::ImuControl;
    let imu = ctx.settings().imu.clone();
    let [a, b] = imu.imu_pair;
    if ctx.n_valve() == 0 || a >= ctx.n_imu() || b >= ctx.n_imu() {
        return Err(ControlError::ImuUnavailable {
            pair: imu.imu_pair,
            n_imu: ctx.n_imu(),
        });
    }

    ctx.enter(mode);
    ctx.reset_controllers();
    for valve in 0..ctx.n_valve() {
        ctx.drive(valve, imu.hold_output)?;
    }

    let mut refs = vec![0.0; ctx.n_valve()];
    let mut duties = vec![0.0; ctx.n_valve()];
    let mut dvalves = vec![false; ctx.n_dvalve()];

    while ctx.keep_running(mode) {
        ctx.begin_period();
        ctx.sample_sensors()?;
        ctx.sample_imus()?;
        ctx.load_tasks(&mut refs, &mut duties, &mut dvalves);

        let (angle, _) = calc_angle(ctx.acceleration(a), ctx.acceleration(b));
        ctx.track_angle(JOINT_VALVE, refs[JOINT_VALVE] * imu.reference_scale_deg, angle)?;
        ctx.set_dvalves(&dvalves)?;
        ctx.publish_outputs();
        ctx.publish_imu_angle(Some(angle));
        ctx.end_period();
    }
    ctx.publish_imu_angle(None);
    Ok(ctx.leave(mode))
}
