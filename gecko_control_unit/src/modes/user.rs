//! `USER_CONTROL` and `USER_REFERENCE`: the operator's task maps drive the
//! valves directly or through one PID per valve.

use gecko_common::mode::Mode;

use crate::context::ControlContext;
use crate::error::ControlError;

/// Duty per valve straight from the duty task map.
pub fn control(ctx: &mut ControlContext) -> Result<Mode, ControlError> {
    let mode = Mode::UserControl;
    ctx.enter(mode);
    let mut refs = vec![0.0; ctx.n_valve()];
    let mut duties = vec![0.0; ctx.n_valve()];
    let mut dvalves = vec![false; ctx.n_dvalve()];

    while ctx.keep_running(mode) {
        ctx.begin_period();
        ctx.sample_sensors()?;
        ctx.load_tasks(&mut refs, &mut duties, &mut dvalves);
        for (valve, &duty) in duties.iter().enumerate() {
            ctx.drive(valve, duty)?;
        }
        ctx.set_dvalves(&dvalves)?;
        ctx.publish_outputs();
        ctx.end_period();
    }
    Ok(ctx.leave(mode))
}

/// Each valve's PID tracks its reference task.
pub fn reference(ctx: &mut ControlContext) -> Result<Mode, ControlError> {
    let mode = Mode::UserReference;
    ctx.enter(mode);
    ctx.reset_controllers();
    let mut refs = vec![0.0; ctx.n_valve()];
    let mut duties = vec![0.0; ctx.n_valve()];
    let mut dvalves = vec![false; ctx.n_dvalve()];

    while ctx.keep_running(mode) {
        ctx.begin_period();
        ctx.sample_sensors()?;
        ctx.load_tasks(&mut refs, &mut duties, &mut dvalves);
        for (valve, &r) in refs.iter().enumerate() {
            ctx.track(valve, r)?;
        }
        ctx.set_dvalves(&dvalves)?;
        ctx.publish_outputs();
        ctx.end_period();
    }
    Ok(ctx.leave(mode))
}
