//! `REFERENCE_TRACKING`: gait sessions on operator confirm.
//!
//! Between sessions the valves sit idle with every discrete valve off,
//! and the reference tasks are reset so that a later `USER_REFERENCE`
//! does not start from stale setpoints.

use gecko_common::mode::Mode;

use crate::context::ControlContext;
use crate::error::ControlError;
use crate::gait;

pub fn run(ctx: &mut ControlContext) -> Result<Mode, ControlError> {
    let mode = Mode::ReferenceTracking;
    ctx.enter(mode);
    ctx.reset_controllers();

    while ctx.keep_running(mode) {
        ctx.clear_reference_tasks();
        gait::run_session(ctx, mode)?;

        ctx.begin_period();
        ctx.sample_sensors()?;
        ctx.idle_valves()?;
        ctx.release_dvalves()?;
        ctx.publish_outputs();
        ctx.end_period();
    }
    Ok(ctx.leave(mode))
}
