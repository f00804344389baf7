//! `PAUSE`: every valve idle, sensors keep being sampled.

use gecko_common::mode::Mode;

use crate::context::ControlContext;
use crate::error::ControlError;

pub fn run(ctx: &mut ControlContext) -> Result<Mode, ControlError> {
    let mode = Mode::Pause;
    ctx.enter(mode);
    ctx.idle_valves()?;
    ctx.publish_outputs();

    while ctx.keep_running(mode) {
        ctx.begin_period();
        ctx.sample_sensors()?;
        ctx.end_period();
    }
    Ok(ctx.leave(mode))
}
