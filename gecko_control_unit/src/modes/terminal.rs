//! `ERROR` and `EXIT`. Neither loops.

use gecko_common::mode::Mode;
use tracing::{error, info, warn};

use crate::comm::CommThread;
use crate::context::ControlContext;
use crate::error::{CommError, ControlError};

/// Report the last recorded fault and fall back to `PAUSE`.
pub fn error(ctx: &mut ControlContext) -> Result<Mode, ControlError> {
    ctx.enter(Mode::Error);
    match ctx.last_fault() {
        Some(fault) => error!("Fault in {}: {}", fault.mode, fault.message),
        None => warn!("No fault recorded"),
    }
    Ok(Mode::Pause)
}

/// Idle and release every valve, then `QUIT`. Safe to run twice.
pub fn exit(ctx: &mut ControlContext) -> Result<Mode, ControlError> {
    ctx.enter(Mode::Exit);
    ctx.release()?;
    info!("Ready to quit");
    Ok(Mode::Quit)
}

/// Run `body` with `comm` polling alongside, then shut both down.
///
/// On success the endpoint is stopped and joined. On failure it is
/// killed, `EXIT` releases the valves, and the endpoint is joined before
/// the failure is returned.
pub fn supervise<E, F>(ctx: &mut ControlContext, comm: Option<CommThread>, body: F) -> Result<(), E>
where
    E: From<CommError> + std::fmt::Display,
    F: FnOnce(&mut ControlContext) -> Result<(), E>,
{
    match body(ctx) {
        Ok(()) => {
            if let Some(comm) = comm {
                comm.stop();
                comm.join()?;
            }
            Ok(())
        }
        Err(e) => {
            error!("Control loop stopped: {e}");
            if let Some(comm) = &comm {
                comm.kill();
            }
            if let Err(release) = exit(ctx) {
                error!("Release after failure: {release}");
            }
            if let Some(comm) = comm {
                if let Err(join) = comm.join() {
                    error!("{join}");
                }
            }
            Err(e)
        }
    }
}
