//! Mode handlers and the dispatcher table wiring them.
//!
//! | Mode | Handler | Actuation |
//! |---|---|---|
//! | `PAUSE` | [`pause::run`] | all valves idle |
//! | `USER_CONTROL` | [`user::control`] | duty task per valve, discrete tasks |
//! | `USER_REFERENCE` | [`user::reference`] | PID per valve on the reference task |
//! | `IMU_CONTROL` | [`imu::run`] | first valve tracks an IMU angle, others hold |
//! | `REFERENCE_TRACKING` | [`tracking::run`] | gait sessions |
//! | `ERROR` | [`terminal::error`] | reports the last fault, then `PAUSE` |
//! | `EXIT` | [`terminal::exit`] | idle and release everything, then `QUIT` |
//! | `QUIT` | terminal | none |
//!
//! Every sampling handler has the same shape: publish the running mode,
//! set its entry outputs, then loop once per period while its mode is
//! requested, and return the mode that replaced it.

pub mod imu;
pub mod pause;
pub mod terminal;
pub mod tracking;
pub mod user;

use gecko_common::mode::Mode;

use crate::context::ControlContext;
use crate::dispatcher::Dispatcher;
use crate::error::ControlError;

/// The control unit's dispatcher.
pub type ModeDispatcher = Dispatcher<Mode, ControlContext, ControlError>;

/// Register every handler, starting in `start`. With `route_faults`,
/// handler failures go through `ERROR` instead of ending `run`.
pub fn build_dispatcher(start: Mode, route_faults: bool) -> ModeDispatcher {
    let mut d = Dispatcher::new();
    d.register(Mode::Pause, pause::run)
        .register(Mode::UserControl, user::control)
        .register(Mode::UserReference, user::reference)
        .register(Mode::ImuControl, imu::run)
        .register(Mode::ReferenceTracking, tracking::run)
        .register(Mode::Error, terminal::error)
        .register(Mode::Exit, terminal::exit)
        .register_terminal(Mode::Quit)
        .set_initial(start);
    if route_faults {
        d.route_faults_to(Mode::Error);
    }
    d
}
