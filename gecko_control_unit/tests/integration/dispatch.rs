//! Integration test: dispatcher lifecycle, shutdown and fault routing.

use gecko_common::mode::Mode;
use gecko_control_unit::error::DispatchError;
use gecko_control_unit::modes::terminal;
use gecko_hal::drivers::simulation::SimFault;

use super::{Rig, fast_config};

#[test]
fn exit_releases_everything_once_and_quits() {
    let config = fast_config();
    let rig = Rig::start(config.clone());
    rig.switch(Mode::UserControl);
    let probe = rig.probe.clone();

    let (result, mut ctx) = rig.finish();
    assert_eq!(result.unwrap(), Mode::Quit);
    for name in &config.hardware.valves {
        assert_eq!(probe.valve_cleanups(name), Some(1), "valve {name}");
        assert_eq!(probe.valve_output(name), Some(config.hardware.idle_output));
    }
    for name in &config.hardware.dvalves {
        assert_eq!(probe.dvalve_cleanups(name), Some(1), "dvalve {name}");
    }

    // A second EXIT neither fails nor releases again.
    assert_eq!(terminal::exit(&mut ctx).unwrap(), Mode::Quit);
    assert_eq!(probe.valve_cleanups("0"), Some(1));
}

#[test]
fn requests_after_exit_are_refused() {
    let rig = Rig::start(fast_config());
    assert!(rig.link.request_mode(Mode::Exit));
    assert!(!rig.link.request_mode(Mode::UserReference));
    let (result, _ctx) = rig.join();
    assert_eq!(result.unwrap(), Mode::Quit);
}

#[test]
fn mode_changes_are_observed_in_order() {
    let rig = Rig::start(fast_config());
    for mode in [
        Mode::UserControl,
        Mode::UserReference,
        Mode::ReferenceTracking,
        Mode::ImuControl,
        Mode::Pause,
    ] {
        rig.switch(mode);
        assert_eq!(rig.link.running_mode(), mode);
    }
    let (result, _ctx) = rig.finish();
    assert_eq!(result.unwrap(), Mode::Quit);
}

#[test]
fn fatal_sensor_fault_propagates_by_default() {
    let rig = Rig::start(fast_config());
    rig.switch(Mode::UserReference);
    rig.probe.inject_sensor_fault("4", SimFault::Disconnected, 1);

    let (result, mut ctx) = rig.join();
    match result {
        Err(DispatchError::Handler { mode, .. }) => assert_eq!(mode, "USER_REFERENCE"),
        other => panic!("expected handler failure, got {other:?}"),
    }
    // The caller can still release the hardware.
    assert_eq!(terminal::exit(&mut ctx).unwrap(), Mode::Quit);
    assert!(ctx.is_released());
}

#[test]
fn routed_fault_goes_through_error_to_pause() {
    let mut config = fast_config();
    config.route_faults_to_error = true;
    let rig = Rig::start(config);
    rig.switch(Mode::UserControl);
    rig.probe.inject_sensor_fault("2", SimFault::Disconnected, 1);

    assert!(rig.link.wait_running(Mode::Pause, super::WAIT));
    let fault = rig.link.telemetry().last_fault.expect("fault recorded");
    assert_eq!(fault.mode, Mode::UserControl);
    assert!(fault.message.contains("[2]"), "{}", fault.message);

    let (result, _ctx) = rig.finish();
    assert_eq!(result.unwrap(), Mode::Quit);
}

#[test]
fn starts_in_configured_mode() {
    let mut config = fast_config();
    config.start_mode = Mode::UserReference;
    let rig = Rig::start(config);
    assert_eq!(rig.link.running_mode(), Mode::UserReference);
    let (result, _ctx) = rig.finish();
    assert_eq!(result.unwrap(), Mode::Quit);
}
