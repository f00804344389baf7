//! Integration test: actuation policy of each sampling mode.

use gecko_common::hal::Vector3;
use gecko_common::mode::Mode;
use gecko_hal::drivers::simulation::SimFault;

use super::{Rig, fast_config};

#[test]
fn user_control_writes_duty_tasks_verbatim() {
    let rig = Rig::start(fast_config());
    rig.switch(Mode::UserControl);
    rig.link.set_duty("2", 0.33).unwrap();
    rig.link.set_dvalve("3", true).unwrap();

    assert!(rig.wait_for(|| rig.probe.valve_output("2") == Some(0.33)));
    assert!(rig.wait_for(|| rig.probe.dvalve_state("3") == Some(true)));
    let snap = rig.link.telemetry();
    assert_eq!(snap.outputs["2"], 0.33);
    assert_eq!(snap.references["2"], None);
    assert!(snap.dvalves["3"]);
    rig.finish().0.unwrap();
}

#[test]
fn user_reference_proportional_unbounded() {
    let mut config = fast_config();
    config.pid.kp = 1.0;
    config.pid.ki = 0.0;
    config.pid.kd = 0.0;
    config.pid.tf = 0.0;
    config.pid.tt = 0.0;
    config.pid.out_max = 0.0;
    let rig = Rig::start(config);
    rig.probe.pin_pressure("1", Some(0.2));
    rig.switch(Mode::UserReference);
    rig.link.set_reference("1", 0.9).unwrap();

    assert!(rig.wait_for(|| {
        rig.probe
            .valve_output("1")
            .is_some_and(|out| (out - 0.7).abs() < 1e-9)
    }));
    assert_eq!(rig.link.telemetry().references["1"], Some(0.9));
    rig.finish().0.unwrap();
}

#[test]
fn user_reference_output_is_bounded() {
    let mut config = fast_config();
    config.pid.kp = 1.0;
    config.pid.ki = 0.0;
    config.pid.kd = 0.0;
    config.pid.out_max = 0.25;
    let rig = Rig::start(config);
    rig.probe.pin_pressure("0", Some(0.0));
    rig.switch(Mode::UserReference);
    rig.link.set_reference("0", 0.8).unwrap();
    assert!(rig.wait_for(|| rig.probe.valve_output("0") == Some(0.25)));
    rig.finish().0.unwrap();
}

#[test]
fn pause_idles_every_valve() {
    let config = fast_config();
    let idle = config.hardware.idle_output;
    let rig = Rig::start(config);
    rig.switch(Mode::UserControl);
    rig.link.set_duties(&[0.4; 8]);
    assert!(rig.wait_for(|| rig.probe.valve_output("7") == Some(0.4)));

    rig.switch(Mode::Pause);
    for name in ["0", "3", "7"] {
        assert_eq!(rig.probe.valve_output(name), Some(idle));
    }
    rig.finish().0.unwrap();
}

#[test]
fn transient_faults_keep_the_loop_running() {
    let rig = Rig::start(fast_config());
    rig.probe.pin_pressure("5", Some(0.3));
    rig.periods(5);
    rig.probe.inject_sensor_fault("5", SimFault::RemoteIo, 20);
    rig.probe.pin_pressure("5", Some(0.7));
    rig.periods(5);

    assert_eq!(rig.link.running_mode(), Mode::Pause);
    // Eventually the queued faults drain and fresh samples arrive.
    assert!(rig.wait_for(|| rig.link.telemetry().sensors["5"] == 0.7));
    rig.finish().0.unwrap();
}

#[test]
fn imu_control_drives_only_the_first_valve() {
    let config = fast_config();
    let hold = config.imu_control.hold_output;
    let rig = Rig::start(config);
    rig.probe.set_acceleration("0", Vector3::new(0.0, -1.0, 0.0));
    rig.probe.set_acceleration("1", Vector3::new(0.0, -1.0, 0.0));
    rig.link.set_reference("0", 0.5).unwrap();
    rig.switch(Mode::ImuControl);

    assert!(rig.wait_for(|| rig.link.telemetry().imu_angle.is_some()));
    rig.periods(5);
    for name in ["1", "2", "7"] {
        assert_eq!(rig.probe.valve_output(name), Some(hold), "valve {name}");
    }
    let out = rig.probe.valve_output("0").unwrap();
    assert!(out > hold, "joint valve output {out}");
    assert_eq!(rig.link.telemetry().references["0"], Some(45.0));

    rig.switch(Mode::Pause);
    assert_eq!(rig.link.telemetry().imu_angle, None);
    rig.finish().0.unwrap();
}

#[test]
fn imu_control_without_imus_fails() {
    let mut config = fast_config();
    config.hardware.imus.clear();
    let rig = Rig::start(config);
    rig.link.request_mode(Mode::ImuControl);
    let (result, _ctx) = rig.join();
    assert!(result.is_err());
}
