//! Integration test: gait sessions in REFERENCE_TRACKING.

use gecko_common::mode::Mode;
use gecko_common::pattern::preset;

use super::{Rig, fast_config, fast_pattern};

fn on_events(rig: &Rig, name: &str) -> usize {
    rig.probe
        .dvalve_log()
        .iter()
        .filter(|e| e.name == name && e.on)
        .count()
}

#[test]
fn limited_session_plays_three_cycles_and_rests() {
    let config = fast_config();
    let idle = config.hardware.idle_output;
    let rig = Rig::start(config);
    rig.link.upload_pattern("fast", fast_pattern()).unwrap();
    rig.link.select_pattern("fast").unwrap();
    rig.link.set_cycle_count_limit(3);
    rig.link.set_infinite_mode(false);
    rig.switch(Mode::ReferenceTracking);
    rig.probe.clear_dvalve_log();

    rig.link.set_confirm(true);
    assert!(rig.wait_for(|| {
        let g = rig.link.gait_status();
        !g.confirm && !g.is_active && g.cycles_completed == 3
    }));
    rig.periods(3);

    assert_eq!(on_events(&rig, "0"), 3);
    assert_eq!(on_events(&rig, "3"), 3);
    assert_eq!(on_events(&rig, "1"), 2);
    for name in ["0", "1", "2", "3"] {
        assert_eq!(rig.probe.dvalve_state(name), Some(false));
    }
    for name in ["0", "1", "4"] {
        assert_eq!(rig.probe.valve_output(name), Some(idle));
    }
    assert_eq!(rig.link.running_mode(), Mode::ReferenceTracking);
    rig.finish().0.unwrap();
}

#[test]
fn infinite_session_runs_until_confirm_cleared() {
    let rig = Rig::start(fast_config());
    rig.link.upload_pattern("fast", fast_pattern()).unwrap();
    rig.link.select_pattern("fast").unwrap();
    rig.link.set_infinite_mode(true);
    rig.switch(Mode::ReferenceTracking);
    rig.link.set_confirm(true);

    assert!(rig.wait_for(|| rig.link.gait_status().cycles_completed >= 5));
    assert!(rig.link.gait_status().is_active);
    rig.link.set_confirm(false);
    assert!(rig.wait_for(|| !rig.link.gait_status().is_active));
    rig.finish().0.unwrap();
}

#[test]
fn mode_change_ends_session_with_transition_out() {
    let rig = Rig::start(fast_config());
    rig.link.upload_pattern("fast", fast_pattern()).unwrap();
    rig.link.select_pattern("fast").unwrap();
    rig.link.set_infinite_mode(true);
    rig.switch(Mode::ReferenceTracking);
    rig.link.set_confirm(true);
    assert!(rig.wait_for(|| rig.link.gait_status().cycles_completed >= 2));

    rig.switch(Mode::Pause);
    let g = rig.link.gait_status();
    assert!(!g.confirm);
    assert!(!g.is_active);
    assert_eq!(rig.probe.dvalve_state("1"), Some(false));
    rig.finish().0.unwrap();
}

#[test]
fn reference_tasks_reset_on_tracking_entry() {
    let rig = Rig::start(fast_config());
    rig.link.set_reference("2", 0.8).unwrap();
    rig.switch(Mode::ReferenceTracking);
    rig.periods(3);
    rig.switch(Mode::UserReference);
    rig.periods(3);
    assert_eq!(rig.link.telemetry().references["2"], Some(0.0));
    rig.finish().0.unwrap();
}

#[test]
fn custom_pattern_is_generated_for_the_robot() {
    let rig = Rig::start(fast_config());
    rig.link.set_custom_pattern(&preset("v2_6").unwrap()).unwrap();
    let g = rig.link.gait_status();
    assert!(g.custom_pattern_flag);
    assert_eq!(g.active_pattern, "custom");
    rig.finish().0.unwrap();
}
