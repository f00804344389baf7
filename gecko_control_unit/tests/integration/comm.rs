//! Integration test: operator endpoints driving the running loop.

use gecko_common::mode::Mode;
use gecko_control_unit::comm::{
    Button, CommEndpoint, CommThread, EndpointStatus, Led, OperatorLink, OperatorPanel,
    PanelEndpoint, Script, ScriptEndpoint,
};
use gecko_common::control_unit::config::ControlUnitConfig;
use gecko_control_unit::context::ControlContext;
use gecko_control_unit::error::CommError;
use gecko_control_unit::modes::terminal;
use gecko_hal::{BenchConfig, SimBench};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Rig, fast_config};

#[test]
fn script_runs_a_session_and_exits() {
    let rig = Rig::start(fast_config());
    let script = Script::parse(
        r#"
exit_when_done = true

[[step]]
command = "request_mode"
mode = "USER_CONTROL"

[[step]]
command = "wait_running"
mode = "USER_CONTROL"

[[step]]
command = "set_duty"
valve = "6"
value = 0.45

[[step]]
at = 0.05
command = "request_mode"
mode = "PAUSE"

[[step]]
command = "wait_running"
mode = "PAUSE"
"#,
    )
    .unwrap();

    let comm = CommThread::spawn(ScriptEndpoint::new(script), rig.link.clone()).unwrap();
    let probe = rig.probe.clone();
    let (result, _ctx) = rig.join();
    comm.join().unwrap();

    assert_eq!(result.unwrap(), Mode::Quit);
    assert_eq!(probe.valve_writes("6").map(|w| w > 0), Some(true));
    assert_eq!(probe.valve_cleanups("6"), Some(1));
}

#[test]
fn script_error_requests_exit() {
    let rig = Rig::start(fast_config());
    let script = Script::parse("[[step]]\ncommand = \"select_pattern\"\nname = \"missing\"").unwrap();
    let comm = CommThread::spawn(ScriptEndpoint::new(script), rig.link.clone()).unwrap();
    let (result, _ctx) = rig.join();
    comm.join().unwrap();
    assert_eq!(result.unwrap(), Mode::Quit);
}

#[test]
fn kill_shuts_the_loop_down() {
    struct Idle;
    impl CommEndpoint for Idle {
        fn name(&self) -> &str {
            "idle"
        }
        fn poll(&mut self, _link: &OperatorLink) -> Result<EndpointStatus, CommError> {
            Ok(EndpointStatus::Continue)
        }
    }

    let rig = Rig::start(fast_config());
    let comm = CommThread::spawn(Idle, rig.link.clone()).unwrap();
    rig.switch(Mode::UserReference);
    comm.kill();
    let (result, ctx) = rig.join();
    comm.join().unwrap();
    assert_eq!(result.unwrap(), Mode::Quit);
    assert!(ctx.is_released());
}

#[derive(Default)]
struct PanelState {
    buttons: [bool; 5],
    knobs: [f64; 7],
    switches: [bool; 4],
    leds: [bool; 5],
}

#[derive(Clone, Default)]
struct SharedPanel(Arc<Mutex<PanelState>>);

impl OperatorPanel for SharedPanel {
    fn button(&mut self, button: Button) -> Result<bool, CommError> {
        Ok(self.0.lock().buttons[button as usize])
    }
    fn analog_channels(&self) -> usize {
        7
    }
    fn analog(&mut self, channel: usize) -> Result<f64, CommError> {
        Ok(self.0.lock().knobs[channel])
    }
    fn switch_count(&self) -> usize {
        4
    }
    fn switch(&mut self, index: usize) -> Result<bool, CommError> {
        Ok(self.0.lock().switches[index])
    }
    fn set_led(&mut self, led: Led, on: bool) -> Result<(), CommError> {
        self.0.lock().leds[led as usize] = on;
        Ok(())
    }
}

#[test]
fn panel_selects_mode_and_feeds_duties() {
    let rig = Rig::start(fast_config());
    let panel = SharedPanel::default();
    panel.0.lock().knobs = [0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.35];
    panel.0.lock().switches = [false, true, false, false];
    let comm = CommThread::spawn(PanelEndpoint::new(panel.clone()), rig.link.clone()).unwrap();

    panel.0.lock().buttons[Button::UserControl as usize] = true;
    assert!(rig.link.wait_running(Mode::UserControl, super::WAIT));
    assert!(rig.wait_for(|| rig.probe.valve_output("4") == Some(0.25)));
    assert!(rig.wait_for(|| rig.probe.dvalve_state("1") == Some(true)));
    assert!(rig.wait_for(|| panel.0.lock().leds[Led::UserControl as usize]));

    comm.kill();
    comm.join().unwrap();
    assert_eq!(rig.join().0.unwrap(), Mode::Quit);
}

/// Endpoint that raises `stopped` once its thread is winding down.
struct Flagging(Arc<AtomicBool>);

impl CommEndpoint for Flagging {
    fn name(&self) -> &str {
        "flagging"
    }
    fn poll(&mut self, _link: &OperatorLink) -> Result<EndpointStatus, CommError> {
        Ok(EndpointStatus::Continue)
    }
}

impl Drop for Flagging {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

fn supervised_rig() -> (ControlContext, gecko_hal::BenchProbe, CommThread, Arc<AtomicBool>) {
    let config = ControlUnitConfig::default();
    let bench = SimBench::new(&config.hardware, BenchConfig::default());
    let ctx = ControlContext::new(&config, bench.proxies()).unwrap();
    let stopped = Arc::new(AtomicBool::new(false));
    let comm = CommThread::spawn(Flagging(Arc::clone(&stopped)), OperatorLink::new(ctx.shared())).unwrap();
    (ctx, bench.probe(), comm, stopped)
}

#[test]
fn setup_failure_joins_endpoint_and_releases() {
    let (mut ctx, probe, comm, stopped) = supervised_rig();
    let result: Result<(), Box<dyn std::error::Error>> =
        terminal::supervise(&mut ctx, Some(comm), |_| Err("sched_setscheduler: EPERM".into()));

    assert!(result.unwrap_err().to_string().contains("EPERM"));
    assert!(stopped.load(Ordering::Acquire), "endpoint thread still running");
    assert!(ctx.is_released());
    assert_eq!(probe.valve_cleanups("0"), Some(1));
    assert_eq!(probe.dvalve_cleanups("3"), Some(1));
    assert_eq!(ctx.requested_mode(), Mode::Exit);
}

#[test]
fn clean_run_stops_endpoint_without_release() {
    let (mut ctx, probe, comm, stopped) = supervised_rig();
    let result: Result<(), CommError> = terminal::supervise(&mut ctx, Some(comm), |_| Ok(()));

    result.unwrap();
    assert!(stopped.load(Ordering::Acquire));
    assert!(!ctx.is_released());
    assert_eq!(probe.valve_cleanups("0"), Some(0));
}
