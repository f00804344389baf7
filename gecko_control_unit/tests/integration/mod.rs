//! Shared rig for the integration tests.

mod comm;
mod dispatch;
mod gait;
mod modes;
mod startup;

use gecko_common::control_unit::config::ControlUnitConfig;
use gecko_common::mode::Mode;
use gecko_common::pattern::{Pattern, PatternRow};
use gecko_control_unit::comm::OperatorLink;
use gecko_control_unit::context::ControlContext;
use gecko_control_unit::error::{ControlError, DispatchError};
use gecko_control_unit::modes::build_dispatcher;
use gecko_hal::{BenchConfig, BenchProbe, SimBench};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub type RunResult = Result<Mode, DispatchError<ControlError>>;

/// Short holds so a whole gait session takes a few tens of milliseconds.
pub const FAST_HOLD: f64 = 0.004;

pub const WAIT: Duration = Duration::from_secs(2);

/// Default robot, 1 ms period, fast gait transitions.
pub fn fast_config() -> ControlUnitConfig {
    let mut config = ControlUnitConfig::default();
    config.gait.transition_in_holds = [FAST_HOLD, FAST_HOLD];
    config.gait.transition_out_holds = [FAST_HOLD, FAST_HOLD];
    config
}

/// Two-row crawl stand-in for the default 8+4 robot.
pub fn fast_pattern() -> Pattern {
    let row = |refs: [f64; 8], dvalves: [bool; 4]| PatternRow::new(refs.to_vec(), dvalves.to_vec(), FAST_HOLD);
    Pattern::new(vec![
        row([0.6, 0.0, 0.0, 0.6, 0.0, 0.0, 0.0, 0.0], [true, false, false, false]),
        row([0.0, 0.6, 0.6, 0.0, 0.0, 0.0, 0.0, 0.0], [false, false, false, true]),
    ])
    .unwrap()
}

/// Dispatcher running on its own thread.
pub struct Rig {
    pub link: OperatorLink,
    pub probe: BenchProbe,
    handle: JoinHandle<(RunResult, ControlContext)>,
}

impl Rig {
    pub fn start(config: ControlUnitConfig) -> Self {
        Self::start_with(config, BenchConfig::default())
    }

    pub fn start_with(config: ControlUnitConfig, bench: BenchConfig) -> Self {
        let bench = SimBench::new(&config.hardware, bench);
        let mut ctx = ControlContext::new(&config, bench.proxies()).unwrap();
        let link = OperatorLink::new(ctx.shared());
        let start = config.start_mode;
        let route = config.route_faults_to_error;
        let handle = thread::spawn(move || {
            let mut dispatcher = build_dispatcher(start, route);
            let result = dispatcher.run(&mut ctx);
            (result, ctx)
        });
        let rig = Self {
            link,
            probe: bench.probe(),
            handle,
        };
        assert!(rig.link.wait_running(start, WAIT), "loop never started");
        rig
    }

    /// Request `mode` and wait for the loop to run it.
    pub fn switch(&self, mode: Mode) {
        assert!(self.link.request_mode(mode), "request for {mode} refused");
        assert!(self.link.wait_running(mode, WAIT), "loop never reached {mode}");
    }

    /// Let `n` sampling periods pass.
    pub fn periods(&self, n: u32) {
        thread::sleep(self.link.sampling_period() * n);
    }

    /// Poll `cond` once per period until it holds or `WAIT` runs out.
    pub fn wait_for(&self, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            self.periods(1);
        }
        cond()
    }

    /// Wait for the dispatcher to return on its own.
    pub fn join(self) -> (RunResult, ControlContext) {
        self.handle.join().expect("dispatcher thread panicked")
    }

    /// Request `EXIT` and wait for the dispatcher to return.
    pub fn finish(self) -> (RunResult, ControlContext) {
        self.link.request_mode(Mode::Exit);
        self.join()
    }
}
