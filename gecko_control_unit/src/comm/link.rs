//! The operator's handle on the shared context.

use gecko_common::consts::CUSTOM_PATTERN_NAME;
use gecko_common::mode::Mode;
use gecko_common::pattern::{GaitParameters, Pattern, generate_pattern};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::context::{GaitStatus, Roster, SharedContext, TelemetrySnapshot};
use crate::error::{ContextError, ProxyKind};

/// Cheap to clone; every method is one lock or one atomic operation.
#[derive(Debug, Clone)]
pub struct OperatorLink {
    shared: Arc<SharedContext>,
}

impl OperatorLink {
    pub fn new(shared: Arc<SharedContext>) -> Self {
        Self { shared }
    }

    #[inline]
    pub fn roster(&self) -> &Roster {
        self.shared.roster()
    }

    #[inline]
    pub fn sampling_period(&self) -> Duration {
        self.shared.sampling_period()
    }

    // ─── Modes ──────────────────────────────────────────────────

    /// Ask the loop to switch to `mode`. `false` once shutdown is underway.
    pub fn request_mode(&self, mode: Mode) -> bool {
        let accepted = self.shared.request_mode(mode);
        if accepted {
            debug!("Operator requested {mode}");
        } else {
            debug!("Request for {mode} refused, shutting down");
        }
        accepted
    }

    #[inline]
    pub fn requested_mode(&self) -> Mode {
        self.shared.requested_mode()
    }

    #[inline]
    pub fn running_mode(&self) -> Mode {
        self.shared.running_mode()
    }

    /// Block until the loop runs `mode`, polling once per sampling period.
    /// Returns `false` on timeout.
    pub fn wait_running(&self, mode: Mode, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.running_mode() == mode {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.sampling_period());
        }
    }

    // ─── Task Maps ──────────────────────────────────────────────

    /// Pressure reference of valve `name`.
    pub fn set_reference(&self, name: &str, value: f64) -> Result<(), ContextError> {
        let idx = self.roster().index_of(ProxyKind::Valve, name)?;
        self.shared.tasks.write().references[idx] = value;
        Ok(())
    }

    /// Direct output of valve `name`, used by `USER_CONTROL`.
    pub fn set_duty(&self, name: &str, value: f64) -> Result<(), ContextError> {
        let idx = self.roster().index_of(ProxyKind::Valve, name)?;
        self.shared.tasks.write().duties[idx] = value;
        Ok(())
    }

    /// Requested state of discrete valve `name`.
    pub fn set_dvalve(&self, name: &str, on: bool) -> Result<(), ContextError> {
        let idx = self.roster().index_of(ProxyKind::DiscreteValve, name)?;
        self.shared.tasks.write().dvalves[idx] = on;
        Ok(())
    }

    /// Write the first `values.len()` references in valve order.
    pub fn set_references(&self, values: &[f64]) {
        let mut tasks = self.shared.tasks.write();
        for (slot, &v) in tasks.references.iter_mut().zip(values) {
            *slot = v;
        }
    }

    /// Write the first `values.len()` duties in valve order.
    pub fn set_duties(&self, values: &[f64]) {
        let mut tasks = self.shared.tasks.write();
        for (slot, &v) in tasks.duties.iter_mut().zip(values) {
            *slot = v;
        }
    }

    /// Write the first `values.len()` discrete tasks in order.
    pub fn set_dvalves(&self, values: &[bool]) {
        let mut tasks = self.shared.tasks.write();
        for (slot, &v) in tasks.dvalves.iter_mut().zip(values) {
            *slot = v;
        }
    }

    // ─── Gait ───────────────────────────────────────────────────

    pub fn set_confirm(&self, on: bool) {
        self.shared.gait.lock().confirm = on;
    }

    /// Flip `confirm`; returns the new value.
    pub fn toggle_confirm(&self) -> bool {
        let mut g = self.shared.gait.lock();
        g.confirm = !g.confirm;
        g.confirm
    }

    pub fn set_infinite_mode(&self, on: bool) {
        self.shared.gait.lock().infinite_mode = on;
    }

    /// Flip `infinite_mode`; returns the new value.
    pub fn toggle_infinite_mode(&self) -> bool {
        let mut g = self.shared.gait.lock();
        g.infinite_mode = !g.infinite_mode;
        g.infinite_mode
    }

    pub fn set_cycle_count_limit(&self, limit: u32) {
        self.shared.gait.lock().cycle_count_limit = limit;
    }

    /// Make library entry `name` the active pattern from the next cycle on.
    pub fn select_pattern(&self, name: &str) -> Result<(), ContextError> {
        self.shared.gait.lock().select(name)?;
        info!("Active pattern is now '{name}'");
        Ok(())
    }

    /// Store `pattern` under `name` after checking it fits the robot.
    pub fn upload_pattern(&self, name: &str, pattern: Pattern) -> Result<(), ContextError> {
        pattern.check_layout(self.roster().layout())?;
        self.shared.gait.lock().store(name, pattern);
        info!("Pattern '{name}' stored");
        Ok(())
    }

    /// Generate a crawl gait from `params`, store it as the custom pattern
    /// and make it active.
    pub fn set_custom_pattern(&self, params: &GaitParameters) -> Result<(), ContextError> {
        let pattern = generate_pattern(params)?;
        pattern.check_layout(self.roster().layout())?;
        let mut g = self.shared.gait.lock();
        g.store(CUSTOM_PATTERN_NAME, pattern);
        g.select(CUSTOM_PATTERN_NAME)
    }

    pub fn pattern_names(&self) -> Vec<String> {
        self.shared
            .gait
            .lock()
            .library
            .names()
            .map(str::to_string)
            .collect()
    }

    // ─── Monitoring ─────────────────────────────────────────────

    pub fn gait_status(&self) -> GaitStatus {
        self.shared.gait()
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.shared.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GaitState;
    use gecko_common::pattern::{PatternLibrary, PatternRow, preset};

    fn link(n_valve: usize) -> OperatorLink {
        let names = |n: usize| (0..n).map(|i| i.to_string()).collect::<Vec<_>>();
        let roster = Roster::new(names(n_valve), names(n_valve), names(4), names(2)).unwrap();
        let library = if n_valve == 8 {
            PatternLibrary::default()
        } else {
            let mut l = PatternLibrary::empty();
            let row = PatternRow::new(vec![0.0; n_valve], vec![false; 4], 0.1);
            l.insert("default", Pattern::new(vec![row]).unwrap());
            l
        };
        let gait = GaitState::new(library, "default", 3, false).unwrap();
        let shared = SharedContext::new(roster, Duration::from_millis(1), Mode::Pause, gait);
        OperatorLink::new(Arc::new(shared))
    }

    #[test]
    fn task_writes_by_name() {
        let l = link(8);
        l.set_reference("3", 0.7).unwrap();
        l.set_duty("0", 0.2).unwrap();
        l.set_dvalve("2", true).unwrap();
        let tasks = l.shared.tasks();
        assert_eq!(tasks.references[3], 0.7);
        assert_eq!(tasks.duties[0], 0.2);
        assert!(tasks.dvalves[2]);

        assert!(matches!(
            l.set_reference("x", 1.0),
            Err(ContextError::UnknownName { kind: ProxyKind::Valve, .. })
        ));
        assert!(l.set_dvalve("4", true).is_err());
    }

    #[test]
    fn partial_slice_writes() {
        let l = link(8);
        l.set_references(&[0.1, 0.2]);
        let tasks = l.shared.tasks();
        assert_eq!(&tasks.references[..3], &[0.1, 0.2, 0.0]);
    }

    #[test]
    fn toggles() {
        let l = link(8);
        assert!(l.toggle_confirm());
        assert!(!l.toggle_confirm());
        assert!(l.toggle_infinite_mode());
        assert!(l.gait_status().infinite_mode);
    }

    #[test]
    fn custom_pattern_becomes_active() {
        let l = link(8);
        let params = preset("v2_5").unwrap();
        l.set_custom_pattern(&params).unwrap();
        let status = l.gait_status();
        assert_eq!(status.active_pattern, CUSTOM_PATTERN_NAME);
        assert!(status.custom_pattern_flag);
    }

    #[test]
    fn upload_checks_layout() {
        let l = link(2);
        let wrong = generate_pattern(&preset("v3_0").unwrap()).unwrap();
        assert!(matches!(l.upload_pattern("crawl", wrong), Err(ContextError::Pattern(_))));

        let row = PatternRow::new(vec![0.3, 0.4], vec![true, false, false, true], 0.5);
        l.upload_pattern("two", Pattern::new(vec![row]).unwrap()).unwrap();
        assert!(l.pattern_names().contains(&"two".to_string()));
        l.select_pattern("two").unwrap();
        assert_eq!(l.gait_status().active_pattern, "two");
    }

    #[test]
    fn wait_running_times_out() {
        let l = link(8);
        assert!(l.wait_running(Mode::Pause, Duration::ZERO));
        assert!(!l.wait_running(Mode::UserControl, Duration::from_millis(5)));
    }
}
