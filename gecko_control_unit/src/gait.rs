//! Gait pattern playback.
//!
//! A session brackets steady-state cycling with two synthesized patterns:
//!
//! ```text
//!  confirm ──▶ transition-in ──▶ pattern × N ──▶ transition-out ──▶ rest
//!                (once)          (N < limit or infinite)   (if any cycle ran)
//! ```
//!
//! Every row is closed-loop: for the whole hold, each valve's PID tracks
//! the row's reference for that valve.

use gecko_common::mode::Mode;
use gecko_common::pattern::{Pattern, PatternError, PatternRow};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::context::ControlContext;
use crate::error::ControlError;

/// Play one row: set the discrete valves, then track the row's references
/// for at least `row.hold`.
///
/// The hold is checked once per sampling period and the last period is cut
/// at the deadline, so the row lasts `hold` plus at most one period.
/// A hold outside `[0, MAX_ROW_HOLD_S]` is rejected before any valve moves.
pub fn play_row(ctx: &mut ControlContext, row: &PatternRow) -> Result<(), ControlError> {
    let invalid = || PatternError::InvalidHold { row: 0, hold: row.hold };
    let hold = row.hold_duration().ok_or_else(invalid)?;
    ctx.set_dvalves(&row.dvalves)?;
    let start = Instant::now();
    let deadline = start.checked_add(hold).ok_or_else(invalid)?;

    loop {
        ctx.begin_period();
        ctx.sample_sensors()?;
        for (valve, &reference) in row.references.iter().enumerate() {
            ctx.track(valve, reference)?;
        }
        ctx.publish_outputs();
        if Instant::now() >= deadline {
            return Ok(());
        }
        ctx.end_period_by(deadline);
    }
}

/// Play every row of `pattern` in stored order.
pub fn play_pattern(ctx: &mut ControlContext, pattern: &Pattern) -> Result<(), ControlError> {
    for row in pattern.rows() {
        play_row(ctx, row)?;
    }
    Ok(())
}

/// One confirm session, run from REFERENCE_TRACKING.
///
/// Cycles while `confirm` holds, `mode` is still requested, and the cycle
/// limit is not reached (or infinite mode is on). Clears `confirm` and
/// `is_active` before returning. Returns the number of full cycles played.
pub fn run_session(ctx: &mut ControlContext, mode: Mode) -> Result<u32, ControlError> {
    let settings = ctx.settings();
    let anchor = settings.anchor_pair;
    let in_holds = settings.transition_in_holds;
    let out_holds = settings.transition_out_holds;

    let mut played = 0u32;
    let mut last: Option<Arc<Pattern>> = None;

    loop {
        let next = {
            let still_requested = ctx.keep_running(mode);
            let mut gait = ctx.gait();
            if still_requested && gait.may_continue(played) {
                gait.is_active = true;
                if played == 0 {
                    gait.cycles_completed = 0;
                }
                Some((Arc::clone(&gait.active), gait.active_name.clone()))
            } else {
                None
            }
        };
        let Some((pattern, name)) = next else { break };

        if played == 0 {
            info!("Gait session starting with pattern '{name}'");
            let bracket = pattern.transition_in(anchor, in_holds)?;
            play_pattern(ctx, &bracket)?;
        }
        play_pattern(ctx, &pattern)?;
        played += 1;
        ctx.gait().cycles_completed = played;
        debug!("Gait cycle {played} of '{name}' done");
        last = Some(pattern);
    }

    ctx.gait().confirm = false;
    if let Some(pattern) = last {
        let bracket = pattern.transition_out(anchor, out_holds)?;
        play_pattern(ctx, &bracket)?;
        info!("Gait session finished after {played} cycles");
    }
    ctx.gait().is_active = false;
    Ok(played)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use gecko_common::control_unit::config::ControlUnitConfig;
    use gecko_common::pattern::PatternRow;
    use gecko_hal::{BenchConfig, BenchProbe, SimBench};
    use std::time::Duration;

    const HOLD: f64 = 0.003;

    fn row(refs: [f64; 8], dvalves: [bool; 4], hold: f64) -> PatternRow {
        PatternRow::new(refs.to_vec(), dvalves.to_vec(), hold)
    }

    fn fast_pattern() -> Pattern {
        Pattern::new(vec![
            row([0.5, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0], [true, false, false, false], HOLD),
            row([0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0], [false, false, false, true], HOLD),
        ])
        .unwrap()
    }

    fn setup(limit: u32, infinite: bool) -> (ControlContext, BenchProbe) {
        let mut config = ControlUnitConfig::default();
        config.gait.cycle_count_limit = limit;
        config.gait.infinite_mode = infinite;
        config.gait.transition_in_holds = [HOLD, HOLD];
        config.gait.transition_out_holds = [HOLD, HOLD];
        let bench = SimBench::new(&config.hardware, BenchConfig::default());
        let ctx = ControlContext::new(&config, bench.proxies()).unwrap();
        ctx.gait().store("default", fast_pattern());
        (ctx, bench.probe())
    }

    fn on_events(probe: &BenchProbe, name: &str) -> usize {
        probe
            .dvalve_log()
            .iter()
            .filter(|e| e.name == name && e.on)
            .count()
    }

    #[test]
    fn row_hold_is_bounded_by_one_period() {
        let mut config = ControlUnitConfig::default();
        config.sampling_period_us = 10_000;
        let bench = SimBench::new(&config.hardware, BenchConfig::default());
        let mut ctx = ControlContext::new(&config, bench.proxies()).unwrap();

        let r = row([0.3; 8], [false; 4], 0.025);
        let t0 = Instant::now();
        play_row(&mut ctx, &r).unwrap();
        let elapsed = t0.elapsed();
        assert!(elapsed >= Duration::from_millis(25), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(35), "{elapsed:?}");
    }

    #[test]
    fn unplayable_hold_is_an_error() {
        let (mut ctx, probe) = setup(1, false);
        probe.clear_dvalve_log();
        for hold in [1e19, 1e20, -0.5, f64::NAN] {
            let r = row([0.0; 8], [true, false, false, false], hold);
            let t0 = Instant::now();
            let err = play_row(&mut ctx, &r).unwrap_err();
            assert!(
                matches!(err, ControlError::Pattern(PatternError::InvalidHold { .. })),
                "{hold}: {err}"
            );
            assert!(t0.elapsed() < Duration::from_millis(100));
        }
        assert!(probe.dvalve_log().is_empty());
    }

    #[test]
    fn row_tracks_its_own_references() {
        let (mut ctx, probe) = setup(1, false);
        probe.pin_pressure("0", Some(0.1));
        probe.pin_pressure("1", Some(0.6));
        play_row(&mut ctx, &row([0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], [false; 4], 0.0)).unwrap();
        assert!(probe.valve_output("0").unwrap() > 0.0);
        assert!(probe.valve_output("1").unwrap() < 0.0);
        let t = ctx.shared().telemetry();
        assert_eq!(t.references[0], Some(0.5));
    }

    #[test]
    fn session_plays_bracket_and_limited_cycles() {
        let (mut ctx, probe) = setup(3, false);
        ctx.gait().confirm = true;
        probe.clear_dvalve_log();

        let mode = ctx.requested_mode();
        let played = run_session(&mut ctx, mode).unwrap();
        assert_eq!(played, 3);

        // Pattern rows switch "0" and "3" on once per cycle.
        assert_eq!(on_events(&probe, "0"), 3);
        assert_eq!(on_events(&probe, "3"), 3);
        // The anchor pair is asserted by transition-in and transition-out.
        assert_eq!(on_events(&probe, "1"), 2);
        assert_eq!(on_events(&probe, "2"), 2);

        let gait = ctx.shared().gait();
        assert!(!gait.confirm);
        assert!(!gait.is_active);
        assert_eq!(gait.cycles_completed, 3);
        for name in ["0", "1", "2", "3"] {
            assert_eq!(probe.dvalve_state(name), Some(false));
        }
    }

    #[test]
    fn no_confirm_no_playback() {
        let (mut ctx, probe) = setup(3, false);
        probe.clear_dvalve_log();
        let mode = ctx.requested_mode();
        assert_eq!(run_session(&mut ctx, mode).unwrap(), 0);
        assert!(probe.dvalve_log().is_empty());
    }

    #[test]
    fn infinite_session_stops_on_mode_change() {
        let (mut ctx, _probe) = setup(1, true);
        ctx.gait().confirm = true;
        let shared = ctx.shared();
        let mode = ctx.requested_mode();
        let stopper = std::thread::spawn(move || {
            while shared.gait().cycles_completed < 5 {
                std::thread::sleep(Duration::from_millis(1));
            }
            shared.request_mode(Mode::UserControl);
        });
        let played = run_session(&mut ctx, mode).unwrap();
        stopper.join().unwrap();
        assert!(played >= 5);
        assert!(!ctx.shared().gait().is_active);
    }
}
