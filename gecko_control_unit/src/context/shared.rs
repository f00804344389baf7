//! State shared between the sampling loop and the operator endpoint.
//!
//! ## Discipline
//!
//! | Field | Writer | Cell |
//! |---|---|---|
//! | `requested` | operator, dispatcher | `AtomicU8` |
//! | `running` | sampling loop | `AtomicU8` |
//! | `tasks` | operator | `RwLock<TaskMaps>` |
//! | `telemetry` | sampling loop | `RwLock<Telemetry>` |
//! | `gait` | both | `Mutex<GaitState>` |
//!
//! Every cross-flow access is one lock or one atomic operation. The loop
//! reads the requested mode once per iteration, at the loop-top check.

use gecko_common::consts::CUSTOM_PATTERN_NAME;
use gecko_common::hal::Vector3;
use gecko_common::mode::Mode;
use gecko_common::pattern::{Pattern, PatternLayout, PatternLibrary};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::error::{ContextError, ProxyKind};

// ─── Mode Cell ──────────────────────────────────────────────────────

/// A [`Mode`] in an atomic byte.
#[derive(Debug)]
pub struct ModeCell(AtomicU8);

impl ModeCell {
    pub fn new(mode: Mode) -> Self {
        Self(AtomicU8::new(mode.as_u8()))
    }

    #[inline]
    pub fn load(&self) -> Mode {
        decode(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, mode: Mode) {
        self.0.store(mode.as_u8(), Ordering::Release);
    }

    /// Replace `current` with `next`; returns the value found.
    #[inline]
    pub fn compare_exchange(&self, current: Mode, next: Mode) -> Result<Mode, Mode> {
        self.0
            .compare_exchange(
                current.as_u8(),
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(decode)
            .map_err(decode)
    }

    /// Store `next` unless `f(current)` refuses. Returns the previous mode.
    pub fn update_if(&self, next: Mode, f: impl Fn(Mode) -> bool) -> Result<Mode, Mode> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                f(decode(raw)).then_some(next.as_u8())
            })
            .map(decode)
            .map_err(decode)
    }
}

/// Only [`ModeCell`] writes the byte, so every value decodes.
#[inline]
fn decode(raw: u8) -> Mode {
    Mode::from_u8(raw).unwrap_or(Mode::Exit)
}

// ─── Roster ─────────────────────────────────────────────────────────

/// Proxy names per collection, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub sensors: Vec<String>,
    pub valves: Vec<String>,
    pub dvalves: Vec<String>,
    pub imus: Vec<String>,
}

impl Roster {
    /// Validate uniqueness within every collection.
    pub fn new(
        sensors: Vec<String>,
        valves: Vec<String>,
        dvalves: Vec<String>,
        imus: Vec<String>,
    ) -> Result<Self, ContextError> {
        let roster = Self {
            sensors,
            valves,
            dvalves,
            imus,
        };
        for kind in [
            ProxyKind::Sensor,
            ProxyKind::Valve,
            ProxyKind::DiscreteValve,
            ProxyKind::Imu,
        ] {
            let mut seen = HashSet::new();
            for name in roster.names(kind) {
                if !seen.insert(name.as_str()) {
                    return Err(ContextError::DuplicateName {
                        kind,
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(roster)
    }

    pub fn names(&self, kind: ProxyKind) -> &[String] {
        match kind {
            ProxyKind::Sensor => &self.sensors,
            ProxyKind::Valve => &self.valves,
            ProxyKind::DiscreteValve => &self.dvalves,
            ProxyKind::Imu => &self.imus,
        }
    }

    /// Index of `name` within `kind`.
    pub fn index_of(&self, kind: ProxyKind, name: &str) -> Result<usize, ContextError> {
        self.names(kind)
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ContextError::UnknownName {
                kind,
                name: name.to_string(),
            })
    }

    #[inline]
    pub fn layout(&self) -> PatternLayout {
        PatternLayout::new(self.valves.len(), self.dvalves.len())
    }
}

// ─── Task & Telemetry Maps ──────────────────────────────────────────

/// Operator → loop. Indexed like the roster.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMaps {
    /// Pressure reference per valve.
    pub references: Vec<f64>,
    /// Direct output per valve (USER_CONTROL).
    pub duties: Vec<f64>,
    /// Requested state per discrete valve.
    pub dvalves: Vec<bool>,
}

impl TaskMaps {
    pub fn new(roster: &Roster) -> Self {
        Self {
            references: vec![0.0; roster.valves.len()],
            duties: vec![0.0; roster.valves.len()],
            dvalves: vec![false; roster.dvalves.len()],
        }
    }
}

/// A fault recorded for the ERROR mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultRecord {
    /// Mode whose handler failed.
    pub mode: Mode,
    pub message: String,
}

/// Loop → operator. Indexed like the roster.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// Last good sample per sensor.
    pub sensors: Vec<f64>,
    /// Last commanded output per valve.
    pub outputs: Vec<f64>,
    /// Reference the valve is tracking, `None` when open loop.
    pub references: Vec<Option<f64>>,
    /// Last commanded state per discrete valve.
    pub dvalves: Vec<bool>,
    /// Last good acceleration per IMU.
    pub imus: Vec<Vector3>,
    /// Last IMU_CONTROL angle [deg].
    pub imu_angle: Option<f64>,
    pub last_fault: Option<FaultRecord>,
}

impl Telemetry {
    pub fn new(roster: &Roster) -> Self {
        Self {
            sensors: vec![0.0; roster.sensors.len()],
            outputs: vec![0.0; roster.valves.len()],
            references: vec![None; roster.valves.len()],
            dvalves: vec![false; roster.dvalves.len()],
            imus: vec![Vector3::default(); roster.imus.len()],
            imu_angle: None,
            last_fault: None,
        }
    }
}

// ─── Gait Sub-Context ───────────────────────────────────────────────

/// Gait playback state. Multi-field transitions happen under one lock.
#[derive(Debug, Clone)]
pub struct GaitState {
    /// Name of the active pattern.
    pub active_name: String,
    /// Pattern played on confirm.
    pub active: Arc<Pattern>,
    pub library: PatternLibrary,
    /// Operator asks for a gait session.
    pub confirm: bool,
    /// Loop reports a session in progress.
    pub is_active: bool,
    pub cycle_count_limit: u32,
    pub infinite_mode: bool,
    /// Active pattern is the operator-defined one.
    pub custom_pattern_flag: bool,
    /// Full cycles played in the current session.
    pub cycles_completed: u32,
}

impl GaitState {
    /// Start with `active_name` from `library`.
    pub fn new(
        library: PatternLibrary,
        active_name: &str,
        cycle_count_limit: u32,
        infinite_mode: bool,
    ) -> Result<Self, ContextError> {
        let active = library
            .get(active_name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownPattern(active_name.to_string()))?;
        Ok(Self {
            active_name: active_name.to_string(),
            active: Arc::new(active),
            library,
            confirm: false,
            is_active: false,
            cycle_count_limit,
            infinite_mode,
            custom_pattern_flag: active_name == CUSTOM_PATTERN_NAME,
            cycles_completed: 0,
        })
    }

    /// Make `name` the active pattern.
    pub fn select(&mut self, name: &str) -> Result<(), ContextError> {
        let pattern = self
            .library
            .get(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownPattern(name.to_string()))?;
        self.active = Arc::new(pattern);
        self.active_name = name.to_string();
        self.custom_pattern_flag = name == CUSTOM_PATTERN_NAME;
        Ok(())
    }

    /// Insert or replace a library entry; refreshes the active pattern if
    /// it was the one replaced.
    pub fn store(&mut self, name: &str, pattern: Pattern) {
        if name == self.active_name {
            self.active = Arc::new(pattern.clone());
        }
        self.library.insert(name, pattern);
    }

    /// Whether another cycle may start after `played` cycles.
    #[inline]
    pub fn may_continue(&self, played: u32) -> bool {
        self.confirm && (played < self.cycle_count_limit || self.infinite_mode)
    }
}

// ─── Shared Context ─────────────────────────────────────────────────

/// The record both flows touch.
///
/// Constructed once by [`super::ControlContext::new`] and handed to the
/// operator side as `Arc<SharedContext>`.
#[derive(Debug)]
pub struct SharedContext {
    requested: ModeCell,
    running: ModeCell,
    roster: Roster,
    sampling_period: Duration,
    pub(crate) tasks: RwLock<TaskMaps>,
    pub(crate) telemetry: RwLock<Telemetry>,
    pub(crate) gait: Mutex<GaitState>,
}

impl SharedContext {
    pub fn new(roster: Roster, sampling_period: Duration, start: Mode, gait: GaitState) -> Self {
        Self {
            requested: ModeCell::new(start),
            running: ModeCell::new(start),
            tasks: RwLock::new(TaskMaps::new(&roster)),
            telemetry: RwLock::new(Telemetry::new(&roster)),
            gait: Mutex::new(gait),
            roster,
            sampling_period,
        }
    }

    #[inline]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[inline]
    pub fn sampling_period(&self) -> Duration {
        self.sampling_period
    }

    #[inline]
    pub fn requested_mode(&self) -> Mode {
        self.requested.load()
    }

    #[inline]
    pub fn running_mode(&self) -> Mode {
        self.running.load()
    }

    /// Operator request. Refused once shutdown (EXIT or QUIT) is underway.
    pub fn request_mode(&self, mode: Mode) -> bool {
        self.requested
            .update_if(mode, |current| !matches!(current, Mode::Exit | Mode::Quit))
            .is_ok()
    }

    /// Dispatcher install: `from` → `next`, unless someone moved the
    /// request in between. Returns the mode now requested.
    ///
    /// Shutdown only moves forward: from EXIT the only install is QUIT.
    pub fn install_mode(&self, from: Mode, next: Mode) -> Mode {
        if matches!(from, Mode::Exit | Mode::Quit) && next != Mode::Quit {
            return self.requested_mode();
        }
        match self.requested.compare_exchange(from, next) {
            Ok(_) => next,
            Err(found) => found,
        }
    }

    /// Unconditional store, used for the initial mode.
    pub fn force_mode(&self, mode: Mode) {
        self.requested.store(mode);
    }

    pub(crate) fn set_running(&self, mode: Mode) {
        self.running.store(mode);
    }

    /// Copy of the operator tasks.
    pub fn tasks(&self) -> TaskMaps {
        self.tasks.read().clone()
    }

    /// Copy of the raw telemetry.
    pub fn telemetry(&self) -> Telemetry {
        self.telemetry.read().clone()
    }

    /// Copy of the gait sub-context.
    pub fn gait(&self) -> GaitStatus {
        let g = self.gait.lock();
        GaitStatus {
            active_pattern: g.active_name.clone(),
            confirm: g.confirm,
            is_active: g.is_active,
            cycle_count_limit: g.cycle_count_limit,
            infinite_mode: g.infinite_mode,
            custom_pattern_flag: g.custom_pattern_flag,
            cycles_completed: g.cycles_completed,
        }
    }

    /// Named view of everything the operator monitors.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let t = self.telemetry();
        let r = &self.roster;
        let named = |names: &[String], values: &[f64]| -> BTreeMap<String, f64> {
            names.iter().cloned().zip(values.iter().copied()).collect()
        };
        TelemetrySnapshot {
            requested_mode: self.requested_mode(),
            running_mode: self.running_mode(),
            sensors: named(&r.sensors, &t.sensors),
            outputs: named(&r.valves, &t.outputs),
            references: r.valves.iter().cloned().zip(t.references.iter().copied()).collect(),
            dvalves: r.dvalves.iter().cloned().zip(t.dvalves.iter().copied()).collect(),
            imus: r.imus.iter().cloned().zip(t.imus.iter().copied()).collect(),
            imu_angle: t.imu_angle,
            last_fault: t.last_fault,
            gait: self.gait(),
        }
    }
}

/// Operator view of the gait sub-context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaitStatus {
    pub active_pattern: String,
    pub confirm: bool,
    pub is_active: bool,
    pub cycle_count_limit: u32,
    pub infinite_mode: bool,
    pub custom_pattern_flag: bool,
    pub cycles_completed: u32,
}

/// Operator view of the telemetry, keyed by proxy name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub requested_mode: Mode,
    pub running_mode: Mode,
    pub sensors: BTreeMap<String, f64>,
    pub outputs: BTreeMap<String, f64>,
    pub references: BTreeMap<String, Option<f64>>,
    pub dvalves: BTreeMap<String, bool>,
    pub imus: BTreeMap<String, Vector3>,
    pub imu_angle: Option<f64>,
    pub last_fault: Option<FaultRecord>,
    pub gait: GaitStatus,
}
