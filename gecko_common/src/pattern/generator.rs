//! Crawl gait generator for the eight-chamber, four-foot robot.
//!
//! Chambers: 0 upper-left leg, 1 upper-right leg, 2 left belly, 3 right
//! belly, 4 lower-left leg, 5 lower-right leg, 6 and 7 auxiliary.
//! Feet (discrete valves): 0 upper-left, 1 upper-right, 2 lower-left,
//! 3 lower-right.
//!
//! The gait alternates two chamber groups. While group A inflates the
//! diagonal feet (1, 2) hold the robot; both diagonals grip while the
//! feet swap; then group B inflates on feet (0, 3).
//!
//! The row sequence is this crate's own design. The preset pressure
//! vectors are the commissioned ones.

use serde::{Deserialize, Serialize};

use super::{Pattern, PatternError, PatternRow};

/// Chambers of the first half stroke.
const GROUP_A: [usize; 4] = [0, 2, 5, 6];
/// Chambers of the second half stroke.
const GROUP_B: [usize; 4] = [1, 3, 4, 7];

const FEET_A: [bool; 4] = [false, true, true, false];
const FEET_B: [bool; 4] = [true, false, false, true];
const FEET_ALL: [bool; 4] = [true; 4];

/// Peak pressures and phase times of a generated gait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaitParameters {
    /// Peak pressure per chamber [bar].
    pub pressures: [f64; 8],
    /// Inflation phase [s].
    #[serde(default = "default_t_move")]
    pub t_move: f64,
    /// Foot swap, one diagonal released [s].
    #[serde(default = "default_t_fix")]
    pub t_fix: f64,
    /// Foot swap, all feet gripping [s].
    #[serde(default = "default_t_dfx")]
    pub t_dfx: f64,
}

fn default_t_move() -> f64 {
    3.0
}
fn default_t_fix() -> f64 {
    0.66
}
fn default_t_dfx() -> f64 {
    0.25
}

impl GaitParameters {
    /// Parameters with default phase times.
    pub fn with_pressures(pressures: [f64; 8]) -> Self {
        Self {
            pressures,
            t_move: default_t_move(),
            t_fix: default_t_fix(),
            t_dfx: default_t_dfx(),
        }
    }
}

/// Commissioned pressure sets, oldest first.
const PRESETS: [(&str, [f64; 8]); 6] = [
    ("v2_2", [0.80, 0.80, 0.90, 0.99, 0.80, 0.80, 0.0, 0.0]),
    ("v2_3", [0.72, 0.74, 0.99, 0.99, 0.69, 0.63, 0.0, 0.0]),
    ("v2_4", [0.64, 0.79, 0.99, 0.99, 0.75, 0.78, 0.0, 0.0]),
    ("v2_5", [0.92, 0.68, 0.93, 0.92, 0.90, 0.74, 0.0, 0.0]),
    ("v2_6", [0.77, 0.99, 0.97, 0.93, 0.70, 0.71, 0.0, 0.0]),
    ("v3_0", [0.74, 0.66, 0.99, 0.85, 0.65, 0.86, 0.0, 0.0]),
];

/// Name of the preset used when nothing else is configured.
pub const DEFAULT_PRESET: &str = "v3_0";

/// Look up a commissioned pressure set by name.
pub fn preset(name: &str) -> Option<GaitParameters> {
    PRESETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, p)| GaitParameters::with_pressures(*p))
}

/// Names of all presets.
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(n, _)| *n)
}

fn group_refs(pressures: &[f64; 8], group: [usize; 4]) -> Vec<f64> {
    let mut refs = vec![0.0; pressures.len()];
    for idx in group {
        refs[idx] = pressures[idx];
    }
    refs
}

/// Build the six-row crawl cycle.
///
/// The last row leaves group B inflated on feet (1, 2), which is the
/// resting phase the transition patterns bracket.
pub fn generate_pattern(params: &GaitParameters) -> Result<Pattern, PatternError> {
    let a = group_refs(&params.pressures, GROUP_A);
    let b = group_refs(&params.pressures, GROUP_B);

    let rows = vec![
        PatternRow::new(a.clone(), FEET_A.to_vec(), params.t_move),
        PatternRow::new(a.clone(), FEET_ALL.to_vec(), params.t_dfx),
        PatternRow::new(a, FEET_B.to_vec(), params.t_fix),
        PatternRow::new(b.clone(), FEET_B.to_vec(), params.t_move),
        PatternRow::new(b.clone(), FEET_ALL.to_vec(), params.t_dfx),
        PatternRow::new(b, FEET_A.to_vec(), params.t_fix),
    ];

    Pattern::new(rows)
}
