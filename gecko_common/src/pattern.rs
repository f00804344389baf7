//! Gait patterns.
//!
//! A pattern is an ordered list of rows. Each row carries one pressure
//! reference per proportional valve, one target per discrete valve and a
//! minimum hold time. Playing every row once is one gait cycle.
//!
//! Stored form of a row (JSON or TOML):
//!
//! ```text
//! [ref_0, ..., ref_{n-1}, dv_0, ..., dv_{m-1}, hold]
//! ```

pub mod generator;
pub mod library;
pub mod row;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::consts::MAX_ROW_HOLD_S;

pub use generator::{DEFAULT_PRESET, GaitParameters, generate_pattern, preset, preset_names};
pub use library::PatternLibrary;
pub use row::PatternRow;

/// Pattern validation and storage errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    /// A pattern needs at least one row.
    #[error("pattern has no rows")]
    Empty,

    /// Row length differs from the first row.
    #[error("row {row}: layout {found} differs from {expected}")]
    RowLayout {
        row: usize,
        expected: PatternLayout,
        found: PatternLayout,
    },

    /// Hold time negative, non-finite or beyond [`MAX_ROW_HOLD_S`].
    #[error("row {row}: invalid hold time {hold}")]
    InvalidHold { row: usize, hold: f64 },

    /// Non-finite reference value.
    #[error("row {row}: reference {index} is not finite")]
    InvalidReference { row: usize, index: usize },

    /// Stored row does not follow `numbers, booleans, hold`.
    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// Pattern does not fit the robot it is played on.
    #[error("pattern layout {found} does not match robot layout {expected}")]
    LayoutMismatch {
        expected: PatternLayout,
        found: PatternLayout,
    },

    /// Discrete valve index beyond the layout.
    #[error("discrete valve {index} out of range for {n_dvalve} discrete valves")]
    DvalveOutOfRange { index: usize, n_dvalve: usize },

    /// Pattern file could not be read or written.
    #[error("pattern storage: {0}")]
    Storage(String),
}

/// Shape of a pattern row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternLayout {
    /// Number of proportional valves.
    pub n_valve: usize,
    /// Number of discrete valves.
    pub n_dvalve: usize,
}

impl PatternLayout {
    pub const fn new(n_valve: usize, n_dvalve: usize) -> Self {
        Self { n_valve, n_dvalve }
    }

    /// Flat row length: references, discrete targets, hold.
    #[inline]
    pub const fn row_len(&self) -> usize {
        self.n_valve + self.n_dvalve + 1
    }
}

impl fmt::Display for PatternLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v+{}d", self.n_valve, self.n_dvalve)
    }
}

/// A validated, non-empty sequence of rows sharing one layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PatternRow>", into = "Vec<PatternRow>")]
pub struct Pattern {
    rows: Vec<PatternRow>,
}

impl Pattern {
    /// Validate and wrap `rows`.
    pub fn new(rows: Vec<PatternRow>) -> Result<Self, PatternError> {
        let first = rows.first().ok_or(PatternError::Empty)?;
        let expected = first.layout();

        for (idx, row) in rows.iter().enumerate() {
            let found = row.layout();
            if found != expected {
                return Err(PatternError::RowLayout {
                    row: idx,
                    expected,
                    found,
                });
            }
            if row.hold_duration().is_none() {
                return Err(PatternError::InvalidHold {
                    row: idx,
                    hold: row.hold,
                });
            }
            if let Some(index) = row.references.iter().position(|r| !r.is_finite()) {
                return Err(PatternError::InvalidReference { row: idx, index });
            }
        }

        Ok(Self { rows })
    }

    #[inline]
    pub fn rows(&self) -> &[PatternRow] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn layout(&self) -> PatternLayout {
        self.rows[0].layout()
    }

    /// The resting phase the gait starts from and returns to.
    #[inline]
    pub fn final_row(&self) -> &PatternRow {
        &self.rows[self.rows.len() - 1]
    }

    /// Sum of all minimum hold times [s].
    pub fn cycle_time(&self) -> f64 {
        self.rows.iter().map(|r| r.hold).sum()
    }

    /// Reject a pattern that does not fit the robot.
    pub fn check_layout(&self, expected: PatternLayout) -> Result<(), PatternError> {
        let found = self.layout();
        if found != expected {
            return Err(PatternError::LayoutMismatch { expected, found });
        }
        Ok(())
    }

    /// Two rows that bring the robot from rest into the gait's resting
    /// phase: final setpoints with all feet released, then the same
    /// setpoints with the `anchor` pair asserted.
    pub fn transition_in(&self, anchor: [usize; 2], holds: [f64; 2]) -> Result<Pattern, PatternError> {
        let last = self.final_row();
        let n_dvalve = last.dvalves.len();
        let released = vec![false; n_dvalve];
        let anchored = anchor_targets(anchor, n_dvalve)?;

        Pattern::new(vec![
            PatternRow::new(last.references.clone(), released, holds[0]),
            PatternRow::new(last.references.clone(), anchored, holds[1]),
        ])
    }

    /// Two rows that bring the robot back to rest: final setpoints with the
    /// `anchor` pair asserted, then everything vented and released.
    pub fn transition_out(&self, anchor: [usize; 2], holds: [f64; 2]) -> Result<Pattern, PatternError> {
        let last = self.final_row();
        let n_valve = last.references.len();
        let n_dvalve = last.dvalves.len();
        let anchored = anchor_targets(anchor, n_dvalve)?;

        Pattern::new(vec![
            PatternRow::new(last.references.clone(), anchored, holds[0]),
            PatternRow::new(vec![0.0; n_valve], vec![false; n_dvalve], holds[1]),
        ])
    }
}

impl TryFrom<Vec<PatternRow>> for Pattern {
    type Error = PatternError;

    fn try_from(rows: Vec<PatternRow>) -> Result<Self, Self::Error> {
        Pattern::new(rows)
    }
}

impl From<Pattern> for Vec<PatternRow> {
    fn from(pattern: Pattern) -> Self {
        pattern.rows
    }
}

fn anchor_targets(anchor: [usize; 2], n_dvalve: usize) -> Result<Vec<bool>, PatternError> {
    let mut targets = vec![false; n_dvalve];
    for index in anchor {
        let slot = targets
            .get_mut(index)
            .ok_or(PatternError::DvalveOutOfRange { index, n_dvalve })?;
        *slot = true;
    }
    Ok(targets)
}
