//! One pattern row and its flat stored form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use super::{PatternError, PatternLayout};
use crate::consts::MAX_ROW_HOLD_S;

/// Setpoints for one phase of the gait.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRow {
    /// Pressure reference per proportional valve, in valve-index order.
    pub references: Vec<f64>,
    /// Target per discrete valve, in valve-index order.
    pub dvalves: Vec<bool>,
    /// Minimum hold time [s].
    pub hold: f64,
}

/// One element of the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Flag(bool),
    Value(f64),
}

impl PatternRow {
    pub fn new(references: Vec<f64>, dvalves: Vec<bool>, hold: f64) -> Self {
        Self {
            references,
            dvalves,
            hold,
        }
    }

    /// `hold` as a duration, `None` unless it lies in `[0, MAX_ROW_HOLD_S]`.
    pub fn hold_duration(&self) -> Option<Duration> {
        if !(0.0..=MAX_ROW_HOLD_S).contains(&self.hold) {
            return None;
        }
        Duration::try_from_secs_f64(self.hold).ok()
    }

    #[inline]
    pub fn layout(&self) -> PatternLayout {
        PatternLayout::new(self.references.len(), self.dvalves.len())
    }

    /// Flatten into `[refs.., dvalves.., hold]`.
    pub fn to_flat(&self) -> Vec<Cell> {
        self.references
            .iter()
            .copied()
            .map(Cell::Value)
            .chain(self.dvalves.iter().copied().map(Cell::Flag))
            .chain(std::iter::once(Cell::Value(self.hold)))
            .collect()
    }

    /// Parse `[refs.., dvalves.., hold]`.
    ///
    /// The last cell is the hold time. Before it, every number must come
    /// before every boolean.
    pub fn from_flat(cells: &[Cell]) -> Result<Self, PatternError> {
        let (last, body) = cells
            .split_last()
            .ok_or_else(|| PatternError::MalformedRow("empty row".to_string()))?;
        let Cell::Value(hold) = *last else {
            return Err(PatternError::MalformedRow(
                "last cell must be the hold time".to_string(),
            ));
        };

        let split = body
            .iter()
            .position(|c| matches!(c, Cell::Flag(_)))
            .unwrap_or(body.len());

        let references = body[..split]
            .iter()
            .filter_map(|c| match c {
                Cell::Value(v) => Some(*v),
                Cell::Flag(_) => None,
            })
            .collect();

        let dvalves = body[split..]
            .iter()
            .enumerate()
            .map(|(i, c)| match c {
                Cell::Flag(b) => Ok(*b),
                Cell::Value(_) => Err(PatternError::MalformedRow(format!(
                    "number at position {} after discrete targets",
                    split + i
                ))),
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        Ok(Self::new(references, dvalves, hold))
    }
}

impl Serialize for PatternRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_flat().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PatternRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cells = Vec::<Cell>::deserialize(deserializer)?;
        PatternRow::from_flat(&cells).map_err(serde::de::Error::custom)
    }
}
