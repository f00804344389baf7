//! Named pattern dictionary with JSON persistence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use super::generator::{DEFAULT_PRESET, GaitParameters, generate_pattern, preset};
use super::{Pattern, PatternError, PatternLayout};
use crate::consts::{CUSTOM_PATTERN_NAME, DEFAULT_PATTERN_NAME};

/// Patterns by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternLibrary {
    patterns: BTreeMap<String, Pattern>,
}

impl Default for PatternLibrary {
    /// `default` is the commissioned gait, `custom` a vented placeholder
    /// for operator uploads.
    fn default() -> Self {
        let vented = GaitParameters::with_pressures([0.0; 8]);
        let commissioned = preset(DEFAULT_PRESET).unwrap_or_else(|| vented.clone());
        let mut lib = Self::empty();
        if let Ok(p) = generate_pattern(&commissioned) {
            lib.insert(DEFAULT_PATTERN_NAME, p);
        }
        if let Ok(p) = generate_pattern(&vented) {
            lib.insert(CUSTOM_PATTERN_NAME, p);
        }
        lib
    }
}

impl PatternLibrary {
    pub fn empty() -> Self {
        Self {
            patterns: BTreeMap::new(),
        }
    }

    /// Insert or replace; returns the previous pattern of that name.
    pub fn insert(&mut self, name: impl Into<String>, pattern: Pattern) -> Option<Pattern> {
        self.patterns.insert(name.into(), pattern)
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every entry must fit `layout`.
    pub fn check_layout(&self, layout: PatternLayout) -> Result<(), PatternError> {
        self.patterns
            .values()
            .try_for_each(|p| p.check_layout(layout))
    }

    pub fn load_json(path: &Path) -> Result<Self, PatternError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PatternError::Storage(format!("{}: {e}", path.display())))?;
        let library: Self = serde_json::from_str(&text)
            .map_err(|e| PatternError::Storage(format!("{}: {e}", path.display())))?;
        info!("Loaded {} patterns from {}", library.len(), path.display());
        Ok(library)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), PatternError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| PatternError::Storage(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| PatternError::Storage(format!("{}: {e}", path.display())))?;
        debug!("Saved {} patterns to {}", self.len(), path.display());
        Ok(())
    }
}
