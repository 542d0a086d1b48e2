//! Sweep axes: step counts and paired grid sizes.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A (longitudinal, transversal) grid size pair. Pairs are never crossed
/// with each other; only (steps, pair, repetition) form the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPair {
    pub longitudinal: u32,
    pub transversal: u32,
}

impl GridPair {
    pub const fn new(longitudinal: u32, transversal: u32) -> Self {
        GridPair {
            longitudinal,
            transversal,
        }
    }
}

/// One coordinate of the configuration matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepPoint {
    pub steps: u32,
    pub grid: GridPair,
    /// 1-based repetition index.
    pub repetition: u32,
}

const DEFAULT_STEPS: [u32; 3] = [2, 4, 8];

const DEFAULT_GRID: [GridPair; 7] = [
    GridPair::new(64, 64),
    GridPair::new(128, 64),
    GridPair::new(256, 64),
    GridPair::new(512, 64),
    GridPair::new(64, 128),
    GridPair::new(128, 128),
    GridPair::new(64, 256),
];

/// Step counts and grid pairs swept for a benchmark kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepAxes {
    pub steps: Vec<u32>,
    pub grid: Vec<GridPair>,
}

impl Default for SweepAxes {
    fn default() -> Self {
        SweepAxes {
            steps: DEFAULT_STEPS.to_vec(),
            grid: DEFAULT_GRID.to_vec(),
        }
    }
}

impl SweepAxes {
    /// Minimal matrix for the smoke kind.
    pub fn smoke() -> Self {
        SweepAxes {
            steps: vec![2],
            grid: vec![GridPair::new(16, 16)],
        }
    }

    /// Load axes from a TOML file:
    ///
    /// ```toml
    /// steps = [2, 4]
    ///
    /// [[grid]]
    /// longitudinal = 64
    /// transversal = 64
    /// ```
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BenchError::InputValidation(format!("cannot read axes file {}: {e}", path.display()))
        })?;
        let axes: SweepAxes = toml::from_str(&text).map_err(|e| {
            BenchError::InputValidation(format!("invalid axes file {}: {e}", path.display()))
        })?;
        axes.validate()?;
        Ok(axes)
    }

    /// Step counts must be even and at least 2; grid sizes positive.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(BenchError::InputValidation(
                "at least one step count is required".into(),
            ));
        }
        if self.grid.is_empty() {
            return Err(BenchError::InputValidation(
                "at least one grid pair is required".into(),
            ));
        }
        if let Some(bad) = self.steps.iter().find(|s| **s < 2 || **s % 2 != 0) {
            return Err(BenchError::InputValidation(format!(
                "step count {bad} must be even and >= 2"
            )));
        }
        if let Some(bad) = self
            .grid
            .iter()
            .find(|g| g.longitudinal == 0 || g.transversal == 0)
        {
            return Err(BenchError::InputValidation(format!(
                "grid pair ({}, {}) must be positive",
                bad.longitudinal, bad.transversal
            )));
        }
        Ok(())
    }

    /// Number of invocations for `repeat` repetitions.
    pub fn point_count(&self, repeat: u32) -> u64 {
        self.steps.len() as u64 * self.grid.len() as u64 * u64::from(repeat)
    }

    /// Nested enumeration: steps outermost, grid pair in the middle,
    /// repetition innermost.
    pub fn points(&self, repeat: u32) -> impl Iterator<Item = SweepPoint> + '_ {
        self.steps.iter().flat_map(move |&steps| {
            self.grid.iter().flat_map(move |&grid| {
                (1..=repeat).map(move |repetition| SweepPoint {
                    steps,
                    grid,
                    repetition,
                })
            })
        })
    }
}
