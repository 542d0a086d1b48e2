//! Run configuration and per-point naming.

use super::axes::{SweepAxes, SweepPoint};
use super::kind::BenchmarkKind;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use source_resolver::DeviceKind;

/// Sweep-invariant parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub device: DeviceKind,
    pub fast_math: bool,
    pub repeat_count: u32,
    pub kind: BenchmarkKind,
    /// Axes for the production kinds; smoke kinds ignore them.
    pub axes: SweepAxes,
}

impl RunConfiguration {
    pub fn new(
        device: DeviceKind,
        fast_math: bool,
        repeat_count: u32,
        kind: BenchmarkKind,
        axes: SweepAxes,
    ) -> Result<Self> {
        if repeat_count == 0 {
            return Err(BenchError::InputValidation(
                "repeat count must be a positive integer".into(),
            ));
        }
        axes.validate()?;
        Ok(RunConfiguration {
            device,
            fast_math,
            repeat_count,
            kind,
            axes,
        })
    }

    pub fn fast_math_flag(&self) -> u8 {
        u8::from(self.fast_math)
    }

    /// Axes actually swept for a concrete kind.
    pub fn axes_for(&self, kind: BenchmarkKind) -> SweepAxes {
        if kind.is_smoke() {
            SweepAxes::smoke()
        } else {
            self.axes.clone()
        }
    }

    /// Human-readable description recorded as the `config` field of each
    /// timing record.
    pub fn describe(&self, point: &SweepPoint) -> String {
        format!(
            "device={} fastmath={} nl={} nt={} steps={}",
            self.device,
            self.fast_math_flag(),
            point.grid.longitudinal,
            point.grid.transversal,
            point.steps
        )
    }

    /// Deterministic per-iteration log name; reruns overwrite.
    pub fn log_file_name(&self, point: &SweepPoint) -> String {
        format!(
            "{}_fm{}_nl{}_nt{}_s{}_run{}.log",
            self.device,
            self.fast_math_flag(),
            point.grid.longitudinal,
            point.grid.transversal,
            point.steps,
            point.repetition
        )
    }
}
