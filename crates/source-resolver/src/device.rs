//! Device kinds and the compatibility families that group them
//!
//! Each source-distribution lineage supports a fixed set of device kinds.
//! The numba lineage runs on `cuda` and `numba`; the cython lineage only
//! on `cython`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Compute backend the workload targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Numba CUDA kernels on a GPU
    Cuda,
    /// Numba CPU kernels
    Numba,
    /// Compiled cython extension
    Cython,
}

impl DeviceKind {
    /// All device kinds in CLI order.
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Cuda, DeviceKind::Numba, DeviceKind::Cython];

    /// Lowercase name as used on the command line and in workload flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Cuda => "cuda",
            DeviceKind::Numba => "numba",
            DeviceKind::Cython => "cython",
        }
    }

    /// The family whose distributions run on this device.
    pub fn family(&self) -> CompatFamily {
        match self {
            DeviceKind::Cuda | DeviceKind::Numba => CompatFamily::NumbaCuda,
            DeviceKind::Cython => CompatFamily::Cython,
        }
    }

    /// Whether the source tree must be compiled before it can run.
    pub fn needs_build(&self) -> bool {
        matches!(self, DeviceKind::Cython)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cuda" => Ok(DeviceKind::Cuda),
            "numba" => Ok(DeviceKind::Numba),
            "cython" => Ok(DeviceKind::Cython),
            other => Err(format!(
                "unknown device '{other}' (expected cuda, numba or cython)"
            )),
        }
    }
}

/// A source-distribution lineage and the devices it supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatFamily {
    /// numba port: cuda + numba
    NumbaCuda,
    /// original cython code base
    Cython,
}

impl CompatFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatFamily::NumbaCuda => "numba_cuda",
            CompatFamily::Cython => "cython",
        }
    }

    /// Device kinds this family can run on.
    pub fn devices(&self) -> BTreeSet<DeviceKind> {
        DeviceKind::ALL
            .into_iter()
            .filter(|d| d.family() == *self)
            .collect()
    }

    pub fn supports(&self, device: DeviceKind) -> bool {
        device.family() == *self
    }
}

impl fmt::Display for CompatFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
