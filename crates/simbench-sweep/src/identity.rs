//! Sweep identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use simbench_core::{BenchmarkKind, RunConfiguration};

/// Deterministic identity of a sweep: same inputs, same digest. Recorded in
/// provenance so two result sets can be checked for comparability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepIdentity {
    /// SHA-256 over device, fast-math, repeat count, kinds and axes.
    pub digest: String,

    /// Concrete kinds swept, in order.
    pub kinds: Vec<BenchmarkKind>,
}

impl SweepIdentity {
    pub fn new(config: &RunConfiguration) -> Self {
        let kinds = config.kind.expand();
        let digest = compute_sweep_digest(config, &kinds);
        SweepIdentity { digest, kinds }
    }

    /// First 12 hex digits, or the whole digest if it is shorter.
    pub fn short(&self) -> &str {
        self.digest.get(..12).unwrap_or(&self.digest)
    }
}

fn compute_sweep_digest(config: &RunConfiguration, kinds: &[BenchmarkKind]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.device.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update([config.fast_math_flag()]);
    hasher.update(config.repeat_count.to_le_bytes());
    for kind in kinds {
        hasher.update(kind.label().as_bytes());
        hasher.update(b"\0");
        let axes = config.axes_for(*kind);
        for steps in &axes.steps {
            hasher.update(steps.to_le_bytes());
        }
        hasher.update(b"\0");
        for pair in &axes.grid {
            hasher.update(pair.longitudinal.to_le_bytes());
            hasher.update(pair.transversal.to_le_bytes());
        }
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
