//! Benchmark kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which simulation benchmark to sweep.
///
/// `All` is a selector only; it expands to the three production kinds and
/// never labels a timing log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkKind {
    All,
    Init,
    Evolve,
    Full,
    Test,
}

impl BenchmarkKind {
    pub const SELECTABLE: [BenchmarkKind; 5] = [
        BenchmarkKind::All,
        BenchmarkKind::Init,
        BenchmarkKind::Evolve,
        BenchmarkKind::Full,
        BenchmarkKind::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BenchmarkKind::All => "all",
            BenchmarkKind::Init => "init",
            BenchmarkKind::Evolve => "evolve",
            BenchmarkKind::Full => "full",
            BenchmarkKind::Test => "test",
        }
    }

    /// Concrete kinds this selector runs, in execution order.
    pub fn expand(self) -> Vec<BenchmarkKind> {
        match self {
            BenchmarkKind::All => vec![
                BenchmarkKind::Init,
                BenchmarkKind::Evolve,
                BenchmarkKind::Full,
            ],
            other => vec![other],
        }
    }

    /// Category label used for log directories, timing files and the
    /// keys of the aggregated run document.
    pub fn label(&self) -> &'static str {
        match self {
            BenchmarkKind::All => "all",
            BenchmarkKind::Init => "init_bench",
            BenchmarkKind::Evolve => "evolve_bench",
            BenchmarkKind::Full => "full_bench",
            BenchmarkKind::Test => "test_setup",
        }
    }

    /// Python module executed with `-m` inside the source tree.
    pub fn module(&self) -> &'static str {
        match self {
            BenchmarkKind::All => "examples.mv_full_bench",
            BenchmarkKind::Init => "examples.mv_init_bench",
            BenchmarkKind::Evolve => "examples.mv_evolve_bench",
            BenchmarkKind::Full => "examples.mv_full_bench",
            BenchmarkKind::Test => "examples.mv_test_setup",
        }
    }

    /// Smoke kinds ignore configured axes and run a minimal matrix.
    pub fn is_smoke(&self) -> bool {
        matches!(self, BenchmarkKind::Test)
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BenchmarkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BenchmarkKind::SELECTABLE
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown benchmark kind '{s}' (expected all, init, evolve, full or test)")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_expands_to_production_kinds() {
        assert_eq!(
            BenchmarkKind::All.expand(),
            vec![
                BenchmarkKind::Init,
                BenchmarkKind::Evolve,
                BenchmarkKind::Full
            ]
        );
        assert_eq!(BenchmarkKind::Test.expand(), vec![BenchmarkKind::Test]);
    }

    #[test]
    fn test_labels_are_distinct() {
        let labels: std::collections::BTreeSet<_> = BenchmarkKind::All
            .expand()
            .iter()
            .chain(std::iter::once(&BenchmarkKind::Test))
            .map(|k| k.label())
            .collect();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Evolve".parse::<BenchmarkKind>(), Ok(BenchmarkKind::Evolve));
        assert!("bench".parse::<BenchmarkKind>().is_err());
    }
}
