//! Python environment selection and probing.
//!
//! The selector is either a virtualenv directory (its `bin/python` is
//! used) or an interpreter path/name. Without one, `python3` from `PATH`.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{BenchError, Result};

/// Oldest interpreter the workload supports.
pub const MIN_PYTHON: (u32, u32) = (3, 6);

const DEFAULT_INTERPRETER: &str = "python3";

/// A probed interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonEnvironment {
    pub interpreter: PathBuf,
    /// Virtualenv/conda name, the selector, or `system`.
    pub identity: String,
    pub version: (u32, u32, u32),
    pub version_text: String,
}

impl PythonEnvironment {
    /// Resolve the selector and check the interpreter version.
    pub fn probe(selector: Option<&Path>) -> Result<Self> {
        let (interpreter, identity) = select_interpreter(selector)?;
        let output = Command::new(&interpreter)
            .arg("--version")
            .output()
            .map_err(|e| {
                BenchError::Environment(format!(
                    "cannot run interpreter {}: {e}",
                    interpreter.display()
                ))
            })?;
        // Python 2 prints its version on stderr.
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
        .trim()
        .to_string();
        if !output.status.success() {
            return Err(BenchError::Environment(format!(
                "{} --version failed: {text}",
                interpreter.display()
            )));
        }
        let version = parse_python_version(&text).ok_or_else(|| {
            BenchError::Environment(format!("unrecognised interpreter version '{text}'"))
        })?;
        check_minimum(version)?;
        info!(interpreter = %interpreter.display(), version = %text, env = %identity, "python environment selected");
        Ok(PythonEnvironment {
            interpreter,
            identity,
            version,
            version_text: text,
        })
    }

    /// `pip list --format=freeze` for provenance, or a note that it was
    /// unavailable.
    pub fn installed_packages(&self) -> String {
        let result = Command::new(&self.interpreter)
            .args(["-m", "pip", "list", "--format=freeze"])
            .output();
        match result {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
            Ok(out) => {
                debug!(status = ?out.status, "pip list failed");
                format!("unavailable (pip exited with {})", out.status)
            }
            Err(e) => format!("unavailable ({e})"),
        }
    }
}

fn select_interpreter(selector: Option<&Path>) -> Result<(PathBuf, String)> {
    match selector {
        Some(dir) if dir.is_dir() => {
            let python = dir.join("bin").join("python");
            if !python.exists() {
                return Err(BenchError::Environment(format!(
                    "{} is not a virtual environment (no bin/python)",
                    dir.display()
                )));
            }
            let identity = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.display().to_string());
            Ok((python, identity))
        }
        Some(path) => Ok((path.to_path_buf(), path.display().to_string())),
        None => {
            let identity = std::env::var("VIRTUAL_ENV")
                .or_else(|_| std::env::var("CONDA_DEFAULT_ENV"))
                .unwrap_or_else(|_| "system".to_string());
            Ok((PathBuf::from(DEFAULT_INTERPRETER), identity))
        }
    }
}

/// Parse `Python 3.10.12` (or `Python 3.12.0rc1`) into a triple.
pub fn parse_python_version(text: &str) -> Option<(u32, u32, u32)> {
    let rest = text.trim().strip_prefix("Python")?.trim();
    let mut parts = rest.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = leading_number(parts.next()?)?;
    let patch = parts.next().and_then(leading_number).unwrap_or(0);
    Some((major, minor, patch))
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn check_minimum(version: (u32, u32, u32)) -> Result<()> {
    if (version.0, version.1) < MIN_PYTHON {
        return Err(BenchError::Environment(format!(
            "python {}.{}.{} is too old; {}.{} or newer is required",
            version.0, version.1, version.2, MIN_PYTHON.0, MIN_PYTHON.1
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_versions() {
        assert_eq!(parse_python_version("Python 3.10.12"), Some((3, 10, 12)));
        assert_eq!(parse_python_version("Python 3.12.0rc1\n"), Some((3, 12, 0)));
        assert_eq!(parse_python_version("Python 2.7"), Some((2, 7, 0)));
        assert_eq!(parse_python_version("pypy"), None);
    }

    #[test]
    fn test_minimum_version() {
        assert!(check_minimum((3, 6, 0)).is_ok());
        assert!(check_minimum((3, 11, 4)).is_ok());
        assert!(matches!(
            check_minimum((3, 5, 9)),
            Err(BenchError::Environment(_))
        ));
        assert!(check_minimum((2, 7, 18)).is_err());
    }

    #[test]
    fn test_directory_without_python_rejected() {
        let dir = TempDir::new().unwrap();
        let err = PythonEnvironment::probe(Some(dir.path())).unwrap_err();
        assert!(matches!(err, BenchError::Environment(_)));
    }

    #[test]
    fn test_missing_interpreter_rejected() {
        let err =
            PythonEnvironment::probe(Some(Path::new("/nonexistent/bin/python9"))).unwrap_err();
        assert_eq!(err.stage(), "environment check");
    }
}
