//! Error types for source-resolver

use thiserror::Error;

/// Errors raised while resolving or verifying a source distribution
#[derive(Error, Debug)]
pub enum VersionError {
    /// Selector is neither `latest`, a known tag, nor a readable archive
    #[error("cannot resolve version selector '{0}': not 'latest', a known tag, or a readable archive")]
    Unresolvable(String),

    /// Local archive digest is in neither allow-list and no override label was given
    #[error("archive {path} has untrusted digest {digest}; pass a force label to use it anyway")]
    Untrusted { path: String, digest: String },

    /// Requested device is outside the distribution's compatibility family
    #[error("version '{version}' ({family}) does not support device '{device}'")]
    IncompatibleDevice {
        version: String,
        family: String,
        device: String,
    },

    /// A fetched tagged archive does not match its pinned digest
    #[error("checksum mismatch for tag '{tag}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        tag: String,
        expected: String,
        actual: String,
    },

    /// Force label is present but empty
    #[error("force label must not be empty")]
    EmptyForceLabel,

    /// Download failed
    #[error("fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    /// Known-digest file could not be parsed
    #[error("invalid known-digest table: {0}")]
    InvalidTable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for VersionError {
    fn from(err: toml::de::Error) -> Self {
        VersionError::InvalidTable(err.to_string())
    }
}
