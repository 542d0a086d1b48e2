//! source-resolver: version resolution for simbench
//!
//! Turns a user-supplied version selector (`latest`, a published tag, or a
//! local archive path) into a verified [`SourceDistribution`] for one
//! device kind.
//!
//! ## Trust boundary
//!
//! Archives are identified by SHA-256. Two disjoint allow-lists, one per
//! [`CompatFamily`], pin published tags to digests. Anything else needs an
//! explicit force label.

pub mod device;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod known;
pub mod resolve;

pub use device::{CompatFamily, DeviceKind};
pub use digest::ArchiveDigest;
pub use error::VersionError;
pub use fetch::{Fetcher, HttpFetcher, UpstreamConfig, HEAD_REF};
pub use known::{KnownDigests, KnownRelease};
pub use resolve::{Resolver, SourceDistribution, Trust, LATEST};

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, VersionError>;
