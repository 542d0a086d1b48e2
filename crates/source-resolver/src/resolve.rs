//! Version resolution
//!
//! Maps a version selector plus a target device to a verified
//! [`SourceDistribution`]. Selectors are tried in this order:
//! 1. `latest` - head of the device family's upstream, trusted by convention
//! 2. a known numba/cuda tag - fetched and checked against its pinned digest
//! 3. a readable local archive - digest looked up in both allow-lists
//!
//! An archive whose digest is unknown is rejected unless the caller passes
//! a force label; that label then replaces the tag as the version string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::device::{CompatFamily, DeviceKind};
use crate::digest::ArchiveDigest;
use crate::error::VersionError;
use crate::fetch::{Fetcher, UpstreamConfig, HEAD_REF};
use crate::known::KnownDigests;
use crate::Result;

/// Selector value that requests the upstream head.
pub const LATEST: &str = "latest";

/// How a distribution earned (or bypassed) trust
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trust {
    /// Upstream head; no digest to check against
    Latest,
    /// Digest matches a pinned release
    Tagged { tag: String },
    /// Unknown digest accepted through an explicit force label
    Custom { label: String },
}

/// An immutable, content-addressed source archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDistribution {
    /// Local path of the archive
    pub location: PathBuf,
    /// Where it came from (URL or the path given by the caller)
    pub origin: String,
    /// SHA-256 of the archive bytes
    pub digest: ArchiveDigest,
    pub trust: Trust,
    /// Lineage, when known
    pub family: Option<CompatFamily>,
    /// Devices this distribution may run on
    pub devices: BTreeSet<DeviceKind>,
    /// Device the distribution was resolved for
    pub device: DeviceKind,
}

impl SourceDistribution {
    pub fn is_trusted(&self) -> bool {
        !matches!(self.trust, Trust::Custom { .. })
    }

    pub fn trusted_tag(&self) -> Option<&str> {
        match &self.trust {
            Trust::Tagged { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn supports(&self, device: DeviceKind) -> bool {
        self.devices.contains(&device)
    }

    /// Version string used in provenance and directory names.
    pub fn version_label(&self) -> String {
        match &self.trust {
            Trust::Latest => format!("{LATEST}_{}", self.device),
            Trust::Tagged { tag } => tag.clone(),
            Trust::Custom { label } => label.clone(),
        }
    }
}

/// Resolves selectors against the allow-lists and upstream locations
pub struct Resolver {
    known: KnownDigests,
    upstream: UpstreamConfig,
    fetcher: Arc<dyn Fetcher>,
    download_dir: PathBuf,
}

impl Resolver {
    /// `download_dir` receives fetched archives.
    pub fn new(
        known: KnownDigests,
        upstream: UpstreamConfig,
        fetcher: Arc<dyn Fetcher>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Resolver {
            known,
            upstream,
            fetcher,
            download_dir: download_dir.into(),
        }
    }

    pub fn known(&self) -> &KnownDigests {
        &self.known
    }

    /// Resolve `selector` for `device`.
    ///
    /// `force_label` is the only way to accept an archive whose digest is
    /// not pinned; it is never applied implicitly.
    pub async fn resolve(
        &self,
        selector: &str,
        device: DeviceKind,
        force_label: Option<&str>,
    ) -> Result<SourceDistribution> {
        let force_label = match force_label {
            Some(label) if label.trim().is_empty() => return Err(VersionError::EmptyForceLabel),
            Some(label) => Some(label.trim()),
            None => None,
        };

        if selector == LATEST {
            return self.resolve_latest(device).await;
        }

        if let Some(release) = self.known.lookup_tag(selector) {
            if !release.family.supports(device) {
                return Err(VersionError::IncompatibleDevice {
                    version: release.tag.clone(),
                    family: release.family.to_string(),
                    device: device.to_string(),
                });
            }
            let url = self.upstream.archive_url(release.family, &release.tag);
            let dest = self.download_dir.join(format!("{}-{}.zip", release.family, release.tag));
            self.fetcher.fetch(&url, &dest).await?;
            let digest = ArchiveDigest::of_file(&dest)?;

            if digest != release.digest {
                let Some(label) = force_label else {
                    return Err(VersionError::ChecksumMismatch {
                        tag: release.tag.clone(),
                        expected: release.digest.to_hex(),
                        actual: digest.to_hex(),
                    });
                };
                return Ok(self.custom(dest, url, digest, device, label));
            }

            info!(tag = %release.tag, digest = %digest.short(), "Verified tagged distribution");
            return Ok(SourceDistribution {
                location: dest,
                origin: url,
                digest,
                trust: Trust::Tagged {
                    tag: release.tag.clone(),
                },
                family: Some(release.family),
                devices: release.family.devices(),
                device,
            });
        }

        let path = Path::new(selector);
        if path.is_file() {
            let digest = ArchiveDigest::of_file(path)
                .map_err(|_| VersionError::Unresolvable(selector.to_string()))?;
            return self.resolve_local(path, digest, device, force_label);
        }

        Err(VersionError::Unresolvable(selector.to_string()))
    }

    async fn resolve_latest(&self, device: DeviceKind) -> Result<SourceDistribution> {
        let family = device.family();
        let url = self.upstream.archive_url(family, HEAD_REF);
        let dest = self.download_dir.join(format!("{family}-{LATEST}.zip"));
        self.fetcher.fetch(&url, &dest).await?;
        let digest = ArchiveDigest::of_file(&dest)?;
        info!(%device, digest = %digest.short(), "Using upstream head distribution");

        Ok(SourceDistribution {
            location: dest,
            origin: url,
            digest,
            trust: Trust::Latest,
            family: Some(family),
            devices: family.devices(),
            device,
        })
    }

    fn resolve_local(
        &self,
        path: &Path,
        digest: ArchiveDigest,
        device: DeviceKind,
        force_label: Option<&str>,
    ) -> Result<SourceDistribution> {
        let origin = path.to_string_lossy().to_string();

        match self.known.lookup_digest(&digest) {
            Some(release) => {
                if !release.family.supports(device) {
                    return Err(VersionError::IncompatibleDevice {
                        version: release.tag.clone(),
                        family: release.family.to_string(),
                        device: device.to_string(),
                    });
                }
                info!(tag = %release.tag, digest = %digest.short(), "Local archive matches pinned release");
                Ok(SourceDistribution {
                    location: path.to_path_buf(),
                    origin,
                    digest,
                    trust: Trust::Tagged {
                        tag: release.tag.clone(),
                    },
                    family: Some(release.family),
                    devices: release.family.devices(),
                    device,
                })
            }
            None => match force_label {
                Some(label) => Ok(self.custom(path.to_path_buf(), origin, digest, device, label)),
                None => Err(VersionError::Untrusted {
                    path: origin,
                    digest: digest.to_hex(),
                }),
            },
        }
    }

    fn custom(
        &self,
        location: PathBuf,
        origin: String,
        digest: ArchiveDigest,
        device: DeviceKind,
        label: &str,
    ) -> SourceDistribution {
        warn!(
            digest = %digest.short(),
            label = %label,
            "Accepting untrusted distribution through force label"
        );
        SourceDistribution {
            location,
            origin,
            digest,
            trust: Trust::Custom {
                label: label.to_string(),
            },
            family: None,
            devices: BTreeSet::from([device]),
            device,
        }
    }
}
