//! Known-digest allow-lists
//!
//! Two disjoint tables, one per compatibility family, map published tags
//! to the SHA-256 of their archive. A distribution is trusted only when
//! its digest appears in one of them.
//!
//! No digests are compiled in. Pins come from a TOML file that is
//! recorded alongside the archives it describes:
//!
//! ```toml
//! [[numba_cuda]]
//! tag = "v0.4.6"
//! sha256 = "<64 hex chars>"
//!
//! [[cython]]
//! tag = "v1.1"
//! sha256 = "<64 hex chars>"
//! ```
//!
//! Without a pin file only `latest`, and local archives under a force
//! label, resolve.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::device::CompatFamily;
use crate::digest::ArchiveDigest;
use crate::error::VersionError;
use crate::Result;

/// A published release pinned by digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownRelease {
    pub tag: String,
    pub family: CompatFamily,
    pub digest: ArchiveDigest,
}

/// The per-family allow-lists
#[derive(Debug, Clone, Default)]
pub struct KnownDigests {
    tables: BTreeMap<CompatFamily, Vec<KnownRelease>>,
}

#[derive(Debug, Deserialize)]
struct DigestEntry {
    tag: String,
    sha256: String,
}

#[derive(Debug, Deserialize, Default)]
struct DigestFile {
    #[serde(default)]
    numba_cuda: Vec<DigestEntry>,
    #[serde(default)]
    cython: Vec<DigestEntry>,
}

impl KnownDigests {
    /// Empty tables: nothing pinned.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Tables loaded from one pin file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut known = Self::empty();
        known.extend_from_file(path)?;
        Ok(known)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(Vec::is_empty)
    }

    /// Builder form of [`KnownDigests::insert`].
    pub fn with_release(
        mut self,
        tag: &str,
        family: CompatFamily,
        digest: ArchiveDigest,
    ) -> Result<Self> {
        self.insert(tag, family, digest)?;
        Ok(self)
    }

    /// Add a pinned release. The tables must stay disjoint: a digest may
    /// belong to only one family, and a tag only once per family.
    pub fn insert(&mut self, tag: &str, family: CompatFamily, digest: ArchiveDigest) -> Result<()> {
        if let Some(existing) = self.lookup_digest(&digest) {
            if existing.family != family {
                return Err(VersionError::InvalidTable(format!(
                    "digest {} already pinned for {} tag '{}'",
                    digest.short(),
                    existing.family,
                    existing.tag
                )));
            }
        }
        let table = self.tables.entry(family).or_default();
        if table.iter().any(|r| r.tag == tag) {
            return Err(VersionError::InvalidTable(format!(
                "tag '{tag}' pinned twice for {family}"
            )));
        }
        table.push(KnownRelease {
            tag: tag.to_string(),
            family,
            digest,
        });
        Ok(())
    }

    /// Extend the tables from a TOML file.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.extend_from_toml(&content)?;
        debug!("Loaded known digests from {:?}", path);
        Ok(())
    }

    /// Extend the tables from TOML text in the pin-file format.
    pub fn extend_from_toml(&mut self, content: &str) -> Result<()> {
        let file: DigestFile = toml::from_str(content)?;
        for entry in file.numba_cuda {
            self.insert(&entry.tag, CompatFamily::NumbaCuda, entry.sha256.parse()?)?;
        }
        for entry in file.cython {
            self.insert(&entry.tag, CompatFamily::Cython, entry.sha256.parse()?)?;
        }
        Ok(())
    }

    /// Look up a fetchable tag. Only the numba/cuda family publishes
    /// fetchable tags.
    pub fn lookup_tag(&self, tag: &str) -> Option<&KnownRelease> {
        self.tables
            .get(&CompatFamily::NumbaCuda)?
            .iter()
            .find(|r| r.tag == tag)
    }

    /// Look up a digest across both tables.
    pub fn lookup_digest(&self, digest: &ArchiveDigest) -> Option<&KnownRelease> {
        self.tables
            .values()
            .flat_map(|t| t.iter())
            .find(|r| r.digest == *digest)
    }

    /// Releases pinned for one family.
    pub fn family(&self, family: CompatFamily) -> &[KnownRelease] {
        self.tables.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture() -> KnownDigests {
        let numba_a = ArchiveDigest::compute(b"numba-a");
        let numba_b = ArchiveDigest::compute(b"numba-b");
        let cython = ArchiveDigest::compute(b"cython");
        let mut known = KnownDigests::empty();
        known
            .extend_from_toml(&format!(
                "[[numba_cuda]]\ntag = \"v0.4.0\"\nsha256 = \"{numba_a}\"\n\n\
                 [[numba_cuda]]\ntag = \"v0.4.5\"\nsha256 = \"{numba_b}\"\n\n\
                 [[cython]]\ntag = \"v1.0\"\nsha256 = \"{cython}\"\n"
            ))
            .unwrap();
        known
    }

    #[test]
    fn test_nothing_pinned_by_default() {
        let known = KnownDigests::empty();
        assert!(known.is_empty());
        assert!(known.lookup_tag("v0.4.5").is_none());
        assert!(known.family(CompatFamily::NumbaCuda).is_empty());
    }

    #[test]
    fn test_loaded_tables_are_disjoint() {
        let known = fixture();
        assert!(!known.is_empty());
        assert_eq!(known.family(CompatFamily::NumbaCuda).len(), 2);
        for release in known.family(CompatFamily::NumbaCuda) {
            assert!(known
                .family(CompatFamily::Cython)
                .iter()
                .all(|c| c.digest != release.digest));
        }
        assert!(known.lookup_tag("v0.4.5").is_some());
    }

    #[test]
    fn test_cython_tags_are_not_fetchable() {
        let known = fixture();
        assert!(known.lookup_tag("v1.0").is_none());
        assert_eq!(known.family(CompatFamily::Cython)[0].tag, "v1.0");
    }

    #[test]
    fn test_same_tag_twice_rejected() {
        let digest = ArchiveDigest::compute(b"numba-c");
        let err = fixture()
            .with_release("v0.4.5", CompatFamily::NumbaCuda, digest)
            .unwrap_err();
        assert!(matches!(err, VersionError::InvalidTable(_)));
    }

    #[test]
    fn test_same_digest_in_both_families_rejected() {
        let digest = ArchiveDigest::compute(b"shared");
        let result = KnownDigests::empty()
            .with_release("a", CompatFamily::NumbaCuda, digest)
            .and_then(|k| k.with_release("b", CompatFamily::Cython, digest));
        assert!(matches!(result, Err(VersionError::InvalidTable(_))));
    }

    #[test]
    fn test_extend_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("digests.toml");
        let numba = ArchiveDigest::compute(b"numba");
        let cython = ArchiveDigest::compute(b"cython");
        std::fs::write(
            &path,
            format!(
                "[[numba_cuda]]\ntag = \"v9\"\nsha256 = \"{numba}\"\n\n[[cython]]\ntag = \"c9\"\nsha256 = \"{cython}\"\n"
            ),
        )
        .unwrap();

        let known = KnownDigests::from_file(&path).unwrap();
        assert_eq!(known.lookup_tag("v9").unwrap().digest, numba);
        assert_eq!(
            known.lookup_digest(&cython).unwrap().family,
            CompatFamily::Cython
        );
    }

    #[test]
    fn test_malformed_file_is_invalid_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("digests.toml");
        std::fs::write(&path, "[[numba_cuda]]\ntag = 3\n").unwrap();
        let err = KnownDigests::empty().extend_from_file(&path).unwrap_err();
        assert!(matches!(err, VersionError::InvalidTable(_)));
    }
}
