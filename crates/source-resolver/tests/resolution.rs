//! Resolution tests against in-memory upstreams.

use async_trait::async_trait;
use source_resolver::{
    ArchiveDigest, CompatFamily, DeviceKind, Fetcher, KnownDigests, Resolver, Trust,
    UpstreamConfig, VersionError,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const NUMBA_TAG_BYTES: &[u8] = b"numba v0.4.5 archive";
const CYTHON_BYTES: &[u8] = b"cython v1.0 archive";
const HEAD_BYTES: &[u8] = b"numba head archive";

/// Serves fixed bodies per URL and records every request.
struct FakeFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn new(bodies: Vec<(String, &[u8])>) -> Self {
        FakeFetcher {
            bodies: bodies.into_iter().map(|(u, b)| (u, b.to_vec())).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> source_resolver::Result<()> {
        self.requests.lock().unwrap().push(url.to_string());
        let body = self.bodies.get(url).ok_or_else(|| VersionError::Fetch {
            url: url.to_string(),
            reason: "404".to_string(),
        })?;
        std::fs::create_dir_all(dest.parent().unwrap())?;
        std::fs::write(dest, body)?;
        Ok(())
    }
}

fn upstream() -> UpstreamConfig {
    UpstreamConfig::new("https://up.example/numba", "https://up.example/cython")
}

fn known() -> KnownDigests {
    KnownDigests::empty()
        .with_release(
            "v0.4.5",
            CompatFamily::NumbaCuda,
            ArchiveDigest::compute(NUMBA_TAG_BYTES),
        )
        .unwrap()
        .with_release("v1.0", CompatFamily::Cython, ArchiveDigest::compute(CYTHON_BYTES))
        .unwrap()
}

fn resolver(fetcher: Arc<FakeFetcher>, dir: &TempDir) -> Resolver {
    Resolver::new(known(), upstream(), fetcher, dir.path().join("downloads"))
}

fn default_fetcher() -> Arc<FakeFetcher> {
    let up = upstream();
    Arc::new(FakeFetcher::new(vec![
        (up.archive_url(CompatFamily::NumbaCuda, "v0.4.5"), NUMBA_TAG_BYTES),
        (up.archive_url(CompatFamily::NumbaCuda, "master"), HEAD_BYTES),
        (up.archive_url(CompatFamily::Cython, "master"), CYTHON_BYTES),
    ]))
}

fn write_archive(dir: &TempDir, name: &str, bytes: &[u8]) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path.to_string_lossy().to_string()
}

#[tokio::test]
async fn test_known_tag_resolves_for_every_compatible_device() {
    let dir = TempDir::new().unwrap();
    let fetcher = default_fetcher();
    let resolver = resolver(fetcher.clone(), &dir);

    for device in [DeviceKind::Cuda, DeviceKind::Numba] {
        let dist = resolver.resolve("v0.4.5", device, None).await.unwrap();
        assert!(dist.supports(device));
        assert_eq!(dist.trusted_tag(), Some("v0.4.5"));
        assert_eq!(dist.digest, ArchiveDigest::compute(NUMBA_TAG_BYTES));
        assert!(dist.location.exists());
    }
    assert_eq!(fetcher.requests().len(), 2);
}

#[tokio::test]
async fn test_known_tag_incompatible_device_fails_before_fetch() {
    let dir = TempDir::new().unwrap();
    let fetcher = default_fetcher();
    let resolver = resolver(fetcher.clone(), &dir);

    let err = resolver
        .resolve("v0.4.5", DeviceKind::Cython, None)
        .await
        .unwrap_err();
    assert!(matches!(err, VersionError::IncompatibleDevice { .. }));
    assert!(fetcher.requests().is_empty(), "no network on incompatible tag");
}

#[tokio::test]
async fn test_local_archive_matching_pinned_digest() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(default_fetcher(), &dir);
    let numba_path = write_archive(&dir, "numba.zip", NUMBA_TAG_BYTES);
    let cython_path = write_archive(&dir, "cython.zip", CYTHON_BYTES);

    let dist = resolver
        .resolve(&numba_path, DeviceKind::Cuda, None)
        .await
        .unwrap();
    assert_eq!(dist.trusted_tag(), Some("v0.4.5"));
    assert_eq!(dist.family, Some(CompatFamily::NumbaCuda));

    let dist = resolver
        .resolve(&cython_path, DeviceKind::Cython, None)
        .await
        .unwrap();
    assert_eq!(dist.trusted_tag(), Some("v1.0"));
    assert!(dist.supports(DeviceKind::Cython));

    for device in [DeviceKind::Cuda, DeviceKind::Numba] {
        let err = resolver.resolve(&cython_path, device, None).await.unwrap_err();
        assert!(matches!(err, VersionError::IncompatibleDevice { .. }));
    }
    let err = resolver
        .resolve(&numba_path, DeviceKind::Cython, None)
        .await
        .unwrap_err();
    assert!(matches!(err, VersionError::IncompatibleDevice { .. }));
}

#[tokio::test]
async fn test_unknown_local_archive_requires_force_label() {
    let dir = TempDir::new().unwrap();
    let fetcher = default_fetcher();
    let resolver = resolver(fetcher.clone(), &dir);
    let path = write_archive(&dir, "patched.zip", b"locally patched tree");

    let err = resolver
        .resolve(&path, DeviceKind::Cuda, None)
        .await
        .unwrap_err();
    assert!(matches!(err, VersionError::Untrusted { .. }));

    let dist = resolver
        .resolve(&path, DeviceKind::Cuda, Some("fix-boundary"))
        .await
        .unwrap();
    assert_eq!(
        dist.trust,
        Trust::Custom {
            label: "fix-boundary".to_string()
        }
    );
    assert_eq!(dist.version_label(), "fix-boundary");
    assert!(!dist.is_trusted());
    assert!(dist.supports(DeviceKind::Cuda));
    assert!(fetcher.requests().is_empty(), "local paths never hit the network");
}

#[tokio::test]
async fn test_empty_force_label_rejected() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(default_fetcher(), &dir);
    let path = write_archive(&dir, "patched.zip", b"x");

    let err = resolver
        .resolve(&path, DeviceKind::Cuda, Some("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, VersionError::EmptyForceLabel));
}

#[tokio::test]
async fn test_latest_uses_device_family_upstream() {
    let dir = TempDir::new().unwrap();
    let fetcher = default_fetcher();
    let resolver = resolver(fetcher.clone(), &dir);

    let dist = resolver.resolve("latest", DeviceKind::Cuda, None).await.unwrap();
    assert_eq!(dist.trust, Trust::Latest);
    assert_eq!(dist.version_label(), "latest_cuda");
    assert!(dist.is_trusted());

    let dist = resolver
        .resolve("latest", DeviceKind::Cython, None)
        .await
        .unwrap();
    assert_eq!(dist.version_label(), "latest_cython");
    assert!(dist.supports(DeviceKind::Cython));

    let requests = fetcher.requests();
    assert!(requests[0].starts_with("https://up.example/numba/"));
    assert!(requests[1].starts_with("https://up.example/cython/"));
}

#[tokio::test]
async fn test_tag_checksum_mismatch() {
    let dir = TempDir::new().unwrap();
    let up = upstream();
    let tampered = Arc::new(FakeFetcher::new(vec![(
        up.archive_url(CompatFamily::NumbaCuda, "v0.4.5"),
        b"tampered bytes".as_slice(),
    )]));
    let resolver = resolver(tampered, &dir);

    let err = resolver
        .resolve("v0.4.5", DeviceKind::Numba, None)
        .await
        .unwrap_err();
    assert!(matches!(err, VersionError::ChecksumMismatch { .. }));

    let dist = resolver
        .resolve("v0.4.5", DeviceKind::Numba, Some("mirror-build"))
        .await
        .unwrap();
    assert_eq!(dist.version_label(), "mirror-build");
}

#[tokio::test]
async fn test_unknown_selector_is_unresolvable() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(default_fetcher(), &dir);

    for selector in ["v9.9.9", "/definitely/not/here.zip"] {
        let err = resolver
            .resolve(selector, DeviceKind::Cuda, Some("label"))
            .await
            .unwrap_err();
        assert!(matches!(err, VersionError::Unresolvable(_)), "{selector}");
    }
}
