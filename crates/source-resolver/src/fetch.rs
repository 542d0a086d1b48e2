//! Upstream archive locations and the download seam
//!
//! Network access is isolated behind [`Fetcher`] so resolution can be
//! exercised against local fixtures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::device::CompatFamily;
use crate::error::VersionError;
use crate::Result;

/// Ref fetched when the selector is `latest`.
pub const HEAD_REF: &str = "master";

/// Upstream repository locations, one per family
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Repository of the numba/cuda port
    pub numba_cuda_repo: String,
    /// Repository of the cython code base
    pub cython_repo: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            numba_cuda_repo: std::env::var("SIMBENCH_NUMBA_UPSTREAM")
                .unwrap_or_else(|_| "https://gitlab.com/monolithu/pyglasma3d_numba".to_string()),
            cython_repo: std::env::var("SIMBENCH_CYTHON_UPSTREAM")
                .unwrap_or_else(|_| "https://gitlab.com/dmueller/pyglasma3d".to_string()),
        }
    }
}

impl UpstreamConfig {
    /// Read the locations from environment variables, with defaults.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Fixed locations (tests, mirrors).
    pub fn new(numba_cuda_repo: &str, cython_repo: &str) -> Self {
        UpstreamConfig {
            numba_cuda_repo: numba_cuda_repo.trim_end_matches('/').to_string(),
            cython_repo: cython_repo.trim_end_matches('/').to_string(),
        }
    }

    pub fn repo(&self, family: CompatFamily) -> &str {
        match family {
            CompatFamily::NumbaCuda => &self.numba_cuda_repo,
            CompatFamily::Cython => &self.cython_repo,
        }
    }

    /// Zip archive URL for `git_ref` in the family's repository
    /// (`<repo>/-/archive/<ref>/<name>-<ref>.zip`).
    pub fn archive_url(&self, family: CompatFamily, git_ref: &str) -> String {
        let repo = self.repo(family).trim_end_matches('/');
        let name = repo.rsplit('/').next().unwrap_or("source");
        format!("{repo}/-/archive/{git_ref}/{name}-{git_ref}.zip")
    }
}

/// Downloads an archive to a local file
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("simbench-source-resolver/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VersionError::Fetch {
                url: String::new(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(HttpFetcher { http_client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Fetching {}", url);
        let fetch_err = |reason: String| VersionError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_err(e.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &body).await?;
        debug!("Wrote {} bytes to {:?}", body.len(), dest);
        Ok(())
    }
}
