//! In-cluster discovery source.
//!
//! Reads the pod's service-account artifacts (namespace marker, CA bundle,
//! bearer token) and issues an authenticated GET against the cluster API
//! host. When any artifact is missing the process is not running inside a
//! pod and every read returns `Ok(None)`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use fluxmetrics_core::error::{MetricsError, Result};

use super::DiscoverySource;

/// Paths of the service-account artifacts, all known to exist.
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    pub namespace_file: PathBuf,
    pub ca_file: PathBuf,
    pub token_file: PathBuf,
}

impl ServiceAccount {
    /// `Some` only when the directory and all three files are present.
    pub fn discover(dir: &Path) -> Option<Self> {
        let sa = Self {
            namespace_file: dir.join("namespace"),
            ca_file: dir.join("ca.crt"),
            token_file: dir.join("token"),
        };
        let present = dir.is_dir()
            && [&sa.namespace_file, &sa.ca_file, &sa.token_file]
                .iter()
                .all(|p| p.exists());
        present.then_some(sa)
    }
}

pub struct InClusterSource {
    host: String,
    service_account_dir: PathBuf,
    timeout: Duration,
}

impl InClusterSource {
    pub fn new(host: impl Into<String>, service_account_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            service_account_dir: service_account_dir.into(),
            timeout,
        }
    }

    pub fn credentials(&self) -> Option<ServiceAccount> {
        ServiceAccount::discover(&self.service_account_dir)
    }

    fn client(&self, ca_pem: &[u8]) -> Result<reqwest::Client> {
        let ca = reqwest::Certificate::from_pem(ca_pem)
            .map_err(|e| MetricsError::Upstream(format!("invalid cluster CA: {e}")))?;
        reqwest::Client::builder()
            .add_root_certificate(ca)
            .timeout(self.timeout)
            .build()
            .map_err(|e| MetricsError::Upstream(format!("http client build failed: {e}")))
    }
}

#[async_trait]
impl DiscoverySource for InClusterSource {
    async fn get(&self, endpoint: &str) -> Result<Option<Vec<u8>>> {
        let Some(sa) = self.credentials() else {
            return Ok(None);
        };

        let token = tokio::fs::read_to_string(&sa.token_file)
            .await
            .map_err(|e| MetricsError::Upstream(format!("read token failed: {e}")))?;
        let ca_pem = tokio::fs::read(&sa.ca_file)
            .await
            .map_err(|e| MetricsError::Upstream(format!("read CA failed: {e}")))?;

        let url = format!("{}/{}", self.host.trim_end_matches('/'), endpoint.trim_start_matches('/'));
        let resp = self
            .client(&ca_pem)?
            .get(&url)
            .bearer_auth(token.trim())
            .send()
            .await
            .map_err(|e| MetricsError::Upstream(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MetricsError::Upstream(format!("GET {url} returned {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| MetricsError::Upstream(format!("GET {url} body failed: {e}")))?;
        tracing::debug!(%url, bytes = body.len(), "upstream discovery fetched");
        Ok(Some(body.to_vec()))
    }
}
