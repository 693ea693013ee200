//! Upstream discovery (cluster API server) access.
//!
//! `DiscoverySource` performs one raw read of an endpoint; `EndpointCache`
//! sits in front of it, parses the body and memoizes successful results for
//! the life of the process.

pub mod cache;
pub mod incluster;

use async_trait::async_trait;

use fluxmetrics_core::error::Result;

pub use cache::EndpointCache;
pub use incluster::InClusterSource;

/// One raw read against the upstream discovery API.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Body of `GET <host>/<endpoint>`.
    ///
    /// `Ok(None)` means the source is not usable from this process (e.g. not
    /// running inside a pod). Transport failures are `Err(Upstream)`.
    async fn get(&self, endpoint: &str) -> Result<Option<Vec<u8>>>;
}
