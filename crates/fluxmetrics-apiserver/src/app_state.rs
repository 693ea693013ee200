//! Shared application state for the metrics API server.
//!
//! Everything here is assembled once before the listener opens and is
//! read-only afterwards (the endpoint cache is the only interior mutability).
//! Startup errors are returned, never panicked.

use std::sync::Arc;
use std::time::Duration;

use fluxmetrics_core::error::Result;
use fluxmetrics_core::protocol::EnvelopeBuilder;
use fluxmetrics_core::{MetricRegistry, MetricResolver, SchedulerHandle};

use crate::config::ApiServerConfig;
use crate::obs::metrics::ApiMetrics;
use crate::plugin;
use crate::upstream::{DiscoverySource, EndpointCache, InClusterSource};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ApiServerConfig,
    resolver: MetricResolver,
    cache: EndpointCache,
    metrics: Arc<ApiMetrics>,
}

impl AppState {
    /// Build state with the built-in metrics, plus the custom metrics library
    /// when one is configured. A bad library aborts startup.
    pub fn new(
        cfg: ApiServerConfig,
        handle: Arc<dyn SchedulerHandle>,
        source: Arc<dyn DiscoverySource>,
    ) -> Result<Self> {
        let mut registry = MetricRegistry::with_builtins(handle);
        if let Some(path) = &cfg.metrics.custom_metrics {
            plugin::load(path, &mut registry)?;
        }
        Self::from_registry(cfg, registry, source)
    }

    /// Build state around an already-populated registry.
    pub fn from_registry(
        cfg: ApiServerConfig,
        registry: MetricRegistry,
        source: Arc<dyn DiscoverySource>,
    ) -> Result<Self> {
        cfg.validate()?;

        let envelope = EnvelopeBuilder::new(
            cfg.api.group_version(),
            cfg.service.namespace.clone(),
            cfg.service.name.clone(),
        );
        let resolver = MetricResolver::new(Arc::new(registry), Arc::new(envelope));

        let metrics = Arc::new(ApiMetrics::default());
        let cache = EndpointCache::new(source, cfg.upstream.cache).with_metrics(Arc::clone(&metrics));

        tracing::info!(
            root = %cfg.api.root,
            metrics = resolver.registry().len(),
            custom = resolver.registry().custom_len(),
            cache = cfg.upstream.cache,
            "api state ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                resolver,
                cache,
                metrics,
            }),
        })
    }

    /// The discovery source used in production: the pod's service account.
    pub fn in_cluster_source(cfg: &ApiServerConfig) -> Arc<dyn DiscoverySource> {
        Arc::new(InClusterSource::new(
            cfg.upstream.host.clone(),
            cfg.upstream.service_account_dir.clone(),
            Duration::from_millis(cfg.upstream.timeout_ms),
        ))
    }

    pub fn cfg(&self) -> &ApiServerConfig {
        &self.inner.cfg
    }

    pub fn resolver(&self) -> &MetricResolver {
        &self.inner.resolver
    }

    pub fn envelope(&self) -> &EnvelopeBuilder {
        self.inner.resolver.envelope()
    }

    pub fn registry(&self) -> &MetricRegistry {
        self.inner.resolver.registry()
    }

    pub fn cache(&self) -> &EndpointCache {
        &self.inner.cache
    }

    pub fn metrics(&self) -> Arc<ApiMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.cfg.metrics.provider_timeout_ms)
    }

    pub fn debug(&self) -> bool {
        self.inner.cfg.server.debug
    }
}
