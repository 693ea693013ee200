//! Metric resolver: name -> provider -> `MetricValue`.

use std::sync::Arc;

use crate::error::{MetricsError, Result};
use crate::protocol::{EnvelopeBuilder, LabelSelector, MetricIdentifier, MetricValue};
use crate::registry::MetricRegistry;

/// Read-only after construction; clone the `Arc`s freely across requests.
#[derive(Clone)]
pub struct MetricResolver {
    registry: Arc<MetricRegistry>,
    envelope: Arc<EnvelopeBuilder>,
}

impl MetricResolver {
    pub fn new(registry: Arc<MetricRegistry>, envelope: Arc<EnvelopeBuilder>) -> Self {
        Self { registry, envelope }
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn envelope(&self) -> &EnvelopeBuilder {
        &self.envelope
    }

    /// Look up `name`, run its provider now and wrap the result.
    ///
    /// Unknown names fail with `NotFound`. Any error a provider raises becomes
    /// `Provider`, so a known metric that failed is never reported as unknown.
    pub fn resolve_and_evaluate(&self, name: &str, selector: Option<LabelSelector>) -> Result<MetricValue> {
        let provider = self.registry.resolve(name)?;
        let value = provider
            .invoke(self.registry.handle().as_ref())
            .map_err(|e| match e {
                MetricsError::Provider { .. } => e,
                other => MetricsError::provider(name, other),
            })?;
        tracing::debug!(metric = %name, custom = provider.is_custom(), ?value, "metric evaluated");

        self.envelope
            .new_metric(MetricIdentifier::new(name, selector), value, None)
    }
}
