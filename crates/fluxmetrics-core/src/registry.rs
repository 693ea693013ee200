//! Metric provider registry.
//!
//! Two maps keyed by metric name:
//! - built-in providers: zero-argument closures that captured the scheduler
//!   handle when they were registered.
//! - custom providers: `CustomMetric` values that receive the handle on every
//!   call.
//!
//! Lookup checks the custom map first, so a custom metric with a built-in's
//! name replaces it. The registry is filled during startup and then shared
//! read-only behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{MetricsError, Result};
use crate::protocol::MetricScalar;
use crate::scheduler::{JobState, SchedulerHandle};

/// Built-in provider: computes a value from state it already holds.
pub type MetricFn = Arc<dyn Fn() -> Result<MetricScalar> + Send + Sync>;

/// A user-supplied metric. Receives the scheduler handle as its only argument.
pub trait CustomMetric: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, handle: &dyn SchedulerHandle) -> Result<MetricScalar>;
}

/// Closure-backed `CustomMetric` for in-process plugins.
pub struct FnMetric<F> {
    name: String,
    f: F,
}

impl<F> CustomMetric for FnMetric<F>
where
    F: Fn(&dyn SchedulerHandle) -> Result<MetricScalar> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, handle: &dyn SchedulerHandle) -> Result<MetricScalar> {
        (self.f)(handle)
    }
}

/// Wrap a closure as a custom metric named `name`.
pub fn custom_metric<F>(name: impl Into<String>, f: F) -> Arc<dyn CustomMetric>
where
    F: Fn(&dyn SchedulerHandle) -> Result<MetricScalar> + Send + Sync + 'static,
{
    Arc::new(FnMetric {
        name: name.into(),
        f,
    })
}

/// A resolved provider, borrowed from the registry.
pub enum Provider<'a> {
    Builtin(&'a MetricFn),
    Custom(&'a dyn CustomMetric),
}

impl Provider<'_> {
    /// Run the provider. Custom providers get `handle`; built-ins ignore it.
    pub fn invoke(&self, handle: &dyn SchedulerHandle) -> Result<MetricScalar> {
        match self {
            Provider::Builtin(f) => f(),
            Provider::Custom(m) => m.evaluate(handle),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Provider::Custom(_))
    }
}

pub struct MetricRegistry {
    handle: Arc<dyn SchedulerHandle>,
    builtin: BTreeMap<String, MetricFn>,
    custom: BTreeMap<String, Arc<dyn CustomMetric>>,
}

impl MetricRegistry {
    /// Empty registry bound to `handle`.
    pub fn new(handle: Arc<dyn SchedulerHandle>) -> Self {
        Self {
            handle,
            builtin: BTreeMap::new(),
            custom: BTreeMap::new(),
        }
    }

    /// Registry with every built-in metric installed.
    pub fn with_builtins(handle: Arc<dyn SchedulerHandle>) -> Self {
        let mut registry = Self::new(handle);
        register_builtins(&mut registry);
        registry
    }

    pub fn handle(&self) -> &Arc<dyn SchedulerHandle> {
        &self.handle
    }

    /// Install a built-in provider. A later registration under the same name wins.
    pub fn register(&mut self, name: impl Into<String>, provider: MetricFn) {
        let name = name.into();
        if self.builtin.insert(name.clone(), provider).is_some() {
            tracing::warn!(metric = %name, "built-in metric registered twice, keeping the last one");
        }
    }

    /// Install a custom provider under its own name.
    pub fn register_custom(&mut self, metric: Arc<dyn CustomMetric>) -> Result<()> {
        let name = metric.name().to_string();
        if name.is_empty() {
            return Err(MetricsError::Config("custom metric name must not be empty".into()));
        }
        if self.builtin.contains_key(&name) {
            tracing::info!(metric = %name, "custom metric overrides built-in");
        }
        if self.custom.insert(name.clone(), metric).is_some() {
            tracing::warn!(metric = %name, "custom metric registered twice, keeping the last one");
        }
        Ok(())
    }

    /// Look up `name`, custom set first.
    pub fn resolve(&self, name: &str) -> Result<Provider<'_>> {
        if let Some(m) = self.custom.get(name) {
            return Ok(Provider::Custom(m.as_ref()));
        }
        self.builtin
            .get(name)
            .map(Provider::Builtin)
            .ok_or_else(|| MetricsError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name) || self.builtin.contains_key(name)
    }

    /// Every registered name, sorted, without duplicates.
    pub fn list_names(&self) -> Vec<&str> {
        self.builtin
            .keys()
            .chain(self.custom.keys())
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.list_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.builtin.is_empty() && self.custom.is_empty()
    }

    pub fn custom_len(&self) -> usize {
        self.custom.len()
    }
}

/// Names of the node/core metrics, in registration order.
pub const NODE_METRICS: [&str; 4] = [
    "node_cores_free_count",
    "node_cores_up_count",
    "node_free_count",
    "node_up_count",
];

fn register_builtins(registry: &mut MetricRegistry) {
    let handle = Arc::clone(&registry.handle);

    for name in NODE_METRICS {
        let h = Arc::clone(&handle);
        registry.register(
            name,
            Arc::new(move || {
                let listing = h.query_resource_listing()?;
                let value = match name {
                    "node_cores_free_count" => MetricScalar::from(listing.free.ncores),
                    "node_cores_up_count" => MetricScalar::from(listing.up.ncores),
                    "node_free_count" => MetricScalar::from(listing.free.nodelist.len()),
                    _ => MetricScalar::from(listing.up.nodelist.len()),
                };
                Ok(value)
            }),
        );
    }

    for state in JobState::ALL {
        let h = Arc::clone(&handle);
        registry.register(
            state.metric_name(),
            Arc::new(move || queue_state_count(h.as_ref(), state).map(MetricScalar::from)),
        );
    }
}

/// Number of jobs currently in `state`, from one job listing query.
pub fn queue_state_count(handle: &dyn SchedulerHandle, state: JobState) -> Result<u64> {
    let jobs = handle.query_job_listing()?;
    let count = jobs
        .iter()
        .filter(|job| handle.state_to_name(job.state).eq_ignore_ascii_case(state.as_str()))
        .count();
    Ok(count as u64)
}
