//! fluxmetrics core: registry, resolver and wire types for exposing Flux
//! scheduler state through the Kubernetes custom metrics API.
//!
//! This crate carries no transport or runtime dependencies. The scheduler is
//! reached only through the `SchedulerHandle` trait, so the registry and
//! resolver can be driven by a stub in tests and by a real client in the
//! API server.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `MetricsError`/`Result` so a failing provider never takes the
//! server down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod registry;
pub mod resolver;
pub mod scheduler;

/// Shared result type.
pub use error::{MetricsError, Result};
pub use registry::{custom_metric, CustomMetric, MetricFn, MetricRegistry, Provider};
pub use protocol::MetricScalar;
pub use resolver::MetricResolver;
pub use scheduler::{JobRecord, JobState, ResourceListing, ResourceSet, SchedulerHandle};
