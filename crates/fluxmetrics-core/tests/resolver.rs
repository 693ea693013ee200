#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod stub_scheduler;

use std::collections::HashSet;
use std::sync::Arc;

use fluxmetrics_core::protocol::{EnvelopeBuilder, LabelSelector, MetricScalar, DEFAULT_GROUP_VERSION};
use fluxmetrics_core::{custom_metric, JobState, MetricRegistry, MetricResolver, MetricsError};
use stub_scheduler::StubScheduler;

fn resolver_for(stub: StubScheduler) -> MetricResolver {
    resolver_with(MetricRegistry::with_builtins(Arc::new(stub)))
}

fn resolver_with(registry: MetricRegistry) -> MetricResolver {
    let envelope = EnvelopeBuilder::new(DEFAULT_GROUP_VERSION, "flux-operator", "custom-metrics-apiserver");
    MetricResolver::new(Arc::new(registry), Arc::new(envelope))
}

#[test]
fn every_builtin_resolves_with_its_own_name() {
    let resolver = resolver_for(StubScheduler::with_nodes(&["n0"], &["n0"], 4, 4));
    let names: Vec<String> = resolver
        .registry()
        .list_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(names.len(), 11);

    for name in names {
        let v = resolver.resolve_and_evaluate(&name, None).expect("builtin resolves");
        assert_eq!(v.metric.name, name);
        assert_eq!(v.window_seconds, 0);
        assert!(v.metric.selector.is_none());
    }
}

#[test]
fn node_metrics_read_the_resource_listing() {
    let resolver = resolver_for(StubScheduler::with_nodes(&["n0", "n1", "n2"], &["n2"], 12, 4));
    let value = |name: &str| resolver.resolve_and_evaluate(name, None).unwrap().value;

    assert_eq!(value("node_up_count"), MetricScalar::Integer(3));
    assert_eq!(value("node_free_count"), MetricScalar::Integer(1));
    assert_eq!(value("node_cores_up_count"), MetricScalar::Integer(12));
    assert_eq!(value("node_cores_free_count"), MetricScalar::Integer(4));
}

#[test]
fn queue_metrics_count_jobs_per_state() {
    let stub = StubScheduler::default()
        .with_jobs(JobState::New, 2)
        .with_jobs(JobState::Run, 5);
    let resolver = resolver_for(stub);

    for state in JobState::ALL {
        let expected = match state {
            JobState::New => 2,
            JobState::Run => 5,
            _ => 0,
        };
        let v = resolver.resolve_and_evaluate(&state.metric_name(), None).unwrap();
        assert_eq!(v.value, MetricScalar::Integer(expected), "{}", state.metric_name());
    }
}

#[test]
fn unknown_metric_is_not_found() {
    let resolver = resolver_for(StubScheduler::default());
    let err = resolver.resolve_and_evaluate("bogus_metric", None).unwrap_err();
    assert!(matches!(err, MetricsError::NotFound(_)));
    assert_eq!(err.client_code().as_str(), "NOT_FOUND");
}

#[test]
fn scheduler_failure_surfaces_as_provider_error() {
    let resolver = resolver_for(StubScheduler::failing());
    let err = resolver.resolve_and_evaluate("node_up_count", None).unwrap_err();
    assert!(matches!(err, MetricsError::Provider { ref name, .. } if name == "node_up_count"));
    assert_eq!(err.client_code().as_str(), "INTERNAL");
}

#[test]
fn custom_metric_receives_the_handle() {
    let mut registry =
        MetricRegistry::with_builtins(Arc::new(StubScheduler::with_nodes(&["a", "b"], &[], 8, 0)));
    registry
        .register_custom(custom_metric("up_cores_per_node", |h| {
            let listing = h.query_resource_listing()?;
            Ok(MetricScalar::from(listing.up.ncores as f64 / listing.up.nodelist.len() as f64))
        }))
        .unwrap();
    let resolver = resolver_with(registry);

    let v = resolver.resolve_and_evaluate("up_cores_per_node", None).unwrap();
    assert_eq!(v.value, MetricScalar::Integer(4));
}

#[test]
fn custom_metric_errors_are_not_masked_as_unknown() {
    let mut registry = MetricRegistry::with_builtins(Arc::new(StubScheduler::default()));
    registry
        .register_custom(custom_metric("lookup", |_| Err(MetricsError::NotFound("inner".into()))))
        .unwrap();
    let resolver = resolver_with(registry);

    let err = resolver.resolve_and_evaluate("lookup", None).unwrap_err();
    assert_eq!(err.client_code().as_str(), "INTERNAL");
}

#[test]
fn resource_list_grows_with_custom_metrics_without_duplicates() {
    let mut registry = MetricRegistry::with_builtins(Arc::new(StubScheduler::default()));
    let builtin = registry.len();
    for name in ["gpu_free_count", "queue_depth", "node_up_count"] {
        registry
            .register_custom(custom_metric(name, |_| Ok(MetricScalar::Integer(0))))
            .unwrap();
    }
    let resolver = resolver_with(registry);

    let list = resolver.envelope().build_resource_list(resolver.registry());
    let names: HashSet<&str> = list.resources.iter().map(|r| r.name.as_str()).collect();
    // node_up_count shadows a built-in, so only two new names appear.
    assert_eq!(list.resources.len(), builtin + 2);
    assert_eq!(names.len(), list.resources.len());
    assert!(list.resources.iter().all(|r| r.namespaced && r.verbs == ["get"]));
}

#[test]
fn selector_is_carried_into_the_identifier() {
    let resolver = resolver_for(StubScheduler::default());
    let v = resolver
        .resolve_and_evaluate("node_up_count", LabelSelector::parse("queue=debug"))
        .unwrap();
    assert_eq!(v.metric.selector.unwrap().match_labels["queue"], "debug");
}
