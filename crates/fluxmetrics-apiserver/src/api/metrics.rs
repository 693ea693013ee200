use std::collections::HashMap;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;

use fluxmetrics_core::error::{MetricsError, Result};
use fluxmetrics_core::protocol::{LabelSelector, ListMeta, MetricValue};

use crate::app_state::AppState;

use super::{error_response, ok_json};

#[derive(Debug, Default, Deserialize)]
pub struct MetricQuery {
    #[serde(rename = "metricLabelSelector")]
    pub metric_label_selector: Option<String>,
}

/// GET {root}
///
/// Doubles as the health check; lists every registered metric.
pub async fn resource_list(State(state): State<AppState>) -> Response {
    let listing = state.envelope().build_resource_list(state.registry());
    ok_json(&state, "resource_list", listing)
}

/// GET {root}/namespaces/{namespace}/metrics/{metric_name} and the object routes.
///
/// `resource` and `name` are accepted but not checked: this exporter reports
/// every metric against its own Service.
pub async fn metric(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<MetricQuery>,
) -> Response {
    let Some(metric_name) = params.get("metric_name").cloned() else {
        let err = MetricsError::Internal("route without metric_name".into());
        return error_response(&state, "metric", &err);
    };
    let namespace = params.get("namespace");
    tracing::info!(metric = %metric_name, namespace = ?namespace, "metric requested");

    if let Some(ns) = namespace {
        if !state.cfg().api.serves_namespace(ns) {
            return error_response(&state, "metric", &MetricsError::UnknownNamespace(ns.clone()));
        }
    }

    let selector = query
        .metric_label_selector
        .as_deref()
        .and_then(LabelSelector::parse);

    match evaluate(&state, metric_name, selector).await {
        Ok(value) => {
            let metadata = ListMeta {
                self_link: state.cfg().api.root.clone(),
            };
            let listing = state.envelope().build_metric_list(vec![value], Some(metadata));
            ok_json(&state, "metric", listing)
        }
        Err(e) => error_response(&state, "metric", &e),
    }
}

/// Run the provider on the blocking pool, bounded by the provider timeout.
async fn evaluate(state: &AppState, name: String, selector: Option<LabelSelector>) -> Result<MetricValue> {
    if !state.registry().contains(&name) {
        return Err(MetricsError::NotFound(name));
    }

    let resolver = state.resolver().clone();
    let timeout = state.provider_timeout();
    let started = Instant::now();

    let task_name = name.clone();
    let task = tokio::task::spawn_blocking(move || resolver.resolve_and_evaluate(&task_name, selector));
    let result = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(MetricsError::provider(&name, format!("provider aborted: {join}"))),
        Err(_) => Err(MetricsError::provider(
            &name,
            format!("timed out after {} ms", timeout.as_millis()),
        )),
    };

    state
        .metrics()
        .provider_duration
        .observe(&[("metric", name.as_str())], started.elapsed());
    result
}
