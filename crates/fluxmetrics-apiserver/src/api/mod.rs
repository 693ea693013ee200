//! HTTP handlers for the custom metrics API.
//!
//! - `metrics`: resource list and metric value routes
//! - `discovery`: proxied (or static) cluster discovery
//! - `schema`: this server's own route description
//!
//! All error bodies are `{"detail": "..."}`.

pub mod discovery;
pub mod metrics;
pub mod schema;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use fluxmetrics_core::error::{ClientCode, MetricsError};

use crate::app_state::AppState;

pub const METRIC_NOT_FOUND: &str = "This metric is not known to the server.";
pub const NAMESPACE_NOT_FOUND: &str = "This namespace is not served by this metrics server.";
pub const NOT_IN_CLUSTER: &str = "The metric server is not running in a Kubernetes pod.";
const INTERNAL_ERROR: &str = "Internal Server Error";

fn count(state: &AppState, route: &'static str, status: StatusCode) {
    state
        .metrics()
        .requests
        .inc(&[("route", route), ("status", status.as_str())]);
}

/// 200 with a JSON body.
pub(crate) fn ok_json<T: Serialize>(state: &AppState, route: &'static str, body: T) -> Response {
    count(state, route, StatusCode::OK);
    Json(body).into_response()
}

pub(crate) fn detail(state: &AppState, route: &'static str, status: StatusCode, msg: &str) -> Response {
    count(state, route, status);
    (status, Json(json!({ "detail": msg }))).into_response()
}

/// Map an error to its response. Only internal failures are logged as errors.
pub(crate) fn error_response(state: &AppState, route: &'static str, err: &MetricsError) -> Response {
    match (err.client_code(), err) {
        (ClientCode::NotFound, MetricsError::UnknownNamespace(ns)) => {
            tracing::info!(namespace = %ns, "metric requested for a namespace not served");
            detail(state, route, StatusCode::NOT_FOUND, NAMESPACE_NOT_FOUND)
        }
        (ClientCode::NotFound, _) => {
            tracing::info!(error = %err, "unknown metric requested");
            detail(state, route, StatusCode::NOT_FOUND, METRIC_NOT_FOUND)
        }
        (ClientCode::Unavailable, _) => detail(state, route, StatusCode::NOT_FOUND, NOT_IN_CLUSTER),
        (ClientCode::Config | ClientCode::Internal, _) => {
            tracing::error!(route, error = %err, "request failed");
            let msg = if state.debug() { err.to_string() } else { INTERNAL_ERROR.to_string() };
            detail(state, route, StatusCode::INTERNAL_SERVER_ERROR, &msg)
        }
    }
}
