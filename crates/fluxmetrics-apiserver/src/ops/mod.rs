//! Operational HTTP endpoints.
//!
//! - `/metrics` : Prometheus text format (verbose mode only)

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;

pub async fn metrics(State(state): State<AppState>) -> Response {
    let registered = state.registry().len() as u64;
    let cached = state.cache().len() as u64;
    let body = state.metrics().render(&[
        ("fluxmetrics_registered_metrics", registered),
        ("fluxmetrics_upstream_cache_entries", cached),
    ]);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
