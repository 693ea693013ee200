//! Cluster discovery routes.
//!
//! In `proxy` mode the cluster's own documents are forwarded through the
//! endpoint cache; an empty result means "not running in a pod" and is a 404.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};

use crate::app_state::AppState;
use crate::config::DiscoveryMode;
use crate::upstream::cache::is_empty_result;

use super::{detail, ok_json, NOT_IN_CLUSTER};

/// GET /apis
pub async fn group_list(State(state): State<AppState>) -> Response {
    match state.cfg().api.discovery {
        DiscoveryMode::Static => ok_json(&state, "apis", state.envelope().build_static_group_list()),
        DiscoveryMode::Proxy => proxy(&state, "apis", "apis").await,
    }
}

/// GET /openapi/{version}
pub async fn openapi(State(state): State<AppState>, Path(version): Path<String>) -> Response {
    proxy(&state, "openapi", &format!("openapi/{version}")).await
}

async fn proxy(state: &AppState, route: &'static str, endpoint: &str) -> Response {
    let doc = state.cache().fetch(endpoint).await;
    if is_empty_result(&doc) {
        return detail(state, route, StatusCode::NOT_FOUND, NOT_IN_CLUSTER);
    }
    ok_json(state, route, doc.as_ref())
}
