//! OpenAPI description of this server's own routes.

use axum::{extract::State, response::Response};
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::router::{data_routes, Endpoint, RouteSpec};

use super::ok_json;

/// GET /schema and GET {root}/openapi/v2
pub async fn openapi_schema(State(state): State<AppState>) -> Response {
    let doc = build_schema(&state.cfg().api.root);
    ok_json(&state, "schema", doc)
}

pub fn build_schema(root: &str) -> Value {
    let mut paths = Map::new();
    for spec in data_routes(root) {
        paths.insert(spec.path.clone(), json!({ "get": operation(&spec) }));
    }

    json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Flux Metrics API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Export Flux custom metrics.",
        },
        "paths": paths,
    })
}

fn operation(spec: &RouteSpec) -> Value {
    let parameters: Vec<Value> = spec
        .path
        .split('/')
        .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .map(|name| {
            json!({
                "name": name,
                "in": "path",
                "required": true,
                "schema": { "type": "string" },
            })
        })
        .collect();

    let mut responses = Map::new();
    responses.insert("200".into(), json!({ "description": ok_description(spec.endpoint) }));
    if spec.endpoint != Endpoint::ResourceList {
        responses.insert("404".into(), json!({ "description": "Not found" }));
    }

    json!({
        "summary": spec.summary,
        "parameters": parameters,
        "responses": responses,
    })
}

fn ok_description(endpoint: Endpoint) -> &'static str {
    match endpoint {
        Endpoint::ResourceList => "APIResourceList",
        Endpoint::GroupList => "APIGroupList",
        Endpoint::ClusterOpenApi => "OpenAPI document",
        Endpoint::Metric => "MetricValueList",
    }
}
