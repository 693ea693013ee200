//! Axum router wiring.
//!
//! Data routes are described once in `data_routes` so the router and the
//! self-describing schema (`/schema`) cannot drift apart. Paths use
//! `{param}` placeholders there and are converted for axum on mount.

use axum::{routing::get, routing::MethodRouter, Router};

use crate::{api, app_state::AppState, ops};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ResourceList,
    GroupList,
    ClusterOpenApi,
    Metric,
}

#[derive(Debug, Clone)]
pub struct RouteSpec {
    /// OpenAPI-style path (`{param}` placeholders).
    pub path: String,
    pub endpoint: Endpoint,
    pub summary: &'static str,
}

/// Every data route served under `root`, in mount order.
pub fn data_routes(root: &str) -> Vec<RouteSpec> {
    let route = |path: String, endpoint, summary| RouteSpec { path, endpoint, summary };
    vec![
        route(root.to_string(), Endpoint::ResourceList, "List the metrics this server exports"),
        route("/apis".into(), Endpoint::GroupList, "API group list for discovery"),
        route("/openapi/{version}".into(), Endpoint::ClusterOpenApi, "Cluster OpenAPI schema"),
        route(
            format!("{root}/namespaces/{{namespace}}/metrics/{{metric_name}}"),
            Endpoint::Metric,
            "Get a metric for a namespace",
        ),
        route(
            format!("{root}/{{resource}}/{{name}}/{{metric_name}}"),
            Endpoint::Metric,
            "Get a metric for a named object",
        ),
        route(
            format!("{root}/namespaces/{{namespace}}/{{resource}}/{{name}}/{{metric_name}}"),
            Endpoint::Metric,
            "Get a metric for a named object in a namespace",
        ),
    ]
}

/// `{param}` -> `:param`.
fn axum_path(path: &str) -> String {
    path.split('/')
        .map(|seg| match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(param) => format!(":{param}"),
            None => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn handler(endpoint: Endpoint) -> MethodRouter<AppState> {
    match endpoint {
        Endpoint::ResourceList => get(api::metrics::resource_list),
        Endpoint::GroupList => get(api::discovery::group_list),
        Endpoint::ClusterOpenApi => get(api::discovery::openapi),
        Endpoint::Metric => get(api::metrics::metric),
    }
}

pub fn build_router(state: AppState) -> Router {
    let root = state.cfg().api.root.clone();

    let mut router = Router::new();
    for spec in data_routes(&root) {
        router = router.route(&axum_path(&spec.path), handler(spec.endpoint));
    }

    router = router
        .route("/schema", get(api::schema::openapi_schema))
        .route(&format!("{root}/openapi/v2"), get(api::schema::openapi_schema));

    if state.cfg().metrics.verbose {
        router = router.route("/metrics", get(ops::metrics));
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_become_axum_params() {
        assert_eq!(
            axum_path("/apis/x/v1/namespaces/{namespace}/metrics/{metric_name}"),
            "/apis/x/v1/namespaces/:namespace/metrics/:metric_name"
        );
        assert_eq!(axum_path("/apis"), "/apis");
    }

    #[test]
    fn metric_routes_share_one_endpoint() {
        let routes = data_routes("/apis/custom.metrics.k8s.io/v1beta2");
        assert_eq!(routes.iter().filter(|r| r.endpoint == Endpoint::Metric).count(), 3);
        assert_eq!(routes[0].path, "/apis/custom.metrics.k8s.io/v1beta2");
    }
}
