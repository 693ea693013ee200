//! Endpoint cache for upstream discovery responses.
//!
//! Entries never expire. Concurrent first fetches of the same key may both
//! reach the upstream; whichever finishes last overwrites an identical parsed
//! value, so no lock is held across the network call.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::obs::metrics::ApiMetrics;

use super::DiscoverySource;

pub struct EndpointCache {
    source: Arc<dyn DiscoverySource>,
    entries: DashMap<String, Arc<Value>>,
    enabled: bool,
    metrics: Option<Arc<ApiMetrics>>,
}

impl EndpointCache {
    pub fn new(source: Arc<dyn DiscoverySource>, enabled: bool) -> Self {
        Self {
            source,
            entries: DashMap::new(),
            enabled,
            metrics: None,
        }
    }

    /// Record cache hits and fetch outcomes into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<ApiMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parsed JSON for `endpoint`, or an empty object when the upstream is
    /// unusable, fails, or returns something that is not JSON. Never errors.
    pub async fn fetch(&self, endpoint: &str) -> Arc<Value> {
        let key = endpoint.trim_start_matches('/');

        if self.enabled {
            if let Some(hit) = self.entries.get(key) {
                self.record("cache_hit", key);
                return Arc::clone(hit.value());
            }
        }

        let body = match self.source.get(key).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::debug!(endpoint = %key, "upstream discovery not available in this environment");
                self.record("unavailable", key);
                return empty();
            }
            Err(e) => {
                tracing::warn!(endpoint = %key, error = %e, "upstream fetch failed");
                self.record("error", key);
                return empty();
            }
        };

        let parsed: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(endpoint = %key, error = %e, "upstream returned non-JSON body");
                self.record("invalid", key);
                return empty();
            }
        };

        let parsed = Arc::new(parsed);
        if self.enabled {
            self.entries.insert(key.to_string(), Arc::clone(&parsed));
        }
        self.record("ok", key);
        parsed
    }

    fn record(&self, outcome: &str, endpoint: &str) {
        if let Some(m) = &self.metrics {
            if outcome == "cache_hit" {
                m.cache_hits.inc(&[("endpoint", endpoint)]);
            } else {
                m.upstream_fetches.inc(&[("endpoint", endpoint), ("outcome", outcome)]);
            }
        }
    }
}

fn empty() -> Arc<Value> {
    Arc::new(Value::Object(Map::new()))
}

/// True for a "nothing available" result: any falsy JSON document
/// (`null`, `false`, `0`, `""`, `[]` or `{}`).
pub fn is_empty_result(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_detection() {
        assert!(is_empty_result(&Value::Null));
        assert!(is_empty_result(&serde_json::json!({})));
        assert!(is_empty_result(&serde_json::json!([])));
        assert!(is_empty_result(&serde_json::json!("")));
        assert!(is_empty_result(&serde_json::json!(false)));
        assert!(is_empty_result(&serde_json::json!(0)));
        assert!(!is_empty_result(&serde_json::json!({"kind": "APIGroupList"})));
        assert!(!is_empty_result(&serde_json::json!([{"name": "apps"}])));
        assert!(!is_empty_result(&serde_json::json!(1)));
    }
}
