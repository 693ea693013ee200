//! Response envelope builder.
//!
//! Holds the exporter's identity and wraps resolved values into the list,
//! resource and group objects of the custom metrics API. Every method is a
//! pure formatting step and safe to call from many requests at once.

use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::{MetricsError, Result};
use crate::registry::MetricRegistry;

use super::types::{
    ApiGroup, ApiGroupList, ApiResource, ApiResourceList, DescribedObject, GroupVersionForDiscovery,
    ListMeta, MetricIdentifier, MetricScalar, MetricValue, MetricValueList,
};

/// Group/version served when the API root does not name one.
pub const DEFAULT_GROUP_VERSION: &str = "custom.metrics.k8s.io/v1beta2";

/// Current UTC instant as `YYYY-MM-DDTHH:MM:SS+00:00`.
pub fn now_timestamp() -> Result<String> {
    let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]+00:00");
    OffsetDateTime::now_utc()
        .format(&fmt)
        .map_err(|e| MetricsError::Internal(format!("timestamp format failed: {e}")))
}

#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    group_version: String,
    service_namespace: String,
    service_name: String,
}

impl EnvelopeBuilder {
    pub fn new(
        group_version: impl Into<String>,
        service_namespace: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            group_version: group_version.into(),
            service_namespace: service_namespace.into(),
            service_name: service_name.into(),
        }
    }

    /// e.g. `custom.metrics.k8s.io/v1beta2`.
    pub fn group_version(&self) -> &str {
        &self.group_version
    }

    /// Group part of the group/version (`custom.metrics.k8s.io`).
    pub fn group(&self) -> &str {
        self.group_version
            .trim_end_matches('/')
            .rsplit_once('/')
            .map(|(g, _)| g)
            .unwrap_or(&self.group_version)
    }

    /// Version part of the group/version (`v1beta2`).
    pub fn api_version(&self) -> &str {
        let gv = self.group_version.trim_end_matches('/');
        gv.rsplit('/').next().unwrap_or(gv)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_namespace(&self) -> &str {
        &self.service_namespace
    }

    /// The exporter's own Service, which every value is reported against.
    pub fn described_object(&self) -> DescribedObject {
        DescribedObject {
            kind: "Service".to_string(),
            namespace: self.service_namespace.clone(),
            name: self.service_name.clone(),
            api_version: self.api_version().to_string(),
        }
    }

    /// Instantaneous value (`windowSeconds == 0`), stamped now unless `timestamp` is given.
    pub fn new_metric(
        &self,
        metric: MetricIdentifier,
        value: MetricScalar,
        timestamp: Option<String>,
    ) -> Result<MetricValue> {
        let timestamp = match timestamp {
            Some(ts) if !ts.is_empty() => ts,
            _ => now_timestamp()?,
        };
        Ok(MetricValue {
            metric,
            value,
            timestamp,
            window_seconds: 0,
            described_object: self.described_object(),
        })
    }

    pub fn build_metric_list(&self, values: Vec<MetricValue>, metadata: Option<ListMeta>) -> MetricValueList {
        MetricValueList {
            items: values,
            api_version: self.group_version.clone(),
            kind: "MetricValueList".to_string(),
            metadata,
        }
    }

    /// Every registered name as a discoverable resource. Built per call.
    pub fn build_resource_list(&self, registry: &MetricRegistry) -> ApiResourceList {
        let resources = registry
            .list_names()
            .into_iter()
            .map(|name| ApiResource {
                name: name.to_string(),
                singular_name: name.to_string(),
                namespaced: true,
                kind: "MetricValueList".to_string(),
                verbs: vec!["get".to_string()],
            })
            .collect();

        ApiResourceList {
            kind: "APIResourceList".to_string(),
            api_version: self.api_version().to_string(),
            group_version: self.group_version.clone(),
            resources,
        }
    }

    /// Hand-authored group list naming only this API group.
    pub fn build_static_group_list(&self) -> ApiGroupList {
        let version = GroupVersionForDiscovery {
            group_version: self.group_version.clone(),
            version: self.api_version().to_string(),
        };
        ApiGroupList {
            kind: "APIGroupList".to_string(),
            api_version: "v1".to_string(),
            groups: vec![ApiGroup {
                name: self.group().to_string(),
                versions: vec![version.clone()],
                preferred_version: version,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::new(DEFAULT_GROUP_VERSION, "flux-operator", "custom-metrics-apiserver")
    }

    #[test]
    fn group_version_splits() {
        let b = builder();
        assert_eq!(b.group(), "custom.metrics.k8s.io");
        assert_eq!(b.api_version(), "v1beta2");
    }

    #[test]
    fn timestamp_has_utc_suffix_and_fixed_width() {
        let ts = now_timestamp().expect("timestamp");
        assert_eq!(ts.len(), "2024-01-01T00:00:00+00:00".len());
        assert!(ts.ends_with("+00:00"));
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn metric_is_described_by_own_service() {
        let b = builder();
        let v = b
            .new_metric(MetricIdentifier::new("node_up_count", None), MetricScalar::Integer(3), None)
            .expect("metric");
        assert_eq!(v.window_seconds, 0);
        assert_eq!(v.described_object.kind, "Service");
        assert_eq!(v.described_object.name, "custom-metrics-apiserver");
        assert_eq!(v.described_object.namespace, "flux-operator");
    }

    #[test]
    fn explicit_timestamp_is_kept() {
        let v = builder()
            .new_metric(
                MetricIdentifier::new("x", None),
                MetricScalar::Integer(1),
                Some("2023-06-01T10:00:00+00:00".into()),
            )
            .expect("metric");
        assert_eq!(v.timestamp, "2023-06-01T10:00:00+00:00");
    }

    #[test]
    fn static_group_list_prefers_its_only_version() {
        let list = builder().build_static_group_list();
        assert_eq!(list.groups.len(), 1);
        assert_eq!(list.groups[0].preferred_version.group_version, DEFAULT_GROUP_VERSION);
    }

    #[test]
    fn metric_list_carries_metadata_only_when_given() {
        let b = builder();
        let plain = serde_json::to_value(b.build_metric_list(vec![], None)).expect("json");
        assert!(plain.get("metadata").is_none());
        assert_eq!(plain["kind"], "MetricValueList");
        assert_eq!(plain["apiVersion"], DEFAULT_GROUP_VERSION);
    }
}
