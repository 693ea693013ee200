//! Protocol objects (JSON).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A metric value: integer counts from the scheduler, or decimals from plugins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricScalar {
    Integer(i64),
    Decimal(f64),
}

impl MetricScalar {
    /// Collapse whole decimals into integers so counts stay counts on the wire.
    pub fn from_f64(v: f64) -> Self {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            MetricScalar::Integer(v as i64)
        } else {
            MetricScalar::Decimal(v)
        }
    }
}

impl From<i64> for MetricScalar {
    fn from(v: i64) -> Self {
        MetricScalar::Integer(v)
    }
}

impl From<u64> for MetricScalar {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(MetricScalar::Integer)
            .unwrap_or(MetricScalar::Decimal(v as f64))
    }
}

impl From<usize> for MetricScalar {
    fn from(v: usize) -> Self {
        MetricScalar::from(v as u64)
    }
}

impl From<f64> for MetricScalar {
    fn from(v: f64) -> Self {
        MetricScalar::from_f64(v)
    }
}

/// Label selector attached to an identifier (`matchLabels` only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    #[serde(rename = "matchLabels")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Parse `k=v,k2=v2`. Terms without `=` are ignored; `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let match_labels: BTreeMap<String, String> = raw
            .split(',')
            .filter_map(|term| term.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        if match_labels.is_empty() {
            None
        } else {
            Some(Self { match_labels })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricIdentifier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

impl MetricIdentifier {
    pub fn new(name: impl Into<String>, selector: Option<LabelSelector>) -> Self {
        Self {
            name: name.into(),
            selector,
        }
    }
}

/// The object a metric is reported against. Always this exporter's Service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedObject {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub metric: MetricIdentifier,
    pub value: MetricScalar,
    pub timestamp: String,
    #[serde(rename = "windowSeconds")]
    pub window_seconds: u64,
    #[serde(rename = "describedObject")]
    pub described_object: DescribedObject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    #[serde(rename = "selfLink")]
    pub self_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValueList {
    pub items: Vec<MetricValue>,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ListMeta>,
}

/// One discoverable metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResource {
    pub name: String,
    #[serde(rename = "singularName")]
    pub singular_name: String,
    pub namespaced: bool,
    pub kind: String,
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResourceList {
    pub kind: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "groupVersion")]
    pub group_version: String,
    pub resources: Vec<ApiResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionForDiscovery {
    #[serde(rename = "groupVersion")]
    pub group_version: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiGroup {
    pub name: String,
    pub versions: Vec<GroupVersionForDiscovery>,
    #[serde(rename = "preferredVersion")]
    pub preferred_version: GroupVersionForDiscovery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiGroupList {
    pub kind: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub groups: Vec<ApiGroup>,
}
