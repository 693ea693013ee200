//! Custom metrics API wire shapes.
//!
//! - `types`: serde structs for the JSON objects the protocol exchanges.
//! - `envelope`: builders that fill those structs with this exporter's
//!   identity (group/version, service name, namespace).
//!
//! Field names follow the protocol's camelCase spelling on the wire.

pub mod envelope;
pub mod types;

pub use envelope::{now_timestamp, EnvelopeBuilder, DEFAULT_GROUP_VERSION};
pub use types::{
    ApiGroup, ApiGroupList, ApiResource, ApiResourceList, DescribedObject, GroupVersionForDiscovery,
    LabelSelector, ListMeta, MetricIdentifier, MetricScalar, MetricValue, MetricValueList,
};
