//! Shared error type across fluxmetrics crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Unknown metric or namespace.
    NotFound,
    /// Upstream discovery is not reachable from this process.
    Unavailable,
    /// Invalid startup configuration.
    Config,
    /// Internal server error (provider or scheduler failure).
    Internal,
}

impl ClientCode {
    /// String representation used in logs and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::Config => "CONFIG",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core and apiserver.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric not found: {0}")]
    NotFound(String),
    #[error("namespace not served: {0}")]
    UnknownNamespace(String),
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("metric `{name}` failed: {reason}")]
    Provider { name: String, reason: String },
    #[error("scheduler query failed: {0}")]
    Scheduler(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MetricsError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            MetricsError::NotFound(_) | MetricsError::UnknownNamespace(_) => ClientCode::NotFound,
            MetricsError::Upstream(_) => ClientCode::Unavailable,
            MetricsError::Config(_) => ClientCode::Config,
            MetricsError::Provider { .. }
            | MetricsError::Scheduler(_)
            | MetricsError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Wrap any error raised while a provider computes `name`.
    pub fn provider(name: &str, err: impl std::fmt::Display) -> Self {
        MetricsError::Provider {
            name: name.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_metric_and_namespace_share_not_found() {
        assert_eq!(MetricsError::NotFound("x".into()).client_code(), ClientCode::NotFound);
        assert_eq!(
            MetricsError::UnknownNamespace("default".into()).client_code(),
            ClientCode::NotFound
        );
    }

    #[test]
    fn provider_failure_is_internal_not_not_found() {
        let err = MetricsError::provider("node_up_count", "boom");
        assert_eq!(err.client_code().as_str(), "INTERNAL");
        assert_eq!(err.to_string(), "metric `node_up_count` failed: boom");
    }
}
