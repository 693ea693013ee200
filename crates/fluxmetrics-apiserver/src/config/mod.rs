//! API server config loader (strict parsing).
//!
//! A YAML file is optional; `ApiServerConfig::default()` is a complete,
//! valid configuration. CLI flags are applied on top by `cli::StartArgs`.

pub mod schema;

use std::fs;
use std::path::Path;

use fluxmetrics_core::error::{MetricsError, Result};

pub use schema::{
    ApiSection, ApiServerConfig, DiscoveryMode, MetricsSection, SchedulerSection, ServerSection,
    ServiceSection, TlsSection, UpstreamSection,
};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<ApiServerConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        MetricsError::Config(format!("read config failed ({}): {e}", path.display()))
    })?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ApiServerConfig> {
    let cfg: ApiServerConfig = serde_yaml::from_str(s)
        .map_err(|e| MetricsError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
