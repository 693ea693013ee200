use std::path::PathBuf;

use serde::Deserialize;
use fluxmetrics_core::error::{MetricsError, Result};
use fluxmetrics_core::protocol::DEFAULT_GROUP_VERSION;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub api: ApiSection,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub metrics: MetricsSection,

    #[serde(default)]
    pub upstream: UpstreamSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            api: ApiSection::default(),
            service: ServiceSection::default(),
            metrics: MetricsSection::default(),
            upstream: UpstreamSection::default(),
            scheduler: SchedulerSection::default(),
        }
    }
}

impl ApiServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::Config(format!(
                "unsupported config version {} (expected 1)",
                self.version
            )));
        }

        self.server.validate()?;
        self.api.validate()?;
        self.metrics.validate()?;
        self.upstream.validate()?;
        self.scheduler.validate()?;

        if self.scheduler.timeout_ms > self.metrics.provider_timeout_ms {
            return Err(MetricsError::Config(format!(
                "scheduler.timeout_ms ({}) must not exceed metrics.provider_timeout_ms ({})",
                self.scheduler.timeout_ms, self.metrics.provider_timeout_ms
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub tls: TlsSection,

    /// Include error text in 500 responses.
    #[serde(default)]
    pub debug: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: TlsSection::default(),
            debug: false,
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MetricsError::Config("server.host must not be empty".into()));
        }
        self.tls.validate()
    }

    /// `host:port`, bracketing bare IPv6 hosts.
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsSection {
    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

impl TlsSection {
    pub fn validate(&self) -> Result<()> {
        match (&self.cert_file, &self.key_file) {
            (Some(_), None) | (None, Some(_)) => Err(MetricsError::Config(
                "both a TLS certificate file and key file are required (or neither)".into(),
            )),
            _ => Ok(()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }
}

/// Fixed routes the API root may not shadow.
const RESERVED_PATHS: [&str; 4] = ["/apis", "/schema", "/metrics", "/openapi"];

/// How `/apis` is answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Forward the cluster's own group list (404 outside a pod).
    #[default]
    Proxy,
    /// Answer with a fixed group list naming only the custom metrics group.
    Static,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSection {
    #[serde(default = "default_api_root")]
    pub root: String,

    /// Namespaces metric requests may name. Empty means any.
    #[serde(default)]
    pub namespaces: Vec<String>,

    #[serde(default)]
    pub discovery: DiscoveryMode,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            root: default_api_root(),
            namespaces: Vec::new(),
            discovery: DiscoveryMode::default(),
        }
    }
}

impl ApiSection {
    pub fn validate(&self) -> Result<()> {
        if !self.root.starts_with('/') || self.root.len() < 2 {
            return Err(MetricsError::Config(format!(
                "api.root must be an absolute path: {}",
                self.root
            )));
        }
        if self.root.ends_with('/') {
            return Err(MetricsError::Config(format!(
                "api.root must not end with '/': {}",
                self.root
            )));
        }
        if RESERVED_PATHS.contains(&self.root.as_str()) {
            return Err(MetricsError::Config(format!(
                "api.root collides with a built-in route: {}",
                self.root
            )));
        }
        Ok(())
    }

    /// `<group>/<version>` taken from a `/apis/<group>/<version>` root.
    pub fn group_version(&self) -> String {
        match self.root.strip_prefix("/apis/") {
            Some(gv) if gv.split('/').count() == 2 && !gv.contains("//") => gv.to_string(),
            _ => DEFAULT_GROUP_VERSION.to_string(),
        }
    }

    pub fn serves_namespace(&self, namespace: &str) -> bool {
        self.namespaces.is_empty() || self.namespaces.iter().any(|n| n == namespace)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default = "default_service_namespace")]
    pub namespace: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            namespace: default_service_namespace(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Shared library exporting extra metrics.
    #[serde(default)]
    pub custom_metrics: Option<PathBuf>,

    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    /// Mount `/metrics` with the server's own request counters.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            custom_metrics: None,
            provider_timeout_ms: default_provider_timeout_ms(),
            verbose: false,
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=300_000).contains(&self.provider_timeout_ms) {
            return Err(MetricsError::Config(
                "metrics.provider_timeout_ms must be between 100 and 300000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamSection {
    #[serde(default = "default_true")]
    pub cache: bool,

    #[serde(default = "default_upstream_host")]
    pub host: String,

    #[serde(default = "default_service_account_dir")]
    pub service_account_dir: PathBuf,

    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            cache: true,
            host: default_upstream_host(),
            service_account_dir: default_service_account_dir(),
            timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

impl UpstreamSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.host.starts_with("https://") || self.host.starts_with("http://")) {
            return Err(MetricsError::Config(format!(
                "upstream.host must be an http(s) URL: {}",
                self.host
            )));
        }
        if !(100..=120_000).contains(&self.timeout_ms) {
            return Err(MetricsError::Config(
                "upstream.timeout_ms must be between 100 and 120000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    #[serde(default = "default_resource_command")]
    pub resource_command: Vec<String>,

    #[serde(default = "default_jobs_command")]
    pub jobs_command: Vec<String>,

    /// Deadline for one command; it is killed (with its children) past it.
    #[serde(default = "default_scheduler_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            resource_command: default_resource_command(),
            jobs_command: default_jobs_command(),
            timeout_ms: default_scheduler_timeout_ms(),
        }
    }
}

impl SchedulerSection {
    pub fn validate(&self) -> Result<()> {
        if self.resource_command.is_empty() || self.jobs_command.is_empty() {
            return Err(MetricsError::Config(
                "scheduler.resource_command and scheduler.jobs_command must not be empty".into(),
            ));
        }
        if !(100..=300_000).contains(&self.timeout_ms) {
            return Err(MetricsError::Config(
                "scheduler.timeout_ms must be between 100 and 300000".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_api_root() -> String {
    format!("/apis/{DEFAULT_GROUP_VERSION}")
}
fn default_service_name() -> String {
    "custom-metrics-apiserver".into()
}
fn default_service_namespace() -> String {
    "flux-operator".into()
}
fn default_provider_timeout_ms() -> u64 {
    30_000
}
fn default_upstream_host() -> String {
    "https://kubernetes.default.svc".into()
}
fn default_service_account_dir() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount")
}
fn default_upstream_timeout_ms() -> u64 {
    10_000
}
fn default_scheduler_timeout_ms() -> u64 {
    10_000
}
fn default_resource_command() -> Vec<String> {
    ["flux", "resource", "list", "--json"].map(String::from).to_vec()
}
fn default_jobs_command() -> Vec<String> {
    ["flux", "jobs", "--all", "--json"].map(String::from).to_vec()
}
