//! Command line interface.
//!
//! ```text
//! fluxmetrics-apiserver [--debug|--quiet] start --port 8443 --ssl-certfile tls.crt --ssl-keyfile tls.key
//! fluxmetrics-apiserver version
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use fluxmetrics_core::error::Result;

use crate::config::{self, ApiServerConfig, DiscoveryMode};

#[derive(Debug, Parser)]
#[command(
    name = "fluxmetrics-apiserver",
    version,
    about = "Custom metrics API server for the Flux scheduler"
)]
pub struct Cli {
    /// Verbose logging (and error text in 500 responses).
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only log warnings and errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the metrics API server.
    Start(StartArgs),
    /// Print the version and exit.
    Version,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[derive(Debug, Default, Args)]
pub struct StartArgs {
    /// YAML config file; flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Host address to listen on.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// TLS private key (requires --ssl-certfile).
    #[arg(long)]
    pub ssl_keyfile: Option<PathBuf>,

    /// TLS certificate (requires --ssl-keyfile).
    #[arg(long)]
    pub ssl_certfile: Option<PathBuf>,

    /// Root path of the custom metrics API.
    #[arg(long)]
    pub api_path: Option<String>,

    /// Namespace metric requests may name; repeat for several.
    #[arg(long = "namespace")]
    pub namespaces: Vec<String>,

    /// Service name reported as the described object.
    #[arg(long)]
    pub service_name: Option<String>,

    /// Namespace of that service.
    #[arg(long)]
    pub service_namespace: Option<String>,

    /// Shared library exporting custom metrics.
    #[arg(long)]
    pub custom_metrics: Option<PathBuf>,

    /// Do not cache cluster discovery documents.
    #[arg(long)]
    pub no_cache: bool,

    /// Answer /apis from a fixed group list instead of the cluster.
    #[arg(long)]
    pub static_discovery: bool,

    /// Expose the server's own counters on /metrics.
    #[arg(long)]
    pub verbose: bool,
}

impl StartArgs {
    /// Load the config file (if any), apply flag overrides and validate.
    pub fn resolve(&self, debug: bool) -> Result<ApiServerConfig> {
        let cfg = match &self.config {
            Some(path) => config::load_from_file(path)?,
            None => ApiServerConfig::default(),
        };
        let cfg = self.apply(cfg, debug);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply(&self, mut cfg: ApiServerConfig, debug: bool) -> ApiServerConfig {
        if let Some(host) = &self.host {
            cfg.server.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.server.port = port;
        }
        if self.ssl_certfile.is_some() || self.ssl_keyfile.is_some() {
            cfg.server.tls.cert_file = self.ssl_certfile.clone();
            cfg.server.tls.key_file = self.ssl_keyfile.clone();
        }
        cfg.server.debug |= debug;

        if let Some(root) = &self.api_path {
            cfg.api.root = root.clone();
        }
        if !self.namespaces.is_empty() {
            cfg.api.namespaces = self.namespaces.clone();
        }
        if self.static_discovery {
            cfg.api.discovery = DiscoveryMode::Static;
        }

        if let Some(name) = &self.service_name {
            cfg.service.name = name.clone();
        }
        if let Some(ns) = &self.service_namespace {
            cfg.service.namespace = ns.clone();
        }

        if let Some(path) = &self.custom_metrics {
            cfg.metrics.custom_metrics = Some(path.clone());
        }
        cfg.metrics.verbose |= self.verbose;
        if self.no_cache {
            cfg.upstream.cache = false;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fluxmetrics-apiserver").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn start_flags_override_defaults() {
        let cli = parse(&[
            "--debug",
            "start",
            "--port",
            "9443",
            "--namespace",
            "flux-operator",
            "--namespace",
            "default",
            "--no-cache",
            "--static-discovery",
        ]);
        let Command::Start(args) = &cli.command else {
            panic!("expected start");
        };
        let cfg = args.resolve(cli.debug).unwrap();
        assert_eq!(cfg.server.port, 9443);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.api.namespaces, vec!["flux-operator", "default"]);
        assert!(!cfg.upstream.cache);
        assert!(cfg.server.debug);
        assert_eq!(cfg.api.discovery, DiscoveryMode::Static);
        assert_eq!(cli.log_filter(), "debug");
    }

    #[test]
    fn half_a_tls_pair_is_rejected() {
        let cli = parse(&["start", "--ssl-certfile", "/tmp/tls.crt"]);
        let Command::Start(args) = &cli.command else {
            panic!("expected start");
        };
        let err = args.resolve(false).unwrap_err();
        assert_eq!(err.client_code().as_str(), "CONFIG");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["start", "--quiet"]);
        assert_eq!(cli.log_filter(), "warn");
        assert!(matches!(parse(&["version"]).command, Command::Version));
    }
}
