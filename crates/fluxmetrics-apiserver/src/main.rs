//! Flux custom metrics API server.
//!
//! - `start`: serve the custom metrics API (plain or TLS)
//! - `version`: print the version

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use fluxmetrics_apiserver::cli::{Cli, Command, StartArgs};
use fluxmetrics_apiserver::{app_state::AppState, router, scheduler::CommandScheduler, transport};
use fluxmetrics_core::error::Result;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    fmt().with_env_filter(filter).init();

    match &cli.command {
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Command::Start(args) => match start(args, cli.debug).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "fluxmetrics-apiserver failed");
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn start(args: &StartArgs, debug: bool) -> Result<()> {
    let cfg = args.resolve(debug)?;

    let tls = match (&cfg.server.tls.cert_file, &cfg.server.tls.key_file) {
        (Some(cert), Some(key)) => Some(transport::tls::load_server_config(cert, key)?),
        _ => None,
    };

    let handle = Arc::new(CommandScheduler::from_config(&cfg.scheduler)?);
    let source = AppState::in_cluster_source(&cfg);
    let listen = cfg.server.listen_addr();

    let state = AppState::new(cfg, handle, source)?;
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await.map_err(|e| {
        fluxmetrics_core::MetricsError::Config(format!("cannot listen on {listen}: {e}"))
    })?;

    tracing::info!(%listen, tls = tls.is_some(), version = env!("CARGO_PKG_VERSION"), "fluxmetrics-apiserver starting");
    transport::serve(listener, app, tls).await
}
