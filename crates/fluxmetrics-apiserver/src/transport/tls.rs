//! TLS termination for the API server.
//!
//! Certificates are read once at startup; a missing or unreadable pair is a
//! configuration error. Each accepted connection is handshaked on its own
//! task and then served over HTTP/1.1 by hyper.

use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use fluxmetrics_core::error::{MetricsError, Result};

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| MetricsError::Config(format!("cannot open {}: {e}", path.display())))
}

pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MetricsError::Config(format!("invalid certificate {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(MetricsError::Config(format!("no certificate in {}", path.display())));
    }
    Ok(certs)
}

pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| MetricsError::Config(format!("invalid private key {}: {e}", path.display())))?
        .ok_or_else(|| MetricsError::Config(format!("no private key in {}", path.display())))
}

pub fn load_server_config(cert: &Path, key: &Path) -> Result<Arc<ServerConfig>> {
    let certs = load_certs(cert)?;
    let key = load_key(key)?;

    let mut cfg = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| MetricsError::Config(format!("tls protocol setup failed: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| MetricsError::Config(format!("tls certificate rejected: {e}")))?;
    cfg.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(cfg))
}

pub async fn serve_tls(
    listener: TcpListener,
    app: Router,
    cfg: Arc<ServerConfig>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let acceptor = TlsAcceptor::from(cfg);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let acceptor = acceptor.clone();
                let app = app.clone();

                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::debug!(%peer, error = %e, "tls handshake failed");
                            return;
                        }
                    };
                    let io = TokioIo::new(tls_stream);
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(io, TowerToHyperService::new(app))
                        .await
                    {
                        tracing::debug!(%peer, error = %e, "connection error");
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("tls listener shutting down");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn missing_files_are_config_errors() {
        let err = load_server_config(Path::new("/nonexistent/tls.crt"), Path::new("/nonexistent/tls.key"))
            .unwrap_err();
        assert_eq!(err.client_code().as_str(), "CONFIG");
    }

    #[test]
    fn pem_without_certificates_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("tls.crt");
        std::fs::write(&cert, "not a pem file\n").unwrap();
        assert!(load_certs(&cert).is_err());
    }
}
