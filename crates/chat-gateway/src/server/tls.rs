//! TLS acceptor from PEM files

use chat_common::{AppError, TlsConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, private_key};
use std::fs;
use std::io::BufReader;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Build the listener's acceptor from the configured certificate chain and key
pub fn load_tls_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, AppError> {
    let cert_chain = load_cert_chain(&config.cert_path)?;
    let key = load_private_key(&config.key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let server_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| AppError::Tls(format!("protocol versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| AppError::Tls(format!("certificate: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_cert_chain(path: &str) -> Result<Vec<CertificateDer<'static>>, AppError> {
    let pem = fs::read(path).map_err(|e| AppError::Tls(format!("read {path}: {e}")))?;
    let chain = certs(&mut BufReader::new(pem.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Tls(format!("parse {path}: {e}")))?;
    if chain.is_empty() {
        return Err(AppError::Tls(format!("no certificates in {path}")));
    }
    Ok(chain)
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, AppError> {
    let pem = fs::read(path).map_err(|e| AppError::Tls(format!("read {path}: {e}")))?;
    private_key(&mut BufReader::new(pem.as_slice()))
        .map_err(|e| AppError::Tls(format!("parse {path}: {e}")))?
        .ok_or_else(|| AppError::Tls(format!("no private key in {path}")))
}
