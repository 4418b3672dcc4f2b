//! Process-wide TLS client configuration.
//!
//! `rustls::ClientConfig` construction touches process-global crypto-provider
//! state, so it is built exactly once, wrapped in an `Arc`, and shared by
//! every `SocketCreator` that needs it. It is torn down (dropped) along
//! with the `SocketCreator` that built it — nothing else in the crate
//! retains a handle to it.

use crate::error::{QueueError, Result};
use rustls::{ClientConfig, RootCertStore};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

/// Builds the shared `rustls::ClientConfig` used by every TLS connection
/// this process makes, trusting exactly the CA certificates named in
/// `extra_pem_paths` (news servers are typically reached with either a
/// public CA or an operator-supplied private one; this crate does not
/// bundle a public root bundle — see spec's Non-goal on SSL policy).
pub fn build_client_config(extra_pem_paths: &[String]) -> Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();

    for path in extra_pem_paths {
        let file = File::open(path).map_err(QueueError::Io)?;
        let mut reader = BufReader::new(file);
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(QueueError::Io)?;
            roots
                .add(cert)
                .map_err(|e| QueueError::Tls(format!("{path}: {e}")))?;
        }
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}
