//! TLS client stream backed by rustls + ring.
//!
//! One [`ClientConfig`] is built per [`TlsConnector`] and shared across
//! connections; it trusts Mozilla's root CA bundle and validates the
//! server hostname.

use std::net::TcpStream;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};

use burrow_types::{BurrowError, Result};

/// Shared, reusable TLS client configuration (one per transport).
pub struct TlsConnector {
    config: Arc<ClientConfig>,
}

impl TlsConnector {
    /// Build a connector that trusts Mozilla's root CA bundle.
    pub fn new() -> Self {
        let root_store =
            rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self {
            config: Arc::new(config),
        }
    }

    /// Wrap an already connected socket in a TLS session for `server_name`.
    pub fn connect(
        &self,
        stream: TcpStream,
        server_name: &str,
    ) -> Result<StreamOwned<ClientConnection, TcpStream>> {
        let sni = ServerName::try_from(server_name.to_owned())
            .map_err(|e| BurrowError::Tls(format!("invalid server name {server_name}: {e}")))?;

        let conn = ClientConnection::new(Arc::clone(&self.config), sni)
            .map_err(|e| BurrowError::Tls(format!("TLS init: {e}")))?;

        Ok(StreamOwned::new(conn, stream))
    }
}

impl Default for TlsConnector {
    fn default() -> Self {
        Self::new()
    }
}
