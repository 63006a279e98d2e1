//! TLS client setup for the hub connection

use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::error::SinkError;

/// Connector plus the verified server name.
pub(crate) struct HubTls {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

impl HubTls {
    /// Build the TLS client configuration.
    ///
    /// `server_name` falls back to the host part of `addr`; `ca_file`
    /// falls back to the webpki root store.
    pub(crate) fn build(addr: &str, server_name: &str, ca_file: &str) -> Result<Self, SinkError> {
        let name = if server_name.is_empty() {
            addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr)
        } else {
            server_name
        };
        let server_name = ServerName::try_from(name.to_string())
            .map_err(|e| SinkError::Tls(format!("invalid server name '{name}': {e}")))?;

        let mut roots = RootCertStore::empty();
        if ca_file.is_empty() {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        } else {
            let pem = std::fs::read(ca_file)
                .map_err(|e| SinkError::Tls(format!("failed to read CA file '{ca_file}': {e}")))?;
            for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
                let cert = cert
                    .map_err(|e| SinkError::Tls(format!("bad certificate in '{ca_file}': {e}")))?;
                roots
                    .add(cert)
                    .map_err(|e| SinkError::Tls(format!("unusable certificate: {e}")))?;
            }
        }

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
        })
    }

    pub(crate) async fn connect(&self, stream: TcpStream) -> std::io::Result<TlsStream<TcpStream>> {
        self.connector
            .connect(self.server_name.clone(), stream)
            .await
    }
}
