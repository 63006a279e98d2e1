//! Drain transports
//!
//! One transport per drain URL scheme: plain TCP for `syslog://`, TLS
//! for `syslog-tls://`, and per-message HTTPS POST for `https://`. The
//! writer state machine drives `connect` / `send` and treats every
//! error as transport-transient (backoff); certificate problems are
//! surfaced at connect time.

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::binding::DrainSpec;
use crate::error::DrainError;

/// Shared TLS/HTTP client material for every writer.
pub(crate) struct TransportFactory {
    tls_config: Arc<rustls::ClientConfig>,
    http_client: reqwest::Client,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TransportFactory {
    /// Build the shared client material once.
    ///
    /// `ca_file` pins drain server certificates (empty: webpki roots);
    /// `skip_verify` disables verification for both TLS and HTTPS
    /// drains.
    pub(crate) fn new(
        ca_file: &str,
        skip_verify: bool,
        connect_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, DrainError> {
        let tls_config = if skip_verify {
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(danger::NoVerification::new()?))
                .with_no_client_auth()
        } else {
            let mut roots = RootCertStore::empty();
            if ca_file.is_empty() {
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            } else {
                let pem = std::fs::read(ca_file).map_err(|e| {
                    DrainError::ClientTls(format!("failed to read '{ca_file}': {e}"))
                })?;
                for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
                    let cert = cert.map_err(|e| {
                        DrainError::ClientTls(format!("bad certificate in '{ca_file}': {e}"))
                    })?;
                    roots
                        .add(cert)
                        .map_err(|e| DrainError::ClientTls(format!("unusable certificate: {e}")))?;
                }
            }
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        };

        let mut http_builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(write_timeout)
            .connect_timeout(connect_timeout);
        if skip_verify {
            http_builder = http_builder.danger_accept_invalid_certs(true);
        }
        let http_client = http_builder
            .build()
            .map_err(|e| DrainError::ClientTls(e.to_string()))?;

        Ok(Self {
            tls_config: Arc::new(tls_config),
            http_client,
            connect_timeout,
            write_timeout,
        })
    }

    /// Open a connection for the drain. For HTTPS drains this is a
    /// no-op success; each message is its own request.
    pub(crate) async fn connect(&self, spec: &DrainSpec) -> Result<DrainConnection, DrainError> {
        match spec.url.scheme() {
            "syslog" => {
                let stream = self.dial(spec).await?;
                Ok(DrainConnection::Stream(Box::new(stream)))
            }
            "syslog-tls" => {
                let stream = self.dial(spec).await?;
                let server_name = ServerName::try_from(spec.host().to_string())
                    .map_err(|e| DrainError::ClientTls(format!("invalid server name: {e}")))?;
                let connector = TlsConnector::from(Arc::clone(&self.tls_config));
                let tls = timeout(self.connect_timeout, connector.connect(server_name, stream))
                    .await
                    .map_err(|_| {
                        DrainError::Connect(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "tls handshake timed out",
                        ))
                    })?
                    .map_err(DrainError::Connect)?;
                Ok(DrainConnection::Stream(Box::new(tls)))
            }
            _ => Ok(DrainConnection::Https),
        }
    }

    async fn dial(&self, spec: &DrainSpec) -> Result<TcpStream, DrainError> {
        let addr = (spec.host().to_string(), spec.port());
        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                DrainError::Connect(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                ))
            })?
            .map_err(DrainError::Connect)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY on drain connection");
        }
        Ok(stream)
    }

    /// Send one rendered message over the connection.
    ///
    /// Stream drains get octet-counted framing; HTTPS drains POST the
    /// bare message, with any non-2xx status counting as a write
    /// failure.
    pub(crate) async fn send(
        &self,
        spec: &DrainSpec,
        connection: &mut DrainConnection,
        message: &[u8],
    ) -> Result<(), DrainError> {
        match connection {
            DrainConnection::Stream(stream) => {
                let framed = crate::syslog::octet_frame(message);
                timeout(self.write_timeout, async {
                    stream.write_all(&framed).await?;
                    stream.flush().await
                })
                .await
                .map_err(|_| {
                    DrainError::Write(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "write timed out",
                    ))
                })?
                .map_err(DrainError::Write)?;
                Ok(())
            }
            DrainConnection::Https => {
                let response = self
                    .http_client
                    .post(spec.url.as_str())
                    .header("Content-Type", "text/plain")
                    .body(message.to_vec())
                    .send()
                    .await
                    .map_err(|e| {
                        DrainError::Write(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            e.to_string(),
                        ))
                    })?;

                if !response.status().is_success() {
                    return Err(DrainError::Write(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("drain returned status {}", response.status()),
                    )));
                }
                Ok(())
            }
        }
    }
}

/// An open path to a drain.
pub(crate) enum DrainConnection {
    /// TCP or TLS stream (octet-counted frames)
    Stream(Box<dyn AsyncWrite + Send + Unpin>),
    /// Per-message HTTPS POST; connectionless
    Https,
}

mod danger {
    //! Certificate verifier for `tls_skip_verify` drains.

    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::CryptoProvider;
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};

    use crate::error::DrainError;

    /// Accepts any server certificate. Only reachable behind the
    /// explicit `tls_skip_verify` configuration flag.
    #[derive(Debug)]
    pub(super) struct NoVerification {
        provider: std::sync::Arc<CryptoProvider>,
    }

    impl NoVerification {
        pub(super) fn new() -> Result<Self, DrainError> {
            let provider = CryptoProvider::get_default()
                .cloned()
                .unwrap_or_else(|| std::sync::Arc::new(rustls::crypto::aws_lc_rs::default_provider()));
            Ok(Self { provider })
        }
    }

    impl ServerCertVerifier for NoVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &rustls::DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls12_signature(
                message,
                cert,
                dss,
                &self.provider.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &rustls::DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls13_signature(
                message,
                cert,
                dss,
                &self.provider.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
            self.provider
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}
