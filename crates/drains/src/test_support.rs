//! Shared fixtures for drain tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carrier_protocol::{Envelope, LogType};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use crate::binding::{Binding, Drain, DrainScope, SyslogFormat};
use crate::error::Result;
use crate::fetcher::BindingReader;

/// A syslog drain stand-in: accepts TCP connections and records every
/// octet-framed message.
pub(crate) struct SyslogServer {
    pub(crate) addr: std::net::SocketAddr,
    pub(crate) messages: Arc<Mutex<Vec<String>>>,
    pub(crate) connections: Arc<AtomicU64>,
}

impl SyslogServer {
    pub(crate) async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        Self::from_listener(listener)
    }

    pub(crate) fn from_listener(listener: TcpListener) -> Self {
        let addr = listener.local_addr().expect("local addr");
        let messages: Arc<Mutex<Vec<String>>> = Arc::default();
        let connections: Arc<AtomicU64> = Arc::default();

        let recorded = Arc::clone(&messages);
        let accepted = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                accepted.fetch_add(1, Ordering::Relaxed);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    while let Some(message) = read_octet_frame(&mut stream).await {
                        recorded.lock().push(message);
                    }
                });
            }
        });

        Self {
            addr,
            messages,
            connections,
        }
    }

    pub(crate) fn url(&self) -> String {
        format!("syslog://{}", self.addr)
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Wait until at least `count` messages arrived.
    pub(crate) async fn wait_for(&self, count: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.messages.lock().len() >= count {
                    return self.messages();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} messages, got {:?}", self.messages()))
    }
}

/// Read one `<len> <msg>` octet-counted frame.
async fn read_octet_frame(stream: &mut tokio::net::TcpStream) -> Option<String> {
    let mut len = 0usize;
    loop {
        let byte = stream.read_u8().await.ok()?;
        if byte == b' ' {
            break;
        }
        if !byte.is_ascii_digit() {
            return None;
        }
        len = len * 10 + (byte - b'0') as usize;
        if len > 1024 * 1024 {
            return None;
        }
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.ok()?;
    String::from_utf8(body).ok()
}

/// Binding reader whose contents tests can swap at will.
#[derive(Clone, Default)]
pub(crate) struct SwappableReader {
    bindings: Arc<Mutex<Vec<Binding>>>,
    fail: Arc<std::sync::atomic::AtomicBool>,
}

impl SwappableReader {
    pub(crate) fn set(&self, bindings: Vec<Binding>) {
        *self.bindings.lock() = bindings;
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl BindingReader for SwappableReader {
    async fn fetch_bindings(&self) -> Result<Vec<Binding>> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(crate::error::DrainError::InvalidUrl {
                url: "provider".into(),
                reason: "unavailable".into(),
            });
        }
        Ok(self.bindings.lock().clone())
    }
}

pub(crate) fn app_binding(app_id: &str, urls: &[&str]) -> Binding {
    binding_scoped(app_id, urls, DrainScope::App)
}

pub(crate) fn binding_scoped(app_id: &str, urls: &[&str], scope: DrainScope) -> Binding {
    Binding {
        app_id: app_id.into(),
        hostname: format!("test.{app_id}"),
        drains: urls
            .iter()
            .map(|url| Drain {
                url: (*url).into(),
                scope,
                credentials: None,
                format: SyslogFormat::Rfc5424,
            })
            .collect(),
    }
}

pub(crate) fn log_envelope(source_id: &str, text: &str) -> Envelope {
    let mut envelope = Envelope::log(source_id, text.as_bytes().to_vec(), LogType::Out);
    envelope.timestamp = 1_700_000_000_000_000_000;
    envelope
}
