//! Connection transports.
//!
//! The engine speaks lines over exactly one of: plaintext TCP, TLS
//! (tokio-rustls), or an in-memory duplex pipe. The duplex variant exists
//! so tests and embedders can run the full engine, handshake included,
//! without a socket.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{rustls, TlsConnector};
use tracing::warn;

use crate::error::{ClientError, Result};

pub(crate) type ReadHalf = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type WriteHalf = Box<dyn AsyncWrite + Send + Unpin>;

/// An established, not-yet-registered connection.
pub enum Transport {
    /// Plaintext TCP.
    Tcp(TcpStream),
    /// TLS over TCP.
    Tls(Box<TlsStream<TcpStream>>),
    /// In-memory pipe.
    Local(DuplexStream),
}

impl Transport {
    /// Dial a plaintext connection. No retries: the reconnect loop owns
    /// retry policy.
    pub async fn dial(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(ClientError::Dial)?;
        if let Err(e) = enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }
        Ok(Self::Tcp(stream))
    }

    /// Dial a TLS connection, verifying `server_name` against the
    /// certificate. `config` overrides the default webpki trust roots.
    pub async fn dial_tls(
        addr: &str,
        server_name: &str,
        config: Option<Arc<rustls::ClientConfig>>,
    ) -> Result<Self> {
        let tcp = TcpStream::connect(addr).await.map_err(ClientError::Dial)?;
        if let Err(e) = enable_keepalive(&tcp) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        let config = config.unwrap_or_else(default_tls_config);
        let connector = TlsConnector::from(config);
        let dns_name = rustls::pki_types::ServerName::try_from(server_name.to_string())
            .map_err(|e| ClientError::Tls(e.to_string()))?;
        let stream = connector
            .connect(dns_name, tcp)
            .await
            .map_err(|e| ClientError::Tls(e.to_string()))?;
        Ok(Self::Tls(Box::new(stream)))
    }

    /// Wrap one end of an in-memory duplex pipe.
    pub fn local(stream: DuplexStream) -> Self {
        Self::Local(stream)
    }

    /// Whether this transport is encrypted.
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    pub(crate) fn into_split(self) -> (ReadHalf, WriteHalf) {
        match self {
            Self::Tcp(stream) => {
                let (r, w) = tokio::io::split(stream);
                (Box::new(r), Box::new(w))
            }
            Self::Tls(stream) => {
                let (r, w) = tokio::io::split(*stream);
                (Box::new(r), Box::new(w))
            }
            Self::Local(stream) => {
                let (r, w) = tokio::io::split(stream);
                (Box::new(r), Box::new(w))
            }
        }
    }
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    use socket2::{SockRef, TcpKeepalive};
    use std::time::Duration;

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));

    sock.set_tcp_keepalive(&keepalive)
}

fn default_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    )
}
