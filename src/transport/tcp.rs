//! Connection establishment.
//!
//! The session engine never opens sockets itself; it asks a [`Connector`] for a
//! stream. Production code uses [`TcpConnector`]; tests substitute in-memory pipes.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

use crate::error::{constants, ProtocolError, Result};
use crate::utils::timeout::{with_timeout_error, DEFAULT_CONNECT_TIMEOUT};

/// A freshly opened stream and the local address it is bound to.
pub struct Connection<S> {
    pub stream: S,
    pub local_ip: Ipv4Addr,
}

/// Opens byte streams to IPv4 endpoints.
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    fn connect(
        &self,
        address: SocketAddrV4,
    ) -> impl Future<Output = Result<Connection<Self::Stream>>>;
}

/// Plain TCP with a connect deadline.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    #[instrument(skip(self), fields(timeout_ms = self.connect_timeout.as_millis() as u64))]
    async fn connect(&self, address: SocketAddrV4) -> Result<Connection<TcpStream>> {
        let connect = async {
            TcpStream::connect(SocketAddr::V4(address))
                .await
                .map_err(|source| ProtocolError::ConnectFailed { address, source })
        };

        let stream = with_timeout_error(connect, self.connect_timeout)
            .await
            .inspect_err(|e| {
                if matches!(e, ProtocolError::Timeout) {
                    warn!(%address, "{}", constants::ERR_CONNECT_TIMEOUT);
                }
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        let local_ip = match stream.local_addr()?.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(ip) => ip.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
        };

        debug!(%address, %local_ip, "Connected");
        Ok(Connection { stream, local_ip })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_reports_local_ipv4() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = match listener.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!(),
        };

        let connection = TcpConnector::default().connect(address).await.unwrap();
        assert_eq!(connection.local_ip, Ipv4Addr::LOCALHOST);
    }

    #[tokio::test]
    async fn test_refused_connection_names_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = match listener.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!(),
        };
        drop(listener);

        match TcpConnector::default().connect(address).await {
            Err(ProtocolError::ConnectFailed { address: failed, .. }) => {
                assert_eq!(failed, address)
            }
            Err(other) => panic!("Unexpected error: {other}"),
            Ok(_) => panic!("Connected to a closed port"),
        }
    }
}
