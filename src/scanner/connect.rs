//! Baseline strategy: a full TCP connect per port.
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use log::debug;
use tokio::{io::AsyncWriteExt, net::TcpStream, time};

use super::PortScanner;
use crate::error::Result;
use crate::results::{PortStatus, ScanResult};

#[derive(Debug, Clone)]
pub struct ConnectScanner {
    timeout: Duration,
}

impl ConnectScanner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Connects to `socket` once and classifies the outcome.
    ///
    /// Established means open, an elapsed timeout means filtered, and a refusal
    /// or any other transport error means closed.
    pub async fn scan_socket(&self, socket: SocketAddr) -> PortStatus {
        match self.connect(socket).await {
            Ok(Ok(stream)) => {
                debug!("Connection was successful, shutting down stream {}", &socket);
                if let Err(e) = { stream }.shutdown().await {
                    debug!("Shutdown stream error {}", &e);
                }
                PortStatus::Open
            }
            Ok(Err(e)) => {
                debug!("Connection to {} failed: {}", socket, e);
                PortStatus::Closed
            }
            Err(_elapsed) => {
                debug!("Connection to {} timed out after {:?}", socket, self.timeout);
                PortStatus::Filtered
            }
        }
    }

    /// Performs the connection to the socket with timeout.
    ///
    /// The outer `Err` is the timeout, the inner one the connect error.
    async fn connect(
        &self,
        socket: SocketAddr,
    ) -> std::result::Result<io::Result<TcpStream>, time::error::Elapsed> {
        time::timeout(self.timeout, TcpStream::connect(socket)).await
    }
}

impl PortScanner for ConnectScanner {
    async fn scan(&self, host: IpAddr, ports: &[u16]) -> Result<ScanResult> {
        let mut result = ScanResult::new(host);
        for &port in ports {
            let status = self.scan_socket(SocketAddr::new(host, port)).await;
            result.record(port, status);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn scanner() -> ConnectScanner {
        ConnectScanner::new(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        assert_eq!(scanner().scan_socket(addr).await, PortStatus::Open);
    }

    #[tokio::test]
    async fn released_port_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert_eq!(scanner().scan_socket(addr).await, PortStatus::Closed);
    }

    #[tokio::test]
    async fn scan_keeps_every_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = {
            let tmp = TcpListener::bind("127.0.0.1:0").await.unwrap();
            tmp.local_addr().unwrap().port()
        };

        let host: IpAddr = "127.0.0.1".parse().unwrap();
        let result = scanner().scan(host, &[open, closed]).await.unwrap();

        assert_eq!(result.host, host);
        assert_eq!(result.ports[&open], PortStatus::Open);
        assert_eq!(result.ports[&closed], PortStatus::Closed);
        assert!(result.ping.is_none());
    }
}
