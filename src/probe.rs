//! Host reachability probes run before port scanning.
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use log::{debug, trace};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::results::PingStatus;

/// Answers "is this host up?" once per host.
pub trait Probe {
    fn probe(&self, host: IpAddr) -> impl Future<Output = PingStatus> + Send;
}

/// TCP connect probe: the host is up as soon as any of a few common ports
/// either accepts or actively refuses a connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    ports: Vec<u16>,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self { ports, timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(vec![80, 443, 22], Duration::from_secs(2))
    }
}

impl Probe for TcpProbe {
    async fn probe(&self, host: IpAddr) -> PingStatus {
        let start = Instant::now();

        for &port in &self.ports {
            let addr = SocketAddr::new(host, port);
            trace!("TCP connect probe to {}", addr);

            let answered = match timeout(self.timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => true,
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => true,
                Ok(Err(e)) => {
                    trace!("TCP connect to {} failed: {}", addr, e);
                    false
                }
                Err(_) => {
                    trace!("TCP connect to {} timed out", addr);
                    false
                }
            };

            if answered {
                let latency_ms = start.elapsed().as_millis() as u64;
                debug!("Host {} is up (port {} answered in {} ms)", host, port, latency_ms);
                return PingStatus::up(latency_ms);
            }
        }

        debug!("Host {} appears down (no TCP response)", host);
        PingStatus::down()
    }
}

/// A probe that never succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl Probe for NoProbe {
    async fn probe(&self, _host: IpAddr) -> PingStatus {
        PingStatus::down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listener_means_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpProbe::new(vec![port], Duration::from_millis(500));

        let status = probe.probe(IpAddr::from([127, 0, 0, 1])).await;
        assert!(status.success);
    }

    #[tokio::test]
    async fn refusal_means_up() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = TcpProbe::new(vec![port], Duration::from_millis(500));

        assert!(probe.probe(IpAddr::from([127, 0, 0, 1])).await.success);
    }

    #[tokio::test]
    async fn no_ports_means_down() {
        let probe = TcpProbe::new(vec![], Duration::from_millis(10));
        assert_eq!(
            probe.probe(IpAddr::from([127, 0, 0, 1])).await,
            PingStatus::down()
        );
    }

    #[tokio::test]
    async fn no_probe_always_fails() {
        assert!(!NoProbe.probe(IpAddr::from([127, 0, 0, 1])).await.success);
    }
}
